// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

/*! Shared ABI definitions for the Lottery Pool application */

use async_graphql::{Request, Response, SimpleObject};
use linera_sdk::linera_base_types::{AccountOwner, Amount, ChainId, ContractAbi, ServiceAbi};
use serde::{Deserialize, Serialize};

/// Name of the event stream carrying [`LotteryEvent`]s.
pub const LOTTERY_STREAM_NAME: &[u8] = b"lottery_pool";

pub const DEFAULT_MINIMUM_PLAYERS: u64 = 3;
pub const DEFAULT_OPEN_DRAW_THRESHOLD: u64 = 10;
pub const DEFAULT_WINNER_SHARE_PERCENT: u8 = 90;

pub struct LotteryPoolAbi;

impl ContractAbi for LotteryPoolAbi {
    type Operation = LotteryPoolOperation;
    type Response = LotteryPoolResponse;
}

impl ServiceAbi for LotteryPoolAbi {
    type Query = Request;
    type QueryResponse = Response;
}

/// Application parameters, readable on every chain the application runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryPoolParameters {
    /// Collects the fee and may always draw; never a participant.
    pub manager: AccountOwner,
}

/// Pool rules fixed at instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct PoolConfig {
    /// Quorum: fewest players a draw may run with.
    pub minimum_players: u64,
    /// Player count from which any participant may trigger the draw.
    pub open_draw_threshold: u64,
    /// Share of the pool paid to the winner; the manager keeps the rest.
    pub winner_share_percent: u8,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            minimum_players: DEFAULT_MINIMUM_PLAYERS,
            open_draw_threshold: DEFAULT_OPEN_DRAW_THRESHOLD,
            winner_share_percent: DEFAULT_WINNER_SHARE_PERCENT,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub enum LotteryPoolOperation {
    /// Explicit entry into the current round, executed on the pool chain
    EnterLottery { owner: AccountOwner, amount: Amount },
    /// Plain value transfer to the pool; counts as an entry.
    /// Works from any chain: remote chains forward the funds and a `Deposit` message.
    Transfer { owner: AccountOwner, amount: Amount },
    /// Draw a winner, pay out and reset the round
    PickWinner { owner: AccountOwner },

    // Queries
    GetBalance,
    GetTotalPlayers,
    GetPlayer { index: u64 },
    GetLotteryManager,
    GetLotteryWinner { index: u64 },
}

#[derive(Debug, Deserialize, Serialize)]
pub enum LotteryPoolResponse {
    Ok,
    /// Deposit forwarded to the pool chain
    Forwarded,
    Balance(Amount),
    TotalPlayers(u64),
    Player(AccountOwner),
    Manager(AccountOwner),
    Winner(AccountOwner),
    WinnerPicked {
        round: u64,
        winner: AccountOwner,
        winner_prize: Amount,
        manager_fee: Amount,
    },
}

#[derive(Debug, Deserialize, Serialize)]
pub enum LotteryPoolMessage {
    /// Funds already credited to the pool account; enter `owner` with `amount`.
    /// Refunded to `source_chain_id` if the pool rejects the entry.
    Deposit {
        owner: AccountOwner,
        amount: Amount,
        source_chain_id: ChainId,
    },
}

/// Notifications published on [`LOTTERY_STREAM_NAME`] after successful operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotteryEvent {
    PlayerEntered { owner: AccountOwner, amount: Amount },
    WinnerSelected { winner: AccountOwner },
    WinnerPrize { amount: Amount },
    ManagerFee { amount: Amount },
}

/// One completed draw, as kept in the pool's history
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct DrawRecord {
    pub round: u64,
    pub winner: AccountOwner,
    pub winner_prize: Amount,
    pub manager_fee: Amount,
    pub player_count: u64,
    pub timestamp: u64,
}
