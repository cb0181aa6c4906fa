// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use linera_sdk::linera_base_types::{AccountOwner, Amount};
use lottery_pool_abi::{LotteryEvent, PoolConfig};
use num_bigint::BigUint;
use num_traits::cast::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::entropy::{derive_seed, select_index, EntropySource};
use crate::error::LotteryError;

/// Moves currency in and out of the pool.
pub trait Treasury {
    /// Collect a stake from `from` into the pool.
    fn receive(&mut self, from: AccountOwner, amount: Amount) -> Result<(), LotteryError>;

    /// Pay out every transfer in `payouts`, or none of them.
    fn settle(&mut self, payouts: &[Payout]) -> Result<(), LotteryError>;
}

/// Receives pool notifications. Only called once an operation has committed.
pub trait EventSink {
    fn notify(&mut self, event: LotteryEvent);
}

impl EventSink for Vec<LotteryEvent> {
    fn notify(&mut self, event: LotteryEvent) {
        self.push(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payout {
    pub recipient: AccountOwner,
    pub amount: Amount,
}

/// Result of a successful draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawOutcome {
    pub round: u64,
    pub winner: AccountOwner,
    pub winner_index: usize,
    pub winner_prize: Amount,
    pub manager_fee: Amount,
    pub player_count: u64,
}

/// Split `balance` into the winner's prize (`share_percent`, rounded down)
/// and the manager's fee (everything else).
pub fn split_pool(balance: Amount, share_percent: u8) -> Result<(Amount, Amount), LotteryError> {
    // BigUint so that balance * percent cannot overflow u128
    let balance_big = BigUint::from(u128::from(balance));
    let prize_big = balance_big * BigUint::from(share_percent) / BigUint::from(100u8);
    let prize = prize_big.to_u128().ok_or(LotteryError::BalanceOverflow)?;

    let winner_prize = Amount::from_attos(prize);
    let manager_fee = balance
        .try_sub(winner_prize)
        .map_err(|_| LotteryError::BalanceOverflow)?;
    Ok((winner_prize, manager_fee))
}

/// Checks an entry can make without the pool's balance, so a chain that
/// only knows the manager can reject it before moving any funds.
pub fn check_entry(manager: AccountOwner, caller: AccountOwner, amount: Amount) -> Result<(), LotteryError> {
    if amount.is_zero() {
        return Err(LotteryError::InsufficientFunds);
    }
    if caller == manager {
        return Err(LotteryError::ManagerNotAllowed);
    }
    Ok(())
}

/// The pooled-wager state machine.
///
/// Entries accumulate until a draw pays the winner and the manager and
/// clears the round. The manager and the rules never change after [`LotteryPool::new`].
/// Past winners are reported through [`DrawOutcome`] and kept by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryPool {
    manager: AccountOwner,
    config: PoolConfig,
    players: Vec<AccountOwner>,
    balance: Amount,
    rounds_completed: u64,
}

impl LotteryPool {
    pub fn new(manager: AccountOwner, config: PoolConfig) -> Result<Self, LotteryError> {
        if config.minimum_players == 0 {
            return Err(LotteryError::InvalidConfig("minimum_players must be at least 1"));
        }
        if config.open_draw_threshold < config.minimum_players {
            return Err(LotteryError::InvalidConfig(
                "open_draw_threshold must not be below minimum_players",
            ));
        }
        if config.winner_share_percent > 100 {
            return Err(LotteryError::InvalidConfig("winner_share_percent must be at most 100"));
        }

        Ok(LotteryPool {
            manager,
            config,
            players: Vec::new(),
            balance: Amount::ZERO,
            rounds_completed: 0,
        })
    }

    /// Enter `caller` into the current round with a stake of `amount`.
    pub fn enter(
        &mut self,
        caller: AccountOwner,
        amount: Amount,
        treasury: &mut impl Treasury,
        events: &mut impl EventSink,
    ) -> Result<(), LotteryError> {
        check_entry(self.manager, caller, amount)?;
        let balance = self
            .balance
            .try_add(amount)
            .map_err(|_| LotteryError::BalanceOverflow)?;

        treasury.receive(caller, amount)?;

        self.players.push(caller);
        self.balance = balance;
        events.notify(LotteryEvent::PlayerEntered {
            owner: caller,
            amount,
        });
        Ok(())
    }

    /// Check that `caller` may draw right now.
    pub fn authorize_draw(&self, caller: AccountOwner) -> Result<(), LotteryError> {
        let player_count = self.total_players();
        if player_count < self.config.minimum_players {
            return Err(LotteryError::NotEnoughPlayers);
        }
        if caller == self.manager {
            return Ok(());
        }
        if player_count < self.config.open_draw_threshold {
            return Err(LotteryError::NotManager);
        }
        if !self.players.contains(&caller) {
            return Err(LotteryError::NotParticipant);
        }
        Ok(())
    }

    /// Select a winner, pay the prize and the manager fee, and reset the round.
    pub fn pick_winner(
        &mut self,
        caller: AccountOwner,
        treasury: &mut impl Treasury,
        entropy: &impl EntropySource,
        events: &mut impl EventSink,
    ) -> Result<DrawOutcome, LotteryError> {
        self.authorize_draw(caller)?;

        let player_count = self.total_players();
        let seed = derive_seed(&entropy.seed_material()?, player_count);
        let winner_index = select_index(seed, player_count);
        let winner = self.players[winner_index];
        let (winner_prize, manager_fee) = split_pool(self.balance, self.config.winner_share_percent)?;

        let payouts: Vec<Payout> = [
            Payout {
                recipient: winner,
                amount: winner_prize,
            },
            Payout {
                recipient: self.manager,
                amount: manager_fee,
            },
        ]
        .into_iter()
        .filter(|payout| !payout.amount.is_zero())
        .collect();

        // The round is detached before any funds leave, and reattached if they can't.
        let players = std::mem::take(&mut self.players);
        let balance = std::mem::replace(&mut self.balance, Amount::ZERO);
        if let Err(error) = treasury.settle(&payouts) {
            self.players = players;
            self.balance = balance;
            return Err(error);
        }
        self.rounds_completed += 1;

        events.notify(LotteryEvent::WinnerSelected { winner });
        events.notify(LotteryEvent::WinnerPrize {
            amount: winner_prize,
        });
        events.notify(LotteryEvent::ManagerFee {
            amount: manager_fee,
        });

        Ok(DrawOutcome {
            round: self.rounds_completed,
            winner,
            winner_index,
            winner_prize,
            manager_fee,
            player_count,
        })
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn total_players(&self) -> u64 {
        self.players.len() as u64
    }

    pub fn player(&self, index: u64) -> Result<AccountOwner, LotteryError> {
        lookup(&self.players, index)
    }

    pub fn players(&self) -> &[AccountOwner] {
        &self.players
    }

    pub fn manager(&self) -> AccountOwner {
        self.manager
    }

    pub fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }
}

fn lookup(entries: &[AccountOwner], index: u64) -> Result<AccountOwner, LotteryError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| entries.get(i).copied())
        .ok_or(LotteryError::IndexOutOfRange {
            index,
            len: entries.len() as u64,
        })
}
