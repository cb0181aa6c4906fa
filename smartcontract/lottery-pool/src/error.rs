// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use linera_sdk::views::ViewError;
use thiserror::Error;

/// Reasons a pool operation is rejected. A rejected operation has no effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LotteryError {
    #[error("Not enough funds!")]
    InsufficientFunds,

    #[error("The manager can not participate in the lottery!")]
    ManagerNotAllowed,

    #[error("Not enough players to finish lottery!")]
    NotEnoughPlayers,

    #[error("You are not manager!")]
    NotManager,

    #[error("You are not participate in the lottery!")]
    NotParticipant,

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: u64, len: u64 },

    #[error("Pool balance overflow")]
    BalanceOverflow,

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Entropy unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<ViewError> for LotteryError {
    fn from(error: ViewError) -> Self {
        LotteryError::Storage(error.to_string())
    }
}
