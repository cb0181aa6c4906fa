// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

/*! Lottery Pool Application - pooled wager with a manager-run draw */

pub mod entropy;
pub mod error;
pub mod pool;
pub mod shared;

pub use entropy::{BlockEntropy, EntropySource};
pub use error::LotteryError;
pub use pool::{check_entry, DrawOutcome, EventSink, LotteryPool, Payout, Treasury};
pub use shared::SharedLotteryPool;

// Re-export the ABI for this crate
pub use lottery_pool_abi::{
    DrawRecord,
    LotteryEvent,
    LotteryPoolAbi,
    LotteryPoolMessage as Message,
    LotteryPoolOperation,
    LotteryPoolParameters,
    LotteryPoolResponse,
    PoolConfig,
    LOTTERY_STREAM_NAME,
};
