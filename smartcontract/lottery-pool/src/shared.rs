// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! A pool shared between threads of a host that does not serialize calls itself.
//! Entry and draw go through the same lock, so neither can see the other half-done.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use linera_sdk::linera_base_types::{AccountOwner, Amount};

use crate::entropy::EntropySource;
use crate::error::LotteryError;
use crate::pool::{DrawOutcome, EventSink, LotteryPool, Treasury};

#[derive(Debug, Clone)]
pub struct SharedLotteryPool {
    inner: Arc<Mutex<LotteryPool>>,
}

impl SharedLotteryPool {
    pub fn new(pool: LotteryPool) -> Self {
        SharedLotteryPool {
            inner: Arc::new(Mutex::new(pool)),
        }
    }

    pub fn enter(
        &self,
        caller: AccountOwner,
        amount: Amount,
        treasury: &mut impl Treasury,
        events: &mut impl EventSink,
    ) -> Result<(), LotteryError> {
        self.lock().enter(caller, amount, treasury, events)
    }

    pub fn pick_winner(
        &self,
        caller: AccountOwner,
        treasury: &mut impl Treasury,
        entropy: &impl EntropySource,
        events: &mut impl EventSink,
    ) -> Result<DrawOutcome, LotteryError> {
        self.lock().pick_winner(caller, treasury, entropy, events)
    }

    /// Copy of the current state, for reads.
    pub fn snapshot(&self) -> LotteryPool {
        self.lock().clone()
    }

    // Every operation leaves the pool consistent before returning, so a
    // panic elsewhere while holding the lock does not invalidate it.
    fn lock(&self) -> MutexGuard<'_, LotteryPool> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
