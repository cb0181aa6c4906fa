// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use linera_sdk::{
    linera_base_types::AccountOwner,
    views::{linera_views, LogView, RegisterView, RootView, ViewError, ViewStorageContext},
};
use lottery_pool::{DrawRecord, LotteryError, LotteryPool};

/// The application state for Lottery Pool.
#[derive(RootView)]
#[view(context = ViewStorageContext)]
pub struct LotteryPoolState {
    /// The current round; `None` until instantiated, and on chains other than the creator's
    pub pool: RegisterView<Option<LotteryPool>>,
    /// Every completed draw, oldest first. This is the winner log.
    pub draws: LogView<DrawRecord>,
}

impl LotteryPoolState {
    pub fn pool(&self) -> Option<&LotteryPool> {
        self.pool.get().as_ref()
    }

    #[allow(dead_code)] // contract only
    pub fn pool_mut(&mut self) -> Option<&mut LotteryPool> {
        self.pool.get_mut().as_mut()
    }

    /// Winner of the draw at `index`, oldest first
    pub async fn winner(&self, index: u64) -> Result<AccountOwner, LotteryError> {
        let draw = match usize::try_from(index) {
            Ok(index) => self.draws.get(index).await?,
            Err(_) => None,
        };
        draw.map(|draw| draw.winner)
            .ok_or(LotteryError::IndexOutOfRange {
                index,
                len: self.draws.count() as u64,
            })
    }

    #[allow(dead_code)] // service only
    pub async fn winners(&self) -> Result<Vec<AccountOwner>, ViewError> {
        let draws = self.draws.read(..).await?;
        Ok(draws.into_iter().map(|draw| draw.winner).collect())
    }

    /// The last `limit` draws, oldest first
    #[allow(dead_code)] // service only
    pub async fn recent_draws(&self, limit: usize) -> Result<Vec<DrawRecord>, ViewError> {
        let count = self.draws.count();
        self.draws.read(count.saturating_sub(limit)..count).await
    }
}
