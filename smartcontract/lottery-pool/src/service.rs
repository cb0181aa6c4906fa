// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(target_arch = "wasm32", no_main)]

mod state;

use std::sync::Arc;

use async_graphql::{EmptySubscription, Error, Object, Request, Response, Schema};
use linera_sdk::{
    linera_base_types::{AccountOwner, Amount, WithServiceAbi},
    views::View,
    Service, ServiceRuntime,
};
use lottery_pool::{
    DrawRecord, LotteryPool, LotteryPoolAbi, LotteryPoolOperation, LotteryPoolParameters, PoolConfig,
};

use self::state::LotteryPoolState;

pub struct LotteryPoolService {
    state: Arc<LotteryPoolState>,
    runtime: Arc<ServiceRuntime<Self>>,
}

linera_sdk::service!(LotteryPoolService);

impl WithServiceAbi for LotteryPoolService {
    type Abi = LotteryPoolAbi;
}

impl Service for LotteryPoolService {
    type Parameters = LotteryPoolParameters;

    async fn new(runtime: ServiceRuntime<Self>) -> Self {
        let state = LotteryPoolState::load(runtime.root_view_storage_context())
            .await
            .expect("Failed to load state");
        LotteryPoolService {
            state: Arc::new(state),
            runtime: Arc::new(runtime),
        }
    }

    async fn handle_query(&self, request: Request) -> Response {
        let schema = Schema::build(
            QueryRoot {
                state: self.state.clone(),
            },
            MutationRoot {
                runtime: self.runtime.clone(),
            },
            EmptySubscription,
        )
        .finish();
        schema.execute(request).await
    }
}

struct QueryRoot {
    state: Arc<LotteryPoolState>,
}

impl QueryRoot {
    fn pool(&self) -> Result<&LotteryPool, Error> {
        self.state
            .pool()
            .ok_or_else(|| Error::new("Lottery pool is not instantiated on this chain"))
    }
}

#[Object]
impl QueryRoot {
    /// Current pool balance
    async fn balance(&self) -> Result<Amount, Error> {
        Ok(self.pool()?.balance())
    }

    /// Number of entries in the current round
    async fn total_players(&self) -> Result<u64, Error> {
        Ok(self.pool()?.total_players())
    }

    /// Entry at `index` in the current round
    async fn player(&self, index: u64) -> Result<AccountOwner, Error> {
        Ok(self.pool()?.player(index)?)
    }

    /// All entries in the current round, in entry order
    async fn players(&self) -> Result<Vec<AccountOwner>, Error> {
        Ok(self.pool()?.players().to_vec())
    }

    async fn lottery_manager(&self) -> Result<AccountOwner, Error> {
        Ok(self.pool()?.manager())
    }

    /// Winner of the draw at `index`, oldest first
    async fn lottery_winner(&self, index: u64) -> Result<AccountOwner, Error> {
        Ok(self.state.winner(index).await?)
    }

    /// Every past winner, oldest first
    async fn winners(&self) -> Result<Vec<AccountOwner>, Error> {
        Ok(self.state.winners().await?)
    }

    async fn rounds_completed(&self) -> Result<u64, Error> {
        Ok(self.pool()?.rounds_completed())
    }

    async fn config(&self) -> Result<PoolConfig, Error> {
        Ok(self.pool()?.config())
    }

    /// Completed draws with their payouts; the most recent `limit` if given
    async fn draws(&self, limit: Option<usize>) -> Result<Vec<DrawRecord>, Error> {
        let limit = limit.unwrap_or(usize::MAX);
        Ok(self.state.recent_draws(limit).await?)
    }
}

struct MutationRoot {
    runtime: Arc<ServiceRuntime<LotteryPoolService>>,
}

#[Object]
impl MutationRoot {
    /// Enter the lottery with `amount` (must run on the pool chain)
    async fn enter_lottery(&self, owner: AccountOwner, amount: Amount) -> String {
        self.runtime
            .schedule_operation(&LotteryPoolOperation::EnterLottery { owner, amount });
        "EnterLottery operation scheduled".to_string()
    }

    /// Send `amount` to the pool from any chain; counts as an entry
    async fn transfer(&self, owner: AccountOwner, amount: Amount) -> String {
        self.runtime
            .schedule_operation(&LotteryPoolOperation::Transfer { owner, amount });
        "Transfer operation scheduled".to_string()
    }

    /// Draw the winner of the current round
    async fn pick_winner(&self, owner: AccountOwner) -> String {
        self.runtime
            .schedule_operation(&LotteryPoolOperation::PickWinner { owner });
        "PickWinner operation scheduled".to_string()
    }
}
