// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(target_arch = "wasm32", no_main)]

mod state;

use linera_sdk::{
    linera_base_types::{Account, AccountOwner, Amount, WithContractAbi},
    views::{RootView, View},
    Contract, ContractRuntime,
};
use lottery_pool::{
    check_entry, BlockEntropy, DrawOutcome, DrawRecord, LotteryError, LotteryEvent, LotteryPool,
    LotteryPoolAbi, LotteryPoolOperation, LotteryPoolParameters, LotteryPoolResponse, Message,
    Payout, PoolConfig, Treasury, LOTTERY_STREAM_NAME,
};

use self::state::LotteryPoolState;

pub struct LotteryPoolContract {
    state: LotteryPoolState,
    runtime: ContractRuntime<Self>,
}

linera_sdk::contract!(LotteryPoolContract);

impl WithContractAbi for LotteryPoolContract {
    type Abi = LotteryPoolAbi;
}

impl Contract for LotteryPoolContract {
    type Message = Message;
    type Parameters = LotteryPoolParameters;
    type InstantiationArgument = PoolConfig;
    type EventValue = LotteryEvent;

    async fn load(runtime: ContractRuntime<Self>) -> Self {
        let state = LotteryPoolState::load(runtime.root_view_storage_context())
            .await
            .expect("Failed to load state");
        LotteryPoolContract { state, runtime }
    }

    async fn instantiate(&mut self, config: Self::InstantiationArgument) {
        let manager = self.runtime.application_parameters().manager;
        assert_eq!(
            self.runtime.authenticated_signer(),
            Some(manager),
            "Lottery pool must be created by its manager"
        );

        match LotteryPool::new(manager, config) {
            Ok(pool) => {
                log::info!("Lottery pool created, manager: {}, config: {:?}", manager, config);
                self.state.pool.set(Some(pool));
            }
            Err(e) => panic!("Failed to create lottery pool: {}", e),
        }
    }

    async fn execute_operation(&mut self, operation: Self::Operation) -> Self::Response {
        match operation {
            LotteryPoolOperation::EnterLottery { owner, amount } => {
                self.runtime
                    .check_account_permission(owner)
                    .expect("Permission for EnterLottery operation");

                let mut events = Vec::new();
                match self.enter(owner, amount, false, &mut events) {
                    Ok(()) => {
                        self.publish(events);
                        LotteryPoolResponse::Ok
                    }
                    Err(e) => panic!("Failed to enter lottery: {}", e),
                }
            }

            LotteryPoolOperation::Transfer { owner, amount } => {
                self.runtime
                    .check_account_permission(owner)
                    .expect("Permission for Transfer operation");

                let pool_chain_id = self.runtime.application_creator_chain_id();
                if pool_chain_id == self.runtime.chain_id() {
                    let mut events = Vec::new();
                    match self.enter(owner, amount, false, &mut events) {
                        Ok(()) => {
                            self.publish(events);
                            LotteryPoolResponse::Ok
                        }
                        Err(e) => panic!("Failed to enter lottery: {}", e),
                    }
                } else {
                    // The balance lives on the pool chain; overflow is caught there and refunded
                    let manager = self.runtime.application_parameters().manager;
                    if let Err(e) = check_entry(manager, owner, amount) {
                        panic!("Failed to enter lottery: {}", e);
                    }
                    let pool_account = Account {
                        chain_id: pool_chain_id,
                        owner: self.pool_owner(),
                    };
                    self.runtime.transfer(owner, pool_account, amount);

                    let source_chain_id = self.runtime.chain_id();
                    self.runtime
                        .prepare_message(Message::Deposit {
                            owner,
                            amount,
                            source_chain_id,
                        })
                        .with_authentication()
                        .send_to(pool_chain_id);
                    log::debug!("Forwarded deposit of {} from {} to chain {}", amount, owner, pool_chain_id);
                    LotteryPoolResponse::Forwarded
                }
            }

            LotteryPoolOperation::PickWinner { owner } => {
                self.runtime
                    .check_account_permission(owner)
                    .expect("Permission for PickWinner operation");

                let mut events = Vec::new();
                match self.pick_winner(owner, &mut events) {
                    Ok(outcome) => {
                        self.publish(events);
                        LotteryPoolResponse::WinnerPicked {
                            round: outcome.round,
                            winner: outcome.winner,
                            winner_prize: outcome.winner_prize,
                            manager_fee: outcome.manager_fee,
                        }
                    }
                    Err(e) => panic!("Failed to pick winner: {}", e),
                }
            }

            // Query operations
            LotteryPoolOperation::GetBalance => LotteryPoolResponse::Balance(self.pool().balance()),

            LotteryPoolOperation::GetTotalPlayers => {
                LotteryPoolResponse::TotalPlayers(self.pool().total_players())
            }

            LotteryPoolOperation::GetPlayer { index } => match self.pool().player(index) {
                Ok(player) => LotteryPoolResponse::Player(player),
                Err(e) => panic!("Failed to get player: {}", e),
            },

            LotteryPoolOperation::GetLotteryManager => LotteryPoolResponse::Manager(self.pool().manager()),

            LotteryPoolOperation::GetLotteryWinner { index } => match self.state.winner(index).await {
                Ok(winner) => LotteryPoolResponse::Winner(winner),
                Err(e) => panic!("Failed to get lottery winner: {}", e),
            },
        }
    }

    async fn execute_message(&mut self, message: Self::Message) {
        match message {
            Message::Deposit {
                owner,
                amount,
                source_chain_id,
            } => {
                // The funds are already in the pool account; a rejected deposit goes back
                let mut events = Vec::new();
                match self.enter(owner, amount, true, &mut events) {
                    Ok(()) => self.publish(events),
                    Err(e) => {
                        log::warn!("Refunding deposit of {} from {}: {}", amount, owner, e);
                        let source = self.pool_owner();
                        let refund_account = Account {
                            chain_id: source_chain_id,
                            owner,
                        };
                        self.runtime.transfer(source, refund_account, amount);
                    }
                }
            }
        }
    }

    async fn store(mut self) {
        self.state.save().await.expect("Failed to save state");
    }
}

impl LotteryPoolContract {
    fn pool(&self) -> &LotteryPool {
        self.state
            .pool()
            .expect("Lottery pool only exists on its creator chain")
    }

    /// The pool application's own account, which holds the stakes.
    fn pool_owner(&mut self) -> AccountOwner {
        AccountOwner::from(self.runtime.application_id().forget_abi())
    }

    fn enter(
        &mut self,
        owner: AccountOwner,
        amount: Amount,
        prefunded: bool,
        events: &mut Vec<LotteryEvent>,
    ) -> Result<(), LotteryError> {
        let pool_owner = self.pool_owner();

        let pool = self
            .state
            .pool_mut()
            .expect("Lottery pool only exists on its creator chain");
        let mut treasury = RuntimeTreasury {
            runtime: &mut self.runtime,
            pool_owner,
            prefunded,
        };
        pool.enter(owner, amount, &mut treasury, events)?;

        log::info!("{} entered the lottery with {}", owner, amount);
        Ok(())
    }

    fn pick_winner(
        &mut self,
        caller: AccountOwner,
        events: &mut Vec<LotteryEvent>,
    ) -> Result<DrawOutcome, LotteryError> {
        let entropy = BlockEntropy {
            chain_id: self.runtime.chain_id(),
            block_height: self.runtime.block_height(),
            timestamp: self.runtime.system_time(),
        };
        let pool_owner = self.pool_owner();

        let pool = self
            .state
            .pool_mut()
            .expect("Lottery pool only exists on its creator chain");
        let mut treasury = RuntimeTreasury {
            runtime: &mut self.runtime,
            pool_owner,
            prefunded: false,
        };
        let outcome = pool.pick_winner(caller, &mut treasury, &entropy, events)?;

        log::info!(
            "Round {} drawn by {}: winner {} (entry {} of {}) gets {}, manager fee {}",
            outcome.round,
            caller,
            outcome.winner,
            outcome.winner_index,
            outcome.player_count,
            outcome.winner_prize,
            outcome.manager_fee,
        );
        self.state.draws.push(DrawRecord {
            round: outcome.round,
            winner: outcome.winner,
            winner_prize: outcome.winner_prize,
            manager_fee: outcome.manager_fee,
            player_count: outcome.player_count,
            timestamp: entropy.timestamp.micros(),
        });
        Ok(outcome)
    }

    fn publish(&mut self, events: Vec<LotteryEvent>) {
        for event in events {
            self.runtime.emit(LOTTERY_STREAM_NAME.into(), &event);
        }
    }
}

/// Moves stakes through the pool application's account.
///
/// A failed runtime transfer aborts the whole block, so a settlement either
/// pays every recipient or the draw never happened.
struct RuntimeTreasury<'a> {
    runtime: &'a mut ContractRuntime<LotteryPoolContract>,
    pool_owner: AccountOwner,
    /// Stake already credited to the pool account by a cross-chain transfer
    prefunded: bool,
}

impl Treasury for RuntimeTreasury<'_> {
    fn receive(&mut self, from: AccountOwner, amount: Amount) -> Result<(), LotteryError> {
        if self.prefunded {
            return Ok(());
        }
        let pool_account = Account {
            chain_id: self.runtime.chain_id(),
            owner: self.pool_owner,
        };
        self.runtime.transfer(from, pool_account, amount);
        Ok(())
    }

    fn settle(&mut self, payouts: &[Payout]) -> Result<(), LotteryError> {
        let chain_id = self.runtime.chain_id();
        for payout in payouts {
            let recipient = Account {
                chain_id,
                owner: payout.recipient,
            };
            self.runtime.transfer(self.pool_owner, recipient, payout.amount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use assert_matches::assert_matches;
    use linera_sdk::{
        linera_base_types::{
            Account, AccountOwner, Amount, ApplicationId, BlockHeight, ChainId, CryptoHash, Timestamp,
        },
        util::BlockingWait,
        views::View,
        Contract, ContractRuntime,
    };
    use lottery_pool::{
        LotteryEvent, LotteryPoolAbi, LotteryPoolOperation, LotteryPoolParameters, LotteryPoolResponse,
        Message, PoolConfig,
    };

    use super::{LotteryPoolContract, LotteryPoolState};

    const MANAGER: AccountOwner = AccountOwner::Address20([0; 20]);
    const BLOCK_TIME: u64 = 1_700_000_000_000_000;

    fn player(n: u8) -> AccountOwner {
        AccountOwner::Address20([n; 20])
    }

    fn tenth() -> Amount {
        Amount::from_millis(100)
    }

    fn pool_chain() -> ChainId {
        ChainId(CryptoHash::test_hash("pool chain"))
    }

    fn remote_chain() -> ChainId {
        ChainId(CryptoHash::test_hash("remote chain"))
    }

    fn application_id() -> ApplicationId<LotteryPoolAbi> {
        ApplicationId::new(CryptoHash::test_hash("lottery pool")).with_abi()
    }

    fn pool_account() -> AccountOwner {
        AccountOwner::from(application_id())
    }

    /// A contract on `chain_id`, signed by the manager. Every player and the
    /// manager hold one token; the pool account is empty.
    fn contract_on(chain_id: ChainId) -> LotteryPoolContract {
        let mut balances = vec![(pool_account(), Amount::ZERO), (MANAGER, Amount::from_tokens(1))];
        balances.extend((1..=4).map(|n| (player(n), Amount::from_tokens(1))));

        let runtime = ContractRuntime::<LotteryPoolContract>::new()
            .with_application_parameters(LotteryPoolParameters { manager: MANAGER })
            .with_application_id(application_id())
            .with_application_creator_chain_id(pool_chain())
            .with_chain_id(chain_id)
            .with_authenticated_signer(MANAGER)
            .with_block_height(BlockHeight(42))
            .with_system_time(Timestamp::from(BLOCK_TIME))
            .with_owner_balances(balances);
        let state = LotteryPoolState::load(runtime.root_view_storage_context())
            .blocking_wait()
            .expect("Failed to read from mock key value store");
        LotteryPoolContract { state, runtime }
    }

    fn instantiated_pool() -> LotteryPoolContract {
        let mut contract = contract_on(pool_chain());
        contract.instantiate(PoolConfig::default()).blocking_wait();
        contract
    }

    fn execute_as(
        contract: &mut LotteryPoolContract,
        signer: AccountOwner,
        operation: LotteryPoolOperation,
    ) -> LotteryPoolResponse {
        contract.runtime.set_authenticated_signer(signer);
        contract.execute_operation(operation).blocking_wait()
    }

    fn enter(contract: &mut LotteryPoolContract, owner: AccountOwner) {
        let response = execute_as(
            contract,
            owner,
            LotteryPoolOperation::EnterLottery {
                owner,
                amount: tenth(),
            },
        );
        assert_matches!(response, LotteryPoolResponse::Ok);
    }

    #[test]
    fn instantiation_makes_the_parameter_manager_the_manager() {
        let contract = instantiated_pool();

        let pool = contract.pool();
        assert_eq!(pool.manager(), MANAGER);
        assert_eq!(pool.balance(), Amount::ZERO);
        assert_eq!(pool.config(), PoolConfig::default());
        assert_eq!(contract.state.draws.count(), 0);
    }

    #[test]
    #[should_panic(expected = "Lottery pool must be created by its manager")]
    fn instantiation_by_another_signer_is_rejected() {
        let mut contract = contract_on(pool_chain());
        contract.runtime.set_authenticated_signer(player(1));
        contract.instantiate(PoolConfig::default()).blocking_wait();
    }

    #[test]
    fn entry_moves_the_stake_into_the_pool_account() {
        let mut contract = instantiated_pool();

        enter(&mut contract, player(1));

        assert_eq!(contract.runtime.owner_balance(pool_account()), tenth());
        assert_eq!(contract.runtime.owner_balance(player(1)), Amount::from_millis(900));
        let pool = contract.pool();
        assert_eq!(pool.balance(), tenth());
        assert_eq!(pool.player(0), Ok(player(1)));
    }

    #[test]
    fn transfer_on_the_pool_chain_enters_directly() {
        let mut contract = instantiated_pool();

        let response = execute_as(
            &mut contract,
            player(2),
            LotteryPoolOperation::Transfer {
                owner: player(2),
                amount: tenth(),
            },
        );

        assert_matches!(response, LotteryPoolResponse::Ok);
        assert_eq!(contract.pool().total_players(), 1);
        assert_eq!(contract.runtime.owner_balance(pool_account()), tenth());
        assert!(contract.runtime.created_send_message_requests().is_empty());
    }

    #[test]
    fn transfer_from_another_chain_forwards_funds_and_a_deposit() {
        let mut contract = contract_on(remote_chain());

        let response = execute_as(
            &mut contract,
            player(1),
            LotteryPoolOperation::Transfer {
                owner: player(1),
                amount: tenth(),
            },
        );

        assert_matches!(response, LotteryPoolResponse::Forwarded);
        let pool_account = Account {
            chain_id: pool_chain(),
            owner: pool_account(),
        };
        assert_eq!(contract.runtime.outgoing_transfers().get(&pool_account), Some(&tenth()));
        assert_eq!(contract.runtime.owner_balance(player(1)), Amount::from_millis(900));

        let requests = contract.runtime.created_send_message_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].destination, pool_chain());
        assert!(requests[0].authenticated);
        assert_matches!(
            requests[0].message,
            Message::Deposit { owner, amount, source_chain_id }
                if owner == player(1) && amount == tenth() && source_chain_id == remote_chain()
        );
    }

    #[test]
    fn manager_transfer_from_another_chain_is_rejected_before_funds_move() {
        let mut contract = contract_on(remote_chain());

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            execute_as(
                &mut contract,
                MANAGER,
                LotteryPoolOperation::Transfer {
                    owner: MANAGER,
                    amount: tenth(),
                },
            )
        }));

        assert!(result.is_err());
        assert_eq!(contract.runtime.owner_balance(MANAGER), Amount::from_tokens(1));
        assert!(contract.runtime.outgoing_transfers().is_empty());
        assert!(contract.runtime.created_send_message_requests().is_empty());
    }

    #[test]
    #[should_panic(expected = "Not enough funds!")]
    fn zero_transfer_from_another_chain_is_rejected() {
        let mut contract = contract_on(remote_chain());
        execute_as(
            &mut contract,
            player(1),
            LotteryPoolOperation::Transfer {
                owner: player(1),
                amount: Amount::ZERO,
            },
        );
    }

    #[test]
    fn accepted_deposit_enters_without_moving_funds_again() {
        let mut contract = instantiated_pool();

        contract
            .execute_message(Message::Deposit {
                owner: player(3),
                amount: tenth(),
                source_chain_id: remote_chain(),
            })
            .blocking_wait();

        assert_eq!(contract.pool().player(0), Ok(player(3)));
        assert_eq!(contract.pool().balance(), tenth());
        assert_eq!(contract.runtime.owner_balance(player(3)), Amount::from_tokens(1));
        assert!(contract.runtime.outgoing_transfers().is_empty());
    }

    #[test]
    fn rejected_deposit_is_refunded_to_the_source_chain() {
        let mut contract = instantiated_pool();
        // credited by the cross-chain transfer that carried the deposit
        contract.runtime.set_owner_balance(pool_account(), tenth());

        contract
            .execute_message(Message::Deposit {
                owner: MANAGER,
                amount: tenth(),
                source_chain_id: remote_chain(),
            })
            .blocking_wait();

        assert_eq!(contract.pool().total_players(), 0);
        assert_eq!(contract.pool().balance(), Amount::ZERO);
        assert_eq!(contract.runtime.owner_balance(pool_account()), Amount::ZERO);
        let refund_account = Account {
            chain_id: remote_chain(),
            owner: MANAGER,
        };
        assert_eq!(contract.runtime.outgoing_transfers().get(&refund_account), Some(&tenth()));
    }

    #[test]
    fn draw_pays_out_and_records_the_round() {
        let mut contract = instantiated_pool();
        for n in 1..=3 {
            enter(&mut contract, player(n));
        }

        let mut events = Vec::new();
        let outcome = contract
            .pick_winner(MANAGER, &mut events)
            .expect("Manager may draw with three players");

        assert_eq!(outcome.round, 1);
        assert_eq!(outcome.winner_prize, Amount::from_millis(270));
        assert_eq!(outcome.manager_fee, Amount::from_millis(30));
        assert_eq!(
            events,
            vec![
                LotteryEvent::WinnerSelected {
                    winner: outcome.winner
                },
                LotteryEvent::WinnerPrize {
                    amount: Amount::from_millis(270)
                },
                LotteryEvent::ManagerFee {
                    amount: Amount::from_millis(30)
                },
            ]
        );

        assert_eq!(contract.runtime.owner_balance(pool_account()), Amount::ZERO);
        assert_eq!(contract.runtime.owner_balance(MANAGER), Amount::from_millis(1030));
        assert_eq!(contract.runtime.owner_balance(outcome.winner), Amount::from_millis(1170));
        assert_eq!(contract.pool().total_players(), 0);
        assert_eq!(contract.pool().balance(), Amount::ZERO);

        assert_eq!(contract.state.draws.count(), 1);
        let record = contract
            .state
            .draws
            .get(0)
            .blocking_wait()
            .expect("Failed to read draw history")
            .expect("Draw was recorded");
        assert_eq!(record.round, 1);
        assert_eq!(record.winner, outcome.winner);
        assert_eq!(record.winner_prize, outcome.winner_prize);
        assert_eq!(record.manager_fee, outcome.manager_fee);
        assert_eq!(record.player_count, 3);
        assert_eq!(record.timestamp, BLOCK_TIME);
    }

    #[test]
    fn winner_log_is_read_from_the_draw_history() {
        let mut contract = instantiated_pool();
        let mut winners = Vec::new();

        for round in 1..=2u64 {
            for n in 1..=3 {
                enter(&mut contract, player(n));
            }
            let response = execute_as(&mut contract, MANAGER, LotteryPoolOperation::PickWinner { owner: MANAGER });
            match response {
                LotteryPoolResponse::WinnerPicked { round: drawn, winner, .. } => {
                    assert_eq!(drawn, round);
                    winners.push(winner);
                }
                other => panic!("Unexpected response: {:?}", other),
            }
        }

        assert_eq!(contract.pool().rounds_completed(), 2);
        assert_eq!(
            contract.state.winners().blocking_wait().expect("Failed to read winners"),
            winners
        );
        let recent = contract
            .state
            .recent_draws(1)
            .blocking_wait()
            .expect("Failed to read draw history");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].round, 2);
        let response = execute_as(&mut contract, MANAGER, LotteryPoolOperation::GetLotteryWinner { index: 1 });
        assert_matches!(response, LotteryPoolResponse::Winner(winner) if winner == winners[1]);
    }

    #[test]
    #[should_panic(expected = "Index 0 out of range for length 0")]
    fn winner_lookup_past_the_log_is_rejected() {
        let mut contract = instantiated_pool();
        execute_as(&mut contract, MANAGER, LotteryPoolOperation::GetLotteryWinner { index: 0 });
    }

    #[test]
    #[should_panic(expected = "Not enough players to finish lottery!")]
    fn draw_below_quorum_is_rejected() {
        let mut contract = instantiated_pool();
        enter(&mut contract, player(1));
        execute_as(&mut contract, MANAGER, LotteryPoolOperation::PickWinner { owner: MANAGER });
    }
}
