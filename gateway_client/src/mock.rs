use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use common::{
    Account, Block, Contract, Event, StorageItem, Transaction, TransactionStatus,
    block::BlockHeight,
};

use crate::{GatewayClient, GatewayResult, error::GatewayError};

#[derive(Default)]
struct MockChain {
    blocks: BTreeMap<BlockHeight, Block>,
    transactions: HashMap<String, Vec<Transaction>>,
    events: HashMap<String, Vec<Event>>,
    statuses: HashMap<String, TransactionStatus>,
    accounts: HashMap<String, Account>,
    contracts: HashMap<String, Vec<Contract>>,
    storage: HashMap<String, Vec<StorageItem>>,

    /// Remaining failures of `get_transactions_in_block` per block id.
    failing_blocks: HashMap<String, usize>,
    failing_accounts: HashSet<String>,
    failing_storage: HashSet<String>,
    storage_requests: usize,
}

fn unavailable() -> GatewayError {
    GatewayError::UnexpectedStatus {
        status: 503,
        body: "mock gateway unavailable".to_string(),
    }
}

/// In-memory chain with programmable failures.
#[derive(Default)]
pub struct MockGateway {
    chain: Mutex<MockChain>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn chain(&self) -> MutexGuard<'_, MockChain> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a sealed block together with its transactions and events.
    pub fn push_block(&self, block: Block, transactions: Vec<Transaction>, events: Vec<Event>) {
        let mut chain = self.chain();
        for transaction in &transactions {
            chain
                .statuses
                .insert(transaction.id.clone(), transaction.status.clone());
        }
        chain.transactions.insert(block.id.clone(), transactions);
        chain.events.insert(block.id.clone(), events);
        chain.blocks.insert(block.height, block);
    }

    pub fn set_transaction_status(&self, transaction_id: &str, status: TransactionStatus) {
        self.chain()
            .statuses
            .insert(transaction_id.to_string(), status);
    }

    pub fn set_account(&self, account: Account, contracts: Vec<Contract>) {
        let mut chain = self.chain();
        chain.contracts.insert(account.address.clone(), contracts);
        chain.accounts.insert(account.address.clone(), account);
    }

    pub fn set_storage(&self, address: &str, items: Vec<StorageItem>) {
        self.chain().storage.insert(address.to_string(), items);
    }

    /// Next `times` transaction fetches of the block at `height` fail with a transient error.
    pub fn fail_block(&self, height: BlockHeight, times: usize) {
        let mut chain = self.chain();
        if let Some(block_id) = chain.blocks.get(&height).map(|block| block.id.clone()) {
            chain.failing_blocks.insert(block_id, times);
        }
    }

    pub fn fail_account(&self, address: &str) {
        self.chain().failing_accounts.insert(address.to_string());
    }

    pub fn recover_account(&self, address: &str) {
        self.chain().failing_accounts.remove(address);
    }

    pub fn fail_storage(&self, address: &str) {
        self.chain().failing_storage.insert(address.to_string());
    }

    pub fn recover_storage(&self, address: &str) {
        self.chain().failing_storage.remove(address);
    }

    pub fn storage_requests(&self) -> usize {
        self.chain().storage_requests
    }
}

#[async_trait]
impl GatewayClient for MockGateway {
    async fn get_latest_block_height(&self) -> GatewayResult<BlockHeight> {
        self.chain()
            .blocks
            .keys()
            .next_back()
            .copied()
            .ok_or_else(|| GatewayError::NotFound("sealed block".to_string()))
    }

    async fn get_block_by_height(&self, height: BlockHeight) -> GatewayResult<Block> {
        self.chain()
            .blocks
            .get(&height)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("block at height {height}")))
    }

    async fn get_transactions_in_block(&self, block_id: &str) -> GatewayResult<Vec<Transaction>> {
        let mut chain = self.chain();

        if let Some(remaining) = chain.failing_blocks.get_mut(block_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(unavailable());
            }
        }

        let statuses = &chain.statuses;
        chain
            .transactions
            .get(block_id)
            .map(|transactions| {
                transactions
                    .iter()
                    .cloned()
                    .map(|mut transaction| {
                        if let Some(status) = statuses.get(&transaction.id) {
                            transaction.status = status.clone();
                        }
                        transaction
                    })
                    .collect()
            })
            .ok_or_else(|| GatewayError::NotFound(format!("block {block_id}")))
    }

    async fn get_events_in_block(&self, block_id: &str) -> GatewayResult<Vec<Event>> {
        self.chain()
            .events
            .get(block_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("block {block_id}")))
    }

    async fn get_transaction_status(
        &self,
        transaction_id: &str,
    ) -> GatewayResult<TransactionStatus> {
        self.chain()
            .statuses
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("transaction {transaction_id}")))
    }

    async fn get_account(&self, address: &str) -> GatewayResult<Account> {
        let chain = self.chain();
        if chain.failing_accounts.contains(address) {
            return Err(unavailable());
        }
        chain
            .accounts
            .get(address)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("account {address}")))
    }

    async fn get_account_contracts(&self, address: &str) -> GatewayResult<Vec<Contract>> {
        let chain = self.chain();
        if chain.failing_accounts.contains(address) {
            return Err(unavailable());
        }
        chain
            .contracts
            .get(address)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("account {address}")))
    }

    async fn get_account_storage(&self, address: &str) -> GatewayResult<Vec<StorageItem>> {
        let mut chain = self.chain();
        chain.storage_requests += 1;
        if chain.failing_storage.contains(address) {
            return Err(unavailable());
        }
        Ok(chain.storage.get(address).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use common::test_utils::{produce_dummy_block, produce_dummy_transaction};
    use tokio::test;

    use super::*;

    #[test]
    async fn test_block_failures_are_consumed() {
        let gateway = MockGateway::new();
        let block = produce_dummy_block(1);
        let transaction = produce_dummy_transaction("tx1", &block.id, "0x01");
        gateway.push_block(block.clone(), vec![transaction], vec![]);
        gateway.fail_block(1, 2);

        for _ in 0..2 {
            let err = gateway
                .get_transactions_in_block(&block.id)
                .await
                .unwrap_err();
            assert!(err.is_transient());
        }
        assert_eq!(
            gateway
                .get_transactions_in_block(&block.id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    async fn test_unknown_height_is_not_found() {
        let gateway = MockGateway::new();
        gateway.push_block(produce_dummy_block(1), vec![], vec![]);

        assert_eq!(gateway.get_latest_block_height().await.unwrap(), 1);
        assert!(
            gateway
                .get_block_by_height(2)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    async fn test_status_override_is_visible_in_block_listing() {
        let gateway = MockGateway::new();
        let block = produce_dummy_block(1);
        gateway.push_block(
            block.clone(),
            vec![produce_dummy_transaction("tx1", &block.id, "0x01")],
            vec![],
        );

        let sealed = TransactionStatus {
            execution_status: common::ExecutionStatus::Sealed,
            ..Default::default()
        };
        gateway.set_transaction_status("tx1", sealed.clone());

        let transactions = gateway.get_transactions_in_block(&block.id).await.unwrap();
        assert_eq!(transactions[0].status, sealed);
        assert_eq!(gateway.get_transaction_status("tx1").await.unwrap(), sealed);
    }
}
