use async_trait::async_trait;
use common::{
    Account, Block, Contract, Event, StorageItem, Transaction, TransactionStatus,
    block::BlockHeight,
};
use serde::{Deserialize, Serialize};

pub use crate::{error::GatewayError, http::HttpGatewayClient};

pub mod cadence;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
mod rest;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub start_delay_millis: u64,
    pub max_retries: usize,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            start_delay_millis: 100,
            max_retries: 3,
        }
    }
}

/// Everything a block carries, fetched in one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockContents {
    pub transactions: Vec<Transaction>,
    pub events: Vec<Event>,
}

/// Read access to the remote chain.
///
/// Every method distinguishes data that does not exist yet ([`GatewayError::NotFound`])
/// from failures worth retrying later, see [`GatewayError::is_transient`].
#[async_trait]
pub trait GatewayClient: Send + Sync + 'static {
    /// Height of the latest sealed block.
    async fn get_latest_block_height(&self) -> GatewayResult<BlockHeight>;

    async fn get_block_by_height(&self, height: BlockHeight) -> GatewayResult<Block>;

    async fn get_transactions_in_block(&self, block_id: &str) -> GatewayResult<Vec<Transaction>>;

    async fn get_events_in_block(&self, block_id: &str) -> GatewayResult<Vec<Event>>;

    /// Transactions and events of a block.
    ///
    /// Implementations that derive both from the same remote objects should override this
    /// to fetch them once.
    async fn get_block_contents(&self, block_id: &str) -> GatewayResult<BlockContents> {
        let transactions = self.get_transactions_in_block(block_id).await?;
        let events = self.get_events_in_block(block_id).await?;
        Ok(BlockContents {
            transactions,
            events,
        })
    }

    async fn get_transaction_status(&self, transaction_id: &str)
    -> GatewayResult<TransactionStatus>;

    async fn get_account(&self, address: &str) -> GatewayResult<Account>;

    async fn get_account_contracts(&self, address: &str) -> GatewayResult<Vec<Contract>>;

    /// Full current storage listing of an account.
    async fn get_account_storage(&self, address: &str) -> GatewayResult<Vec<StorageItem>>;
}
