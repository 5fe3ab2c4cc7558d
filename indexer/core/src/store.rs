use std::sync::Arc;

use common::{
    Account, Block, Contract, Event, StorageItem, Transaction,
    clock::{Clock, SystemClock},
};
use storage::{ReadOnlyIndex, ResourceIndex};

/// All resource indexes, written by the ingestion core only.
#[derive(Clone)]
pub struct IndexerStore {
    pub accounts: Arc<ResourceIndex<Account>>,
    pub blocks: Arc<ResourceIndex<Block>>,
    pub transactions: Arc<ResourceIndex<Transaction>>,
    pub events: Arc<ResourceIndex<Event>>,
    pub contracts: Arc<ResourceIndex<Contract>>,
    pub storage: Arc<ResourceIndex<StorageItem>>,
}

/// Read side of [`IndexerStore`], handed to the polling service.
#[derive(Clone)]
pub struct IndexerReaders {
    pub accounts: ReadOnlyIndex<Account>,
    pub blocks: ReadOnlyIndex<Block>,
    pub transactions: ReadOnlyIndex<Transaction>,
    pub events: ReadOnlyIndex<Event>,
    pub contracts: ReadOnlyIndex<Contract>,
    pub storage: ReadOnlyIndex<StorageItem>,
}

impl Default for IndexerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexerStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: Arc::new(ResourceIndex::with_clock(Arc::clone(&clock))),
            blocks: Arc::new(ResourceIndex::with_clock(Arc::clone(&clock))),
            transactions: Arc::new(ResourceIndex::with_clock(Arc::clone(&clock))),
            events: Arc::new(ResourceIndex::with_clock(Arc::clone(&clock))),
            contracts: Arc::new(ResourceIndex::with_clock(Arc::clone(&clock))),
            storage: Arc::new(ResourceIndex::with_clock(clock)),
        }
    }

    pub fn readers(&self) -> IndexerReaders {
        IndexerReaders {
            accounts: ReadOnlyIndex::new(Arc::clone(&self.accounts)),
            blocks: ReadOnlyIndex::new(Arc::clone(&self.blocks)),
            transactions: ReadOnlyIndex::new(Arc::clone(&self.transactions)),
            events: ReadOnlyIndex::new(Arc::clone(&self.events)),
            contracts: ReadOnlyIndex::new(Arc::clone(&self.contracts)),
            storage: ReadOnlyIndex::new(Arc::clone(&self.storage)),
        }
    }

    pub async fn clear(&self) {
        self.accounts.clear().await;
        self.blocks.clear().await;
        self.transactions.clear().await;
        self.events.clear().await;
        self.contracts.clear().await;
        self.storage.clear().await;
    }
}
