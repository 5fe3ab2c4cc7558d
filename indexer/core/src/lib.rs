use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fmt::Display,
    sync::Arc,
};

use common::{
    Account, Block, Contract, Event, Resource as _, ResourceKind, Transaction, TransactionPatch,
    block::BlockHeight,
};
use futures::{StreamExt as _, stream};
use gateway_client::{BlockContents, GatewayClient, GatewayResult};
use log::{debug, info, warn};
use tokio::{sync::Mutex, time::Instant};

use crate::{
    config::IndexerConfig,
    error::IngestError,
    events::{is_account_created, referenced_address},
    reconcile::{ReconcileOutcome, reconcile_account_storage},
    store::IndexerStore,
};

pub mod config;
pub mod error;
pub mod events;
pub mod reconcile;
pub mod store;

/// Lookups of an account the gateway does not know before it is dropped from the queue.
pub const ACCOUNT_LOOKUP_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Blocks,
    Accounts,
    TransactionStatus,
    Storage,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            Stage::Blocks => "block ingestion",
            Stage::Accounts => "account indexing",
            Stage::TransactionStatus => "transaction status refresh",
            Stage::Storage => "storage resync",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    /// Height, address or id the failure concerns.
    pub target: String,
    pub reason: String,
}

/// Summary of one ingestion tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub blocks_ingested: usize,
    pub watermark: Option<BlockHeight>,
    pub accounts_indexed: usize,
    pub statuses_refreshed: usize,
    /// Set when any account storage was reconciled this tick.
    pub storage: Option<ReconcileOutcome>,
    pub skipped_records: usize,
    pub failures: Vec<StageFailure>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, stage: Stage, target: impl Into<String>, err: impl Into<anyhow::Error>) {
        let target = target.into();
        let err = err.into();
        warn!("{stage} failed for {target}: {err:#}");
        self.failures.push(StageFailure {
            stage,
            target,
            reason: format!("{err:#}"),
        });
    }

    fn skip(&mut self, err: IngestError) {
        warn!("Skipping record: {err}");
        self.skipped_records += 1;
    }
}

struct FetchedBlock {
    block: Block,
    transactions: Vec<Transaction>,
    events: Vec<Event>,
}

#[derive(Debug, Default)]
struct PendingAccount {
    /// Block the account was last observed in.
    block_id: String,
    not_found: u32,
}

#[derive(Default)]
struct IngestState {
    /// Highest height fully merged.
    watermark: Option<BlockHeight>,
    /// First height to ingest, fixed by the first tick that reaches the gateway.
    start_height: Option<BlockHeight>,
    /// Accounts to re-index.
    pending_accounts: BTreeMap<String, PendingAccount>,
    last_storage_resync: Option<Instant>,
    /// Accounts whose storage failed to sync, retried on the next tick.
    failed_storage: BTreeSet<String>,
}

impl IngestState {
    fn queue_account(&mut self, address: &str, block_id: &str) {
        if !address.is_empty() {
            self.pending_accounts.insert(
                address.to_string(),
                PendingAccount {
                    block_id: block_id.to_string(),
                    not_found: 0,
                },
            );
        }
    }
}

/// Advances the local mirror of the chain, one tick at a time.
pub struct IndexerCore<G> {
    gateway: Arc<G>,
    config: IndexerConfig,
    store: IndexerStore,
    tracked: HashSet<String>,
    state: Mutex<IngestState>,
}

impl<G: GatewayClient> IndexerCore<G> {
    pub fn new(config: IndexerConfig, gateway: Arc<G>) -> Self {
        Self::with_store(config, gateway, IndexerStore::new())
    }

    pub fn with_store(config: IndexerConfig, gateway: Arc<G>, store: IndexerStore) -> Self {
        Self {
            gateway,
            tracked: config.tracked_addresses.iter().cloned().collect(),
            config,
            store,
            state: Mutex::new(IngestState::default()),
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn store(&self) -> &IndexerStore {
        &self.store
    }

    pub async fn watermark(&self) -> Option<BlockHeight> {
        self.state.lock().await.watermark
    }

    /// Forgets everything ingested so far. The next tick starts over.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        *state = IngestState::default();
        self.store.clear().await;
        info!("Indexer state reset");
    }

    /// Runs every ingestion stage once.
    ///
    /// A failing stage never prevents the other stages from running, failures are
    /// reported and retried on the next tick.
    pub async fn tick(&self) -> TickReport {
        let mut state = self.state.lock().await;
        let mut report = TickReport::default();

        self.ingest_blocks(&mut state, &mut report).await;
        self.index_accounts(&mut state, &mut report).await;
        self.refresh_transaction_statuses(&mut report).await;
        self.resync_storage_if_due(&mut state, &mut report).await;

        report.watermark = state.watermark;
        debug!("Tick finished: {report:?}");
        report
    }

    async fn ingest_blocks(&self, state: &mut IngestState, report: &mut TickReport) {
        let latest = match self.gateway.get_latest_block_height().await {
            Ok(latest) => latest,
            Err(err) => {
                report.fail(Stage::Blocks, "latest height", err);
                return;
            }
        };

        let next = match state.watermark {
            Some(watermark) => watermark + 1,
            None => *state
                .start_height
                .get_or_insert(self.config.start_height.unwrap_or(latest)),
        };
        if next > latest {
            return;
        }
        let batch = (self.config.max_blocks_per_tick as u64).saturating_sub(1);
        let last = latest.min(next.saturating_add(batch));

        let fetched: Vec<_> = stream::iter(next..=last)
            .map(|height| self.fetch_block(height))
            .buffered(self.config.max_concurrent_requests)
            .collect()
            .await;

        for (height, result) in (next..=last).zip(fetched) {
            match result {
                Ok(fetched) => {
                    self.merge_block(fetched, state, report).await;
                    state.watermark = Some(height);
                    report.blocks_ingested += 1;
                }
                Err(err) if err.is_not_found() => {
                    debug!("Block at height {height} is not available yet: {err}");
                    break;
                }
                Err(err) => {
                    report.fail(Stage::Blocks, format!("height {height}"), err);
                    break;
                }
            }
        }

        if let Some(watermark) = state.watermark.filter(|_| report.blocks_ingested > 0) {
            info!(
                "Ingested {} blocks, watermark at {watermark}",
                report.blocks_ingested
            );
        }
    }

    async fn fetch_block(&self, height: BlockHeight) -> GatewayResult<FetchedBlock> {
        let block = self.gateway.get_block_by_height(height).await?;
        let BlockContents {
            transactions,
            events,
        } = self.gateway.get_block_contents(&block.id).await?;

        Ok(FetchedBlock {
            block,
            transactions,
            events,
        })
    }

    /// Merges transactions and events before the block itself, so a client that sees
    /// the block can also see its contents.
    async fn merge_block(
        &self,
        fetched: FetchedBlock,
        state: &mut IngestState,
        report: &mut TickReport,
    ) {
        let FetchedBlock {
            block,
            transactions,
            mut events,
        } = fetched;

        let mut block_transactions = HashSet::new();
        for transaction in transactions {
            if let Err(err) = self.check_transaction(&transaction, &block).await {
                report.skip(err);
                continue;
            }

            for address in transaction.participant_addresses() {
                state.queue_account(address, &block.id);
            }
            block_transactions.insert(transaction.id.clone());
            self.merge_transaction(transaction).await;
        }

        events.sort_by_key(|event| !is_account_created(event));
        for mut event in events {
            if let Err(err) = self.check_event(&event, &block_transactions).await {
                report.skip(err);
                continue;
            }

            if event.block_id.is_empty() {
                event.block_id = block.id.clone();
            }
            if let Some(address) = referenced_address(&event) {
                state.queue_account(&address, &block.id);
            }
            self.store.events.upsert(event).await;
        }

        self.store.blocks.upsert(block).await;
    }

    async fn check_transaction(
        &self,
        transaction: &Transaction,
        block: &Block,
    ) -> Result<(), IngestError> {
        if transaction.id.is_empty() {
            return Err(IngestError::malformed(
                ResourceKind::Transaction,
                "",
                format!("empty id in block {}", block.id),
            ));
        }
        if transaction.block_id != block.id
            && !self.store.blocks.contains(&transaction.block_id).await
        {
            return Err(IngestError::malformed(
                ResourceKind::Transaction,
                &transaction.id,
                format!("references unknown block {:?}", transaction.block_id),
            ));
        }
        Ok(())
    }

    async fn check_event(
        &self,
        event: &Event,
        block_transactions: &HashSet<String>,
    ) -> Result<(), IngestError> {
        if event.id.is_empty() {
            return Err(IngestError::malformed(
                ResourceKind::Event,
                "",
                format!("empty id in transaction {}", event.transaction_id),
            ));
        }
        if !block_transactions.contains(&event.transaction_id)
            && !self.store.transactions.contains(&event.transaction_id).await
        {
            return Err(IngestError::malformed(
                ResourceKind::Event,
                &event.id,
                format!("references unknown transaction {:?}", event.transaction_id),
            ));
        }
        Ok(())
    }

    /// A stored status never moves backwards.
    async fn merge_transaction(&self, mut transaction: Transaction) {
        if let Ok(stored) = self.store.transactions.find_one(&transaction.id).await {
            if !transaction.status.advances_over(&stored.status) {
                transaction.status = stored.status;
            }
        }
        self.store.transactions.upsert(transaction).await;
    }

    async fn index_accounts(&self, state: &mut IngestState, report: &mut TickReport) {
        for address in &self.config.tracked_addresses {
            if !self.store.accounts.contains(address).await {
                state.pending_accounts.entry(address.clone()).or_default();
            }
        }
        if state.pending_accounts.is_empty() {
            return;
        }

        let pending = std::mem::take(&mut state.pending_accounts);
        let fetched: Vec<_> = stream::iter(pending)
            .map(|(address, pending)| async move {
                let result = futures::try_join!(
                    self.gateway.get_account(&address),
                    self.gateway.get_account_contracts(&address),
                );
                (address, pending, result)
            })
            .buffered(self.config.max_concurrent_requests)
            .collect()
            .await;

        for (address, mut pending, result) in fetched {
            match result {
                Ok((account, contracts)) => {
                    self.merge_account(account, contracts, &pending.block_id)
                        .await;
                    report.accounts_indexed += 1;
                }
                Err(err) if err.is_not_found() => {
                    pending.not_found += 1;
                    if pending.not_found < ACCOUNT_LOOKUP_ATTEMPTS {
                        debug!(
                            "Account {address} not found ({}/{ACCOUNT_LOOKUP_ATTEMPTS}): {err}",
                            pending.not_found
                        );
                        state.pending_accounts.insert(address, pending);
                    } else {
                        debug!("Account {address} does not exist, dropping it: {err}");
                    }
                }
                Err(err) => {
                    report.fail(Stage::Accounts, &address, err);
                    state.pending_accounts.insert(address, pending);
                }
            }
        }
    }

    async fn merge_account(&self, mut account: Account, contracts: Vec<Contract>, block_id: &str) {
        let block_id = if block_id.is_empty() {
            self.store
                .accounts
                .find_one(account.id())
                .await
                .map(|stored| stored.block_id)
                .unwrap_or_default()
        } else {
            block_id.to_string()
        };

        account.is_default_account = self.tracked.contains(&account.address);
        account.block_id = block_id.clone();
        self.store.accounts.upsert(account).await;

        for mut contract in contracts {
            contract.block_id = block_id.clone();
            self.store.contracts.upsert(contract).await;
        }
    }

    async fn refresh_transaction_statuses(&self, report: &mut TickReport) {
        let unsettled = self
            .store
            .transactions
            .find_where(|transaction| !transaction.status.execution_status.is_final())
            .await;
        if unsettled.is_empty() {
            return;
        }

        let fetched: Vec<_> = stream::iter(unsettled)
            .map(|transaction| async move {
                let result = self.gateway.get_transaction_status(&transaction.id).await;
                (transaction, result)
            })
            .buffered(self.config.max_concurrent_requests)
            .collect()
            .await;

        for (transaction, result) in fetched {
            match result {
                Ok(status) if status.advances_over(&transaction.status) => {
                    debug!(
                        "Transaction {} moved from {} to {}",
                        transaction.id,
                        transaction.status.execution_status,
                        status.execution_status
                    );
                    let patch = TransactionPatch {
                        status: Some(status),
                        ..Default::default()
                    };
                    match self.store.transactions.update(&transaction.id, patch).await {
                        Ok(()) => report.statuses_refreshed += 1,
                        Err(err) => report.fail(Stage::TransactionStatus, &transaction.id, err),
                    }
                }
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    debug!("Status of transaction {} is not available: {err}", transaction.id);
                }
                Err(err) => report.fail(Stage::TransactionStatus, &transaction.id, err),
            }
        }
    }

    async fn resync_storage_if_due(&self, state: &mut IngestState, report: &mut TickReport) {
        let due = state
            .last_storage_resync
            .is_none_or(|at| at.elapsed() >= self.config.storage_resync_interval);

        let addresses: Vec<String> = if due {
            state.last_storage_resync = Some(Instant::now());
            state.failed_storage.clear();
            self.store
                .accounts
                .find_all()
                .await
                .into_iter()
                .map(|account| account.address)
                .collect()
        } else if !state.failed_storage.is_empty() {
            debug!("Retrying storage of {} accounts", state.failed_storage.len());
            std::mem::take(&mut state.failed_storage).into_iter().collect()
        } else {
            return;
        };

        let fetched: Vec<_> = stream::iter(addresses)
            .map(|address| async move {
                let result = self.gateway.get_account_storage(&address).await;
                (address, result)
            })
            .buffered(self.config.max_concurrent_requests)
            .collect()
            .await;

        let mut total = ReconcileOutcome::default();
        for (address, result) in fetched {
            match result {
                Ok(remote) => {
                    total += reconcile_account_storage(&self.store.storage, &address, remote).await;
                }
                Err(err) => {
                    report.fail(Stage::Storage, &address, err);
                    state.failed_storage.insert(address);
                }
            }
        }
        report.storage = Some(total);
    }
}
