//! This library contains common code for integration tests.

use std::{future::Future, sync::Arc, sync::LazyLock, time::Duration};

use anyhow::{Context, Result, bail};
use common::{
    Resource, TimeStamp,
    block::BlockHeight,
    test_utils::{produce_dummy_block, produce_dummy_event, produce_dummy_transaction},
};
use gateway_client::mock::MockGateway;
use indexer_service::{IndexerConfig, IndexerHandle};
use indexer_service_protocol::PollingResponse;
use log::debug;
use serde::de::DeserializeOwned;
use url::Url;

pub mod config;

pub const PAYER: &str = "0xf8d6e0586b0a20c7";

const WAIT_TIMEOUT: Duration = Duration::from_secs(10);
const WAIT_STEP: Duration = Duration::from_millis(25);

static LOGGER: LazyLock<()> = LazyLock::new(env_logger::init);

/// Test context running the indexer service against an in-memory gateway.
///
/// Every context binds its own ephemeral port, so contexts can be used from parallel tests.
// NOTE: Order of fields is important for proper drop order.
pub struct TestContext {
    client: reqwest::Client,
    base_url: Url,
    indexer_handle: IndexerHandle,
    gateway: Arc<MockGateway>,
}

impl TestContext {
    pub async fn new(gateway: MockGateway) -> Result<Self> {
        Self::with_config(gateway, config::indexer_config()).await
    }

    pub async fn with_config(gateway: MockGateway, config: IndexerConfig) -> Result<Self> {
        // Ensure logger is initialized only once
        *LOGGER;

        debug!("Test context setup");

        let gateway = Arc::new(gateway);
        let indexer_handle = indexer_service::run_with_gateway(config, 0, Arc::clone(&gateway))
            .await
            .context("Failed to setup Indexer")?;

        let base_url = Url::parse(&format!(
            "http://127.0.0.1:{}/",
            indexer_handle.addr().port()
        ))?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            indexer_handle,
            gateway,
        })
    }

    pub fn gateway(&self) -> &MockGateway {
        &self.gateway
    }

    pub fn indexer_handle(&self) -> &IndexerHandle {
        &self.indexer_handle
    }

    pub async fn get_response(&self, path: &str) -> Result<reqwest::Response> {
        let url = self.base_url.join(path.trim_start_matches('/'))?;
        self.client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {path}"))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.get_response(path).await?;
        let status = response.status();
        if !status.is_success() {
            bail!("Request to {path} failed with status {status}");
        }
        response
            .json()
            .await
            .with_context(|| format!("Failed to decode response of {path}"))
    }

    /// Polls `path` for changes after `timestamp`.
    pub async fn poll<T: DeserializeOwned>(
        &self,
        path: &str,
        timestamp: TimeStamp,
    ) -> Result<PollingResponse<T>> {
        self.get(&format!("{path}?timestamp={timestamp}")).await
    }

    /// Waits until `path` lists at least `count` resources.
    pub async fn wait_for_count<T: DeserializeOwned>(
        &self,
        path: &str,
        count: usize,
    ) -> Result<Vec<T>> {
        wait_until(|| async move {
            let resources: Vec<T> = self.get(path).await?;
            Ok((resources.len() >= count).then_some(resources))
        })
        .await
        .with_context(|| format!("Waiting for {count} resources at {path}"))
    }

    pub async fn shutdown(self) -> Result<()> {
        self.indexer_handle.shutdown().await
    }
}

/// Retries `check` until it yields a value or [`WAIT_TIMEOUT`] passes.
pub async fn wait_until<T, F, Fut>(check: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    tokio::time::timeout(WAIT_TIMEOUT, async {
        loop {
            match check().await {
                Ok(Some(value)) => return value,
                Ok(None) => {}
                Err(err) => debug!("Condition not met yet: {err:#}"),
            }
            tokio::time::sleep(WAIT_STEP).await;
        }
    })
    .await
    .context("Timed out waiting for condition")
}

pub fn transaction_id(height: BlockHeight) -> String {
    format!("tx-{height}")
}

/// Appends a block with one transaction paid by [`PAYER`] and one event.
pub fn push_block(gateway: &MockGateway, height: BlockHeight) {
    let block = produce_dummy_block(height);
    let transaction = produce_dummy_transaction(&transaction_id(height), &block.id, PAYER);
    let event = produce_dummy_event(&transaction.id, 0, "A.01.Dummy.Ping");
    gateway.push_block(block, vec![transaction], vec![event]);
}

/// Highest change timestamp over `resources`, as a polling client would track it.
pub fn max_changed_at<T: Resource>(resources: &[T]) -> TimeStamp {
    resources
        .iter()
        .map(Resource::last_changed_at)
        .max()
        .unwrap_or_default()
}
