use std::{fs::File, io::BufReader, path::Path, time::Duration};

use anyhow::{Context as _, Result, ensure};
use common::{address::ensure_prefixed_address, block::BlockHeight, config::BasicAuth};
pub use gateway_client::BackoffConfig;
use humantime_serde;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the Access REST API.
    pub addr: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<BasicAuth>,
    /// For individual requests we use Fibonacci backoff retry strategy.
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Deadline of a single gateway call, retries included.
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub gateway: GatewayConfig,
    #[serde(with = "humantime_serde", default = "default_block_polling_interval")]
    pub block_polling_interval: Duration,
    /// Account storage listings are heavier, so they are refreshed less often than blocks.
    #[serde(with = "humantime_serde", default = "default_storage_resync_interval")]
    pub storage_resync_interval: Duration,
    /// First height to ingest. Ingestion starts at the chain tip if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_height: Option<BlockHeight>,
    #[serde(default = "default_max_blocks_per_tick")]
    pub max_blocks_per_tick: usize,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Accounts indexed even if no transaction ever touched them.
    #[serde(default)]
    pub tracked_addresses: Vec<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_rust_log: Option<String>,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_block_polling_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_storage_resync_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_max_blocks_per_tick() -> usize {
    50
}

fn default_max_concurrent_requests() -> usize {
    8
}

fn default_port() -> u16 {
    8779
}

impl IndexerConfig {
    /// Config with defaults for everything but the gateway address.
    pub fn new(addr: Url) -> Self {
        Self {
            gateway: GatewayConfig {
                addr,
                auth: None,
                backoff: BackoffConfig::default(),
                request_timeout: default_request_timeout(),
            },
            block_polling_interval: default_block_polling_interval(),
            storage_resync_interval: default_storage_resync_interval(),
            start_height: None,
            max_blocks_per_tick: default_max_blocks_per_tick(),
            max_concurrent_requests: default_max_concurrent_requests(),
            tracked_addresses: vec![],
            port: default_port(),
            override_rust_log: None,
        }
    }

    pub fn from_path(config_path: &Path) -> Result<IndexerConfig> {
        let file = File::open(config_path)
            .with_context(|| format!("Failed to open indexer config at {config_path:?}"))?;
        let reader = BufReader::new(file);

        let mut config: IndexerConfig = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse indexer config at {config_path:?}"))?;
        config.tracked_addresses = config
            .tracked_addresses
            .iter()
            .map(|address| ensure_prefixed_address(address))
            .collect();

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_blocks_per_tick > 0,
            "max_blocks_per_tick must be positive"
        );
        ensure!(
            self.max_concurrent_requests > 0,
            "max_concurrent_requests must be positive"
        );
        ensure!(
            !self.block_polling_interval.is_zero(),
            "block_polling_interval must be positive"
        );
        ensure!(
            self.storage_resync_interval >= self.block_polling_interval,
            "storage_resync_interval ({:?}) is shorter than block_polling_interval ({:?})",
            self.storage_resync_interval,
            self.block_polling_interval
        );
        Ok(())
    }
}
