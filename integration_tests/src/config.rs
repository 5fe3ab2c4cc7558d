use std::time::Duration;

use indexer_service::{BackoffConfig, IndexerConfig};
use url::Url;

/// Indexer config with fast polling, starting at height 1.
///
/// The gateway address is never dialed since tests inject a mock gateway.
pub fn indexer_config() -> IndexerConfig {
    let addr = Url::parse("http://127.0.0.1:8888").expect("Valid gateway URL");
    let mut config = IndexerConfig::new(addr);
    config.gateway.backoff = BackoffConfig {
        start_delay_millis: 10,
        max_retries: 1,
    };
    config.block_polling_interval = Duration::from_millis(50);
    config.storage_resync_interval = Duration::from_millis(200);
    config.start_height = Some(1);
    config
}
