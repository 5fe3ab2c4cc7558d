use std::io::Write as _;

use anyhow::Result;
use common::Block;
use indexer_service::IndexerConfig;
use tokio::test;

#[test]
async fn service_runs_from_config_file_with_unreachable_gateway() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(
        br#"{
            "gateway": {
                "addr": "http://127.0.0.1:1",
                "backoff": { "start_delay_millis": 10, "max_retries": 0 },
                "request_timeout": "200ms"
            },
            "block_polling_interval": "50ms",
            "storage_resync_interval": "50ms",
            "port": 0
        }"#,
    )?;

    let config = IndexerConfig::from_path(file.path())?;
    let port = config.port;
    let handle = indexer_service::run_server(config, port).await?;

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(handle.scheduler().is_running());

    let blocks: Vec<Block> =
        reqwest::get(format!("http://127.0.0.1:{}/blocks", handle.addr().port()))
            .await?
            .json()
            .await?;
    assert!(blocks.is_empty());

    handle.shutdown().await
}

#[test]
async fn invalid_config_is_rejected() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(
        br#"{
            "gateway": { "addr": "http://127.0.0.1:1" },
            "max_blocks_per_tick": 0,
            "port": 0
        }"#,
    )?;

    let config = IndexerConfig::from_path(file.path())?;
    assert!(indexer_service::run_server(config, 0).await.is_err());

    Ok(())
}
