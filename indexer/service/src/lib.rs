use std::{io, net::SocketAddr, sync::Arc};

use actix_cors::Cors;
use actix_web::{App, HttpServer, dev::ServerHandle, http, middleware, web};
use anyhow::{Context as _, Result};
use futures::FutureExt as _;
use gateway_client::{GatewayClient, HttpGatewayClient};
pub use indexer_core::config::*;
use indexer_core::{IndexerCore, store::IndexerReaders};
use log::{error, info, warn};
use scheduler::AsyncIntervalScheduler;
use tokio::task::JoinHandle;

pub mod service;

pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

pub const NETWORK: &str = "network";

pub const RUST_LOG: &str = "RUST_LOG";

fn get_cors() -> Cors {
    Cors::permissive()
        .allowed_methods(vec!["GET"])
        .allowed_headers(vec![http::header::AUTHORIZATION, http::header::ACCEPT])
        .max_age(3600)
}

pub fn new_http_server(
    readers: IndexerReaders,
    port: u16,
) -> io::Result<(actix_web::dev::Server, SocketAddr)> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(target:NETWORK, "Starting HTTP server at {addr}");

    let readers = web::Data::new(readers);
    let http_server = HttpServer::new(move || {
        App::new()
            .wrap(get_cors())
            .app_data(readers.clone())
            .wrap(middleware::Logger::default())
            .configure(service::configure)
    })
    .bind(addr)?
    .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
    .disable_signals();

    let [addr] = http_server.addrs().try_into().map_err(|addrs: Vec<_>| {
        io::Error::other(format!(
            "Expected exactly one bound address for indexer HTTP server, got {addrs:?}"
        ))
    })?;

    info!(target:NETWORK, "HTTP server started at {addr}");

    Ok((http_server.run(), addr))
}

/// Scheduler driving one ingestion tick per block polling interval.
pub fn ingestion_scheduler<G: GatewayClient>(core: Arc<IndexerCore<G>>) -> AsyncIntervalScheduler {
    let interval = core.config().block_polling_interval;

    AsyncIntervalScheduler::new("ingestion", interval, move || {
        let core = Arc::clone(&core);
        async move {
            let report = core.tick().await;
            if !report.is_clean() {
                warn!(
                    "Ingestion tick finished with {} failures and {} skipped records",
                    report.failures.len(),
                    report.skipped_records
                );
            }
            Ok(())
        }
    })
}

/// Handle to the running indexer: the ingestion scheduler and the polling HTTP server.
///
/// Dropping the handle stops both without waiting.
pub struct IndexerHandle {
    addr: SocketAddr,
    scheduler: AsyncIntervalScheduler,
    http_server_handle: ServerHandle,
    server_task: Option<JoinHandle<io::Result<()>>>,
}

impl IndexerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn scheduler(&self) -> &AsyncIntervalScheduler {
        &self.scheduler
    }

    /// Resolves once the HTTP server exits on its own.
    pub async fn stopped(&mut self) -> Result<()> {
        let Some(server_task) = self.server_task.as_mut() else {
            return Ok(());
        };

        let res = server_task.await;
        self.server_task = None;
        res.context("HTTP server task panicked")?
            .context("HTTP server exited with error")
    }

    /// Stops ingestion after the in-flight tick, then drains the HTTP server.
    pub async fn shutdown(mut self) -> Result<()> {
        self.scheduler.stop();
        self.scheduler.stopped().await;
        info!("Ingestion stopped");

        self.http_server_handle.stop(true).await;

        match self.server_task.take() {
            Some(server_task) => server_task
                .await
                .context("HTTP server task panicked")?
                .context("HTTP server exited with error"),
            None => Ok(()),
        }
    }
}

impl Drop for IndexerHandle {
    fn drop(&mut self) {
        let Self {
            addr: _,
            scheduler,
            http_server_handle,
            server_task,
        } = self;

        scheduler.stop();

        // Can't wait here as Drop can't be async, but anyway stop signal should be sent
        http_server_handle.stop(true).now_or_never();

        if let Some(server_task) = server_task.take() {
            if !server_task.is_finished() {
                server_task.abort();
            }
        }
    }
}

pub async fn run_server(config: IndexerConfig, port: u16) -> Result<IndexerHandle> {
    config.validate().context("Invalid indexer config")?;

    let GatewayConfig {
        addr,
        auth,
        backoff,
        request_timeout,
    } = config.gateway.clone();
    info!("Connecting to Flow Access API at {addr}");
    let gateway = HttpGatewayClient::new(
        addr,
        auth,
        backoff,
        request_timeout,
        config.max_concurrent_requests,
    )?;

    run_with_gateway(config, port, Arc::new(gateway)).await
}

/// Starts the indexer on top of an already constructed gateway client.
pub async fn run_with_gateway<G: GatewayClient>(
    config: IndexerConfig,
    port: u16,
    gateway: Arc<G>,
) -> Result<IndexerHandle> {
    let core = Arc::new(IndexerCore::new(config, gateway));

    let (http_server, addr) = new_http_server(core.store().readers(), port)
        .context("Failed to start indexer HTTP server")?;
    let http_server_handle = http_server.handle();
    let server_task = tokio::spawn(async move {
        let res = http_server.await;
        if let Err(err) = &res {
            error!("Indexer HTTP server failed: {err}");
        }
        res
    });

    let scheduler = ingestion_scheduler(core);
    scheduler.start();
    info!("Ingestion scheduled every {:?}", scheduler.interval());

    Ok(IndexerHandle {
        addr,
        scheduler,
        http_server_handle,
        server_task: Some(server_task),
    })
}
