//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the store root shared by both roles
//! - Build the role's collaborators from config
//! - Bind the listener last, so traffic arrives only when ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Both roles take the same `Shutdown` and return once it has fired and work drained

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::RelayConfig;
use crate::front::Relay;
use crate::http::RelayServer;
use crate::lifecycle::Shutdown;
use crate::store::{RecordStore, StoreError};
use crate::target::{HttpTarget, TransportError};
use crate::worker::Worker;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot open store: {0}")]
    Store(#[from] StoreError),

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("cannot build target client: {0}")]
    Target(#[from] TransportError),
}

pub async fn open_store(config: &RelayConfig) -> Result<RecordStore, StartupError> {
    let store = RecordStore::open(&config.store.root).await?;
    tracing::info!(root = %config.store.root.display(), "Store opened");
    Ok(store)
}

/// Run the front role: HTTP adapter over submit-and-wait.
pub async fn run_front(config: &RelayConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    let store = open_store(config).await?;
    let relay = Relay::new(store, &config.polling, &config.front);
    let server = RelayServer::new(relay, config.front.max_body_bytes);

    let address = config.front.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    tracing::info!(
        deadline_ms = config.front.deadline_ms,
        interval_ms = config.polling.interval_ms,
        "Front role ready"
    );
    server
        .run(listener, shutdown.subscribe())
        .await
        .map_err(StartupError::Serve)
}

/// Run the worker role against the configured target.
pub async fn run_worker(config: &RelayConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    let store = open_store(config).await?;
    let target = Arc::new(HttpTarget::new(&config.target)?);
    Worker::new(store, target, config).run(shutdown).await;
    Ok(())
}
