//! The IOU node orchestrator.
//!
//! Opens the debt store, wires settlement and fan-out, starts the background
//! scans and serves the HTTP API until shut down.

use anyhow::Result;
use iou_ledger::{InMemoryLedgerStore, LedgerStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::api;
use crate::config::{IouConfig, StorageBackend};
use crate::state::AppState;
use crate::storage::RocksLedgerStore;

/// How long shutdown waits for side-effect retries to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct IouNode {
    config: IouConfig,
    /// Shared state, present once started.
    state: Option<Arc<AppState>>,
    api_handle: Option<JoinHandle<()>>,
}

impl IouNode {
    pub fn new(config: IouConfig) -> Result<Self> {
        let _: SocketAddr = config.api_addr().parse()?;
        Ok(Self {
            config,
            state: None,
            api_handle: None,
        })
    }

    fn open_store(&self) -> Result<Arc<dyn LedgerStore>> {
        let store: Arc<dyn LedgerStore> = match self.config.storage.backend {
            StorageBackend::Memory => {
                tracing::warn!("using in-memory ledger store; debts are lost on exit");
                Arc::new(InMemoryLedgerStore::new())
            }
            StorageBackend::Rocksdb => {
                Arc::new(RocksLedgerStore::open(&self.config.storage.data_dir)?)
            }
        };
        Ok(store)
    }

    /// Open storage, start the scheduler and the HTTP API.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting IOU node");

        let store = self.open_store()?;
        tracing::info!(store = store.store_id(), "ledger store ready");

        let state = Arc::new(AppState::build(store, &self.config));
        state.scheduler.spawn().await;

        let api_addr: SocketAddr = self.config.api_addr().parse()?;
        let api_state = state.clone();
        self.api_handle = Some(tokio::spawn(async move {
            if let Err(e) = api::start_api_server(api_addr, api_state).await {
                tracing::error!(error = %e, "API server error");
            }
        }));

        self.state = Some(state);
        tracing::info!("IOU node started");
        Ok(())
    }

    /// Wait until the API server stops.
    pub async fn run(&mut self) -> Result<()> {
        match self.api_handle.as_mut() {
            Some(handle) => {
                handle.await?;
                Ok(())
            }
            None => anyhow::bail!("node not started"),
        }
    }

    /// Stop the scans and the API, then give pending side effects a chance
    /// to finish.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down IOU node");
        if let Some(handle) = self.api_handle.take() {
            handle.abort();
        }
        if let Some(state) = self.state.take() {
            state.scheduler.shutdown().await;
            let dispatcher = state.engine.dispatcher();
            if tokio::time::timeout(DRAIN_TIMEOUT, dispatcher.wait_idle()).await.is_err() {
                tracing::warn!(
                    pending = dispatcher.pending_retries(),
                    "side effects still retrying at shutdown"
                );
            }
        }
        tracing::info!("IOU node stopped");
        Ok(())
    }

    pub fn state(&self) -> Option<&Arc<AppState>> {
        self.state.as_ref()
    }
}
