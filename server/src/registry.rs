//! Process-wide wiring: byte store, catalog host, and the perturbation task.

use std::sync::Arc;
use std::time::Duration;

use beanline_engine::DocumentStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::db::{self, ByteStore, MemoryByteStore, PgByteStore, PoolError};
use crate::error::AppError;
use crate::handlers::BatchSessions;
use crate::host::InventoryHost;
use crate::websocket::ConnectionManager;
use crate::AppState;

/// Errors raised while starting the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Host(#[from] AppError),
}

/// Everything started once per process.
pub struct Registry {
    state: AppState,
    perturber: Option<JoinHandle<()>>,
}

impl Registry {
    /// Build the byte store and host, and start the perturbation task.
    pub async fn start(config: Config) -> Result<Self, StartupError> {
        let bytes: Arc<dyn ByteStore> = match &config.database_url {
            Some(url) => {
                let pool = db::connect(url, config.database_max_connections).await?;
                Arc::new(PgByteStore::new(pool))
            }
            None => {
                tracing::warn!("DATABASE_URL not set, keeping the catalog in memory");
                Arc::new(MemoryByteStore::new())
            }
        };

        let host = InventoryHost::open(bytes, &config.document_key).await?;
        let store = host.store().clone();
        tracing::info!(key = host.key(), records = store.snapshot().len(), "Catalog ready");

        let perturber = config
            .perturb_interval
            .map(|period| spawn_perturber(store.clone(), period));

        let state = AppState {
            store,
            config: Arc::new(config),
            conn_manager: ConnectionManager::new_shared(),
            batch_sessions: Arc::new(BatchSessions::new()),
        };

        Ok(Self { state, perturber })
    }

    /// Shared handler state.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Stop the perturbation task and close every session.
    pub fn stop(mut self) {
        if let Some(task) = self.perturber.take() {
            task.abort();
        }
        let connections = self.state.conn_manager.close_all();
        let batches = self.state.batch_sessions.close_all();
        let peers = self.state.store.close_all_peers();
        tracing::info!(connections, batches, peers, "Registry stopped");
    }
}

/// Nudge one random record's stock every `period`.
fn spawn_perturber(store: Arc<DocumentStore>, period: Duration) -> JoinHandle<()> {
    tracing::info!(period_ms = period.as_millis() as u64, "Starting stock perturbation");
    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.bump_random_stock(&mut rng).await {
                Ok(Some(record)) => {
                    tracing::debug!(record_id = %record.id, stock = record.stock, "Perturbed stock")
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Stock perturbation failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config(perturb_interval: Option<Duration>) -> Config {
        Config {
            perturb_interval,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn starts_in_memory_without_database() {
        let registry = Registry::start(memory_config(None)).await.unwrap();
        let state = registry.state();
        assert_eq!(state.store.snapshot().len(), 5);
        registry.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn perturber_moves_stock() {
        let registry = Registry::start(memory_config(Some(Duration::from_millis(10))))
            .await
            .unwrap();
        let store = registry.state().store;
        let heads = store.document().heads();

        tokio::time::sleep(Duration::from_millis(35)).await;

        assert_ne!(store.document().heads(), heads);
        registry.stop();
    }

    #[tokio::test]
    async fn stop_closes_peers() {
        let registry = Registry::start(memory_config(None)).await.unwrap();
        let store = registry.state().store;
        let _session = store.open_peer(None).await;
        assert_eq!(store.peer_count(), 1);

        registry.stop();
        assert_eq!(store.peer_count(), 0);
    }
}
