use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::Stock;
use crate::AppState;

use super::watcher;

/// Tracks which stocks have a live polling task, so each stock gets at
/// most one watcher no matter how many contacts subscribe to it.
#[derive(Clone, Default)]
pub struct StockRegistry {
    watched: Arc<Mutex<HashSet<String>>>,
}

impl StockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a watcher for the stock unless one is already running.
    pub async fn ensure_watching(&self, state: &AppState, stock: &Stock) {
        let key = stock.key();
        let mut watched = self.watched.lock().await;
        if watched.insert(key.clone()) {
            tracing::info!("watching {}", key);
            watcher::spawn(state.clone(), stock.id, key);
        }
    }

    /// Starts watchers for every stock in the store. Run once at startup.
    pub async fn load_all(&self, state: &AppState) -> Result<(), String> {
        for stock in state.store.all_stocks().await? {
            tracing::info!("loading {} ...", stock.label());
            self.ensure_watching(state, &stock).await;
        }
        Ok(())
    }

    /// Drops a registry entry; the watcher task calls this as it exits.
    pub async fn forget(&self, key: &str) {
        self.watched.lock().await.remove(key);
    }

    pub async fn watched_count(&self) -> usize {
        self.watched.lock().await.len()
    }
}
