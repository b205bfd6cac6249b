#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::mpsc;

use followstock::config::Settings;
use followstock::services::quotes::ScriptedQuotes;
use followstock::services::registry::StockRegistry;
use followstock::store::MemStore;
use followstock::transport::SendChat;
use followstock::{transport, AppState};

/// Everything a test needs: the engine state wired to an in-memory store
/// and a scripted quote source, plus the outbound queue to assert on.
pub struct Harness {
    pub state: AppState,
    pub quotes: Arc<ScriptedQuotes>,
    pub outbound: mpsc::Receiver<SendChat>,
    pub shutdown: mpsc::Receiver<i32>,
}

pub fn harness(settings: Settings) -> Harness {
    let (chat, outbound) = transport::channels();
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let quotes = Arc::new(ScriptedQuotes::new());

    let state = AppState {
        settings,
        store: Arc::new(MemStore::new()),
        quotes: quotes.clone(),
        chat,
        registry: StockRegistry::new(),
        started_at: chrono::Utc::now().timestamp_millis(),
        shutdown_tx,
    };

    Harness {
        state,
        quotes,
        outbound,
        shutdown: shutdown_rx,
    }
}
