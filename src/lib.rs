use std::sync::Arc;

use tokio::sync::mpsc;

pub mod config;
pub mod models;
pub mod services;
pub mod store;
pub mod transport;
pub mod watchdog;

/// Shared application state, cloned into every task.
#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub store: Arc<dyn store::Store>,
    pub quotes: Arc<dyn services::quotes::QuoteSource>,
    pub chat: transport::ChatHandles,
    pub registry: services::registry::StockRegistry,
    // epoch ms at process start, for the uptime command
    pub started_at: i64,
    // the exit code sent here becomes the process exit code
    pub shutdown_tx: mpsc::Sender<i32>,
}
