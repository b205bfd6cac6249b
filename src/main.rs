use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use followstock::services::quotes::BoursoramaClient;
use followstock::services::registry::StockRegistry;
use followstock::store::MongoStore;
use followstock::{config, transport, watchdog, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "followstock=info".into()),
        )
        .init();

    let settings = config::load();

    let client = match mongodb::Client::with_uri_str(&settings.mongodb_uri).await {
        Ok(c) => c,
        Err(err) => {
            tracing::error!("mongodb connection failed: {}", err);
            std::process::exit(1);
        }
    };
    let store = MongoStore::new(client.database(&settings.mongodb_db));
    if let Err(err) = store.init().await {
        tracing::error!("mongodb init failed: {}", err);
        std::process::exit(1);
    }

    let (chat, outbound_rx) = transport::channels();
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<i32>(1);

    let state = AppState {
        quotes: Arc::new(BoursoramaClient::new(Duration::from_secs(
            settings.quote_timeout_secs,
        ))),
        store: Arc::new(store),
        chat,
        registry: StockRegistry::new(),
        started_at: chrono::Utc::now().timestamp_millis(),
        shutdown_tx,
        settings,
    };

    transport::spawn(state.clone(), outbound_rx);
    watchdog::spawn(state.clone());

    if let Err(err) = state.registry.load_all(&state).await {
        tracing::error!("loading stocks failed: {}", err);
        std::process::exit(1);
    }
    tracing::info!("watching {} stocks", state.registry.watched_count().await);

    let rc = tokio::select! {
        Some(rc) = shutdown_rx.recv() => rc,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            0
        }
    };
    std::process::exit(rc);
}
