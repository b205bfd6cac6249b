use std::time::Duration;

use mongodb::bson::oid::ObjectId;
use tokio::time::Instant;

use crate::models::PriceSample;
use crate::AppState;

use super::evaluator;

/// What a single polling cycle did with its stock.
#[derive(Debug, PartialEq)]
pub enum CycleOutcome {
    /// Price fetched, sample recorded, this many alerts evaluated.
    Evaluated(usize),
    /// A zero price is a placeholder page, not a real quote.
    SkippedZero,
    /// Fetch failed; the failure counter moved up.
    FetchFailed,
    /// Too many consecutive failures; the stock was deleted.
    Evicted,
    /// The stock no longer exists in the store.
    Gone,
}

/// One polling cycle for one stock: fetch the price, record a sample,
/// evaluate every alert on it. Exposed so tests can drive ticks directly.
pub async fn run_cycle(state: &AppState, stock_id: ObjectId) -> Result<CycleOutcome, String> {
    let mut stock = match state.store.stock_by_id(stock_id).await? {
        Some(s) => s,
        None => return Ok(CycleOutcome::Gone),
    };

    let quote = match state.quotes.fetch(&stock.market, &stock.short).await {
        Ok(q) => q,
        Err(err) => {
            stock.failed_fetches += 1;
            tracing::warn!(
                "{}: fetch failed ({}), {} in a row",
                stock.key(),
                err,
                stock.failed_fetches
            );
            if stock.failed_fetches > state.settings.max_failed_fetches {
                tracing::warn!("{}: giving up, deleting stock", stock.key());
                state.store.delete_stock(stock.id).await?;
                return Ok(CycleOutcome::Evicted);
            }
            state.store.save_stock(&stock).await?;
            return Ok(CycleOutcome::FetchFailed);
        }
    };

    // a parsed quote counts as a successful fetch even when the price is
    // unusable, so the failure counter resets before the zero skip
    if quote.value == 0.0 {
        tracing::warn!("{}: zero price, skipping", stock.key());
        if stock.failed_fetches != 0 {
            stock.failed_fetches = 0;
            state.store.save_stock(&stock).await?;
        }
        return Ok(CycleOutcome::SkippedZero);
    }

    let now_ms = chrono::Utc::now().timestamp_millis();

    let changed = stock.value != quote.value
        || stock.failed_fetches != 0
        || stock.currency != quote.currency;
    stock.failed_fetches = 0;
    stock.value = quote.value;
    stock.currency = quote.currency;
    if changed {
        state.store.save_stock(&stock).await?;
    }

    state
        .store
        .insert_sample(&PriceSample::new(stock.id, now_ms, stock.value))
        .await?;

    let alerts = state.store.alerts_for_stock(stock.id).await?;
    let count = alerts.len();
    for mut alert in alerts {
        if let Err(err) = evaluator::evaluate(state, &stock, &mut alert, stock.value, now_ms).await
        {
            tracing::error!("alert {}: evaluation failed: {}", alert.id.to_hex(), err);
        }
    }

    Ok(CycleOutcome::Evaluated(count))
}

/// Spawns the polling loop for one stock. The task ends itself when the
/// stock is evicted or deleted, after dropping its registry entry so a
/// later subscription can start a fresh watcher.
pub fn spawn(state: AppState, stock_id: ObjectId, key: String) {
    tokio::spawn(async move {
        let period = Duration::from_secs(state.settings.poll_secs);
        let started = Instant::now();
        let mut ticks: u32 = 0;

        loop {
            match run_cycle(&state, stock_id).await {
                Ok(CycleOutcome::Evicted) | Ok(CycleOutcome::Gone) => {
                    state.registry.forget(&key).await;
                    return;
                }
                Ok(_) => {}
                Err(err) => tracing::error!("{}: cycle failed: {}", key, err),
            }

            ticks += 1;
            if state.settings.exact_timing {
                // anchored to the start so ticks never drift
                tokio::time::sleep_until(started + period * ticks).await;
            } else {
                tokio::time::sleep(period).await;
            }
        }
    });
}
