use crate::models::{Alert, Direction, Stock};
use crate::transport;
use crate::AppState;

use super::quotes;

/// Direction filter over a computed percent change. `threshold` is a
/// positive magnitude; `Up`/`Down` apply the sign themselves.
pub fn should_trigger(direction: Direction, percent_change: f64, threshold: f64) -> bool {
    match direction {
        Direction::Both => percent_change.abs() >= threshold,
        Direction::Up => percent_change > threshold,
        Direction::Down => percent_change < -threshold,
    }
}

/// A brand-new alert gets its baseline seeded at HALF the first observed
/// price, so the next real evaluation almost certainly triggers once. That
/// first notification doubles as confirmation that the subscription is
/// live. Change this function to get plain first-price seeding.
fn seed_baseline(alert: &mut Alert, value: f64, now_ms: i64) {
    alert.last_value = value * 0.5;
    alert.last_triggered = now_ms;
    alert.last_date = now_ms;
}

/// Builds the notification text: identity, price, signed percent change,
/// time since the previous trigger.
fn format_trigger(stock: &Stock, value: f64, percent_change: f64, elapsed_secs: i64) -> String {
    format!(
        "{} : {:.3} ({:+.2}%) in {}s",
        stock.label(),
        value,
        percent_change,
        elapsed_secs
    )
}

/// Evaluates one alert against a freshly fetched price. Persists baseline
/// bookkeeping, self-heals orphaned alerts, and enqueues the notification
/// on trigger. Called once per alert per watcher cycle.
pub async fn evaluate(
    state: &AppState,
    stock: &Stock,
    alert: &mut Alert,
    value: f64,
    now_ms: i64,
) -> Result<(), String> {
    // An alert whose contact vanished is orphaned state, not an error.
    let contact = match state.store.contact_by_id(alert.contact_id).await? {
        Some(c) => c,
        None => {
            tracing::info!("alert {}: contact missing, deleting", alert.id.to_hex());
            state.store.delete_alert(alert.id).await?;
            return Ok(());
        }
    };

    if alert.last_value == 0.0 {
        seed_baseline(alert, value, now_ms);
        state.store.save_alert(alert).await?;
        return Ok(());
    }

    // No trigger for a whole evaluation window: slide the baseline to the
    // oldest sample still inside the window, so slow drifts are caught.
    if alert.window_ms > 0 && now_ms - alert.last_triggered > alert.window_ms {
        if let Some(sample) = state
            .store
            .sample_since(stock.id, now_ms - alert.window_ms)
            .await?
        {
            tracing::debug!(
                "alert {}: window refresh, baseline {} -> {}",
                alert.id.to_hex(),
                alert.last_value,
                sample.value
            );
            alert.last_value = sample.value;
            alert.last_triggered = sample.at;
        }
    }

    let percent_change = (value - alert.last_value) / alert.last_value * 100.0;
    tracing::debug!(
        "alert {}: {} at {:+.2}%",
        alert.id.to_hex(),
        stock.key(),
        percent_change
    );

    alert.last_date = now_ms;

    if !should_trigger(alert.direction, percent_change, alert.percent) {
        state.store.save_alert(alert).await?;
        return Ok(());
    }

    if contact.is_paused(now_ms) {
        // Suppressed: the baseline is left alone so the movement is still
        // reported on the first tick after the pause ends.
        tracing::debug!("alert {}: contact paused", alert.id.to_hex());
        state.store.save_alert(alert).await?;
        return Ok(());
    }

    let elapsed_secs = (now_ms - alert.last_triggered) / 1000;
    alert.last_value = value;
    alert.last_triggered = now_ms;

    let mut message = format_trigger(stock, value, percent_change, elapsed_secs);
    if contact.show_url {
        message.push_str(&format!(
            " / {}",
            quotes::page_url(&stock.market, &stock.short)
        ));
    }

    state.store.save_alert(alert).await?;

    if let Some(holding) = state.store.holding_for_pair(contact.id, stock.id).await? {
        message.push_str(&valuation_suffix(holding.cost(), holding.worth(value)));
    }

    tracing::info!("alert {}: trigger", alert.id.to_hex());
    transport::notify(&state.chat.outbound_tx, &contact.address, message).await;
    Ok(())
}

fn valuation_suffix(cost: f64, worth: f64) -> String {
    let diff = worth - cost;
    let percent = diff / cost * 100.0;
    format!(" / {worth:.3} - {cost:.3} = {diff:+.3} ({percent:+.2}%)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_triggers_on_magnitude() {
        assert!(should_trigger(Direction::Both, 5.0, 5.0));
        assert!(should_trigger(Direction::Both, -5.0, 5.0));
        assert!(!should_trigger(Direction::Both, 4.99, 5.0));
        assert!(!should_trigger(Direction::Both, -4.99, 5.0));
    }

    #[test]
    fn up_and_down_are_strict_and_signed() {
        assert!(should_trigger(Direction::Up, 5.01, 5.0));
        assert!(!should_trigger(Direction::Up, 5.0, 5.0));
        assert!(!should_trigger(Direction::Up, -50.0, 5.0));

        assert!(should_trigger(Direction::Down, -5.01, 5.0));
        assert!(!should_trigger(Direction::Down, -5.0, 5.0));
        assert!(!should_trigger(Direction::Down, 50.0, 5.0));
    }

    // Randomized sweep of the trigger formula across directions.
    #[test]
    fn trigger_matches_formula_over_a_sweep() {
        let mut seed = 0x2545f4914f6cdd1d_u64;
        let mut next = || {
            // xorshift, good enough for a value sweep
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            (seed % 10_000) as f64 / 100.0 - 50.0
        };

        for _ in 0..1000 {
            let baseline = 10.0 + next().abs();
            let current = baseline * (1.0 + next() / 100.0);
            let threshold = next().abs() / 2.0;
            let pc = (current - baseline) / baseline * 100.0;

            assert_eq!(
                should_trigger(Direction::Both, pc, threshold),
                pc.abs() >= threshold
            );
            assert_eq!(should_trigger(Direction::Up, pc, threshold), pc > threshold);
            assert_eq!(
                should_trigger(Direction::Down, pc, threshold),
                pc < -threshold
            );
        }
    }

    #[test]
    fn seeding_halves_the_first_price() {
        let mut alert = Alert::new(
            mongodb::bson::oid::ObjectId::new(),
            mongodb::bson::oid::ObjectId::new(),
            5.0,
            Direction::Both,
            0,
        );
        seed_baseline(&mut alert, 10.0, 1_000);
        assert_eq!(alert.last_value, 5.0);
        assert_eq!(alert.last_triggered, 1_000);
    }

    #[test]
    fn trigger_message_format() {
        let mut stock = Stock::new("FR", "RNO");
        stock.name = "RENAULT".to_string();
        let msg = format_trigger(&stock, 10.0, 100.0, 60);
        assert_eq!(msg, "\"RENAULT\" (FR:RNO) : 10.000 (+100.00%) in 60s");
    }
}
