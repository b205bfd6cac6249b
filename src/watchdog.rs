use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::AppState;

/// True when nothing has been heard from the chat server for longer than
/// the idle threshold.
pub fn idle_exceeded(last_inbound_ms: i64, now_ms: i64, threshold_ms: i64) -> bool {
    now_ms - last_inbound_ms > threshold_ms
}

/// Periodically checks inbound liveness. A connection can die without the
/// socket ever reporting it; when that happens the cleanest recovery is to
/// exit and let the supervisor restart the process.
pub fn spawn(state: AppState) {
    tokio::spawn(async move {
        let period = Duration::from_secs(state.settings.watchdog_check_secs);
        let threshold_ms = state.settings.watchdog_idle_secs as i64 * 1000;

        loop {
            tokio::time::sleep(period).await;
            let last = state.chat.last_inbound.load(Ordering::Relaxed);
            let now = chrono::Utc::now().timestamp_millis();
            if idle_exceeded(last, now, threshold_ms) {
                tracing::error!(
                    "no inbound traffic for {}s, exiting",
                    (now - last) / 1000
                );
                std::process::exit(10);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_only_past_the_threshold() {
        assert!(!idle_exceeded(0, 1_800_000, 1_800_000));
        assert!(idle_exceeded(0, 1_800_001, 1_800_000));
        assert!(!idle_exceeded(1_000_000, 1_500_000, 1_800_000));
    }
}
