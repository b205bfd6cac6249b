use std::env;

#[derive(Debug, Clone)]
pub struct Settings {
    pub mongodb_uri: String,
    pub mongodb_db: String,

    // chat gateway websocket endpoint
    pub chat_url: String,

    // watcher cycle period
    pub poll_secs: u64,
    // compute ticks from a monotonic start instead of sleeping a fixed
    // duration after each cycle (prevents drift accumulation)
    pub exact_timing: bool,
    // evict a stock (and its alerts) after this many consecutive failures
    pub max_failed_fetches: i64,

    // reconnect backoff: floor, +1s per consecutive failure, capped
    pub backoff_floor_secs: u64,
    pub backoff_cap_secs: u64,

    // liveness watchdog over inbound chat traffic
    pub watchdog_check_secs: u64,
    pub watchdog_idle_secs: u64,

    // long listings are split into chunks of this many lines
    pub lines_per_message: usize,

    pub quote_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_db: "followstock".to_string(),
            chat_url: "ws://127.0.0.1:5280/bot".to_string(),
            poll_secs: 60,
            exact_timing: false,
            max_failed_fetches: 1000,
            backoff_floor_secs: 5,
            backoff_cap_secs: 120,
            watchdog_check_secs: 300,
            watchdog_idle_secs: 1800,
            lines_per_message: 15,
            quote_timeout_secs: 30,
        }
    }
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let mut s = Settings::default();

    if let Ok(v) = env::var("MONGODB_URI") {
        s.mongodb_uri = v;
    }
    if let Ok(v) = env::var("MONGODB_DB") {
        s.mongodb_db = v;
    }
    if let Ok(v) = env::var("CHAT_WS_URL") {
        s.chat_url = v;
    }

    s.poll_secs = env_u64("POLL_SECS", s.poll_secs);
    s.exact_timing = env_bool("EXACT_TIMING", s.exact_timing);
    s.max_failed_fetches = env_u64("MAX_FAILED_FETCHES", s.max_failed_fetches as u64) as i64;
    s.backoff_floor_secs = env_u64("RECONNECT_FLOOR_SECS", s.backoff_floor_secs);
    s.backoff_cap_secs = env_u64("RECONNECT_CAP_SECS", s.backoff_cap_secs);
    s.watchdog_check_secs = env_u64("WATCHDOG_CHECK_SECS", s.watchdog_check_secs);
    s.watchdog_idle_secs = env_u64("WATCHDOG_IDLE_SECS", s.watchdog_idle_secs);
    s.lines_per_message = env_u64("LINES_PER_MESSAGE", s.lines_per_message as u64) as usize;
    s.quote_timeout_secs = env_u64("QUOTE_TIMEOUT_SECS", s.quote_timeout_secs);

    s
}

fn env_u64(name: &str, fallback: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn env_bool(name: &str, fallback: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => fallback,
    }
}
