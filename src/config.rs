use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv().ok(); // Load .env file if present
    Config {
        debounce_ms: get_env_parsed("SERP_COUNTER_DEBOUNCE_MS", 250),
        poll_interval_ms: get_env_parsed("SERP_COUNTER_POLL_INTERVAL_MS", 500),
        watchdog_interval_ms: get_env_parsed("SERP_COUNTER_WATCHDOG_INTERVAL_MS", 1000),
        watchdog_max_attempts: get_env_parsed("SERP_COUNTER_WATCHDOG_MAX_ATTEMPTS", 6),
        post_load_delay_ms: get_env_parsed("SERP_COUNTER_POST_LOAD_DELAY_MS", 800),
        results_per_page: get_env_parsed("SERP_COUNTER_RESULTS_PER_PAGE", 10),
        mobile_user_agent: get_env_or_default(
            "SERP_COUNTER_MOBILE_USER_AGENT",
            DEFAULT_MOBILE_USER_AGENT,
        ),
    }
});

pub struct Config {
    pub debounce_ms: u64,
    pub poll_interval_ms: u64,
    pub watchdog_interval_ms: u64,
    pub watchdog_max_attempts: u32,
    pub post_load_delay_ms: u64,
    pub results_per_page: u64,
    pub mobile_user_agent: String,
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_parsed<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("ignoring malformed {key}={raw:?}, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Timing and pagination knobs handed to the refresh controller.
///
/// Kept separate from [`CONFIG`] so engines built in tests never read the
/// process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub debounce: Duration,
    pub poll_interval: Duration,
    pub watchdog_interval: Duration,
    pub watchdog_max_attempts: u32,
    pub post_load_delay: Duration,
    pub results_per_page: u64,
}

impl EngineSettings {
    pub fn from_config() -> Self {
        Self {
            debounce: Duration::from_millis(CONFIG.debounce_ms),
            poll_interval: Duration::from_millis(CONFIG.poll_interval_ms),
            watchdog_interval: Duration::from_millis(CONFIG.watchdog_interval_ms),
            watchdog_max_attempts: CONFIG.watchdog_max_attempts,
            post_load_delay: Duration::from_millis(CONFIG.post_load_delay_ms),
            results_per_page: CONFIG.results_per_page.max(1),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
            poll_interval: Duration::from_millis(500),
            watchdog_interval: Duration::from_millis(1000),
            watchdog_max_attempts: 6,
            post_load_delay: Duration::from_millis(800),
            results_per_page: 10,
        }
    }
}
