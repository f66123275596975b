use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:8085";

/// Runtime settings, read from the environment (and `.env` via dotenvy in the binary).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub token: Option<String>,
    pub order_poll: Duration,
    pub list_poll: Duration,
    pub payment_poll: Duration,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            order_poll: Duration::from_millis(15_000),
            list_poll: Duration::from_millis(20_000),
            payment_poll: Duration::from_millis(4_000),
            http_timeout: Duration::from_millis(10_000),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: try_load("STOREFRONT_API_URL", defaults.api_url),
            token: var("STOREFRONT_TOKEN").filter(|t| !t.trim().is_empty()),
            order_poll: millis("STOREFRONT_ORDER_POLL_MS", defaults.order_poll),
            list_poll: millis("STOREFRONT_LIST_POLL_MS", defaults.list_poll),
            payment_poll: millis("STOREFRONT_PAYMENT_POLL_MS", defaults.payment_poll),
            http_timeout: millis("STOREFRONT_HTTP_TIMEOUT_MS", defaults.http_timeout),
        }
    }
}

fn var(key: &str) -> Option<String> { env::var(key).ok() }

fn try_load<T: FromStr + Display>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    let Some(raw) = var(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };
    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value: {e}, using default: {default}");
        default
    })
}

/// Zero is rejected: a zero period would spin the poller.
fn millis(key: &str, default: Duration) -> Duration {
    match try_load::<u64>(key, default.as_millis() as u64) {
        0 => {
            warn!("{key} must be positive, using default");
            default
        }
        ms => Duration::from_millis(ms),
    }
}
