use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

/// Localized UI strings the views render into cards and result areas.
/// Set once at startup and handed to the views through `PollContext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    pub bid: String,
    pub not_started: String,
    pub ended: String,
    pub winner: String,
    pub no_bids: String,
    pub highest_bid: String,
    pub waiting_bid: String,
    /// Unit text following a bid count when the display carries none yet.
    pub bids_suffix: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            bid: "出價".to_string(),
            not_started: "尚未開標".to_string(),
            ended: "已結標".to_string(),
            winner: "得標者".to_string(),
            no_bids: "無人出價".to_string(),
            highest_bid: "最高出價".to_string(),
            waiting_bid: "等待首次出價".to_string(),
            bids_suffix: "次出價".to_string(),
        }
    }
}

impl Labels {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bid: env_or("AUCTION_LABEL_BID", defaults.bid),
            not_started: env_or("AUCTION_LABEL_NOT_STARTED", defaults.not_started),
            ended: env_or("AUCTION_LABEL_ENDED", defaults.ended),
            winner: env_or("AUCTION_LABEL_WINNER", defaults.winner),
            no_bids: env_or("AUCTION_LABEL_NO_BIDS", defaults.no_bids),
            highest_bid: env_or("AUCTION_LABEL_HIGHEST_BID", defaults.highest_bid),
            waiting_bid: env_or("AUCTION_LABEL_WAITING_BID", defaults.waiting_bid),
            bids_suffix: env_or("AUCTION_LABEL_BIDS_SUFFIX", defaults.bids_suffix),
        }
    }
}

/// Timing knobs shared by both pollers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub backoff_interval: Duration,
    pub max_failures: u32,
    pub backoff_reset: Duration,
    pub reload_delay: Duration,
    pub history_limit: usize,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1_000),
            backoff_interval: Duration::from_millis(5_000),
            max_failures: 3,
            backoff_reset: Duration::from_millis(10_000),
            reload_delay: Duration::from_millis(1_000),
            history_limit: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub base_url: String,
    /// When set, the detail page for this listing is polled instead of the list.
    pub product_id: Option<String>,
    pub lang: String,
    pub request_timeout: Option<Duration>,
    pub metrics_addr: Option<SocketAddr>,
    pub poll: PollSettings,
    pub labels: Labels,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // dotenvy loads .env, but doesn't override already-set env vars
        dotenvy::dotenv().ok();

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let base_url = env_or("AUCTION_BASE_URL", "http://127.0.0.1:8000".to_string());
        let product_id = std::env::var("AUCTION_PRODUCT_ID")
            .ok()
            .filter(|id| !id.trim().is_empty());
        let lang = env_or("AUCTION_LANG", "zh-hant".to_string());

        let defaults = PollSettings::default();
        let poll = PollSettings {
            interval: env_millis("POLL_INTERVAL_MS")?.unwrap_or(defaults.interval),
            backoff_interval: env_millis("POLL_BACKOFF_INTERVAL_MS")?
                .unwrap_or(defaults.backoff_interval),
            max_failures: env_parse("POLL_MAX_FAILURES")?.unwrap_or(defaults.max_failures),
            backoff_reset: env_millis("POLL_BACKOFF_RESET_MS")?.unwrap_or(defaults.backoff_reset),
            reload_delay: env_millis("POLL_RELOAD_DELAY_MS")?.unwrap_or(defaults.reload_delay),
            history_limit: env_parse("POLL_HISTORY_LIMIT")?.unwrap_or(defaults.history_limit),
        };

        Ok(Self {
            log_level,
            base_url: base_url.trim_end_matches('/').to_string(),
            product_id,
            lang,
            request_timeout: env_millis("POLL_REQUEST_TIMEOUT_MS")?,
            metrics_addr: env_parse("METRICS_ADDR")?,
            poll,
            labels: Labels::from_env(),
        })
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_var(key, std::env::var(key).ok())
}

fn parse_var<T>(key: &str, raw: Option<String>) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(None),
    }
}

fn env_millis(key: &str) -> anyhow::Result<Option<Duration>> {
    Ok(env_parse::<u64>(key)?.map(Duration::from_millis))
}
