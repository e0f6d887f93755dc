use std::env;

use crate::chart::axis::XWindowMode;
use crate::normalize::partition::DeviceSlot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Upstream feed
    pub feed_base_url: String,
    pub feed_timeout_seconds: u64,
    pub feed_history_limit: usize,

    // Polling
    pub poll_interval_seconds: u64,

    // Devices and charts
    pub device_slots: Vec<DeviceSlot>,
    pub chart_window: XWindowMode,

    // API settings
    pub api_host: String,
    pub api_port: u16,

    // Rate limiting
    pub disable_rate_limiting: bool,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,

    // Caching
    pub cache_ttl_seconds: u64,
    pub cache_max_bytes: u64,

    // Application metadata
    pub deployment: Deployment,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_base_url: "http://localhost:5000".to_string(),
            feed_timeout_seconds: 15,
            feed_history_limit: 200,
            poll_interval_seconds: 30,
            device_slots: Vec::new(),
            chart_window: XWindowMode::Trailing(chrono::Duration::minutes(360)),
            api_host: "0.0.0.0".to_string(),
            api_port: 3000,
            disable_rate_limiting: false,
            rate_limit_per_second: 5,
            rate_limit_burst: 60,
            cache_ttl_seconds: 30,
            cache_max_bytes: 16 * 1024 * 1024, // 16MB
            deployment: Deployment::Local,
        }
    }
}

/// Read an environment variable and parse it, keeping `default` when unset or unparsable.
fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables (and `.env` when present).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `DEVICE_SLOTS` or `CHART_WINDOW_MODE` are malformed,
    /// or if the poll interval is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let poll_interval_seconds =
            parse_or("POLL_INTERVAL_SECONDS", defaults.poll_interval_seconds);
        if poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "POLL_INTERVAL_SECONDS",
                "must be at least 1".to_string(),
            ));
        }

        let device_slots = match env::var("DEVICE_SLOTS") {
            Ok(raw) => parse_device_slots(&raw)?,
            Err(_) => Vec::new(),
        };

        let chart_window = parse_window_mode(
            &env::var("CHART_WINDOW_MODE").unwrap_or_else(|_| "trailing".to_string()),
            parse_or("CHART_WINDOW_MINUTES", 360),
            parse_or("CHART_TIME_MARGIN_SECONDS", 60),
        )?;

        Ok(Self {
            // Upstream feed
            feed_base_url: env::var("FEED_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.feed_base_url),
            feed_timeout_seconds: parse_or("FEED_TIMEOUT_SECONDS", defaults.feed_timeout_seconds),
            feed_history_limit: parse_or("FEED_HISTORY_LIMIT", defaults.feed_history_limit),

            poll_interval_seconds,
            device_slots,
            chart_window,

            // API settings
            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: parse_or("API_PORT", defaults.api_port),

            // Rate limiting
            disable_rate_limiting: parse_or("DISABLE_RATE_LIMITING", false),
            rate_limit_per_second: parse_or("RATE_LIMIT_PER_SECOND", defaults.rate_limit_per_second),
            rate_limit_burst: parse_or("RATE_LIMIT_BURST", defaults.rate_limit_burst),

            // Caching
            cache_ttl_seconds: parse_or("CACHE_TTL_SECONDS", defaults.cache_ttl_seconds),
            cache_max_bytes: parse_or("CACHE_MAX_BYTES", defaults.cache_max_bytes),

            // Application metadata
            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

/// Parse `DEVICE_SLOTS`.
///
/// Format: `key[:Label]=alias1|alias2;key2=alias3`. The key always matches itself, so
/// `Dispositivo_1;Dispositivo_2` is a valid list without aliases.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` on an empty key or a key declared twice.
pub fn parse_device_slots(raw: &str) -> Result<Vec<DeviceSlot>, ConfigError> {
    let mut slots: Vec<DeviceSlot> = Vec::new();

    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (head, aliases) = match entry.split_once('=') {
            Some((head, aliases)) => (head.trim(), aliases),
            None => (entry, ""),
        };

        let (key, label) = match head.split_once(':') {
            Some((key, label)) => (key.trim(), label.trim()),
            None => (head, head),
        };

        if key.is_empty() {
            return Err(ConfigError::Invalid(
                "DEVICE_SLOTS",
                format!("empty device key in '{entry}'"),
            ));
        }
        if slots.iter().any(|s| s.key == key) {
            return Err(ConfigError::Invalid(
                "DEVICE_SLOTS",
                format!("device '{key}' declared twice"),
            ));
        }

        let slot = aliases
            .split('|')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .fold(DeviceSlot::new(key, label), DeviceSlot::with_alias);
        slots.push(slot);
    }

    Ok(slots)
}

/// Parse the X-axis initial window policy.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` for an unknown mode or a zero-length trailing window.
pub fn parse_window_mode(
    mode: &str,
    window_minutes: i64,
    margin_seconds: i64,
) -> Result<XWindowMode, ConfigError> {
    match mode.trim().to_lowercase().as_str() {
        "trailing" => {
            if window_minutes <= 0 {
                return Err(ConfigError::Invalid(
                    "CHART_WINDOW_MINUTES",
                    "must be positive".to_string(),
                ));
            }
            Ok(XWindowMode::Trailing(chrono::Duration::minutes(window_minutes)))
        }
        "full_span" | "full" => Ok(XWindowMode::FullSpan {
            margin: chrono::Duration::seconds(margin_seconds.max(0)),
        }),
        other => Err(ConfigError::Invalid(
            "CHART_WINDOW_MODE",
            format!("unknown mode '{other}' (expected trailing or full_span)"),
        )),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
