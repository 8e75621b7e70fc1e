//! Configuration types.
//!
//! Everything is read from `CONCIERGE_*` environment variables with
//! defaults matching the documented abuse-control limits.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Abuse-control limits.
#[derive(Debug, Clone)]
pub struct AbuseConfig {
    /// Identical bodies needed (within the recent window) to flag a bot.
    pub repeat_threshold: usize,
    /// How many recent received bodies are remembered per sender.
    pub recent_capacity: usize,
    /// Maximum automated replies per sender inside `rate_window`.
    pub max_responses: usize,
    /// Trailing window for the response-rate limiter.
    pub rate_window: Duration,
}

impl AbuseConfig {
    /// `rate_window` as a chrono duration, for comparing against message times.
    pub fn chrono_window(&self) -> Result<chrono::Duration, ConfigError> {
        chrono::Duration::from_std(self.rate_window).map_err(|e| ConfigError::InvalidValue {
            key: "CONCIERGE_RATE_WINDOW_SECS".into(),
            message: format!("{:?} is out of range: {e}", self.rate_window),
        })
    }
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            repeat_threshold: 3,
            recent_capacity: 10,
            max_responses: 10,
            rate_window: Duration::from_secs(3600), // 1 hour
        }
    }
}

/// Intent dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Upper bound on a single flight-search collaborator call.
    pub flight_timeout: Duration,
    /// Upper bound on a single catalog collaborator call.
    pub catalog_timeout: Duration,
    /// Base URL used to build flight-search deep links.
    pub flight_search_url: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            flight_timeout: Duration::from_secs(10),
            catalog_timeout: Duration::from_secs(5),
            flight_search_url: "https://vuelos.ejemplo.com/buscar".to_string(),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    pub abuse: AbuseConfig,
    pub dispatcher: DispatcherConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/concierge.db"),
            abuse: AbuseConfig::default(),
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Build the configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path = std::env::var("CONCIERGE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let abuse = AbuseConfig {
            repeat_threshold: env_positive(
                "CONCIERGE_BOT_THRESHOLD",
                defaults.abuse.repeat_threshold as u64,
            )? as usize,
            recent_capacity: env_positive(
                "CONCIERGE_RECENT_CAPACITY",
                defaults.abuse.recent_capacity as u64,
            )? as usize,
            max_responses: env_positive(
                "CONCIERGE_MAX_REPLIES_PER_HOUR",
                defaults.abuse.max_responses as u64,
            )? as usize,
            rate_window: Duration::from_secs(env_positive(
                "CONCIERGE_RATE_WINDOW_SECS",
                defaults.abuse.rate_window.as_secs(),
            )?),
        };

        let dispatcher = DispatcherConfig {
            flight_timeout: Duration::from_secs(env_positive(
                "CONCIERGE_FLIGHT_TIMEOUT_SECS",
                defaults.dispatcher.flight_timeout.as_secs(),
            )?),
            catalog_timeout: Duration::from_secs(env_positive(
                "CONCIERGE_CATALOG_TIMEOUT_SECS",
                defaults.dispatcher.catalog_timeout.as_secs(),
            )?),
            flight_search_url: std::env::var("CONCIERGE_FLIGHT_SEARCH_URL")
                .unwrap_or(defaults.dispatcher.flight_search_url),
        };

        let config = Self {
            db_path,
            abuse,
            dispatcher,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.abuse.repeat_threshold > self.abuse.recent_capacity {
            return Err(ConfigError::InvalidValue {
                key: "CONCIERGE_BOT_THRESHOLD".into(),
                message: format!(
                    "threshold {} can never be reached with a window of {} messages",
                    self.abuse.repeat_threshold, self.abuse.recent_capacity
                ),
            });
        }
        self.abuse.chrono_window()?;
        if self.dispatcher.flight_search_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "CONCIERGE_FLIGHT_SEARCH_URL".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// Read a strictly positive integer, falling back to `default` when unset.
fn env_positive(key: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => parse_positive(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, ConfigError> {
    let value: u64 = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?} is not a number: {e}"),
    })?;
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".into(),
        });
    }
    Ok(value)
}
