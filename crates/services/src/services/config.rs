//! Runtime configuration from environment variables.

use std::{
    env,
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    /// Pending cases older than this count as stale.
    pub stale_after: chrono::Duration,
    /// Capacity of the case event bus; must be non-zero.
    pub event_buffer: usize,
    /// Periodic refresh of the pending cache that runs even without feed
    /// events. Disabled when unset or zero.
    pub fallback_poll: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("cases.db"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            stale_after: chrono::Duration::hours(24),
            event_buffer: 256,
            fallback_poll: None,
        }
    }
}

impl Config {
    /// Read configuration from the environment, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(path) = env::var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(host) = env_parse::<IpAddr>("HOST")? {
            config.host = host;
        }
        if let Some(port) = env_parse::<u16>("PORT")? {
            config.port = port;
        }
        if let Some(hours) = env_parse::<i64>("PENDING_STALE_AFTER_HOURS")? {
            config.stale_after =
                stale_after_from_hours(hours).ok_or(ConfigError::Invalid {
                    key: "PENDING_STALE_AFTER_HOURS",
                    value: hours.to_string(),
                })?;
        }
        if let Some(buffer) = env_parse::<usize>("CASE_EVENT_BUFFER")? {
            if buffer == 0 {
                return Err(ConfigError::Invalid {
                    key: "CASE_EVENT_BUFFER",
                    value: buffer.to_string(),
                });
            }
            config.event_buffer = buffer;
        }
        if let Some(secs) = env_parse::<u64>("PENDING_FALLBACK_POLL_SECS")? {
            config.fallback_poll = fallback_poll_from_secs(secs);
        }

        Ok(config)
    }
}

fn env_parse<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(None),
    }
}

fn stale_after_from_hours(hours: i64) -> Option<chrono::Duration> {
    if hours <= 0 {
        return None;
    }
    chrono::Duration::try_hours(hours)
}

fn fallback_poll_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
