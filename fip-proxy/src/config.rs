//! Process configuration, read from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::upstream::UpstreamConfig;

/// Longest accepted cache TTL.
const MAX_TTL: Duration = Duration::from_secs(5 * 60);

/// Errors from reading the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Full proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upstream base URL (`FIP_BASE_URL`)
    pub base_url: String,
    /// Cache TTL (`FIP_CACHE_TTL_SECS`)
    pub cache_ttl: Duration,
    /// Maximum stations tracked by the cache (`FIP_CACHE_MAX_ENTRIES`)
    pub max_entries: u64,
    /// Upstream request deadline (`FIP_REQUEST_TIMEOUT_SECS`)
    pub request_timeout: Duration,
    /// Check `stationName` in upstream payloads (`FIP_VALIDATE_STATION`)
    pub validate_station: bool,
    /// Directory served for non-API paths (`FIP_STATIC_DIR`)
    pub static_dir: PathBuf,
    /// Serve canned `{station}.json` files instead of the upstream (`FIP_MOCK_DATA_DIR`)
    pub mock_data_dir: Option<PathBuf>,
    /// Listening port (`PORT`)
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        let upstream = UpstreamConfig::default();
        let cache = CacheConfig::default();
        Self {
            base_url: upstream.base_url,
            cache_ttl: cache.ttl,
            max_entries: cache.max_capacity,
            request_timeout: upstream.timeout,
            validate_station: upstream.validate_station,
            static_dir: PathBuf::from("./static"),
            mock_data_dir: None,
            port: 8080,
        }
    }
}

impl ProxyConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read the configuration through `lookup`, falling back to defaults for
    /// unset or empty variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get("FIP_BASE_URL") {
            config.base_url = url;
        }
        if let Some(value) = get("FIP_CACHE_TTL_SECS") {
            let secs = parse_number::<u64>("FIP_CACHE_TTL_SECS", &value)?;
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(value) = get("FIP_CACHE_MAX_ENTRIES") {
            config.max_entries = parse_number("FIP_CACHE_MAX_ENTRIES", &value)?;
        }
        if let Some(value) = get("FIP_REQUEST_TIMEOUT_SECS") {
            let secs = parse_number::<u64>("FIP_REQUEST_TIMEOUT_SECS", &value)?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = get("FIP_VALIDATE_STATION") {
            config.validate_station = parse_bool("FIP_VALIDATE_STATION", &value)?;
        }
        if let Some(dir) = get("FIP_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        config.mock_data_dir = get("FIP_MOCK_DATA_DIR").map(PathBuf::from);
        if let Some(value) = get("PORT") {
            config.port = parse_number("PORT", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl.is_zero() || self.cache_ttl > MAX_TTL {
            return Err(ConfigError::Invalid {
                var: "FIP_CACHE_TTL_SECS",
                value: self.cache_ttl.as_secs().to_string(),
                reason: format!("must be between 1 and {}", MAX_TTL.as_secs()),
            });
        }
        if self.max_entries == 0 {
            return Err(ConfigError::Invalid {
                var: "FIP_CACHE_MAX_ENTRIES",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "FIP_REQUEST_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Upstream client settings.
    pub fn upstream(&self) -> UpstreamConfig {
        UpstreamConfig::new(&self.base_url)
            .with_timeout(self.request_timeout)
            .with_validation(self.validate_station)
    }

    /// Cache settings.
    pub fn cache(&self) -> CacheConfig {
        CacheConfig {
            ttl: self.cache_ttl,
            max_capacity: self.max_entries,
        }
    }
}

fn parse_number<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
