//! Process configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::taxonomy::OrphanPolicy;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_TAXONOMY_PATH: &str = "data/taxonomy.csv";
const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 15 * 60 * 1000;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 100;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value `{value}`: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Deployment environment. Error responses carry details only in
/// `Development`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "development" => Some(Self::Development),
            "production" => Some(Self::Production),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    /// Requests allowed per client per window. Zero disables limiting.
    pub max_requests: u32,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`. Only
    /// safe behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub environment: Environment,
    pub port: u16,
    pub taxonomy_path: PathBuf,
    pub rate_limit: RateLimitConfig,
    /// Allowed CORS origins. `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
    pub request_timeout: Duration,
    pub orphan_policy: OrphanPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            port: DEFAULT_PORT,
            taxonomy_path: PathBuf::from(DEFAULT_TAXONOMY_PATH),
            rate_limit: RateLimitConfig {
                window: Duration::from_millis(DEFAULT_RATE_LIMIT_WINDOW_MS),
                max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
                trust_proxy_headers: false,
            },
            cors_origins: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            orphan_policy: OrphanPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `ESGT_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let environment = match lookup("ESGT_ENV") {
            Some(value) => Environment::from_str(value.trim()).ok_or(ConfigError::Invalid {
                var: "ESGT_ENV",
                value,
                reason: "expected development, production or test",
            })?,
            None => defaults.environment,
        };

        let port = parse_var(&lookup, "ESGT_PORT", defaults.port)?;

        let taxonomy_path = lookup("ESGT_TAXONOMY_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.taxonomy_path);

        let window_ms = parse_var(
            &lookup,
            "ESGT_RATE_LIMIT_WINDOW_MS",
            DEFAULT_RATE_LIMIT_WINDOW_MS,
        )?;
        let max_requests = parse_var(
            &lookup,
            "ESGT_RATE_LIMIT_MAX_REQUESTS",
            DEFAULT_RATE_LIMIT_MAX_REQUESTS,
        )?;

        let cors_origins = lookup("ESGT_CORS_ORIGINS").map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let trust_proxy_headers = match lookup("ESGT_TRUST_PROXY") {
            Some(value) => match value.trim() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "ESGT_TRUST_PROXY",
                        value,
                        reason: "expected true or false",
                    })
                }
            },
            None => defaults.rate_limit.trust_proxy_headers,
        };

        let timeout_secs = parse_var(
            &lookup,
            "ESGT_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "ESGT_REQUEST_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "expected a positive integer",
            });
        }

        let orphan_policy = match lookup("ESGT_ORPHAN_POLICY") {
            Some(value) => OrphanPolicy::from_str(value.trim()).ok_or(ConfigError::Invalid {
                var: "ESGT_ORPHAN_POLICY",
                value,
                reason: "expected drop or reject",
            })?,
            None => defaults.orphan_policy,
        };

        Ok(Self {
            environment,
            port,
            taxonomy_path,
            rate_limit: RateLimitConfig {
                window: Duration::from_millis(window_ms),
                max_requests,
                trust_proxy_headers,
            },
            cors_origins,
            request_timeout: Duration::from_secs(timeout_secs),
            orphan_policy,
        })
    }

    /// Error responses carry details only during development.
    pub fn expose_error_details(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Source key under which the configured taxonomy is cached.
    pub fn taxonomy_key(&self) -> String {
        self.taxonomy_path.to_string_lossy().into_owned()
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value,
            reason: "expected a non-negative integer",
        }),
        None => Ok(default),
    }
}
