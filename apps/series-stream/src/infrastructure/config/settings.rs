//! Service Configuration Settings
//!
//! Configuration types for the series stream, loaded from environment variables.

use std::time::Duration;

/// Which `SampleStore` adapter to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// `TimescaleDB` / `PostgreSQL` via sqlx.
    #[default]
    Postgres,
    /// In-process store for local runs.
    Memory,
}

impl StoreBackend {
    /// Parse a backend name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unknown names.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "timescale" => Ok(Self::Postgres),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                key: "SERIES_STREAM_STORE".to_string(),
                value: other.to_string(),
            }),
        }
    }

    /// Backend name for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Memory => "memory",
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Control and streaming HTTP port.
    pub http_port: u16,
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_port: 8000,
            health_port: 8082,
        }
    }
}

/// Generation loop settings.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Pause between samples.
    pub interval: Duration,
    /// Inclusive lower bound of generated values.
    pub value_min: f64,
    /// Exclusive upper bound of generated values.
    pub value_max: f64,
    /// Consecutive persistence failures before the loop halts (0 = never).
    pub halt_after_failures: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            value_min: 0.0,
            value_max: 100.0,
            halt_after_failures: 0,
        }
    }
}

/// Broadcast settings.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastSettings {
    /// Upper bound on a single subscriber send.
    pub send_timeout: Duration,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
        }
    }
}

/// Sample store settings.
#[derive(Clone)]
pub struct StoreSettings {
    /// Adapter to build.
    pub backend: StoreBackend,
    /// Postgres connection string.
    pub database_url: String,
    /// Pool size.
    pub max_connections: u32,
    /// Readiness probe attempts.
    pub readiness_attempts: u32,
    /// Pause between readiness attempts.
    pub readiness_delay: Duration,
    /// Convert the table to a `TimescaleDB` hypertable on bootstrap.
    pub create_hypertable: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Postgres,
            database_url: "postgres://postgres:password@db:5432/postgres".to_string(),
            max_connections: 5,
            readiness_attempts: 10,
            readiness_delay: Duration::from_secs(2),
            create_hypertable: true,
        }
    }
}

impl std::fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSettings")
            .field("backend", &self.backend)
            .field("database_url", &redact_url(&self.database_url))
            .field("max_connections", &self.max_connections)
            .field("readiness_attempts", &self.readiness_attempts)
            .field("readiness_delay", &self.readiness_delay)
            .field("create_hypertable", &self.create_hypertable)
            .finish()
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Server port settings.
    pub server: ServerSettings,
    /// Generation loop settings.
    pub generation: GenerationSettings,
    /// Broadcast settings.
    pub broadcast: BroadcastSettings,
    /// Sample store settings.
    pub store: StoreSettings,
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Unparseable numbers fall back to their defaults; semantic violations
    /// (empty range, zero interval, unknown backend) are errors.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let defaults = Self::default();

        let server = ServerSettings {
            http_port: env.parse("SERIES_STREAM_HTTP_PORT", defaults.server.http_port),
            health_port: env.parse("SERIES_STREAM_HEALTH_PORT", defaults.server.health_port),
        };

        let generation = GenerationSettings {
            interval: env.duration_millis(
                "SERIES_STREAM_INTERVAL_MS",
                defaults.generation.interval,
            ),
            value_min: env.parse("SERIES_STREAM_VALUE_MIN", defaults.generation.value_min),
            value_max: env.parse("SERIES_STREAM_VALUE_MAX", defaults.generation.value_max),
            halt_after_failures: env.parse(
                "SERIES_STREAM_HALT_AFTER_FAILURES",
                defaults.generation.halt_after_failures,
            ),
        };

        let broadcast = BroadcastSettings {
            send_timeout: env.duration_millis(
                "SERIES_STREAM_SEND_TIMEOUT_MS",
                defaults.broadcast.send_timeout,
            ),
        };

        let backend = match env.get("SERIES_STREAM_STORE") {
            Some(name) => StoreBackend::parse(&name)?,
            None => defaults.store.backend,
        };

        let database_url = env
            .get("DATABASE_URL")
            .unwrap_or(defaults.store.database_url);

        if backend == StoreBackend::Postgres && database_url.trim().is_empty() {
            return Err(ConfigError::EmptyValue("DATABASE_URL".to_string()));
        }

        let store = StoreSettings {
            backend,
            database_url,
            max_connections: env.parse(
                "SERIES_STREAM_DB_MAX_CONNECTIONS",
                defaults.store.max_connections,
            ),
            readiness_attempts: env.parse(
                "SERIES_STREAM_READINESS_ATTEMPTS",
                defaults.store.readiness_attempts,
            ),
            readiness_delay: env.duration_secs(
                "SERIES_STREAM_READINESS_DELAY_SECS",
                defaults.store.readiness_delay,
            ),
            create_hypertable: env.flag(
                "SERIES_STREAM_HYPERTABLE",
                defaults.store.create_hypertable,
            ),
        };

        let config = Self {
            server,
            generation,
            broadcast,
            store,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check semantic constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let GenerationSettings {
            value_min,
            value_max,
            interval,
            ..
        } = self.generation;

        if !value_min.is_finite() || !value_max.is_finite() || value_min >= value_max {
            return Err(ConfigError::InvalidRange {
                min: value_min,
                max: value_max,
            });
        }

        if interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "SERIES_STREAM_INTERVAL_MS".to_string(),
                value: "0".to_string(),
            });
        }

        if self.broadcast.send_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "SERIES_STREAM_SEND_TIMEOUT_MS".to_string(),
                value: "0".to_string(),
            });
        }

        if self.store.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SERIES_STREAM_DB_MAX_CONNECTIONS".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has a value outside its domain.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
    /// Generated value range is empty or not finite.
    #[error("invalid value range [{min}, {max})")]
    InvalidRange {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map_or(default, |v| match v.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => default,
            })
    }
}

fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://[REDACTED]{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
