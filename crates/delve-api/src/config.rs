//! Server configuration read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use delve_core::geometry::MAX_BOX_EXTENT;
use delve_instances::domain::registry::RegistryConfig;

use crate::error::AppError;

/// Runtime settings for the API server.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Instance limit and default boundary.
    pub registry: RegistryConfig,
    /// How often the idle sweep runs.
    pub cleanup_interval: Duration,
    /// How long an instance may sit empty before the sweep destroys it.
    pub idle_timeout: chrono::Duration,
    /// Optional YAML file of trigger definitions loaded at startup.
    pub triggers_file: Option<PathBuf>,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, applying defaults for unset
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RegistryConfig::default();
        let registry = RegistryConfig {
            max_instances: parse_or(&lookup, "DELVE_MAX_INSTANCES", defaults.max_instances)?,
            half_width: parse_or(&lookup, "DELVE_INSTANCE_HALF_WIDTH", defaults.half_width)?,
            depth: parse_or(&lookup, "DELVE_INSTANCE_DEPTH", defaults.depth)?,
            height: parse_or(&lookup, "DELVE_INSTANCE_HEIGHT", defaults.height)?,
        };
        if registry.max_instances == 0 {
            return Err(AppError::Config(
                "DELVE_MAX_INSTANCES must be at least 1".to_string(),
            ));
        }
        for (key, value) in [
            ("DELVE_INSTANCE_HALF_WIDTH", registry.half_width),
            ("DELVE_INSTANCE_DEPTH", registry.depth),
            ("DELVE_INSTANCE_HEIGHT", registry.height),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Config(format!(
                    "{key} must be a non-negative number"
                )));
            }
        }
        if registry.half_width * 2.0 > MAX_BOX_EXTENT {
            return Err(AppError::Config(format!(
                "DELVE_INSTANCE_HALF_WIDTH must be at most {}",
                MAX_BOX_EXTENT / 2.0
            )));
        }

        let cleanup_secs: u64 = parse_or(&lookup, "DELVE_CLEANUP_INTERVAL_SECS", 60)?;
        let idle_secs: u32 = parse_or(&lookup, "DELVE_IDLE_TIMEOUT_SECS", 300)?;

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            registry,
            cleanup_interval: Duration::from_secs(cleanup_secs),
            idle_timeout: chrono::Duration::seconds(i64::from(idle_secs)),
            triggers_file: lookup("DELVE_TRIGGERS_FILE")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
    }
}
