// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for callwarden.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Top-level callwarden configuration.
///
/// Every section is optional and defaults to production-safe values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CallwardenConfig {
    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Call limit and quality threshold settings.
    #[serde(default)]
    pub governor: GovernorConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("callwarden").join("callwarden.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("callwarden.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Which calling environment the account is operating in.
///
/// Sandbox accounts get much looser limits so integrations can be exercised.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

/// Call limit and quality threshold configuration.
///
/// Unset overrides fall back to the environment's defaults, see
/// [`GovernorConfig::resolve`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GovernorConfig {
    /// Production or sandbox defaults.
    #[serde(default)]
    pub environment: Environment,

    /// Calls allowed per phone number per 24-hour window.
    #[serde(default)]
    pub default_call_limit: Option<u32>,

    /// Consecutive misses before a courtesy warning is due.
    #[serde(default)]
    pub warning_threshold: Option<u32>,

    /// Consecutive misses before calling permission should be revoked.
    #[serde(default)]
    pub revocation_threshold: Option<u32>,
}

/// Resolved thresholds injected into the rate governor and quality tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GovernorSettings {
    /// Limit given to newly created rate records.
    pub default_limit: u32,
    /// Consecutive misses that trigger a warning.
    pub warning_threshold: u32,
    /// Consecutive misses that trigger revocation.
    pub revocation_threshold: u32,
}

impl GovernorSettings {
    /// Built-in thresholds for an environment.
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self {
                default_limit: 10,
                warning_threshold: 2,
                revocation_threshold: 4,
            },
            Environment::Sandbox => Self {
                default_limit: 100,
                warning_threshold: 5,
                revocation_threshold: 10,
            },
        }
    }
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self::for_environment(Environment::Production)
    }
}

impl GovernorConfig {
    /// Environment defaults with any explicit overrides applied.
    pub fn resolve(&self) -> GovernorSettings {
        let base = GovernorSettings::for_environment(self.environment);
        GovernorSettings {
            default_limit: self.default_call_limit.unwrap_or(base.default_limit),
            warning_threshold: self.warning_threshold.unwrap_or(base.warning_threshold),
            revocation_threshold: self
                .revocation_threshold
                .unwrap_or(base.revocation_threshold),
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// The level trimmed and lowercased, as accepted by validation and the
    /// tracing filter.
    pub fn normalized_level(&self) -> String {
        self.level.trim().to_ascii_lowercase()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
