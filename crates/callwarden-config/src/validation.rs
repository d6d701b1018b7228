// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Covers constraints serde cannot express: positive limits, threshold
//! ordering, and recognised log levels.

use crate::diagnostic::ConfigError;
use crate::model::CallwardenConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &CallwardenConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    let governor = &config.governor;
    if governor.default_call_limit == Some(0) {
        errors.push(ConfigError::Validation {
            message: "governor.default_call_limit must be greater than 0".to_string(),
        });
    }
    if governor.warning_threshold == Some(0) {
        errors.push(ConfigError::Validation {
            message: "governor.warning_threshold must be greater than 0".to_string(),
        });
    }
    if governor.revocation_threshold == Some(0) {
        errors.push(ConfigError::Validation {
            message: "governor.revocation_threshold must be greater than 0".to_string(),
        });
    }

    // Checked on the resolved values so a lone override is compared
    // against the environment default.
    let settings = governor.resolve();
    if settings.warning_threshold > settings.revocation_threshold {
        errors.push(ConfigError::Validation {
            message: format!(
                "governor.warning_threshold ({}) must not exceed governor.revocation_threshold ({})",
                settings.warning_threshold, settings.revocation_threshold
            ),
        });
    }

    let level = config.logging.normalized_level();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "logging.level `{}` is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
