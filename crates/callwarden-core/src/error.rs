// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for callwarden.

use thiserror::Error;

/// The primary error type used across all callwarden crates.
///
/// A refused call is not an error: the rate governor reports it as a
/// negative decision. This type only covers faults.
#[derive(Debug, Error)]
pub enum CallwardenError {
    /// Configuration errors (invalid TOML, inconsistent thresholds).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Input rejected before reaching the governor (empty key, bad outcome name).
    #[error("invalid input: {message}")]
    Validation { message: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CallwardenError {
    /// Shorthand for a [`CallwardenError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
