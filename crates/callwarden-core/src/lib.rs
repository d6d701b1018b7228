// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for callwarden.
//!
//! This crate provides the error type, the `(owner, phone_number)` key and
//! outcome types, the clock abstraction, and the two per-key records with
//! their state transitions:
//! - **Rate limit record**: calls placed in a re-anchored 24-hour window
//! - **Quality record**: connect/miss statistics and streaks
//!
//! Transitions take `now` as an argument; persistence lives in
//! `callwarden-storage` and the async services in `callwarden-governor`.

pub mod call_event;
pub mod clock;
pub mod error;
pub mod quality;
pub mod rate_limit;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, ManualClock, SystemClock};
pub use call_event::CallEvent;
pub use error::CallwardenError;
pub use quality::QualityRecord;
pub use rate_limit::RateLimitRecord;
pub use types::{CallDirection, CallKey, CallOutcome, QualityStatus};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callwarden_error_has_all_variants() {
        let _config = CallwardenError::Config("test".into());
        let _storage = CallwardenError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _validation = CallwardenError::Validation {
            message: "test".into(),
        };
        let _internal = CallwardenError::Internal("test".into());
    }

    #[test]
    fn storage_error_displays_source() {
        let err = CallwardenError::Storage {
            source: "disk full".into(),
        };
        assert_eq!(err.to_string(), "storage error: disk full");
    }
}
