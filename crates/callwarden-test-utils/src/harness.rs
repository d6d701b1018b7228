// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full governor stack on a temp SQLite database
//! with a controllable clock.

use std::sync::Arc;

use callwarden_config::model::{CallwardenConfig, Environment, GovernorConfig, StorageConfig};
use callwarden_config::GovernorSettings;
use callwarden_core::{CallKey, CallOutcome, CallwardenError, Clock, ManualClock};
use callwarden_governor::{CallGate, CompletedCall, Reporter};
use callwarden_storage::Database;
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Owner used by [`TestHarness::key`].
pub const TEST_OWNER: &str = "acct-test";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    governor: GovernorConfig,
    start: DateTime<Utc>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            governor: GovernorConfig::default(),
            // Fixed, mid-morning UTC so day-based periods are unambiguous.
            start: Utc
                .with_ymd_and_hms(2026, 3, 10, 9, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }

    /// Use the built-in thresholds of an environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.governor.environment = environment;
        self
    }

    /// Override the limit given to new numbers.
    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.governor.default_call_limit = Some(limit);
        self
    }

    /// Override the warning and revocation thresholds.
    pub fn with_thresholds(mut self, warning: u32, revocation: u32) -> Self {
        self.governor.warning_threshold = Some(warning);
        self.governor.revocation_threshold = Some(revocation);
        self
    }

    /// Start the manual clock at `start`.
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Build the harness, creating the temp database and services.
    pub async fn build(self) -> Result<TestHarness, CallwardenError> {
        let temp_dir = tempfile::TempDir::new()
            .map_err(|e| CallwardenError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let config = CallwardenConfig {
            storage: StorageConfig {
                database_path: db_path.to_string_lossy().to_string(),
                wal_mode: true,
            },
            governor: self.governor,
            ..CallwardenConfig::default()
        };
        let db = Database::from_config(&config.storage).await?;
        let settings = config.governor.resolve();
        let clock = ManualClock::new(self.start);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());

        Ok(TestHarness {
            gate: CallGate::new(db.clone(), settings, shared.clone()),
            reporter: Reporter::new(db.clone(), settings, shared),
            db,
            clock,
            settings,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment over temp storage.
pub struct TestHarness {
    pub db: Database,
    pub clock: ManualClock,
    pub settings: GovernorSettings,
    pub config: CallwardenConfig,
    pub gate: CallGate,
    pub reporter: Reporter,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with production defaults.
    pub async fn new() -> Result<Self, CallwardenError> {
        Self::builder().build().await
    }

    /// Key for `phone` under [`TEST_OWNER`].
    pub fn key(&self, phone: &str) -> CallKey {
        CallKey {
            owner_id: TEST_OWNER.to_string(),
            phone_number: phone.to_string(),
        }
    }

    /// Current instant of the manual clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Move the manual clock forward.
    pub fn advance(&self, delta: Duration) {
        self.clock.advance(delta);
    }

    /// Drive one full call: authorize, place, complete.
    ///
    /// Returns `Ok(None)` when the number was refused before placing.
    pub async fn call(
        &self,
        phone: &str,
        outcome: CallOutcome,
        duration_secs: u32,
    ) -> Result<Option<CompletedCall>, CallwardenError> {
        let key = self.key(phone);
        if !self.gate.authorize(&key).await?.allowed {
            return Ok(None);
        }
        self.gate.placed(&key, None).await?;
        self.gate
            .completed(&key, outcome, duration_secs)
            .await
            .map(Some)
    }
}
