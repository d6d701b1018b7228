// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the callwarden configuration system.

use callwarden_config::diagnostic::ConfigError;
use callwarden_config::model::{CallwardenConfig, Environment};
use callwarden_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[storage]
database_path = "/tmp/callwarden-test.db"
wal_mode = false

[governor]
environment = "sandbox"
default_call_limit = 50
warning_threshold = 3
revocation_threshold = 6

[logging]
level = "debug"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.storage.database_path, "/tmp/callwarden-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.governor.environment, Environment::Sandbox);
    assert_eq!(config.governor.default_call_limit, Some(50));
    assert_eq!(config.logging.level, "debug");

    let settings = config.governor.resolve();
    assert_eq!(settings.default_limit, 50);
    assert_eq!(settings.warning_threshold, 3);
    assert_eq!(settings.revocation_threshold, 6);
}

/// Empty input yields the compiled defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.governor.environment, Environment::Production);
    assert!(config.storage.wal_mode);
    assert_eq!(config.logging.level, "info");
    assert!(config.storage.database_path.ends_with("callwarden.db"));
}

/// Unknown key in [governor] is reported with a suggestion.
#[test]
fn unknown_governor_key_suggests_correction() {
    let toml = r#"
[governor]
warning_treshold = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "warning_treshold");
            assert_eq!(suggestion.as_deref(), Some("warning_threshold"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// Unknown top-level section is rejected.
#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[telephony]
enabled = true
"#;
    assert!(load_config_from_str(toml).is_err());
}

/// A misspelled environment name is a value error, not a panic.
#[test]
fn bad_environment_value_is_reported() {
    let toml = r#"
[governor]
environment = "staging"
"#;
    let errors = load_and_validate_str(toml).expect_err("staging is not an environment");
    assert!(
        matches!(&errors[0], ConfigError::InvalidValue { key, .. } if key.contains("environment")),
        "got: {errors:?}"
    );
}

/// Wrong value type produces an InvalidType diagnostic.
#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[governor]
default_call_limit = "ten"
"#;
    let errors = load_and_validate_str(toml).expect_err("string is not a u32");
    assert!(
        matches!(&errors[0], ConfigError::InvalidType { .. }),
        "got: {errors:?}"
    );
}

/// Semantic validation runs after a successful parse.
#[test]
fn validation_errors_surface_from_str_loader() {
    let toml = r#"
[governor]
warning_threshold = 5
revocation_threshold = 4
"#;
    let errors = load_and_validate_str(toml).expect_err("warning above revocation");
    assert!(errors
        .iter()
        .all(|e| matches!(e, ConfigError::Validation { .. })));
}

/// Config round-trips through serde for `callwarden config --json` style output.
#[test]
fn config_serializes_to_json() {
    let config = CallwardenConfig::default();
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["governor"]["environment"], "production");
    assert_eq!(json["logging"]["level"], "info");
}
