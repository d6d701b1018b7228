// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `./callwarden.toml` > `~/.config/callwarden/callwarden.toml` >
//! `/etc/callwarden/callwarden.toml`, with `CALLWARDEN_` environment variables on top.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CallwardenConfig;

const SYSTEM_CONFIG: &str = "/etc/callwarden/callwarden.toml";
const LOCAL_CONFIG: &str = "callwarden.toml";

/// Candidate config files, lowest precedence first.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("callwarden").join(LOCAL_CONFIG));
    }
    paths.push(PathBuf::from(LOCAL_CONFIG));
    paths
}

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. Each file from [`config_paths`]
/// 3. `CALLWARDEN_*` environment variables
pub fn load_config() -> Result<CallwardenConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. No files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<CallwardenConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CallwardenConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CallwardenConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CallwardenConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    config_paths().into_iter().fold(
        Figment::new().merge(Serialized::defaults(CallwardenConfig::default())),
        |figment, path| figment.merge(Toml::file(path)),
    )
    .merge(env_provider())
}

/// Environment provider mapping `CALLWARDEN_<SECTION>_<KEY>` to `section.key`.
///
/// `Env::split("_")` would break keys that contain underscores
/// (`CALLWARDEN_GOVERNOR_DEFAULT_CALL_LIMIT` must become
/// `governor.default_call_limit`), so sections are mapped explicitly.
fn env_provider() -> Env {
    Env::prefixed("CALLWARDEN_").map(|key| {
        key.as_str()
            .replacen("storage_", "storage.", 1)
            .replacen("governor_", "governor.", 1)
            .replacen("logging_", "logging.", 1)
            .into()
    })
}
