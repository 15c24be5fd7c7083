// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./lumina.toml` > `~/.config/lumina/lumina.toml` > `/etc/lumina/lumina.toml`
//! with environment variable overrides via `LUMINA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::LuminaConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/lumina/lumina.toml` (system-wide)
/// 3. `~/.config/lumina/lumina.toml` (user XDG config)
/// 4. `./lumina.toml` (local directory)
/// 5. `LUMINA_*` environment variables
pub fn load_config() -> Result<LuminaConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<LuminaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LuminaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LuminaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LuminaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LuminaConfig::default()))
        .merge(Toml::file("/etc/lumina/lumina.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("lumina/lumina.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("lumina.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `LUMINA_SERVER_BEARER_TOKEN` must map to
/// `server.bearer_token`, not `server.bearer.token`.
fn env_provider() -> Env {
    Env::prefixed("LUMINA_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("agent_", "agent.", 1)
            .replacen("routing_", "routing.", 1)
            .replacen("calls_", "calls.", 1)
            .replacen("responder_", "responder.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_yields_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn toml_string_overrides_defaults() {
        let config = load_config_from_str(
            r#"
[routing]
escalation_timeout_secs = 5
"#,
        )
        .unwrap();
        assert_eq!(config.routing.escalation_timeout_secs, 5);
        assert_eq!(config.calls.ring_timeout_secs, 30);
    }

    #[test]
    fn unknown_section_errors() {
        assert!(load_config_from_str("[nonsense]\nfoo = 1\n").is_err());
    }
}
