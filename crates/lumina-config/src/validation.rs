// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses and non-zero limits.

use crate::diagnostic::ConfigError;
use crate::model::LuminaConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LuminaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!(
                    "server.host `{host}` is not a valid IP address or hostname"
                ),
            });
        }
    }

    if config.agent.max_concurrent_sessions == 0 {
        errors.push(ConfigError::Validation {
            message: "agent.max_concurrent_sessions must be at least 1".to_string(),
        });
    }

    if config.routing.escalation_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "routing.escalation_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.calls.ring_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "calls.ring_timeout_secs must be at least 1".to_string(),
        });
    }

    if let Some(token) = &config.server.bearer_token
        && token.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "server.bearer_token must not be blank when set".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
