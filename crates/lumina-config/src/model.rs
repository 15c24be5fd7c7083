// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Lumina support engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Lumina configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LuminaConfig {
    /// Gateway bind address and agent authentication.
    #[serde(default)]
    pub server: ServerConfig,

    /// Agent workload settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Escalation routing settings.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Call signaling settings.
    #[serde(default)]
    pub calls: CallConfig,

    /// Built-in responder settings.
    #[serde(default)]
    pub responder: ResponderConfig,
}

/// Gateway bind address and agent authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token agents must present at the socket handshake.
    /// `None` disables agent authentication (development only).
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Agent workload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Sessions one agent may hold before being marked busy.
    /// 1 keeps agents call-capable; raise it for chat-only fleets.
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: default_max_concurrent_sessions(),
            log_level: default_log_level(),
        }
    }
}

fn default_max_concurrent_sessions() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Escalation routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Seconds a session may sit in `escalation_pending` with no assignment
    /// before falling back to `ai_active`.
    #[serde(default = "default_escalation_timeout_secs")]
    pub escalation_timeout_secs: u64,

    /// Re-scan pending escalations when an agent comes online.
    #[serde(default = "default_true")]
    pub rescan_on_agent_online: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            escalation_timeout_secs: default_escalation_timeout_secs(),
            rescan_on_agent_online: default_true(),
        }
    }
}

fn default_escalation_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// Call signaling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CallConfig {
    /// Seconds a call request may ring before it is declined by timeout.
    #[serde(default = "default_ring_timeout_secs")]
    pub ring_timeout_secs: u64,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ring_timeout_secs: default_ring_timeout_secs(),
        }
    }
}

fn default_ring_timeout_secs() -> u64 {
    30
}

/// Built-in responder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResponderConfig {
    /// First AI line appended when a session is created.
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Keywords in a customer message that trigger escalation.
    #[serde(default = "default_escalation_keywords")]
    pub escalation_keywords: Vec<String>,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            escalation_keywords: default_escalation_keywords(),
        }
    }
}

fn default_greeting() -> String {
    "Hello! I am Lumina AI. How can I help you today?".to_string()
}

fn default_escalation_keywords() -> Vec<String> {
    vec!["human".into(), "agent".into(), "person".into()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = LuminaConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.agent.max_concurrent_sessions, 1);
        assert_eq!(config.routing.escalation_timeout_secs, 60);
        assert!(config.routing.rescan_on_agent_online);
        assert_eq!(config.calls.ring_timeout_secs, 30);
        assert!(config.server.bearer_token.is_none());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[server]
port = 9000
"#;
        let config: LuminaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.calls.ring_timeout_secs, 30);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml_str = r#"
[server]
prot = 9000
"#;
        assert!(toml::from_str::<LuminaConfig>(toml_str).is_err());
    }

    #[test]
    fn responder_keywords_deserialize() {
        let toml_str = r#"
[responder]
greeting = "Hi there"
escalation_keywords = ["refund", "complaint"]
"#;
        let config: LuminaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.responder.greeting, "Hi there");
        assert_eq!(config.responder.escalation_keywords.len(), 2);
    }
}
