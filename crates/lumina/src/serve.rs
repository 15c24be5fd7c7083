// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lumina serve` command implementation.
//!
//! Assembles the dispatcher from configuration, wires in the compiled-in
//! keyword responder and the null transcript store, and runs the gateway
//! server until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use lumina_config::LuminaConfig;
use lumina_core::error::LuminaError;
use lumina_core::traits::{KeywordResponder, NullTranscriptStore};
use lumina_engine::dispatch::{Dispatcher, EngineConfig};
use lumina_gateway::{AuthConfig, GatewayState, ServerConfig, start_server};

use crate::shutdown;

/// Runs the `lumina serve` command.
///
/// Runs until SIGINT/SIGTERM; in-flight socket tasks drain through axum's
/// graceful shutdown.
pub async fn run_serve(config: LuminaConfig) -> Result<(), LuminaError> {
    init_tracing(&config.agent.log_level);

    info!("starting lumina serve");

    let dispatcher = Arc::new(Dispatcher::new(
        engine_config(&config),
        Arc::new(KeywordResponder::with_keywords(
            config.responder.escalation_keywords.clone(),
        )),
        Arc::new(NullTranscriptStore),
    ));

    let state = GatewayState::new(
        dispatcher,
        AuthConfig {
            bearer_token: config.server.bearer_token.clone(),
        },
    );
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    let cancel = shutdown::install_signal_handler();
    start_server(&server_config, state, cancel).await?;

    info!("lumina serve shutdown complete");
    Ok(())
}

/// Map the config file sections onto engine tunables.
fn engine_config(config: &LuminaConfig) -> EngineConfig {
    EngineConfig {
        max_concurrent_sessions: config.agent.max_concurrent_sessions,
        escalation_timeout: Duration::from_secs(config.routing.escalation_timeout_secs),
        ring_timeout: Duration::from_secs(config.calls.ring_timeout_secs),
        greeting: config.responder.greeting.clone(),
        rescan_on_agent_online: config.routing.rescan_on_agent_online,
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lumina={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_maps_all_tunables() {
        let mut config = LuminaConfig::default();
        config.agent.max_concurrent_sessions = 3;
        config.routing.escalation_timeout_secs = 15;
        config.calls.ring_timeout_secs = 5;
        config.routing.rescan_on_agent_online = false;
        config.responder.greeting = "hi".into();

        let engine = engine_config(&config);
        assert_eq!(engine.max_concurrent_sessions, 3);
        assert_eq!(engine.escalation_timeout, Duration::from_secs(15));
        assert_eq!(engine.ring_timeout, Duration::from_secs(5));
        assert!(!engine.rescan_on_agent_online);
        assert_eq!(engine.greeting, "hi");
    }
}
