// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for the Lumina support engine.
//!
//! The gateway is the only layer that touches sockets. It upgrades customer
//! and agent WebSockets, decodes JSON frames into engine events, drives the
//! dispatcher, and fans the resulting deliveries back out to the right
//! connections. Timers requested by the dispatcher are armed here and
//! re-enter the engine when they fire.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::AuthConfig;
pub use server::{GatewayState, ServerConfig, build_router, start_server};
