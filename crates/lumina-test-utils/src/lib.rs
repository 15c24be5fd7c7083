// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Lumina integration tests.
//!
//! Provides mock collaborators and a harness that assembles a complete
//! dispatcher stack for fast, deterministic, CI-runnable tests without
//! external services.
//!
//! # Components
//!
//! - [`MockResponder`] - AI responder with a pre-configured reply queue
//! - [`MemoryTranscriptStore`] - transcript store that captures archived sessions
//! - [`EngineHarness`] - assembled dispatcher with connection helpers

pub mod harness;
pub mod memory_store;
pub mod mock_responder;

pub use harness::EngineHarness;
pub use memory_store::MemoryTranscriptStore;
pub use mock_responder::MockResponder;
