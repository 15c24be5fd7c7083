// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams to the external collaborators this engine consumes but does not
//! implement: the AI responder and the transcript persistence service.

pub mod responder;
pub mod storage;

pub use responder::{KeywordResponder, Reply, Responder};
pub use storage::{NullTranscriptStore, TranscriptStore};
