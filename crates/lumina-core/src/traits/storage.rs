// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The transcript persistence seam.
//!
//! Live session state is in-memory; on close a session is handed to the
//! external persistence service as an [`ArchivedSession`]. The engine never
//! reads archived data back.

use async_trait::async_trait;

use crate::error::LuminaError;
use crate::types::ArchivedSession;

/// Durable archival of closed sessions.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn archive_session(
        &self,
        archived: &ArchivedSession,
    ) -> Result<(), LuminaError>;
}

/// Archival stand-in that logs the closed session and drops it.
#[derive(Debug, Default)]
pub struct NullTranscriptStore;

#[async_trait]
impl TranscriptStore for NullTranscriptStore {
    async fn archive_session(
        &self,
        archived: &ArchivedSession,
    ) -> Result<(), LuminaError> {
        tracing::info!(
            session_id = %archived.session_id,
            message_count = archived.message_count,
            duration_secs = archived.duration_secs,
            "session archived (null store)"
        );
        Ok(())
    }
}
