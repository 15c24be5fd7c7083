// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory transcript store that captures archived sessions for assertion.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use lumina_core::error::LuminaError;
use lumina_core::traits::TranscriptStore;
use lumina_core::types::ArchivedSession;

/// Captures every archived session; can be told to fail to exercise the
/// archival error path.
#[derive(Default)]
pub struct MemoryTranscriptStore {
    archived: Arc<Mutex<Vec<ArchivedSession>>>,
    fail: Arc<Mutex<bool>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All sessions archived so far, in archival order.
    pub async fn archived(&self) -> Vec<ArchivedSession> {
        self.archived.lock().await.clone()
    }

    /// Make every subsequent `archive_session` call fail.
    pub async fn fail_archival(&self, fail: bool) {
        *self.fail.lock().await = fail;
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn archive_session(
        &self,
        archived: &ArchivedSession,
    ) -> Result<(), LuminaError> {
        if *self.fail.lock().await {
            return Err(LuminaError::Storage {
                source: "simulated archival failure".into(),
            });
        }
        self.archived.lock().await.push(archived.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lumina_core::types::{Sender, SessionId};

    fn archived_fixture(id: &str) -> ArchivedSession {
        let now = Utc::now();
        ArchivedSession {
            session_id: SessionId(id.into()),
            messages: Vec::new(),
            assigned_agent: None,
            closed_by: Sender::Customer,
            opened_at: now,
            closed_at: now,
            duration_secs: 0,
            message_count: 0,
            rating: None,
        }
    }

    #[tokio::test]
    async fn captures_in_order() {
        let store = MemoryTranscriptStore::new();
        store.archive_session(&archived_fixture("s1")).await.unwrap();
        store.archive_session(&archived_fixture("s2")).await.unwrap();
        let archived = store.archived().await;
        assert_eq!(archived.len(), 2);
        assert_eq!(archived[0].session_id, SessionId("s1".into()));
    }

    #[tokio::test]
    async fn failure_mode_returns_storage_error() {
        let store = MemoryTranscriptStore::new();
        store.fail_archival(true).await;
        let err = store
            .archive_session(&archived_fixture("s1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LuminaError::Storage { .. }));
        assert!(store.archived().await.is_empty());
    }
}
