// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI responder for deterministic testing.
//!
//! `MockResponder` implements `Responder` with pre-configured replies,
//! enabling tests to script exactly when the AI answers and when it hands
//! off to a human.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use lumina_core::error::LuminaError;
use lumina_core::traits::{Reply, Responder};
use lumina_core::types::SessionId;

/// A mock responder that returns pre-configured replies.
///
/// Replies are popped from a FIFO queue. When the queue is empty, a default
/// "mock reply" text is returned.
pub struct MockResponder {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    seen: Arc<Mutex<Vec<(SessionId, String)>>>,
}

impl MockResponder {
    /// Create a new mock responder with an empty reply queue.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock responder pre-loaded with the given replies.
    pub fn with_replies(replies: Vec<Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a reply to the end of the queue.
    pub async fn push_reply(&self, reply: Reply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Every `(session, message)` pair this responder was asked about.
    pub async fn seen(&self) -> Vec<(SessionId, String)> {
        self.seen.lock().await.clone()
    }
}

impl Default for MockResponder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Responder for MockResponder {
    async fn respond(
        &self,
        session_id: &SessionId,
        message: &str,
    ) -> Result<Reply, LuminaError> {
        self.seen
            .lock()
            .await
            .push((session_id.clone(), message.to_string()));
        Ok(self
            .replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Reply::Content("mock reply".to_string())))
    }
}
