// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The AI responder seam.
//!
//! Response generation is an external collaborator: the engine hands it a
//! customer message and gets back either reply text or an escalation signal.
//! [`KeywordResponder`] is the compiled-in stand-in used by `lumina serve`
//! when no real model backend is wired up.

use async_trait::async_trait;

use crate::error::LuminaError;
use crate::types::SessionId;

/// What the responder decided to do with a customer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Reply text to append as an `ai` transcript message.
    Content(String),
    /// The responder wants a human to take over.
    Escalate,
}

/// Generates AI replies for sessions in the `ai_active` state.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(
        &self,
        session_id: &SessionId,
        message: &str,
    ) -> Result<Reply, LuminaError>;
}

/// Canned responder: fixed reply text, with a configurable set of keywords
/// that trigger escalation instead.
pub struct KeywordResponder {
    reply: String,
    escalation_keywords: Vec<String>,
}

impl KeywordResponder {
    pub fn new(reply: impl Into<String>, escalation_keywords: Vec<String>) -> Self {
        Self {
            reply: reply.into(),
            escalation_keywords: escalation_keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }

    /// Default reply text with a custom escalation keyword set.
    pub fn with_keywords(escalation_keywords: Vec<String>) -> Self {
        Self::new(
            "Thanks for reaching out! I'm looking into that for you.",
            escalation_keywords,
        )
    }
}

impl Default for KeywordResponder {
    fn default() -> Self {
        Self::with_keywords(vec!["human".into(), "agent".into(), "person".into()])
    }
}

#[async_trait]
impl Responder for KeywordResponder {
    async fn respond(
        &self,
        _session_id: &SessionId,
        message: &str,
    ) -> Result<Reply, LuminaError> {
        let lower = message.to_lowercase();
        if self.escalation_keywords.iter().any(|k| lower.contains(k)) {
            return Ok(Reply::Escalate);
        }
        Ok(Reply::Content(self.reply.clone()))
    }
}
