//! Shared types for the inbound pipeline.

use serde::{Deserialize, Serialize};

use crate::conversation::model::{Message, MessageKind, MessageTimestamp};

// ── Inbound event ───────────────────────────────────────────────────

/// One inbound chat event, already parsed from the channel's format.
///
/// Channel adapters convert their native payload into this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Raw sender address (phone number, handle). Normalized on ingest.
    pub sender: String,
    pub kind: MessageKind,
    /// Text body, or the media id for non-text kinds.
    pub content: String,
    /// Channel-native message id.
    pub external_id: Option<String>,
    /// Channel-supplied timestamp; ingest time when absent.
    pub timestamp: Option<MessageTimestamp>,
    /// Source channel: "whatsapp", "cli", etc.
    pub channel: String,
}

impl InboundEvent {
    /// A text event with no external id or timestamp.
    pub fn text(sender: &str, content: &str, channel: &str) -> Self {
        Self {
            sender: sender.to_string(),
            kind: MessageKind::Text,
            content: content.to_string(),
            external_id: None,
            timestamp: None,
            channel: channel.to_string(),
        }
    }

    /// The message to record in the sender's history.
    pub fn to_message(&self) -> Message {
        let mut message = Message::received(self.kind, self.content.clone(), &self.channel);
        if let Some(id) = &self.external_id {
            message = message.with_external_id(id.clone());
        }
        if let Some(ts) = &self.timestamp {
            message = message.with_timestamp(ts.clone());
        }
        message
    }
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Why no reply was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    Blacklisted,
    BotDetected,
    RateLimited,
}

/// Result of handling one inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Reply {
    /// Send this text back to the sender.
    Text(String),
    /// Send nothing.
    Suppressed(SuppressReason),
}

impl Reply {
    pub fn text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text),
            Reply::Suppressed(_) => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Reply::Suppressed(_))
    }
}
