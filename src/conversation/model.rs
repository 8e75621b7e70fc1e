//! Conversation data model: sender keys, messages, metadata and views.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConversationError;

// ── Sender ──────────────────────────────────────────────────────────

/// Canonical sender key.
///
/// Every non-alphanumeric character is stripped, so `+52 (55) 1234-5678`
/// and `525512345678` address the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(String);

impl SenderId {
    pub fn new(raw: &str) -> Self {
        Self(raw.chars().filter(|c| c.is_alphanumeric()).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SenderId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

// ── Message ─────────────────────────────────────────────────────────

/// Whether a message came from the sender or from us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Received,
    Sent,
}

/// Payload type of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Document,
    #[serde(other)]
    Unknown,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a channel-supplied type name; anything unrecognized is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Self::Text,
            "image" => Self::Image,
            "audio" => Self::Audio,
            "document" => Self::Document,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message timestamp as it arrived from the channel.
///
/// Channels deliver either epoch seconds (as a number or a digit string)
/// or ISO-8601 text. The raw value is stored unchanged; `instant()`
/// normalizes it for ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageTimestamp {
    Epoch(i64),
    Text(String),
}

impl MessageTimestamp {
    pub fn now() -> Self {
        Self::Text(Utc::now().to_rfc3339())
    }

    /// Normalize to a UTC instant, or `None` if the value is unparseable.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Epoch(secs) => DateTime::from_timestamp(*secs, 0),
            Self::Text(s) => parse_text_timestamp(s),
        }
    }

    /// Ordering key; unparseable timestamps sort before everything else.
    pub fn sort_key(&self) -> DateTime<Utc> {
        self.instant().unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

fn parse_text_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(|secs| DateTime::from_timestamp(secs, 0));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Naive ISO-8601 (no offset) is taken as UTC
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ndt.and_utc());
        }
    }
    None
}

/// One entry of a conversation log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub direction: Direction,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: MessageTimestamp,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub channel: String,
}

impl Message {
    /// A message received from the sender, timestamped now.
    pub fn received(kind: MessageKind, content: impl Into<String>, channel: &str) -> Self {
        Self {
            direction: Direction::Received,
            kind,
            content: content.into(),
            timestamp: MessageTimestamp::now(),
            external_id: None,
            channel: channel.to_string(),
        }
    }

    /// A text reply sent by us, timestamped now.
    pub fn sent(content: impl Into<String>, channel: &str) -> Self {
        Self {
            direction: Direction::Sent,
            kind: MessageKind::Text,
            content: content.into(),
            timestamp: MessageTimestamp::now(),
            external_id: None,
            channel: channel.to_string(),
        }
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: MessageTimestamp) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// ── Metadata ────────────────────────────────────────────────────────

/// Operator-facing lifecycle status of a conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationStatus {
    #[default]
    New,
    InProgress,
    Resolved,
    FollowUp,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in-progress",
            Self::Resolved => "resolved",
            Self::FollowUp => "follow-up",
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationStatus {
    type Err = ConversationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "in-progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "follow-up" => Ok(Self::FollowUp),
            other => Err(ConversationError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// Tags and status for one sender. Lives independently of the message log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub tags: BTreeSet<String>,
    pub status: ConversationStatus,
}

// ── Views ───────────────────────────────────────────────────────────

/// A persisted conversation as loaded from storage.
#[derive(Debug, Clone)]
pub struct ConversationRecord {
    pub sender: SenderId,
    /// Address as the channel first delivered it, before normalization.
    pub address: String,
    pub archived: bool,
    pub messages: Vec<Message>,
}

/// A conversation joined with its metadata, as returned by listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationView {
    pub sender: SenderId,
    pub address: String,
    pub messages: Vec<Message>,
    pub tags: BTreeSet<String>,
    pub status: ConversationStatus,
    pub archived: bool,
}

impl ConversationView {
    pub fn from_parts(record: ConversationRecord, metadata: ConversationMetadata) -> Self {
        Self {
            sender: record.sender,
            address: record.address,
            messages: record.messages,
            tags: metadata.tags,
            status: metadata.status,
            archived: record.archived,
        }
    }

    /// Ordering key of the newest message; empty logs sort last.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.messages
            .last()
            .map(|m| m.timestamp.sort_key())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Full serialized record of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationExport {
    #[serde(flatten)]
    pub conversation: ConversationView,
    pub exported_at: DateTime<Utc>,
}
