//! Storage traits: the persistence seams of the engine.
//!
//! `Database` covers conversation logs and their metadata; `BlacklistStore`
//! is the only durable state of abuse control. One backend implements both,
//! but the abuse guard only ever sees the second trait.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::conversation::model::{ConversationMetadata, ConversationRecord, Message, SenderId};
use crate::error::DatabaseError;

/// Backend-agnostic storage for conversations and their metadata.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Conversations ───────────────────────────────────────────────

    /// Append a message to the sender's log, creating the record if absent.
    ///
    /// The record keeps its archived flag; `address` is only used when the
    /// record is created.
    async fn append_message(
        &self,
        sender: &SenderId,
        address: &str,
        message: &Message,
    ) -> Result<(), DatabaseError>;

    /// Load one conversation regardless of its archived flag.
    async fn get_conversation(
        &self,
        sender: &SenderId,
    ) -> Result<Option<ConversationRecord>, DatabaseError>;

    /// Load all conversations, optionally including archived ones.
    async fn list_conversations(
        &self,
        include_archived: bool,
    ) -> Result<Vec<ConversationRecord>, DatabaseError>;

    /// Move a conversation between partitions.
    ///
    /// Returns `false` when no record exists in the source partition
    /// (the opposite of `archived`).
    async fn set_archived(&self, sender: &SenderId, archived: bool) -> Result<bool, DatabaseError>;

    /// Delete a conversation log. Returns `false` if there was none.
    async fn delete_conversation(&self, sender: &SenderId) -> Result<bool, DatabaseError>;

    // ── Metadata ────────────────────────────────────────────────────

    /// Get tags and status for a sender.
    async fn get_metadata(
        &self,
        sender: &SenderId,
    ) -> Result<Option<ConversationMetadata>, DatabaseError>;

    /// Insert or replace tags and status for a sender.
    async fn put_metadata(
        &self,
        sender: &SenderId,
        metadata: &ConversationMetadata,
    ) -> Result<(), DatabaseError>;

    /// All metadata rows keyed by sender.
    async fn list_metadata(&self) -> Result<HashMap<SenderId, ConversationMetadata>, DatabaseError>;
}

/// Durable set of blacklisted senders.
#[async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Load every blacklisted sender.
    async fn load_blacklist(&self) -> Result<HashSet<SenderId>, DatabaseError>;

    /// Persist a sender. Adding an existing sender is a no-op.
    async fn add_to_blacklist(&self, sender: &SenderId, reason: &str) -> Result<(), DatabaseError>;
}
