//! ConversationStore: message logs, tags, status and archival for each sender.
//!
//! Wraps a `Database` and owns the rules that sit above raw persistence:
//! sender normalization, status initialization on first contact, listing
//! order, and serialized metadata updates.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::conversation::model::{
    ConversationExport, ConversationMetadata, ConversationStatus, ConversationView, Direction,
    Message, SenderId,
};
use crate::error::{ConversationError, DatabaseError};
use crate::store::Database;

/// Conversation log and metadata service.
pub struct ConversationStore {
    db: Arc<dyn Database>,
    /// Held across every metadata read-modify-write.
    metadata_lock: Mutex<()>,
}

impl ConversationStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            metadata_lock: Mutex::new(()),
        }
    }

    /// Append a message for `address`, wherever its record currently lives.
    ///
    /// The first received message of a sender with no metadata initializes
    /// its status to `new`.
    pub async fn append(&self, address: &str, message: Message) -> Result<Message, DatabaseError> {
        let sender = SenderId::new(address);
        self.db.append_message(&sender, address, &message).await?;

        if message.direction == Direction::Received {
            let _guard = self.metadata_lock.lock().await;
            if self.db.get_metadata(&sender).await?.is_none() {
                self.db
                    .put_metadata(&sender, &ConversationMetadata::default())
                    .await?;
                info!(sender = %sender, "New conversation started");
            }
        }
        Ok(message)
    }

    /// One conversation with its metadata, archived or not.
    pub async fn get(&self, sender: &SenderId) -> Result<Option<ConversationView>, DatabaseError> {
        let Some(record) = self.db.get_conversation(sender).await? else {
            return Ok(None);
        };
        let metadata = self.db.get_metadata(sender).await?.unwrap_or_default();
        Ok(Some(ConversationView::from_parts(record, metadata)))
    }

    /// All conversations, newest activity first.
    pub async fn list(&self, include_archived: bool) -> Result<Vec<ConversationView>, DatabaseError> {
        let records = self.db.list_conversations(include_archived).await?;
        let mut metadata = self.db.list_metadata().await?;

        let mut views: Vec<ConversationView> = records
            .into_iter()
            .map(|record| {
                let meta = metadata.remove(&record.sender).unwrap_or_default();
                ConversationView::from_parts(record, meta)
            })
            .collect();

        // Stable sort: equal keys keep the backend's sender order
        views.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
        Ok(views)
    }

    // ── Tags ────────────────────────────────────────────────────────

    pub async fn tags(&self, sender: &SenderId) -> Result<BTreeSet<String>, DatabaseError> {
        Ok(self.metadata(sender).await?.tags)
    }

    pub async fn set_tags(
        &self,
        sender: &SenderId,
        tags: BTreeSet<String>,
    ) -> Result<(), DatabaseError> {
        self.update_metadata(sender, |meta| meta.tags = tags).await
    }

    /// Add a tag. Returns `false` if the sender already had it.
    pub async fn add_tag(&self, sender: &SenderId, tag: &str) -> Result<bool, DatabaseError> {
        let mut added = false;
        self.update_metadata(sender, |meta| added = meta.tags.insert(tag.to_string()))
            .await?;
        Ok(added)
    }

    /// Remove a tag. Returns `false` if the sender did not have it.
    pub async fn remove_tag(&self, sender: &SenderId, tag: &str) -> Result<bool, DatabaseError> {
        let mut removed = false;
        self.update_metadata(sender, |meta| removed = meta.tags.remove(tag))
            .await?;
        Ok(removed)
    }

    // ── Status ──────────────────────────────────────────────────────

    pub async fn status(&self, sender: &SenderId) -> Result<ConversationStatus, DatabaseError> {
        Ok(self.metadata(sender).await?.status)
    }

    /// Set the status from its wire string. Invalid values write nothing.
    pub async fn set_status(
        &self,
        sender: &SenderId,
        status: &str,
    ) -> Result<ConversationStatus, ConversationError> {
        let status: ConversationStatus = status.parse()?;
        self.update_metadata(sender, |meta| meta.status = status)
            .await?;
        Ok(status)
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Move an active conversation to the archive.
    pub async fn archive(&self, sender: &SenderId) -> Result<bool, DatabaseError> {
        let moved = self.db.set_archived(sender, true).await?;
        if moved {
            info!(sender = %sender, "Conversation archived");
        }
        Ok(moved)
    }

    /// Move an archived conversation back to the active listing.
    pub async fn unarchive(&self, sender: &SenderId) -> Result<bool, DatabaseError> {
        let moved = self.db.set_archived(sender, false).await?;
        if moved {
            info!(sender = %sender, "Conversation unarchived");
        }
        Ok(moved)
    }

    /// Serialize the full record, from whichever partition holds it.
    pub async fn export(&self, sender: &SenderId) -> Result<Option<ConversationExport>, DatabaseError> {
        Ok(self.get(sender).await?.map(|conversation| ConversationExport {
            conversation,
            exported_at: Utc::now(),
        }))
    }

    /// Delete the message log. Tags and status are kept.
    pub async fn delete(&self, sender: &SenderId) -> Result<bool, DatabaseError> {
        self.db.delete_conversation(sender).await
    }

    // ── Helpers ─────────────────────────────────────────────────────

    async fn metadata(&self, sender: &SenderId) -> Result<ConversationMetadata, DatabaseError> {
        Ok(self.db.get_metadata(sender).await?.unwrap_or_default())
    }

    async fn update_metadata<F>(&self, sender: &SenderId, update: F) -> Result<(), DatabaseError>
    where
        F: FnOnce(&mut ConversationMetadata),
    {
        let _guard = self.metadata_lock.lock().await;
        let mut meta = self.metadata(sender).await?;
        update(&mut meta);
        self.db.put_metadata(sender, &meta).await?;
        debug!(sender = %sender, tags = meta.tags.len(), status = %meta.status, "Metadata updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::model::{MessageKind, MessageTimestamp};
    use crate::store::LibSqlBackend;

    async fn test_store() -> ConversationStore {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        ConversationStore::new(db)
    }

    fn received(content: &str) -> Message {
        Message::received(MessageKind::Text, content, "whatsapp")
    }

    #[tokio::test]
    async fn append_shows_as_last_message() {
        let store = test_store().await;
        store.append("+52 55 1111", received("hola")).await.unwrap();
        store.append("+52 55 1111", received("quiero un tour")).await.unwrap();

        let list = store.list(false).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].sender.as_str(), "52551111");
        assert_eq!(list[0].messages.last().unwrap().content, "quiero un tour");
    }

    #[tokio::test]
    async fn first_received_message_initializes_status_new() {
        let store = test_store().await;
        let sender = SenderId::new("123");

        store.append("123", Message::sent("outbound first", "whatsapp")).await.unwrap();
        assert!(store.db.get_metadata(&sender).await.unwrap().is_none());

        store.append("123", received("hola")).await.unwrap();
        assert_eq!(store.status(&sender).await.unwrap(), ConversationStatus::New);

        // Later messages don't reset a status that has moved on
        store.set_status(&sender, "resolved").await.unwrap();
        store.append("123", received("otra vez")).await.unwrap();
        assert_eq!(store.status(&sender).await.unwrap(), ConversationStatus::Resolved);
    }

    #[tokio::test]
    async fn archive_round_trip_preserves_everything() {
        let store = test_store().await;
        let sender = SenderId::new("200");
        store.append("200", received("hola")).await.unwrap();
        store.append("200", Message::sent("¡Hola!", "whatsapp")).await.unwrap();
        store.add_tag(&sender, "VIP").await.unwrap();
        store.set_status(&sender, "in-progress").await.unwrap();

        let before = store.get(&sender).await.unwrap().unwrap();

        assert!(store.archive(&sender).await.unwrap());
        assert!(!store.archive(&sender).await.unwrap());
        assert!(store.list(false).await.unwrap().is_empty());
        let archived = store.list(true).await.unwrap();
        assert_eq!(archived.len(), 1);
        assert!(archived[0].archived);

        assert!(store.unarchive(&sender).await.unwrap());
        assert!(!store.unarchive(&sender).await.unwrap());
        let after = store.get(&sender).await.unwrap().unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn archive_unknown_sender_returns_false() {
        let store = test_store().await;
        let sender = SenderId::new("nobody");
        assert!(!store.archive(&sender).await.unwrap());
        assert!(!store.unarchive(&sender).await.unwrap());
    }

    #[tokio::test]
    async fn tag_round_trip() {
        let store = test_store().await;
        let sender = SenderId::new("300");

        assert!(store.add_tag(&sender, "VIP").await.unwrap());
        assert!(!store.add_tag(&sender, "VIP").await.unwrap());
        assert!(store.tags(&sender).await.unwrap().contains("VIP"));

        assert!(store.remove_tag(&sender, "VIP").await.unwrap());
        assert!(!store.tags(&sender).await.unwrap().contains("VIP"));
        assert!(!store.remove_tag(&sender, "VIP").await.unwrap());
    }

    #[tokio::test]
    async fn set_tags_replaces_the_set() {
        let store = test_store().await;
        let sender = SenderId::new("301");
        store.add_tag(&sender, "old").await.unwrap();

        let tags: BTreeSet<String> = ["a".to_string(), "b".to_string()].into_iter().collect();
        store.set_tags(&sender, tags.clone()).await.unwrap();
        assert_eq!(store.tags(&sender).await.unwrap(), tags);
    }

    #[tokio::test]
    async fn invalid_status_leaves_prior_status() {
        let store = test_store().await;
        let sender = SenderId::new("400");
        store.set_status(&sender, "follow-up").await.unwrap();

        let err = store.set_status(&sender, "bogus").await.unwrap_err();
        assert!(matches!(err, ConversationError::InvalidStatus { .. }));
        assert_eq!(store.status(&sender).await.unwrap(), ConversationStatus::FollowUp);
    }

    #[tokio::test]
    async fn metadata_can_exist_without_messages() {
        let store = test_store().await;
        let sender = SenderId::new("500");
        store.add_tag(&sender, "lead").await.unwrap();

        assert!(store.get(&sender).await.unwrap().is_none());
        assert!(store.list(true).await.unwrap().is_empty());

        store.append("500", received("hola")).await.unwrap();
        let view = store.get(&sender).await.unwrap().unwrap();
        assert!(view.tags.contains("lead"));
        assert_eq!(view.status, ConversationStatus::New);
    }

    #[tokio::test]
    async fn list_sorts_by_last_message_mixing_formats() {
        let store = test_store().await;

        let at = |ts: MessageTimestamp| received("x").with_timestamp(ts);
        store
            .append("old", at(MessageTimestamp::Epoch(1_600_000_000)))
            .await
            .unwrap();
        store
            .append("newest", at(MessageTimestamp::Text("2030-01-01T00:00:00".into())))
            .await
            .unwrap();
        store
            .append("middle", at(MessageTimestamp::Text("1700000000".into())))
            .await
            .unwrap();
        store
            .append("broken", at(MessageTimestamp::Text("not a date".into())))
            .await
            .unwrap();

        let order: Vec<String> = store
            .list(false)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.sender.to_string())
            .collect();
        assert_eq!(order, vec!["newest", "middle", "old", "broken"]);
    }

    #[tokio::test]
    async fn export_includes_archived_records() {
        let store = test_store().await;
        let sender = SenderId::new("600");
        store.append("600", received("hola")).await.unwrap();
        store.add_tag(&sender, "VIP").await.unwrap();
        store.archive(&sender).await.unwrap();

        let export = store.export(&sender).await.unwrap().unwrap();
        assert!(export.conversation.archived);
        assert_eq!(export.conversation.messages.len(), 1);
        assert!(export.conversation.tags.contains("VIP"));

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["status"], "new");
        assert_eq!(json["archived"], true);
        assert!(json["exported_at"].is_string());

        assert!(store.export(&SenderId::new("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_keeps_metadata() {
        let store = test_store().await;
        let sender = SenderId::new("700");
        store.append("700", received("hola")).await.unwrap();
        store.add_tag(&sender, "VIP").await.unwrap();

        assert!(store.delete(&sender).await.unwrap());
        assert!(store.get(&sender).await.unwrap().is_none());
        assert!(store.tags(&sender).await.unwrap().contains("VIP"));
    }
}
