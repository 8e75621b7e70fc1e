//! libSQL backend: async `Database` and `BlacklistStore` implementation.
//!
//! Each conversation is one row holding its message log as a JSON document,
//! so archiving is a flag flip and an append is a single row rewrite.
//! Supports local file and in-memory databases.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::conversation::model::{
    ConversationMetadata, ConversationRecord, ConversationStatus, Message, SenderId,
};
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{BlacklistStore, Database};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    /// Serializes read-modify-write of conversation documents.
    append_lock: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            append_lock: Mutex::new(()),
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            append_lock: Mutex::new(()),
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Read the raw message document of one sender, if a row exists.
    async fn load_document(&self, sender: &SenderId) -> Result<Option<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT messages FROM conversations WHERE sender = ?1",
                params![sender.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_document: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get::<String>(0).unwrap_or_default())),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("load_document: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse a stored message document. Corrupt documents read as empty history.
fn parse_messages(sender: &SenderId, raw: &str) -> Vec<Message> {
    match serde_json::from_str(raw) {
        Ok(messages) => messages,
        Err(e) => {
            warn!(
                sender = %sender,
                error = %e,
                "Corrupt conversation record, treating as empty history"
            );
            Vec::new()
        }
    }
}

/// Parse a stored tag set. Corrupt tag sets read as empty.
fn parse_tags(sender: &SenderId, raw: &str) -> BTreeSet<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(sender = %sender, error = %e, "Corrupt tag set, treating as empty");
        BTreeSet::new()
    })
}

/// Parse a stored status. Unknown values fall back to `new`.
fn parse_status(sender: &SenderId, raw: &str) -> ConversationStatus {
    raw.parse().unwrap_or_else(|_| {
        warn!(sender = %sender, status = raw, "Unknown stored status, treating as new");
        ConversationStatus::New
    })
}

/// Map a libsql Row to a ConversationRecord.
///
/// Column order matches CONVERSATION_COLUMNS:
/// 0:sender, 1:address, 2:archived, 3:messages
fn row_to_conversation(row: &libsql::Row) -> Result<ConversationRecord, libsql::Error> {
    let sender_str: String = row.get(0)?;
    let address: String = row.get(1)?;
    let archived: i64 = row.get(2)?;
    let raw_messages: String = row.get::<String>(3).unwrap_or_default();

    let sender = SenderId::new(&sender_str);
    let messages = parse_messages(&sender, &raw_messages);
    Ok(ConversationRecord {
        sender,
        address,
        archived: archived != 0,
        messages,
    })
}

/// Map a libsql Row to `(sender, metadata)`.
///
/// Column order: 0:sender, 1:tags, 2:status
fn row_to_metadata(row: &libsql::Row) -> Result<(SenderId, ConversationMetadata), libsql::Error> {
    let sender = SenderId::new(&row.get::<String>(0)?);
    let tags_str: String = row.get(1)?;
    let status_str: String = row.get(2)?;
    let metadata = ConversationMetadata {
        tags: parse_tags(&sender, &tags_str),
        status: parse_status(&sender, &status_str),
    };
    Ok((sender, metadata))
}

fn serialize<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

// ── Trait implementation ────────────────────────────────────────────

const CONVERSATION_COLUMNS: &str = "sender, address, archived, messages";

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Conversations ───────────────────────────────────────────────

    async fn append_message(
        &self,
        sender: &SenderId,
        address: &str,
        message: &Message,
    ) -> Result<(), DatabaseError> {
        let _guard = self.append_lock.lock().await;

        // An unreadable document is moved to `corrupt_messages` before the
        // log restarts, so the original text survives the rewrite.
        let (mut messages, quarantined) = match self.load_document(sender).await? {
            None => (Vec::new(), None),
            Some(raw) => match serde_json::from_str::<Vec<Message>>(&raw) {
                Ok(messages) => (messages, None),
                Err(e) => {
                    warn!(
                        sender = %sender,
                        error = %e,
                        "Corrupt conversation record, moving it to corrupt_messages"
                    );
                    (Vec::new(), Some(raw))
                }
            },
        };
        messages.push(message.clone());
        let document = serialize(&messages)?;
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO conversations (sender, address, archived, messages, created_at, updated_at)
                 VALUES (?1, ?2, 0, ?3, ?4, ?4)
                 ON CONFLICT(sender) DO UPDATE SET
                     messages = excluded.messages,
                     updated_at = excluded.updated_at,
                     corrupt_messages = CASE
                         WHEN ?5 IS NULL THEN corrupt_messages
                         WHEN corrupt_messages IS NULL THEN ?5
                         ELSE corrupt_messages || char(10) || ?5
                     END",
                params![sender.as_str(), address, document, now, quarantined],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append_message: {e}")))?;

        debug!(sender = %sender, count = messages.len(), "Message appended to conversation");
        Ok(())
    }

    async fn get_conversation(
        &self,
        sender: &SenderId,
    ) -> Result<Option<ConversationRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE sender = ?1"),
                params![sender.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_conversation: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let record = row_to_conversation(&row).map_err(|e| {
                    DatabaseError::Query(format!("get_conversation row parse: {e}"))
                })?;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_conversation: {e}"))),
        }
    }

    async fn list_conversations(
        &self,
        include_archived: bool,
    ) -> Result<Vec<ConversationRecord>, DatabaseError> {
        let sql = if include_archived {
            format!("SELECT {CONVERSATION_COLUMNS} FROM conversations ORDER BY sender")
        } else {
            format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE archived = 0 ORDER BY sender"
            )
        };
        let mut rows = self
            .conn()
            .query(&sql, ())
            .await
            .map_err(|e| DatabaseError::Query(format!("list_conversations: {e}")))?;

        let mut records = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_conversation(&row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Skipping conversation row: {e}");
                }
            }
        }
        Ok(records)
    }

    async fn set_archived(&self, sender: &SenderId, archived: bool) -> Result<bool, DatabaseError> {
        let target = i64::from(archived);
        let count = self
            .conn()
            .execute(
                "UPDATE conversations SET archived = ?1, updated_at = ?2 WHERE sender = ?3 AND archived != ?1",
                params![target, Utc::now().to_rfc3339(), sender.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_archived: {e}")))?;

        debug!(sender = %sender, archived, moved = count > 0, "Archive flag update");
        Ok(count > 0)
    }

    async fn delete_conversation(&self, sender: &SenderId) -> Result<bool, DatabaseError> {
        let _guard = self.append_lock.lock().await;
        let count = self
            .conn()
            .execute(
                "DELETE FROM conversations WHERE sender = ?1",
                params![sender.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_conversation: {e}")))?;

        if count > 0 {
            info!(sender = %sender, "Conversation deleted");
        }
        Ok(count > 0)
    }

    // ── Metadata ────────────────────────────────────────────────────

    async fn get_metadata(
        &self,
        sender: &SenderId,
    ) -> Result<Option<ConversationMetadata>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT sender, tags, status FROM conversation_metadata WHERE sender = ?1",
                params![sender.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_metadata: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let (_, metadata) = row_to_metadata(&row)
                    .map_err(|e| DatabaseError::Query(format!("get_metadata row parse: {e}")))?;
                Ok(Some(metadata))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_metadata: {e}"))),
        }
    }

    async fn put_metadata(
        &self,
        sender: &SenderId,
        metadata: &ConversationMetadata,
    ) -> Result<(), DatabaseError> {
        let tags = serialize(&metadata.tags)?;
        self.conn()
            .execute(
                "INSERT INTO conversation_metadata (sender, tags, status, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(sender) DO UPDATE SET tags = excluded.tags, status = excluded.status, updated_at = excluded.updated_at",
                params![
                    sender.as_str(),
                    tags,
                    metadata.status.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("put_metadata: {e}")))?;

        debug!(sender = %sender, status = %metadata.status, "Conversation metadata saved");
        Ok(())
    }

    async fn list_metadata(&self) -> Result<HashMap<SenderId, ConversationMetadata>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT sender, tags, status FROM conversation_metadata", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("list_metadata: {e}")))?;

        let mut out = HashMap::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_metadata(&row) {
                Ok((sender, metadata)) => {
                    out.insert(sender, metadata);
                }
                Err(e) => {
                    warn!("Skipping metadata row: {e}");
                }
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl BlacklistStore for LibSqlBackend {
    async fn load_blacklist(&self) -> Result<HashSet<SenderId>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT sender FROM blacklist", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("load_blacklist: {e}")))?;

        let mut senders = HashSet::new();
        while let Ok(Some(row)) = rows.next().await {
            if let Ok(sender) = row.get::<String>(0) {
                senders.insert(SenderId::new(&sender));
            }
        }
        Ok(senders)
    }

    async fn add_to_blacklist(&self, sender: &SenderId, reason: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO blacklist (sender, reason, created_at) VALUES (?1, ?2, ?3)",
                params![sender.as_str(), reason, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("add_to_blacklist: {e}")))?;
        Ok(())
    }
}
