//! Version-tracked database migrations for the libSQL backend.
//!
//! `MIGRATIONS` is the ordered schema history. The `_migrations` ledger
//! records which versions a database already has.

use libsql::Connection;

use crate::error::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Append-only. Never edit a version that has shipped.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "conversations",
        sql: r#"
            CREATE TABLE IF NOT EXISTS conversations (
                sender TEXT PRIMARY KEY,
                address TEXT NOT NULL,
                archived INTEGER NOT NULL DEFAULT 0,
                messages TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_conversations_archived ON conversations(archived);

            CREATE TABLE IF NOT EXISTS conversation_metadata (
                sender TEXT PRIMARY KEY,
                tags TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL DEFAULT 'new',
                updated_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        name: "blacklist",
        sql: r#"
            CREATE TABLE IF NOT EXISTS blacklist (
                sender TEXT PRIMARY KEY,
                reason TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 3,
        name: "corrupt_messages",
        sql: "ALTER TABLE conversations ADD COLUMN corrupt_messages TEXT;",
    },
];

const LEDGER: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

/// Bring the schema up to the newest version.
///
/// Each pending step runs in its own transaction together with its ledger
/// row, so a failed step leaves the schema at the previous version.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(LEDGER, ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("_migrations ledger: {e}")))?;

    let applied = applied_version(conn).await?;
    let pending: Vec<_> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();
    if pending.is_empty() {
        tracing::debug!(version = applied, "Schema up to date");
        return Ok(());
    }

    for step in pending {
        tracing::info!(version = step.version, name = step.name, "Applying migration");
        apply(conn, step).await.map_err(|e| {
            DatabaseError::Migration(format!("V{} {}: {e}", step.version, step.name))
        })?;
    }
    Ok(())
}

async fn apply(conn: &Connection, step: &Migration) -> Result<(), libsql::Error> {
    let tx = conn.transaction().await?;
    tx.execute_batch(step.sql).await?;
    tx.execute(
        "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![step.version, step.name],
    )
    .await?;
    tx.commit().await
}

/// Highest version recorded in the ledger, 0 for a fresh database.
async fn applied_version(conn: &Connection) -> Result<i64, DatabaseError> {
    max_version(conn)
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading schema version: {e}")))
}

async fn max_version(conn: &Connection) -> Result<i64, libsql::Error> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await?;
    match rows.next().await? {
        Some(row) => row.get::<i64>(0),
        None => Ok(0),
    }
}
