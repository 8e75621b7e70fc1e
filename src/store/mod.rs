//! Persistence layer: libSQL-backed storage for conversations, metadata and the blacklist.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{BlacklistStore, Database};
