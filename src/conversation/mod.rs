//! Per-sender conversation history and its lifecycle metadata.

pub mod model;
pub mod store;

pub use model::{
    ConversationExport, ConversationMetadata, ConversationStatus, ConversationView, Direction,
    Message, MessageKind, MessageTimestamp, SenderId,
};
pub use store::ConversationStore;
