//! Inbound message pipeline.
//!
//! Every inbound event flows through:
//! 1. `InboundProcessor::handle_inbound()`: record, then abuse screening
//! 2. `IntentRules::classify()`: ordered keyword rules
//! 3. `IntentDispatcher::respond()`: reply text, consulting collaborators

pub mod dispatcher;
pub mod extract;
pub mod processor;
pub mod replies;
pub mod rules;
pub mod types;

pub use dispatcher::IntentDispatcher;
pub use processor::InboundProcessor;
pub use types::{InboundEvent, Reply, SuppressReason};
