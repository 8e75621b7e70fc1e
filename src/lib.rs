//! Travel Concierge: conversation and abuse-control engine for a chat auto-responder.

pub mod abuse;
pub mod channels;
pub mod collaborators;
pub mod config;
pub mod conversation;
pub mod error;
pub mod pipeline;
pub mod store;
