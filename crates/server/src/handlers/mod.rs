//! HTTP handlers
//!
//! Thin wrappers over the delivery hub and the directory. Real-time traffic
//! goes through `gateway::ws_handler` instead.

pub mod groups;
pub mod identity;
pub mod messages;

// Re-export AppState from config
pub use crate::config::AppState;

pub use groups::{create_group, list_groups};
pub use identity::{list_users, login, register};
pub use messages::{
    delete_message, get_conversation, get_group_messages, hide_message, search_messages,
    send_message,
};
