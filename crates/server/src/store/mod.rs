//! Message storage module
//!
//! Append-only conversation logs persisted as JSON files, with mutable
//! status, reaction and hide markers on each message.

pub mod json_store;

pub use json_store::{ConversationKey, ConversationPage, MessageStore, Transition};
