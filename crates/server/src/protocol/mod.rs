//! Wire events exchanged with connected clients
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DeliveryStatus, Group, GroupId, Identity, Message, MessageId};

/// Events pushed to client connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Message(Message),
    /// Status of messages sent by the receiving client moved forward.
    /// `peer` is the identity whose action caused the change.
    StatusChanged {
        message_ids: Vec<MessageId>,
        status: DeliveryStatus,
        peer: Identity,
    },
    MessageDeleted {
        message_id: MessageId,
    },
    Typing {
        sender: Identity,
        group_id: Option<GroupId>,
        is_typing: bool,
    },
    Reaction {
        message_id: MessageId,
        identity: Identity,
        symbol: String,
    },
    PresenceChanged {
        identity: Identity,
        is_online: bool,
        last_seen: Option<DateTime<Utc>>,
    },
    GroupCreated(Group),
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Message(_) => "message",
            ServerEvent::StatusChanged { .. } => "status-changed",
            ServerEvent::MessageDeleted { .. } => "message-deleted",
            ServerEvent::Typing { .. } => "typing",
            ServerEvent::Reaction { .. } => "reaction",
            ServerEvent::PresenceChanged { .. } => "presence-changed",
            ServerEvent::GroupCreated(_) => "group-created",
            ServerEvent::Error { .. } => "error",
        }
    }
}

/// Events received from client connections.
///
/// Identity fields are plain strings so that malformed values can be
/// reported back instead of failing the whole frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Join {
        identity: String,
    },
    Typing {
        #[serde(default)]
        receiver: Option<String>,
        #[serde(default)]
        group_id: Option<GroupId>,
        is_typing: bool,
    },
    Reaction {
        message_id: MessageId,
        symbol: String,
    },
}
