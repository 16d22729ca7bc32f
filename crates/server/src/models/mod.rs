use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Error, Result};

pub type MessageId = String;
pub type GroupId = String;

/// Anything phone-shaped: `+` followed by up to 15 digits.
static IDENTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+\d{1,15}$").unwrap());

/// Registrable phone numbers: `+` followed by 10 to 15 digits.
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+\d{10,15}$").unwrap());

/// A participant, addressed by phone number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if !IDENTITY_RE.is_match(trimmed) {
            return Err(Error::Validation(format!("malformed identity: {:?}", value)));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Strict form accepted at registration and login.
    pub fn parse_phone(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if !PHONE_RE.is_match(trimmed) {
            return Err(Error::Validation("Invalid phone number format".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits only, safe for file names.
    pub fn digits(&self) -> &str {
        self.0.trim_start_matches('+')
    }
}

impl TryFrom<String> for Identity {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Identity::new(value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registered participant with presence attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub identity: Identity,
    pub display_name: String,
    #[serde(default)]
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub members: BTreeSet<Identity>,
    pub created_by: Identity,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn is_member(&self, identity: &Identity) -> bool {
        self.members.contains(identity)
    }
}

/// Delivery lifecycle. Ordering is the allowed direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

impl Default for DeliveryStatus {
    fn default() -> Self {
        DeliveryStatus::Sent
    }
}

impl DeliveryStatus {
    /// The only status a message may move to from `self`.
    pub fn next(self) -> Option<Self> {
        match self {
            DeliveryStatus::Sent => Some(DeliveryStatus::Delivered),
            DeliveryStatus::Delivered => Some(DeliveryStatus::Read),
            DeliveryStatus::Read => None,
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Read => "read",
        };
        f.write_str(name)
    }
}

/// Where a message goes. Fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Direct { receiver: Identity },
    Group { group_id: GroupId },
}

impl Target {
    /// Exactly one of `receiver` / `group_id` must be present.
    pub fn from_addressing(receiver: Option<Identity>, group_id: Option<GroupId>) -> Result<Self> {
        let group_id = group_id.filter(|g| !g.trim().is_empty());
        match (receiver, group_id) {
            (Some(receiver), None) => Ok(Target::Direct { receiver }),
            (None, Some(group_id)) => Ok(Target::Group { group_id }),
            (Some(_), Some(_)) => Err(Error::Validation(
                "message addresses both a receiver and a group".to_string(),
            )),
            (None, None) => Err(Error::Validation(
                "message needs a receiver or a group".to_string(),
            )),
        }
    }

    pub fn group_id(&self) -> Option<&str> {
        match self {
            Target::Group { group_id } => Some(group_id),
            Target::Direct { .. } => None,
        }
    }

    pub fn receiver(&self) -> Option<&Identity> {
        match self {
            Target::Direct { receiver } => Some(receiver),
            Target::Group { .. } => None,
        }
    }
}

/// Largest attachment a message may reference (10 MiB).
pub const MAX_ATTACHMENT_SIZE: u64 = 10 * 1024 * 1024;

/// Content types an attachment may declare: JPEG, PNG, PDF, DOC, DOCX.
pub const ALLOWED_ATTACHMENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Reference to an attachment held by the file collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub content_type: String,
    pub size: u64,
}

impl Attachment {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Validation("attachment url is required".to_string()));
        }
        if !ALLOWED_ATTACHMENT_TYPES.contains(&self.content_type.as_str()) {
            return Err(Error::Validation(
                "Invalid file type. Allowed: JPEG, PNG, PDF, DOC, DOCX".to_string(),
            ));
        }
        if self.size > MAX_ATTACHMENT_SIZE {
            return Err(Error::Validation(format!(
                "attachment exceeds {} bytes",
                MAX_ATTACHMENT_SIZE
            )));
        }
        Ok(())
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Identity,
    #[serde(flatten)]
    pub target: Target,
    pub body: Option<String>,
    pub attachment: Option<Attachment>,
    pub status: DeliveryStatus,
    /// One reaction per identity, latest write wins
    #[serde(default)]
    pub reactions: BTreeMap<Identity, String>,
    /// Identities that deleted the message for themselves only
    #[serde(default)]
    pub hidden_for: BTreeSet<Identity>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_group(&self) -> bool {
        matches!(self.target, Target::Group { .. })
    }

    pub fn is_hidden_for(&self, identity: &Identity) -> bool {
        self.hidden_for.contains(identity)
    }

    /// Sender or direct receiver. Group membership does not count.
    pub fn involves(&self, identity: &Identity) -> bool {
        &self.sender == identity || self.target.receiver() == Some(identity)
    }

    pub fn matches_text(&self, needle_lowercase: &str) -> bool {
        self.body
            .as_deref()
            .map(|body| body.to_lowercase().contains(needle_lowercase))
            .unwrap_or(false)
    }
}

/// Unvalidated send request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMessage {
    pub sender: Option<Identity>,
    pub receiver: Option<Identity>,
    pub group_id: Option<GroupId>,
    pub body: Option<String>,
    pub attachment: Option<Attachment>,
}

impl NewMessage {
    pub fn direct(sender: &Identity, receiver: &Identity, body: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.clone()),
            receiver: Some(receiver.clone()),
            body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn group(sender: &Identity, group_id: impl Into<GroupId>, body: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.clone()),
            group_id: Some(group_id.into()),
            body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Checks addressing and content, returning the sender and target.
    pub fn validate(&self) -> Result<(Identity, Target)> {
        let sender = self
            .sender
            .clone()
            .ok_or_else(|| Error::Validation("message needs a sender".to_string()))?;
        let target = Target::from_addressing(self.receiver.clone(), self.group_id.clone())?;
        if let Some(attachment) = &self.attachment {
            attachment.validate()?;
        }
        if self.body().is_none() && self.attachment.is_none() {
            return Err(Error::Validation(
                "message needs a body or an attachment".to_string(),
            ));
        }
        Ok((sender, target))
    }

    /// Body with whitespace-only text treated as absent
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.trim().is_empty())
    }
}
