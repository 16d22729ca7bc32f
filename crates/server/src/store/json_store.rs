//! JSON-based message storage
//!
//! One file per conversation, rewritten atomically (temp file + rename) on
//! every mutation. Each conversation sits behind its own lock, which is the
//! exclusive-access boundary for status, reaction and hide updates; disk I/O
//! for one conversation never blocks another.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::models::{DeliveryStatus, GroupId, Identity, Message, MessageId, NewMessage, Target};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_REACTION_LEN: usize = 32;

/// Identifies one conversation log
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ConversationKey {
    /// The pair is stored sorted so both directions share a log
    Direct { a: Identity, b: Identity },
    Group { group_id: GroupId },
}

impl ConversationKey {
    pub fn direct(x: &Identity, y: &Identity) -> Self {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        ConversationKey::Direct {
            a: a.clone(),
            b: b.clone(),
        }
    }

    pub fn for_message(sender: &Identity, target: &Target) -> Self {
        match target {
            Target::Direct { receiver } => Self::direct(sender, receiver),
            Target::Group { group_id } => ConversationKey::Group {
                group_id: group_id.clone(),
            },
        }
    }

    fn file_stem(&self) -> String {
        match self {
            ConversationKey::Direct { a, b } => format!("dm-{}-{}", a.digits(), b.digits()),
            ConversationKey::Group { group_id } => format!("group-{}", group_id),
        }
    }

    /// Whether messages in this log can involve `identity` as sender or receiver
    fn may_involve(&self, identity: &Identity) -> bool {
        match self {
            ConversationKey::Direct { a, b } => a == identity || b == identity,
            ConversationKey::Group { .. } => true,
        }
    }
}

/// Group ids end up in file names
fn check_group_id(group_id: &str) -> Result<()> {
    let valid = !group_id.is_empty()
        && group_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!("malformed group id: {:?}", group_id)))
    }
}

#[derive(Deserialize)]
struct ConversationFile {
    key: ConversationKey,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct ConversationFileRef<'a> {
    key: &'a ConversationKey,
    messages: &'a [Message],
}

/// A conversation log, ascending by creation time
pub struct ConversationData {
    pub key: ConversationKey,
    pub messages: Vec<Message>,
}

impl ConversationData {
    fn position(&self, message_id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }
}

/// Outcome of a status update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advanced { from: DeliveryStatus },
    Unchanged,
}

/// One page of direct history plus the read receipts it produced
#[derive(Debug, Clone, Default)]
pub struct ConversationPage {
    pub messages: Vec<Message>,
    /// Messages from the peer that this read moved to `read`
    pub marked_read: Vec<MessageId>,
}

/// Newest `limit` visible messages, oldest first
fn latest_page(messages: &[Message], viewer: Option<&Identity>, limit: usize) -> Vec<Message> {
    let visible: Vec<&Message> = messages
        .iter()
        .filter(|m| viewer.map(|v| !m.is_hidden_for(v)).unwrap_or(true))
        .collect();
    let start = visible.len().saturating_sub(limit);
    visible[start..].iter().map(|m| (*m).clone()).collect()
}

pub struct MessageStore {
    config: ServerConfig,
    /// In-memory cache of every conversation on disk
    conversations: RwLock<HashMap<ConversationKey, Arc<RwLock<ConversationData>>>>,
    /// message id -> owning conversation
    index: RwLock<HashMap<MessageId, ConversationKey>>,
}

impl MessageStore {
    /// Opens the store, loading every conversation under `config.storage_dir`
    pub async fn new(config: ServerConfig) -> Result<Self> {
        fs::create_dir_all(&config.storage_dir).await?;

        let store = Self {
            config,
            conversations: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
        };
        store.load_existing_conversations().await?;

        info!(
            "MessageStore initialized with {} conversations",
            store.conversations.read().await.len()
        );
        Ok(store)
    }

    fn conversation_path(&self, key: &ConversationKey) -> PathBuf {
        self.config
            .storage_dir
            .join(format!("{}.json", key.file_stem()))
    }

    async fn load_existing_conversations(&self) -> Result<()> {
        let mut entries = fs::read_dir(&self.config.storage_dir).await?;
        let mut conversations = self.conversations.write().await;
        let mut index = self.index.write().await;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match Self::load_conversation_from_disk(&path).await {
                Ok(file) => {
                    for message in &file.messages {
                        index.insert(message.id.clone(), file.key.clone());
                    }
                    conversations.insert(
                        file.key.clone(),
                        Arc::new(RwLock::new(ConversationData {
                            key: file.key,
                            messages: file.messages,
                        })),
                    );
                }
                Err(e) => {
                    warn!("Failed to load conversation from {:?}: {}", path, e);
                }
            }
        }

        info!(
            "Loaded {} conversations ({} messages) from disk",
            conversations.len(),
            index.len()
        );
        Ok(())
    }

    async fn load_conversation_from_disk(path: &Path) -> Result<ConversationFile> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save a conversation to disk atomically
    async fn save_conversation(&self, data: &ConversationData) -> Result<()> {
        let path = self.conversation_path(&data.key);
        let temp_path = path.with_extension("tmp");

        let json = serde_json::to_string_pretty(&ConversationFileRef {
            key: &data.key,
            messages: &data.messages,
        })?;

        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn get_or_create(&self, key: &ConversationKey) -> Arc<RwLock<ConversationData>> {
        if let Some(conversation) = self.conversations.read().await.get(key) {
            return conversation.clone();
        }
        self.conversations
            .write()
            .await
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(RwLock::new(ConversationData {
                    key: key.clone(),
                    messages: Vec::new(),
                }))
            })
            .clone()
    }

    async fn existing(&self, key: &ConversationKey) -> Option<Arc<RwLock<ConversationData>>> {
        self.conversations.read().await.get(key).cloned()
    }

    /// Locks the conversation holding `message_id` and returns the message's slot.
    async fn lock_message(
        &self,
        message_id: &str,
    ) -> Result<(OwnedRwLockWriteGuard<ConversationData>, usize)> {
        let not_found = || Error::NotFound(format!("message {}", message_id));

        let key = self
            .index
            .read()
            .await
            .get(message_id)
            .cloned()
            .ok_or_else(not_found)?;
        let conversation = self.existing(&key).await.ok_or_else(not_found)?;
        let guard = conversation.write_owned().await;
        // may have been removed while we waited for the lock
        let slot = guard.position(message_id).ok_or_else(not_found)?;
        Ok((guard, slot))
    }

    /// Validates and appends a new message with status `sent`.
    pub async fn append(&self, new: NewMessage) -> Result<Message> {
        let (sender, target) = new.validate()?;
        if let Target::Group { group_id } = &target {
            check_group_id(group_id)?;
        }

        let key = ConversationKey::for_message(&sender, &target);
        let conversation = self.get_or_create(&key).await;
        let mut data = conversation.write().await;

        // timestamp under the lock keeps the log ordered
        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender,
            target,
            body: new.body().map(str::to_string),
            attachment: new.attachment.clone(),
            status: DeliveryStatus::Sent,
            reactions: Default::default(),
            hidden_for: Default::default(),
            created_at: Utc::now(),
        };

        data.messages.push(message.clone());
        if let Err(e) = self.save_conversation(&data).await {
            data.messages.pop();
            return Err(e);
        }
        drop(data);

        self.index
            .write()
            .await
            .insert(message.id.clone(), key.clone());

        debug!("Appended message {} to {}", message.id, key.file_stem());
        Ok(message)
    }

    pub async fn get(&self, message_id: &str) -> Result<Message> {
        let (data, slot) = self.lock_message(message_id).await?;
        Ok(data.messages[slot].clone())
    }

    /// Moves a message's status one step forward and returns it as stored.
    ///
    /// Same-status calls are `Unchanged`. Regressions and skipped steps fail
    /// with `InvalidTransition`. Group messages stay at `sent`.
    pub async fn advance_status(
        &self,
        message_id: &str,
        to: DeliveryStatus,
    ) -> Result<(Transition, Message)> {
        let (mut data, slot) = self.lock_message(message_id).await?;
        let from = data.messages[slot].status;

        if to == from {
            return Ok((Transition::Unchanged, data.messages[slot].clone()));
        }
        if from.next() != Some(to) || data.messages[slot].is_group() {
            return Err(Error::InvalidTransition { from, to });
        }

        data.messages[slot].status = to;
        if let Err(e) = self.save_conversation(&data).await {
            data.messages[slot].status = from;
            return Err(e);
        }
        Ok((Transition::Advanced { from }, data.messages[slot].clone()))
    }

    /// Sets `identity`'s reaction, replacing any earlier one.
    pub async fn upsert_reaction(
        &self,
        message_id: &str,
        identity: &Identity,
        symbol: &str,
    ) -> Result<Message> {
        let symbol = symbol.trim();
        if symbol.is_empty() || symbol.chars().count() > MAX_REACTION_LEN {
            return Err(Error::Validation("reaction symbol is empty or too long".to_string()));
        }

        let (mut data, slot) = self.lock_message(message_id).await?;
        let previous = data.messages[slot]
            .reactions
            .insert(identity.clone(), symbol.to_string());

        if let Err(e) = self.save_conversation(&data).await {
            let reactions = &mut data.messages[slot].reactions;
            match previous {
                Some(prev) => reactions.insert(identity.clone(), prev),
                None => reactions.remove(identity),
            };
            return Err(e);
        }
        Ok(data.messages[slot].clone())
    }

    /// Hides a message from `identity`'s own views.
    pub async fn hide_for(&self, message_id: &str, identity: &Identity) -> Result<Message> {
        let (mut data, slot) = self.lock_message(message_id).await?;
        if data.messages[slot].hidden_for.insert(identity.clone()) {
            if let Err(e) = self.save_conversation(&data).await {
                data.messages[slot].hidden_for.remove(identity);
                return Err(e);
            }
        }
        Ok(data.messages[slot].clone())
    }

    /// Hard-deletes a message, returning it so callers can notify its audience.
    pub async fn remove(&self, message_id: &str) -> Result<Message> {
        let (mut data, slot) = self.lock_message(message_id).await?;
        let message = data.messages.remove(slot);
        if let Err(e) = self.save_conversation(&data).await {
            data.messages.insert(slot, message);
            return Err(e);
        }
        drop(data);

        self.index.write().await.remove(message_id);
        info!("Removed message {}", message_id);
        Ok(message)
    }

    /// Latest page of the `reader`/`peer` conversation.
    ///
    /// Every message from `peer` to `reader` still below `read` is moved to
    /// `read` first; their ids come back in `marked_read`.
    pub async fn query_conversation(
        &self,
        reader: &Identity,
        peer: &Identity,
        limit: usize,
    ) -> Result<ConversationPage> {
        let limit = self.config.page_limit(Some(limit));
        let Some(conversation) = self.existing(&ConversationKey::direct(reader, peer)).await else {
            return Ok(ConversationPage::default());
        };
        let mut data = conversation.write().await;

        let mut previous = Vec::new();
        for (slot, message) in data.messages.iter_mut().enumerate() {
            if &message.sender == peer
                && message.target.receiver() == Some(reader)
                && message.status < DeliveryStatus::Read
            {
                previous.push((slot, message.status));
                message.status = DeliveryStatus::Read;
            }
        }

        if !previous.is_empty() {
            if let Err(e) = self.save_conversation(&data).await {
                for (slot, status) in previous {
                    data.messages[slot].status = status;
                }
                return Err(e);
            }
        }

        let marked_read = previous
            .iter()
            .map(|(slot, _)| data.messages[*slot].id.clone())
            .collect();

        Ok(ConversationPage {
            messages: latest_page(&data.messages, Some(reader), limit),
            marked_read,
        })
    }

    /// Latest page of a group's log.
    pub async fn query_group(
        &self,
        group_id: &str,
        viewer: Option<&Identity>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let limit = self.config.page_limit(Some(limit));
        let key = ConversationKey::Group {
            group_id: group_id.to_string(),
        };
        let Some(conversation) = self.existing(&key).await else {
            return Ok(Vec::new());
        };
        let data = conversation.read().await;
        Ok(latest_page(&data.messages, viewer, limit))
    }

    /// Case-insensitive substring search over messages `identity` sent or
    /// directly received, newest first.
    pub async fn search_by_text(
        &self,
        identity: &Identity,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(Error::Validation("search query is empty".to_string()));
        }
        let limit = self.config.page_limit(Some(limit));

        let candidates: Vec<_> = self
            .conversations
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.may_involve(identity))
            .map(|(_, conversation)| conversation.clone())
            .collect();

        let mut hits = Vec::new();
        for conversation in candidates {
            let data = conversation.read().await;
            hits.extend(
                data.messages
                    .iter()
                    .filter(|m| m.involves(identity))
                    .filter(|m| !m.is_hidden_for(identity))
                    .filter(|m| m.matches_text(&needle))
                    .cloned(),
            );
        }

        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    async fn store_in(dir: &TempDir) -> MessageStore {
        MessageStore::new(ServerConfig::with_base_dir(dir.path()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_append_validates_addressing() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir).await;
        let (a, b) = (id("+15550001"), id("+15550002"));

        let mut both = NewMessage::direct(&a, &b, "hi");
        both.group_id = Some("g1".into());
        assert!(matches!(store.append(both).await, Err(Error::Validation(_))));

        let neither = NewMessage {
            sender: Some(a.clone()),
            body: Some("hi".into()),
            ..NewMessage::default()
        };
        assert!(matches!(store.append(neither).await, Err(Error::Validation(_))));

        let traversal = NewMessage::group(&a, "../etc", "hi");
        assert!(matches!(store.append(traversal).await, Err(Error::Validation(_))));

        let msg = store.append(NewMessage::direct(&a, &b, "hi")).await.unwrap();
        assert_eq!(msg.status, DeliveryStatus::Sent);
        assert_eq!(msg.body.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_status_is_monotonic() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir).await;
        let (a, b) = (id("+15550001"), id("+15550002"));
        let msg = store.append(NewMessage::direct(&a, &b, "hi")).await.unwrap();

        let (transition, updated) = store
            .advance_status(&msg.id, DeliveryStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(
            transition,
            Transition::Advanced {
                from: DeliveryStatus::Sent
            }
        );
        assert_eq!(updated.status, DeliveryStatus::Delivered);
        assert_eq!(
            store
                .advance_status(&msg.id, DeliveryStatus::Delivered)
                .await
                .unwrap()
                .0,
            Transition::Unchanged
        );
        assert!(matches!(
            store.advance_status(&msg.id, DeliveryStatus::Sent).await,
            Err(Error::InvalidTransition {
                from: DeliveryStatus::Delivered,
                to: DeliveryStatus::Sent
            })
        ));
        assert_eq!(store.get(&msg.id).await.unwrap().status, DeliveryStatus::Delivered);
    }

    #[tokio::test]
    async fn test_status_cannot_skip_delivered() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir).await;
        let (a, b) = (id("+15550001"), id("+15550002"));
        let msg = store.append(NewMessage::direct(&a, &b, "hi")).await.unwrap();

        assert!(matches!(
            store.advance_status(&msg.id, DeliveryStatus::Read).await,
            Err(Error::InvalidTransition {
                from: DeliveryStatus::Sent,
                to: DeliveryStatus::Read
            })
        ));
        assert_eq!(store.get(&msg.id).await.unwrap().status, DeliveryStatus::Sent);

        store
            .advance_status(&msg.id, DeliveryStatus::Delivered)
            .await
            .unwrap();
        let (transition, updated) = store
            .advance_status(&msg.id, DeliveryStatus::Read)
            .await
            .unwrap();
        assert_eq!(
            transition,
            Transition::Advanced {
                from: DeliveryStatus::Delivered
            }
        );
        assert_eq!(updated.status, DeliveryStatus::Read);
    }

    #[tokio::test]
    async fn test_group_status_stays_sent() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir).await;
        let msg = store
            .append(NewMessage::group(&id("+15550001"), "g1", "hello all"))
            .await
            .unwrap();

        assert!(store
            .advance_status(&msg.id, DeliveryStatus::Delivered)
            .await
            .is_err());
        assert_eq!(
            store.advance_status(&msg.id, DeliveryStatus::Sent).await.unwrap().0,
            Transition::Unchanged
        );
    }

    #[tokio::test]
    async fn test_reaction_latest_write_wins() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir).await;
        let (a, b) = (id("+15550001"), id("+15550002"));
        let msg = store.append(NewMessage::direct(&a, &b, "hi")).await.unwrap();

        store.upsert_reaction(&msg.id, &a, "👍").await.unwrap();
        let updated = store.upsert_reaction(&msg.id, &a, "❤").await.unwrap();
        assert_eq!(updated.reactions.len(), 1);
        assert_eq!(updated.reactions.get(&a).map(String::as_str), Some("❤"));

        assert!(matches!(
            store.upsert_reaction(&msg.id, &b, "  ").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            store.upsert_reaction("missing", &b, "👍").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_query_conversation_marks_peer_messages_read() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir).await;
        let (a, b) = (id("+15550001"), id("+15550002"));

        let from_b = store.append(NewMessage::direct(&b, &a, "ping")).await.unwrap();
        let from_a = store.append(NewMessage::direct(&a, &b, "pong")).await.unwrap();

        let page = store.query_conversation(&a, &b, 50).await.unwrap();
        assert_eq!(page.marked_read, vec![from_b.id.clone()]);
        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[0].id, from_b.id);
        assert_eq!(page.messages[0].status, DeliveryStatus::Read);
        // a's own message is untouched by a's read
        assert_eq!(page.messages[1].id, from_a.id);
        assert_eq!(page.messages[1].status, DeliveryStatus::Sent);

        let again = store.query_conversation(&a, &b, 50).await.unwrap();
        assert!(again.marked_read.is_empty());
    }

    #[tokio::test]
    async fn test_query_pages_newest_in_ascending_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir).await;
        let (a, b) = (id("+15550001"), id("+15550002"));
        for i in 0..5 {
            store
                .append(NewMessage::direct(&a, &b, format!("msg {}", i)))
                .await
                .unwrap();
        }

        let page = store.query_conversation(&b, &a, 3).await.unwrap();
        let bodies: Vec<_> = page
            .messages
            .iter()
            .map(|m| m.body.clone().unwrap())
            .collect();
        assert_eq!(bodies, vec!["msg 2", "msg 3", "msg 4"]);
    }

    #[tokio::test]
    async fn test_hidden_messages_skip_only_that_viewer() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir).await;
        let (a, b) = (id("+15550001"), id("+15550002"));
        let msg = store.append(NewMessage::direct(&a, &b, "oops")).await.unwrap();

        store.hide_for(&msg.id, &a).await.unwrap();
        assert!(store.query_conversation(&a, &b, 50).await.unwrap().messages.is_empty());
        assert_eq!(store.query_conversation(&b, &a, 50).await.unwrap().messages.len(), 1);
        assert!(store.search_by_text(&a, "oops", 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_returns_message_and_forgets_it() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir).await;
        let (a, b) = (id("+15550001"), id("+15550002"));
        let msg = store.append(NewMessage::direct(&a, &b, "bye")).await.unwrap();

        let removed = store.remove(&msg.id).await.unwrap();
        assert_eq!(removed.target, Target::Direct { receiver: b.clone() });
        assert!(matches!(store.get(&msg.id).await, Err(Error::NotFound(_))));
        assert!(matches!(store.remove(&msg.id).await, Err(Error::NotFound(_))));
        assert!(store.query_conversation(&b, &a, 50).await.unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_scoped() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir).await;
        let (a, b, c) = (id("+15550001"), id("+15550002"), id("+15550003"));

        store.append(NewMessage::direct(&a, &b, "Lunch tomorrow?")).await.unwrap();
        store.append(NewMessage::direct(&b, &a, "lunch works")).await.unwrap();
        store.append(NewMessage::direct(&b, &c, "LUNCH without a")).await.unwrap();
        store.append(NewMessage::group(&a, "g1", "group lunch")).await.unwrap();
        store.append(NewMessage::group(&b, "g1", "lunch from b")).await.unwrap();

        let hits = store.search_by_text(&a, "LuNcH", 50).await.unwrap();
        let bodies: Vec<_> = hits.iter().map(|m| m.body.clone().unwrap()).collect();
        assert_eq!(bodies, vec!["group lunch", "lunch works", "Lunch tomorrow?"]);
        assert!(hits.iter().all(|m| m.involves(&a)));

        assert!(matches!(
            store.search_by_text(&a, "  ", 50).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_store_reloads_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let (a, b) = (id("+15550001"), id("+15550002"));

        let msg_id = {
            let store = store_in(&temp_dir).await;
            let msg = store.append(NewMessage::direct(&a, &b, "persist me")).await.unwrap();
            store.upsert_reaction(&msg.id, &b, "🎉").await.unwrap();
            store
                .advance_status(&msg.id, DeliveryStatus::Delivered)
                .await
                .unwrap();
            msg.id
        };

        let path = temp_dir
            .path()
            .join("conversations")
            .join("dm-15550001-15550002.json");
        assert!(path.exists(), "conversation JSON file should exist");

        let store = store_in(&temp_dir).await;
        let msg = store.get(&msg_id).await.unwrap();
        assert_eq!(msg.body.as_deref(), Some("persist me"));
        assert_eq!(msg.status, DeliveryStatus::Delivered);
        assert_eq!(msg.reactions.get(&b).map(String::as_str), Some("🎉"));
    }
}
