//! Delivery Router
//!
//! Turns store mutations into pushes. Every publish is best effort: an
//! identity without live connections simply misses the event and catches up
//! through the next history query.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::models::{DeliveryStatus, Group, Identity, Message, NewMessage, Target};
use crate::presence::{ConnectionId, PresenceChange, PresenceRegistry};
use crate::protocol::ServerEvent;
use crate::resolver::ChannelResolver;
use crate::store::{MessageStore, Transition};

pub struct Hub {
    registry: Arc<PresenceRegistry>,
    directory: Arc<dyn Directory>,
    resolver: ChannelResolver,
    store: Arc<MessageStore>,
}

impl Hub {
    pub fn new(
        registry: Arc<PresenceRegistry>,
        directory: Arc<dyn Directory>,
        store: Arc<MessageStore>,
    ) -> Self {
        Self {
            resolver: ChannelResolver::new(directory.clone()),
            registry,
            directory,
            store,
        }
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    /// Pushes one event to every live connection of each identity.
    fn publish<'a>(
        &self,
        recipients: impl IntoIterator<Item = &'a Identity>,
        event: &ServerEvent,
    ) -> usize {
        let mut pushed = 0;
        for identity in recipients {
            let n = self.registry.send_to(identity, event);
            if n == 0 {
                debug!("[Hub] {} offline, dropped {}", identity, event.name());
            }
            pushed += n;
        }
        pushed
    }

    /// Binds a connection to an identity after the `join` handshake.
    pub async fn join(&self, conn: ConnectionId, identity: &Identity) -> Result<()> {
        let changes = self.registry.connect(identity, conn)?;
        self.persist_presence(changes).await;
        Ok(())
    }

    /// Transport-level close, graceful or not.
    pub async fn disconnect(&self, conn: ConnectionId) {
        if let Some(change) = self.registry.disconnect(conn) {
            self.persist_presence(vec![change]).await;
        }
    }

    async fn persist_presence(&self, changes: Vec<PresenceChange>) {
        for change in changes {
            if let PresenceChange::WentOffline {
                identity,
                last_seen,
            } = change
            {
                if let Err(e) = self.directory.record_last_seen(&identity, last_seen).await {
                    warn!("[Hub] Failed to record last seen for {}: {}", identity, e);
                }
            }
        }
    }

    /// Stores and fans out a new message.
    ///
    /// Recipients get a `message` event, the sender's own connections get the
    /// same event as an echo. A direct message whose receiver is online at
    /// publish time is optimistically moved to `delivered`; that is not an
    /// acknowledgment from the receiving client.
    pub async fn send(&self, new: NewMessage) -> Result<Message> {
        let (sender, target) = new.validate()?;
        self.ensure_member(&sender, &target).await?;
        let recipients = self.resolver.resolve_recipients(&sender, &target).await?;

        let mut message = self.store.append(new).await?;
        let event = ServerEvent::Message(message.clone());
        self.publish(&recipients, &event);
        if !recipients.contains(&sender) {
            self.registry.send_to(&sender, &event);
        }

        if let Target::Direct { receiver } = &target {
            if self.registry.is_online(receiver) {
                match self.mark_status(&message.id, DeliveryStatus::Delivered).await {
                    Ok(_) => message.status = message.status.max(DeliveryStatus::Delivered),
                    // already read in the meantime
                    Err(Error::InvalidTransition { from, .. }) => message.status = from,
                    Err(e) => warn!("[Hub] Delivered upgrade failed for {}: {}", message.id, e),
                }
            }
        }

        info!(
            "[Hub] {} -> {:?}: message {} ({} recipients)",
            sender,
            target,
            message.id,
            recipients.len()
        );
        Ok(message)
    }

    /// Advances a message's status and tells its sender, once per real change.
    pub async fn mark_status(
        &self,
        message_id: &str,
        status: DeliveryStatus,
    ) -> Result<Transition> {
        let (transition, message) = self.store.advance_status(message_id, status).await?;
        if let Transition::Advanced { .. } = transition {
            if let Target::Direct { receiver } = &message.target {
                self.registry.send_to(
                    &message.sender,
                    &ServerEvent::StatusChanged {
                        message_ids: vec![message.id.clone()],
                        status,
                        peer: receiver.clone(),
                    },
                );
            }
        }
        Ok(transition)
    }

    /// Direct history as seen by `reader`. Produces read receipts for
    /// everything `peer` sent that `reader` had not read yet.
    pub async fn open_conversation(
        &self,
        reader: &Identity,
        peer: &Identity,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let page = self.store.query_conversation(reader, peer, limit).await?;
        if !page.marked_read.is_empty() {
            debug!(
                "[Hub] {} read {} messages from {}",
                reader,
                page.marked_read.len(),
                peer
            );
            self.registry.send_to(
                peer,
                &ServerEvent::StatusChanged {
                    message_ids: page.marked_read,
                    status: DeliveryStatus::Read,
                    peer: reader.clone(),
                },
            );
        }
        Ok(page.messages)
    }

    pub async fn group_history(
        &self,
        group_id: &str,
        viewer: Option<&Identity>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        self.resolver.group(group_id).await?;
        self.store.query_group(group_id, viewer, limit).await
    }

    /// Hard delete, then `message-deleted` to everyone party to the message.
    pub async fn delete(&self, message_id: &str) -> Result<Message> {
        let message = self.store.get(message_id).await?;
        let audience = self.resolver.audience(&message).await?;
        let removed = self.store.remove(message_id).await?;
        self.publish(
            &audience,
            &ServerEvent::MessageDeleted {
                message_id: removed.id.clone(),
            },
        );
        info!("[Hub] Deleted message {}", removed.id);
        Ok(removed)
    }

    /// Upserts `identity`'s reaction and pushes it to the message's audience.
    pub async fn react(&self, identity: &Identity, message_id: &str, symbol: &str) -> Result<Message> {
        let audience = self.party_audience(message_id, identity).await?;
        let updated = self.store.upsert_reaction(message_id, identity, symbol).await?;
        let symbol = updated
            .reactions
            .get(identity)
            .cloned()
            .unwrap_or_default();
        self.publish(
            &audience,
            &ServerEvent::Reaction {
                message_id: updated.id.clone(),
                identity: identity.clone(),
                symbol,
            },
        );
        Ok(updated)
    }

    /// Transient typing relay. Nothing is stored and nothing expires here.
    pub async fn typing(&self, sender: &Identity, target: &Target, is_typing: bool) -> Result<usize> {
        self.ensure_member(sender, target).await?;
        let recipients = self.resolver.resolve_recipients(sender, target).await?;
        let event = ServerEvent::Typing {
            sender: sender.clone(),
            group_id: target.group_id().map(str::to_string),
            is_typing,
        };
        Ok(self.publish(recipients.iter().filter(|r| *r != sender), &event))
    }

    /// "Delete for me": hides the message from `identity`'s own views only.
    pub async fn hide(&self, message_id: &str, identity: &Identity) -> Result<Message> {
        self.party_audience(message_id, identity).await?;
        self.store.hide_for(message_id, identity).await
    }

    /// Group targets only accept their own members.
    async fn ensure_member(&self, identity: &Identity, target: &Target) -> Result<()> {
        if let Target::Group { group_id } = target {
            let group = self.resolver.group(group_id).await?;
            if !group.is_member(identity) {
                return Err(Error::Validation(format!(
                    "{} is not a member of group {}",
                    identity, group_id
                )));
            }
        }
        Ok(())
    }

    /// Audience of an existing message, provided `identity` belongs to it.
    async fn party_audience(
        &self,
        message_id: &str,
        identity: &Identity,
    ) -> Result<BTreeSet<Identity>> {
        let message = self.store.get(message_id).await?;
        let audience = self.resolver.audience(&message).await?;
        if !audience.contains(identity) {
            return Err(Error::Validation(format!(
                "{} is not party to message {}",
                identity, message_id
            )));
        }
        Ok(audience)
    }

    pub async fn search(&self, identity: &Identity, query: &str, limit: usize) -> Result<Vec<Message>> {
        self.store.search_by_text(identity, query, limit).await
    }

    /// Creates a group (the creator is always a member) and announces it to members.
    pub async fn create_group(
        &self,
        name: &str,
        members: impl IntoIterator<Item = Identity>,
        creator: &Identity,
    ) -> Result<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("group name is required".to_string()));
        }
        let mut members: BTreeSet<Identity> = members.into_iter().collect();
        members.insert(creator.clone());
        if members.len() < 2 {
            return Err(Error::Validation(
                "a group needs at least one member besides its creator".to_string(),
            ));
        }

        let group = self.directory.create_group(name, &members, creator).await?;
        self.publish(&group.members, &ServerEvent::GroupCreated(group.clone()));
        Ok(group)
    }
}
