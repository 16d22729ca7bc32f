//! Channel Resolver: who should see a message, typing signal or reaction.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::models::{Group, Identity, Message, Target};

#[derive(Clone)]
pub struct ChannelResolver {
    directory: Arc<dyn Directory>,
}

impl ChannelResolver {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    pub async fn group(&self, group_id: &str) -> Result<Group> {
        self.directory
            .group(group_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("group {}", group_id)))
    }

    /// Live recipients of something `sender` addresses to `target`.
    ///
    /// A direct peer resolves to itself; a group resolves to its members
    /// minus the sender.
    pub async fn resolve_recipients(
        &self,
        sender: &Identity,
        target: &Target,
    ) -> Result<BTreeSet<Identity>> {
        match target {
            Target::Direct { receiver } => Ok(BTreeSet::from([receiver.clone()])),
            Target::Group { group_id } => {
                let group = self.group(group_id).await?;
                Ok(group
                    .members
                    .into_iter()
                    .filter(|member| member != sender)
                    .collect())
            }
        }
    }

    /// Everyone party to an existing message: both direct parties, or all group members.
    pub async fn audience(&self, message: &Message) -> Result<BTreeSet<Identity>> {
        match &message.target {
            Target::Direct { receiver } => {
                Ok(BTreeSet::from([message.sender.clone(), receiver.clone()]))
            }
            Target::Group { group_id } => Ok(self.group(group_id).await?.members),
        }
    }
}
