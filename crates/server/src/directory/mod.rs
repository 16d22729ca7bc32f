//! Identity and group directory
//!
//! Registration and group creation live outside the delivery core; the core
//! only reads group membership and records last-seen times through this
//! trait. `SqliteDirectory` is the durable implementation, `MemoryDirectory`
//! backs tests and embedded use.

mod sqlite;

pub use sqlite::SqliteDirectory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Group, Identity, Profile};

#[async_trait]
pub trait Directory: Send + Sync {
    /// Creates a profile. Fails with `Conflict` if the identity exists.
    async fn register(&self, identity: &Identity, display_name: &str) -> Result<Profile>;

    async fn identity(&self, identity: &Identity) -> Result<Option<Profile>>;

    async fn list_identities(&self) -> Result<Vec<Profile>>;

    async fn record_last_seen(&self, identity: &Identity, at: DateTime<Utc>) -> Result<()>;

    async fn create_group(
        &self,
        name: &str,
        members: &BTreeSet<Identity>,
        creator: &Identity,
    ) -> Result<Group>;

    async fn group(&self, group_id: &str) -> Result<Option<Group>>;

    async fn groups_for(&self, identity: &Identity) -> Result<Vec<Group>>;
}

#[derive(Default)]
pub struct MemoryDirectory {
    profiles: RwLock<HashMap<Identity, Profile>>,
    groups: RwLock<HashMap<String, Group>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn register(&self, identity: &Identity, display_name: &str) -> Result<Profile> {
        let mut profiles = self.profiles.write();
        if profiles.contains_key(identity) {
            return Err(Error::Conflict("Phone number already registered".to_string()));
        }
        let profile = Profile {
            identity: identity.clone(),
            display_name: display_name.to_string(),
            is_online: false,
            last_seen: None,
            created_at: Utc::now(),
        };
        profiles.insert(identity.clone(), profile.clone());
        Ok(profile)
    }

    async fn identity(&self, identity: &Identity) -> Result<Option<Profile>> {
        Ok(self.profiles.read().get(identity).cloned())
    }

    async fn list_identities(&self) -> Result<Vec<Profile>> {
        let mut all: Vec<_> = self.profiles.read().values().cloned().collect();
        all.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(all)
    }

    async fn record_last_seen(&self, identity: &Identity, at: DateTime<Utc>) -> Result<()> {
        if let Some(profile) = self.profiles.write().get_mut(identity) {
            profile.last_seen = Some(at);
        }
        Ok(())
    }

    async fn create_group(
        &self,
        name: &str,
        members: &BTreeSet<Identity>,
        creator: &Identity,
    ) -> Result<Group> {
        let group = Group {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            members: members.clone(),
            created_by: creator.clone(),
            created_at: Utc::now(),
        };
        self.groups.write().insert(group.id.clone(), group.clone());
        Ok(group)
    }

    async fn group(&self, group_id: &str) -> Result<Option<Group>> {
        Ok(self.groups.read().get(group_id).cloned())
    }

    async fn groups_for(&self, identity: &Identity) -> Result<Vec<Group>> {
        let mut groups: Vec<_> = self
            .groups
            .read()
            .values()
            .filter(|g| g.is_member(identity))
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_register_conflict() {
        let dir = MemoryDirectory::new();
        let alice = id("+15550001");
        dir.register(&alice, "Alice").await.unwrap();
        assert!(matches!(
            dir.register(&alice, "Alice again").await,
            Err(Error::Conflict(_))
        ));
        assert_eq!(dir.list_identities().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_groups_for_member() {
        let dir = MemoryDirectory::new();
        let alice = id("+15550001");
        let bob = id("+15550002");
        let carol = id("+15550003");
        let members: BTreeSet<_> = [alice.clone(), bob.clone()].into_iter().collect();
        let group = dir.create_group("Hikers", &members, &alice).await.unwrap();

        assert_eq!(dir.groups_for(&bob).await.unwrap(), vec![group.clone()]);
        assert!(dir.groups_for(&carol).await.unwrap().is_empty());
        assert_eq!(dir.group(&group.id).await.unwrap(), Some(group));
        assert!(dir.group("missing").await.unwrap().is_none());
    }
}
