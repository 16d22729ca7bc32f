use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use super::Directory;
use crate::error::{Error, Result};
use crate::models::{Group, Identity, Profile};

type ProfileRow = (String, String, Option<String>, String);
type GroupRow = (String, String, String, String);

/// Directory stored in SQLite (`directory.sqlite` under the data root)
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    pub async fn open(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let directory = Self { pool };
        directory.init_db().await?;
        info!("[Directory] Initialized at {:?}", db_path);
        Ok(directory)
    }

    /// Private in-memory database. A single connection keeps it alive.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let directory = Self { pool };
        directory.init_db().await?;
        Ok(directory)
    }

    async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS identities (
                phone TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                last_seen TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS group_members (
                group_id TEXT NOT NULL,
                phone TEXT NOT NULL,
                PRIMARY KEY (group_id, phone),
                FOREIGN KEY (group_id) REFERENCES groups(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn members_of(&self, group_id: &str) -> Result<BTreeSet<Identity>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT phone FROM group_members WHERE group_id = ?")
                .bind(group_id)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|(phone,)| stored_identity(phone))
            .collect()
    }

    async fn hydrate_group(&self, row: GroupRow) -> Result<Group> {
        let (id, name, created_by, created_at) = row;
        let members = self.members_of(&id).await?;
        Ok(Group {
            id,
            name,
            members,
            created_by: stored_identity(created_by)?,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Persistence(format!("bad timestamp {:?}: {}", value, e)))
}

fn stored_identity(value: String) -> Result<Identity> {
    Identity::new(value).map_err(|e| Error::Persistence(format!("bad stored identity: {}", e)))
}

fn row_to_profile(row: ProfileRow) -> Result<Profile> {
    let (phone, display_name, last_seen, created_at) = row;
    Ok(Profile {
        identity: stored_identity(phone)?,
        display_name,
        is_online: false,
        last_seen: last_seen.as_deref().map(parse_timestamp).transpose()?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait]
impl Directory for SqliteDirectory {
    async fn register(&self, identity: &Identity, display_name: &str) -> Result<Profile> {
        let existing: Option<(String,)> =
            sqlx::query_as("SELECT phone FROM identities WHERE phone = ?")
                .bind(identity.as_str())
                .fetch_optional(&self.pool)
                .await?;
        if existing.is_some() {
            return Err(Error::Conflict("Phone number already registered".to_string()));
        }

        let created_at = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO identities (phone, display_name, last_seen, created_at) VALUES (?, ?, NULL, ?)",
        )
        .bind(identity.as_str())
        .bind(display_name)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(Error::Conflict("Phone number already registered".to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        info!("[Directory] Registered {}", identity);
        Ok(Profile {
            identity: identity.clone(),
            display_name: display_name.to_string(),
            is_online: false,
            last_seen: None,
            created_at,
        })
    }

    async fn identity(&self, identity: &Identity) -> Result<Option<Profile>> {
        let row: Option<ProfileRow> = sqlx::query_as(
            "SELECT phone, display_name, last_seen, created_at FROM identities WHERE phone = ?",
        )
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_profile).transpose()
    }

    async fn list_identities(&self) -> Result<Vec<Profile>> {
        let rows: Vec<ProfileRow> = sqlx::query_as(
            "SELECT phone, display_name, last_seen, created_at FROM identities ORDER BY phone",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_profile).collect()
    }

    async fn record_last_seen(&self, identity: &Identity, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE identities SET last_seen = ? WHERE phone = ?")
            .bind(at.to_rfc3339())
            .bind(identity.as_str())
            .execute(&self.pool)
            .await?;
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

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO groups (id, name, created_by, created_at) VALUES (?, ?, ?, ?)")
            .bind(&group.id)
            .bind(&group.name)
            .bind(group.created_by.as_str())
            .bind(group.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        for member in &group.members {
            sqlx::query("INSERT INTO group_members (group_id, phone) VALUES (?, ?)")
                .bind(&group.id)
                .bind(member.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!(
            "[Directory] Created group {} ({} members)",
            group.id,
            group.members.len()
        );
        Ok(group)
    }

    async fn group(&self, group_id: &str) -> Result<Option<Group>> {
        let row: Option<GroupRow> =
            sqlx::query_as("SELECT id, name, created_by, created_at FROM groups WHERE id = ?")
                .bind(group_id)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_group(row).await?)),
            None => Ok(None),
        }
    }

    async fn groups_for(&self, identity: &Identity) -> Result<Vec<Group>> {
        let rows: Vec<GroupRow> = sqlx::query_as(
            r#"
            SELECT g.id, g.name, g.created_by, g.created_at
            FROM groups g
            JOIN group_members m ON m.group_id = g.id
            WHERE m.phone = ?
            ORDER BY g.created_at
            "#,
        )
        .bind(identity.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            groups.push(self.hydrate_group(row).await?);
        }
        Ok(groups)
    }
}
