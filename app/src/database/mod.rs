//! Guild and user documents behind a cache.
//!
//! Documents live in a [`DocumentStore`] and are written one category at a
//! time. Reads go through a [`DocumentCache`] unless the caller asks for a
//! fresh copy; every write updates the store first and the cache second.

pub mod cache;
pub mod entity;
pub mod store;

use chrono::Utc;
use poise::serenity_prelude::{GuildId, UserId};
use tracing::{debug, error, info};

use crate::error::{BotError, Result};
use crate::models::user::{GuildMembership, GUILDS};
use crate::models::{Category, Document, GuildData, UserData};
pub use cache::DocumentCache;
pub use store::{DocumentStore, Kind, MemoryStore, SqlStore};

const DEFAULT_DEMANDS: &str = "3";

pub struct Database {
    store: Box<dyn DocumentStore>,
    cache: DocumentCache,
}

impl Database {
    pub fn new(store: impl DocumentStore) -> Self {
        Self {
            store: Box::new(store),
            cache: DocumentCache::default(),
        }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let db = Self::new(SqlStore::connect(url).await?);
        info!("Connected to document store");
        Ok(db)
    }

    async fn load(&self, kind: Kind, id: &str, fetch: bool) -> Result<Option<Document>> {
        if !fetch {
            if let Some(doc) = self.cache.get(kind, id).filter(|doc| !doc.is_empty()) {
                debug!("Retrieved {} {} from cache", kind.as_str(), id);
                return Ok(Some(doc));
            }
        }

        let Some(doc) = self.store.read(kind, id).await? else {
            return Ok(None);
        };
        debug!("Retrieved {} {} from store", kind.as_str(), id);
        self.cache.set(kind, id, doc.clone());
        Ok(Some(doc))
    }

    async fn create(&self, kind: Kind, id: &str, doc: Document) -> Result<()> {
        match self.store.create(kind, id, doc.clone()).await {
            Ok(()) => {
                debug!("Cached new {} {}", kind.as_str(), id);
                self.cache.set(kind, id, doc);
                Ok(())
            }
            Err(BotError::DuplicateDocument { .. }) => {
                error!("Duplicate key for {} {}", kind.as_str(), id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn write(&self, kind: Kind, id: &str, category: &str, value: serde_json::Value) -> Result<()> {
        self.store.write(kind, id, category, &value).await?;
        debug!("Updated cached {} {} ({})", kind.as_str(), id, category);
        self.cache.update_category(kind, id, category, value);
        Ok(())
    }

    pub async fn get_guild(&self, guild_id: GuildId, fetch: bool) -> Result<Option<GuildData>> {
        let id = guild_id.to_string();
        match self.load(Kind::Guild, &id, fetch).await? {
            Some(doc) => Ok(Some(GuildData::from_document(guild_id, &doc)?)),
            None => Ok(None),
        }
    }

    pub async fn create_guild(&self, guild_id: GuildId) -> Result<()> {
        let doc = GuildData::new(guild_id).to_document()?;
        self.create(Kind::Guild, &guild_id.to_string(), doc).await
    }

    pub async fn get_or_create_guild(&self, guild_id: GuildId) -> Result<GuildData> {
        if let Some(guild) = self.get_guild(guild_id, false).await? {
            return Ok(guild);
        }
        self.create_guild(guild_id).await?;
        match self.get_guild(guild_id, true).await? {
            Some(guild) => Ok(guild),
            None => Ok(GuildData::new(guild_id)),
        }
    }

    /// Persists one category of `guild`. With `unset` the category is emptied.
    pub async fn update_guild(&self, guild: &GuildData, category: Category, unset: bool) -> Result<()> {
        let value = if unset {
            category.empty_value()
        } else {
            guild.category_value(category)?
        };
        self.write(Kind::Guild, &guild.id.to_string(), category.as_str(), value)
            .await
    }

    pub async fn get_user(&self, user_id: UserId, fetch: bool) -> Result<Option<UserData>> {
        let id = user_id.to_string();
        match self.load(Kind::User, &id, fetch).await? {
            Some(doc) => Ok(Some(UserData::from_document(user_id, &doc)?)),
            None => Ok(None),
        }
    }

    pub async fn create_user(&self, user_id: UserId) -> Result<()> {
        let doc = UserData::new(user_id).to_document()?;
        self.create(Kind::User, &user_id.to_string(), doc).await
    }

    pub async fn get_or_create_user(&self, user_id: UserId) -> Result<UserData> {
        if let Some(user) = self.get_user(user_id, false).await? {
            return Ok(user);
        }
        self.create_user(user_id).await?;
        match self.get_user(user_id, true).await? {
            Some(user) => Ok(user),
            None => Ok(UserData::new(user_id)),
        }
    }

    pub async fn update_user(&self, user: &UserData, unset: bool) -> Result<()> {
        let value = if unset {
            serde_json::Value::Object(Default::default())
        } else {
            user.guilds_value()?
        };
        self.write(Kind::User, &user.id.to_string(), GUILDS, value).await
    }

    /// Registers `user` in `guild` with a full demand allowance.
    pub async fn user_guilds_append(&self, user: &mut UserData, guild: &GuildData) -> Result<()> {
        let demands = guild
            .setting("demand_amount")
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_DEMANDS);

        user.guilds.insert(
            guild.id,
            GuildMembership {
                demands_remaining: demands.to_string(),
                demands_wait_time: Utc::now(),
                suspension: Default::default(),
                contract: Default::default(),
            },
        );
        self.update_user(user, false).await
    }

    pub async fn user_guilds_remove(&self, user: &mut UserData, guild: &GuildData) -> Result<()> {
        user.guilds.remove(&guild.id);
        self.update_user(user, false).await
    }

    pub fn flush_cache(&self) -> usize {
        self.cache.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poise::serenity_prelude::{ChannelId, RoleId};

    fn database() -> Database {
        Database::new(MemoryStore::default())
    }

    #[tokio::test]
    async fn missing_guild_is_none_until_created() {
        let db = database();
        let id = GuildId::new(1);
        assert!(db.get_guild(id, false).await.unwrap().is_none());

        let guild = db.get_or_create_guild(id).await.unwrap();
        assert_eq!(guild, GuildData::new(id));
        assert!(db.get_guild(id, true).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn creating_twice_keeps_the_first_document() {
        let db = database();
        let id = GuildId::new(1);
        db.create_guild(id).await.unwrap();

        let mut guild = db.get_guild(id, false).await.unwrap().unwrap();
        guild.roles.insert("operator".into(), RoleId::new(4));
        db.update_guild(&guild, Category::Roles, false).await.unwrap();

        db.create_guild(id).await.unwrap();
        let stored = db.get_guild(id, true).await.unwrap().unwrap();
        assert_eq!(stored.roles["operator"], RoleId::new(4));
    }

    #[tokio::test]
    async fn updates_reach_cache_and_store() {
        let db = database();
        let id = GuildId::new(2);
        let mut guild = db.get_or_create_guild(id).await.unwrap();
        guild.channels.insert("notices".into(), ChannelId::new(9));
        db.update_guild(&guild, Category::Channels, false).await.unwrap();

        let cached = db.get_guild(id, false).await.unwrap().unwrap();
        let fresh = db.get_guild(id, true).await.unwrap().unwrap();
        assert_eq!(cached.channels, fresh.channels);
        assert_eq!(fresh.channels["notices"], ChannelId::new(9));
    }

    #[tokio::test]
    async fn unset_empties_a_category() {
        let db = database();
        let id = GuildId::new(3);
        let guild = db.get_or_create_guild(id).await.unwrap();
        db.update_guild(&guild, Category::Notices, true).await.unwrap();

        let stored = db.get_guild(id, true).await.unwrap().unwrap();
        assert!(stored.notices.is_empty());
        assert!(!stored.notice_enabled("setting_changes"));
    }

    #[tokio::test]
    async fn flushed_cache_falls_back_to_store() {
        let db = database();
        let id = GuildId::new(4);
        db.get_or_create_guild(id).await.unwrap();
        assert_eq!(db.flush_cache(), 1);
        assert!(db.get_guild(id, false).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn membership_uses_guild_demand_amount() {
        let db = database();
        let mut guild = db.get_or_create_guild(GuildId::new(5)).await.unwrap();
        guild.settings.insert("demand_amount".into(), "7".into());
        let mut user = db.get_or_create_user(UserId::new(6)).await.unwrap();

        db.user_guilds_append(&mut user, &guild).await.unwrap();
        let stored = db.get_user(user.id, true).await.unwrap().unwrap();
        assert_eq!(stored.guilds[&guild.id].demands_remaining, "7");

        db.user_guilds_remove(&mut user, &guild).await.unwrap();
        let stored = db.get_user(user.id, true).await.unwrap().unwrap();
        assert!(stored.guilds.is_empty());
    }
}
