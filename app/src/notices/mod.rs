//! Routing of notice embeds to per-event channels through webhooks.
//!
//! Each notice event (`setting_changes`, `notices`, ...) may have a channel in
//! the guild's `channels` category. A webhook is created lazily per channel
//! and its credentials are kept in `store` under `{event}_webhook`. Events
//! that share a channel share the webhook of whichever event created it.

pub mod discord;

use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, CreateEmbed, GuildId, WebhookId};
use std::fmt;
use tracing::{debug, error};

use crate::database::Database;
use crate::error::Result;
use crate::models::{Category, GuildData};
use crate::reply::fail;

pub use discord::SerenityGateway;

/// Fallback event used when an event has no channel of its own.
pub const GENERAL_EVENT: &str = "notices";

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub description: String,
    pub color: u32,
    pub fields: Vec<(String, String, bool)>,
}

impl Notice {
    pub fn new(description: impl Into<String>, color: u32) -> Self {
        Self {
            description: description.into(),
            color,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push((name.into(), value.into(), inline));
        self
    }

    pub fn embed(&self) -> CreateEmbed {
        self.fields.iter().fold(
            CreateEmbed::new().description(&self.description).colour(self.color),
            |embed, (name, value, inline)| embed.field(name, value, *inline),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookCredentials {
    pub id: WebhookId,
    pub token: String,
}

impl WebhookCredentials {
    pub fn parse(stored: &str) -> Option<Self> {
        let (id, token) = stored.split_once(':')?;
        let id = id.parse::<u64>().ok().filter(|id| *id != 0)?;
        if token.is_empty() {
            return None;
        }
        Some(Self {
            id: WebhookId::new(id),
            token: token.to_string(),
        })
    }
}

impl fmt::Display for WebhookCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.token)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum DeliveryError {
    /// The webhook no longer exists.
    NotFound,
    Forbidden,
    Other(String),
}

/// What the router needs from Discord.
#[async_trait]
pub trait NoticeGateway: Send + Sync {
    /// Whether `channel` still exists and is a text channel.
    async fn is_text_channel(&self, channel: ChannelId) -> bool;

    async fn can_manage_webhooks(&self, channel: ChannelId) -> bool;

    async fn create_webhook(&self, channel: ChannelId) -> Result<WebhookCredentials>;

    async fn execute(&self, webhook: &WebhookCredentials, notice: &Notice) -> std::result::Result<(), DeliveryError>;

    /// Tells the invoking user something went wrong.
    async fn warn(&self, message: String);
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Delivered { event: String },
    NoChannel,
    ChannelRemoved,
    MissingPermission,
    CreateFailed,
    Failed,
}

/// The event a notice is sent under: `event` itself when it has a channel,
/// the general notices channel otherwise.
pub fn notice_target<'a>(guild: &GuildData, event: &'a str) -> &'a str {
    if guild.channels.contains_key(event) {
        event
    } else {
        GENERAL_EVENT
    }
}

/// The notice event announcing a change to `category`.
pub fn change_event(category: Category) -> &'static str {
    match category {
        Category::Notices => "notice_changes",
        Category::Status => "status_changes",
        _ => "setting_changes",
    }
}

pub struct NoticeRouter<'a, G: NoticeGateway> {
    db: &'a Database,
    gateway: &'a G,
}

impl<'a, G: NoticeGateway> NoticeRouter<'a, G> {
    pub fn new(db: &'a Database, gateway: &'a G) -> Self {
        Self { db, gateway }
    }

    /// Emits `notice` for `event` if the guild has that notice enabled,
    /// falling back to the general notices channel.
    pub async fn announce(&self, guild_id: GuildId, event: &str, notice: &Notice) -> Result<Option<Outcome>> {
        let guild = self.db.get_or_create_guild(guild_id).await?;
        if !guild.notice_enabled(event) {
            return Ok(None);
        }
        let target = notice_target(&guild, event);
        self.send(guild_id, target, notice).await.map(Some)
    }

    pub async fn send(&self, guild_id: GuildId, event: &str, notice: &Notice) -> Result<Outcome> {
        let mut checked: Vec<String> = Vec::new();
        let mut event = event.to_string();

        loop {
            checked.push(event.clone());
            let mut guild = self.db.get_or_create_guild(guild_id).await?;
            let hook_key = GuildData::webhook_key(&event);

            let Some(channel) = guild.channels.get(&event).copied() else {
                if guild.store.remove(&hook_key).is_some() {
                    self.db.update_guild(&guild, Category::Store, false).await?;
                }
                return Ok(Outcome::NoChannel);
            };

            if !self.gateway.is_text_channel(channel).await {
                if guild.store.remove(&hook_key).is_some() {
                    self.db.update_guild(&guild, Category::Store, false).await?;
                }
                guild.channels.remove(&event);
                self.db.update_guild(&guild, Category::Channels, false).await?;
                return Ok(Outcome::ChannelRemoved);
            }

            let stored = guild.store.get(&hook_key).and_then(|s| WebhookCredentials::parse(s));
            let created = stored.is_none();
            let webhook = match stored {
                Some(webhook) => webhook,
                None => {
                    let sibling = guild
                        .channels
                        .iter()
                        .find(|(other, id)| **id == channel && !checked.contains(*other))
                        .map(|(other, _)| other.clone());
                    if let Some(sibling) = sibling {
                        debug!("Notice {} shares a channel with {}", event, sibling);
                        event = sibling;
                        continue;
                    }

                    event = checked[0].clone();

                    if !self.gateway.can_manage_webhooks(channel).await {
                        self.gateway
                            .warn(fail(format!(
                                "I tried to send a notice, but I don't have the `manage webhooks` permission for the channel <#{channel}>"
                            )))
                            .await;
                        return Ok(Outcome::MissingPermission);
                    }

                    let webhook = match self.gateway.create_webhook(channel).await {
                        Ok(webhook) => webhook,
                        Err(e) => {
                            error!("Failed to create a notice webhook in guild {}: {}", guild_id, e);
                            return Ok(Outcome::CreateFailed);
                        }
                    };

                    guild
                        .store
                        .insert(GuildData::webhook_key(&event), webhook.to_string());
                    self.db.update_guild(&guild, Category::Store, false).await?;
                    webhook
                }
            };

            match self.gateway.execute(&webhook, notice).await {
                Ok(()) => return Ok(Outcome::Delivered { event }),
                Err(DeliveryError::NotFound) => {
                    let mut guild = self.db.get_or_create_guild(guild_id).await?;
                    guild.store.remove(&GuildData::webhook_key(&event));
                    self.db.update_guild(&guild, Category::Store, false).await?;
                    // a webhook we just made vanishing again is not worth chasing
                    if created {
                        error!("Notice webhook in guild {} vanished right after creation", guild_id);
                        return Ok(Outcome::Failed);
                    }
                }
                Err(DeliveryError::Forbidden) => {
                    self.gateway
                        .warn(fail("Unexpected error while trying to send a notice"))
                        .await;
                    error!("Failed to send a notice in guild {} (forbidden)", guild_id);
                    return Ok(Outcome::Failed);
                }
                Err(DeliveryError::Other(e)) => {
                    error!("Failed to send a notice in guild {}: {}", guild_id, e);
                    return Ok(Outcome::Failed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::error::BotError;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    const GUILD: GuildId = GuildId::new(1);

    #[derive(Default)]
    struct FakeGateway {
        text_channels: HashSet<ChannelId>,
        no_permission: HashSet<ChannelId>,
        fail_create: bool,
        /// Webhooks that exist on Discord, with the channel they post into.
        live: Mutex<HashMap<WebhookId, ChannelId>>,
        next_id: Mutex<u64>,
        delivered: Mutex<Vec<(WebhookId, String)>>,
        warnings: Mutex<Vec<String>>,
        forbidden: bool,
    }

    impl FakeGateway {
        fn with_text(channels: &[u64]) -> Self {
            Self {
                text_channels: channels.iter().map(|c| ChannelId::new(*c)).collect(),
                next_id: Mutex::new(100),
                ..Default::default()
            }
        }

        fn add_live(&self, id: u64, channel: u64) {
            self.live.lock().insert(WebhookId::new(id), ChannelId::new(channel));
        }
    }

    #[async_trait]
    impl NoticeGateway for FakeGateway {
        async fn is_text_channel(&self, channel: ChannelId) -> bool {
            self.text_channels.contains(&channel)
        }

        async fn can_manage_webhooks(&self, channel: ChannelId) -> bool {
            !self.no_permission.contains(&channel)
        }

        async fn create_webhook(&self, channel: ChannelId) -> Result<WebhookCredentials> {
            if self.fail_create {
                return Err(BotError::Config("nope".into()));
            }
            let mut next = self.next_id.lock();
            *next += 1;
            let id = WebhookId::new(*next);
            self.live.lock().insert(id, channel);
            Ok(WebhookCredentials { id, token: format!("t{}", *next) })
        }

        async fn execute(&self, webhook: &WebhookCredentials, notice: &Notice) -> std::result::Result<(), DeliveryError> {
            if self.forbidden {
                return Err(DeliveryError::Forbidden);
            }
            if !self.live.lock().contains_key(&webhook.id) {
                return Err(DeliveryError::NotFound);
            }
            self.delivered.lock().push((webhook.id, notice.description.clone()));
            Ok(())
        }

        async fn warn(&self, message: String) {
            self.warnings.lock().push(message);
        }
    }

    async fn setup(channels: &[(&str, u64)], store: &[(&str, &str)]) -> Database {
        let db = Database::new(MemoryStore::default());
        let mut guild = db.get_or_create_guild(GUILD).await.unwrap();
        for (event, channel) in channels {
            guild.channels.insert(event.to_string(), ChannelId::new(*channel));
        }
        for (key, value) in store {
            guild.store.insert(key.to_string(), value.to_string());
        }
        db.update_guild(&guild, Category::Channels, false).await.unwrap();
        db.update_guild(&guild, Category::Store, false).await.unwrap();
        db
    }

    async fn stored(db: &Database) -> GuildData {
        db.get_guild(GUILD, true).await.unwrap().unwrap()
    }

    fn notice() -> Notice {
        Notice::new("changed", 0)
    }

    #[tokio::test]
    async fn no_channel_clears_a_leftover_webhook() {
        let db = setup(&[], &[("notices_webhook", "5:x")]).await;
        let gateway = FakeGateway::with_text(&[]);

        let outcome = NoticeRouter::new(&db, &gateway).send(GUILD, "notices", &notice()).await.unwrap();
        assert_eq!(outcome, Outcome::NoChannel);
        assert!(stored(&db).await.store.is_empty());
    }

    #[tokio::test]
    async fn vanished_channel_is_unset() {
        let db = setup(&[("notices", 7)], &[("notices_webhook", "5:x")]).await;
        let gateway = FakeGateway::with_text(&[]);

        let outcome = NoticeRouter::new(&db, &gateway).send(GUILD, "notices", &notice()).await.unwrap();
        assert_eq!(outcome, Outcome::ChannelRemoved);
        let guild = stored(&db).await;
        assert!(guild.channels.is_empty());
        assert!(guild.store.is_empty());
    }

    #[tokio::test]
    async fn stored_webhook_is_used() {
        let db = setup(&[("notices", 7)], &[("notices_webhook", "5:x")]).await;
        let gateway = FakeGateway::with_text(&[7]);
        gateway.add_live(5, 7);

        let outcome = NoticeRouter::new(&db, &gateway).send(GUILD, "notices", &notice()).await.unwrap();
        assert_eq!(outcome, Outcome::Delivered { event: "notices".into() });
        assert_eq!(gateway.delivered.lock()[0].0, WebhookId::new(5));
    }

    #[tokio::test]
    async fn webhook_is_created_and_stored() {
        let db = setup(&[("setting_changes", 7)], &[]).await;
        let gateway = FakeGateway::with_text(&[7]);

        let outcome = NoticeRouter::new(&db, &gateway)
            .send(GUILD, "setting_changes", &notice())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Delivered { event: "setting_changes".into() });
        assert_eq!(stored(&db).await.store["setting_changes_webhook"], "101:t101");
    }

    #[tokio::test]
    async fn events_sharing_a_channel_share_its_webhook() {
        let db = setup(
            &[("notices", 7), ("setting_changes", 7)],
            &[("notices_webhook", "5:x")],
        )
        .await;
        let gateway = FakeGateway::with_text(&[7]);
        gateway.add_live(5, 7);

        let outcome = NoticeRouter::new(&db, &gateway)
            .send(GUILD, "setting_changes", &notice())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Delivered { event: "notices".into() });
        assert_eq!(*gateway.next_id.lock(), 100);
        assert!(!stored(&db).await.store.contains_key("setting_changes_webhook"));
    }

    #[tokio::test]
    async fn shared_channel_without_webhook_creates_one_for_the_first_event() {
        let db = setup(&[("notices", 7), ("status_changes", 7)], &[]).await;
        let gateway = FakeGateway::with_text(&[7]);

        let outcome = NoticeRouter::new(&db, &gateway)
            .send(GUILD, "status_changes", &notice())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Delivered { event: "status_changes".into() });
        let guild = stored(&db).await;
        assert!(guild.store.contains_key("status_changes_webhook"));
        assert!(!guild.store.contains_key("notices_webhook"));
    }

    #[tokio::test]
    async fn stale_webhook_is_replaced() {
        let db = setup(&[("notices", 7)], &[("notices_webhook", "5:x")]).await;
        let gateway = FakeGateway::with_text(&[7]);

        let outcome = NoticeRouter::new(&db, &gateway).send(GUILD, "notices", &notice()).await.unwrap();
        assert_eq!(outcome, Outcome::Delivered { event: "notices".into() });
        assert_eq!(stored(&db).await.store["notices_webhook"], "101:t101");
        assert_eq!(gateway.delivered.lock().len(), 1);
    }

    #[tokio::test]
    async fn missing_permission_warns_the_user() {
        let db = setup(&[("notices", 7)], &[]).await;
        let mut gateway = FakeGateway::with_text(&[7]);
        gateway.no_permission.insert(ChannelId::new(7));

        let outcome = NoticeRouter::new(&db, &gateway).send(GUILD, "notices", &notice()).await.unwrap();
        assert_eq!(outcome, Outcome::MissingPermission);
        assert!(gateway.warnings.lock()[0].contains("manage webhooks"));
        assert!(stored(&db).await.store.is_empty());
    }

    #[tokio::test]
    async fn failed_creation_stores_nothing() {
        let db = setup(&[("notices", 7)], &[]).await;
        let mut gateway = FakeGateway::with_text(&[7]);
        gateway.fail_create = true;

        let outcome = NoticeRouter::new(&db, &gateway).send(GUILD, "notices", &notice()).await.unwrap();
        assert_eq!(outcome, Outcome::CreateFailed);
        assert!(stored(&db).await.store.is_empty());
    }

    #[tokio::test]
    async fn forbidden_delivery_warns() {
        let db = setup(&[("notices", 7)], &[("notices_webhook", "5:x")]).await;
        let mut gateway = FakeGateway::with_text(&[7]);
        gateway.forbidden = true;

        let outcome = NoticeRouter::new(&db, &gateway).send(GUILD, "notices", &notice()).await.unwrap();
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(gateway.warnings.lock().len(), 1);
    }

    #[tokio::test]
    async fn announce_respects_disabled_notices_and_falls_back() {
        let db = setup(&[("notices", 7)], &[]).await;
        let gateway = FakeGateway::with_text(&[7]);
        let router = NoticeRouter::new(&db, &gateway);

        let outcome = router.announce(GUILD, "setting_changes", &notice()).await.unwrap();
        assert_eq!(outcome, Some(Outcome::Delivered { event: "notices".into() }));

        let mut guild = stored(&db).await;
        guild.notices.insert("setting_changes".into(), false);
        db.update_guild(&guild, Category::Notices, false).await.unwrap();
        assert_eq!(router.announce(GUILD, "setting_changes", &notice()).await.unwrap(), None);
    }

    #[test]
    fn credentials_parse_and_print() {
        let creds = WebhookCredentials::parse("12:abc").unwrap();
        assert_eq!(creds.to_string(), "12:abc");
        assert!(WebhookCredentials::parse("12").is_none());
        assert!(WebhookCredentials::parse("x:abc").is_none());
        assert!(WebhookCredentials::parse("0:abc").is_none());
        assert!(WebhookCredentials::parse("12:").is_none());
    }

    #[test]
    fn change_events_follow_the_category() {
        assert_eq!(change_event(Category::Notices), "notice_changes");
        assert_eq!(change_event(Category::Status), "status_changes");
        assert_eq!(change_event(Category::Roles), "setting_changes");
    }
}
