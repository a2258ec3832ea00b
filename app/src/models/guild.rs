use poise::serenity_prelude::{ChannelId, GuildId, RoleId, UserId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::categories::{NOTICES, STATSHEET_POSITIONS, STATUS};
use super::Document;
use crate::error::Result;

pub const MAX_TEAMS: usize = 50;
pub const MAX_COACHES: usize = 5;

/// Top-level keys of a guild document. Writes always replace a whole category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Settings,
    Channels,
    Roles,
    Store,
    Notices,
    Status,
    Waitlist,
    Blacklist,
    Statsheets,
    Teams,
    Coaches,
    Season,
    Awards,
    Games,
}

impl Category {
    pub const ALL: [Category; 14] = [
        Category::Settings,
        Category::Channels,
        Category::Roles,
        Category::Store,
        Category::Notices,
        Category::Status,
        Category::Waitlist,
        Category::Blacklist,
        Category::Statsheets,
        Category::Teams,
        Category::Coaches,
        Category::Season,
        Category::Awards,
        Category::Games,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Settings => "settings",
            Self::Channels => "channels",
            Self::Roles => "roles",
            Self::Store => "store",
            Self::Notices => "notices",
            Self::Status => "status",
            Self::Waitlist => "waitlist",
            Self::Blacklist => "blacklist",
            Self::Statsheets => "statsheets",
            Self::Teams => "teams",
            Self::Coaches => "coaches",
            Self::Season => "season",
            Self::Awards => "awards",
            Self::Games => "games",
        }
    }

    /// The value an unset category is stored as.
    pub fn empty_value(&self) -> Value {
        match self {
            Self::Waitlist | Self::Blacklist => Value::Array(Vec::new()),
            _ => Value::Object(Default::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub emoji: String,
    pub division: Option<String>,
    pub elo: Option<String>,
    #[serde(default)]
    pub opponents: Vec<RoleId>,
}

impl Team {
    pub fn new(emoji: impl Into<String>) -> Self {
        Self {
            emoji: emoji.into(),
            division: None,
            elo: None,
            opponents: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statsheet {
    pub url: Option<String>,
    #[serde(default)]
    pub players: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub week: String,
}

impl Default for Season {
    fn default() -> Self {
        Self { week: "1".to_string() }
    }
}

/// What a role is already bound to inside a guild document.
#[derive(Debug, PartialEq)]
pub enum RoleUse<'a> {
    Team(&'a Team),
    Coach(&'a str),
    Setting(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuildData {
    pub id: GuildId,
    pub settings: BTreeMap<String, String>,
    pub channels: BTreeMap<String, ChannelId>,
    pub roles: BTreeMap<String, RoleId>,
    pub store: BTreeMap<String, String>,
    pub notices: BTreeMap<String, bool>,
    pub status: BTreeMap<String, bool>,
    pub waitlist: Vec<UserId>,
    pub blacklist: Vec<UserId>,
    pub statsheets: BTreeMap<String, Statsheet>,
    pub teams: BTreeMap<RoleId, Team>,
    pub coaches: BTreeMap<RoleId, String>,
    pub season: Season,
    pub awards: BTreeMap<String, Value>,
    pub games: BTreeMap<String, Value>,
}

impl GuildData {
    pub fn new(id: GuildId) -> Self {
        let settings = [
            ("roster_cap", "20"),
            ("demand_type", "amount"),
            ("demand_amount", "3"),
            ("demand_wait", "7"),
            ("waitlist_type", "queue"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            id,
            settings,
            channels: BTreeMap::new(),
            roles: BTreeMap::new(),
            store: BTreeMap::new(),
            notices: NOTICES.iter().map(|n| (n.key.to_string(), true)).collect(),
            status: STATUS.iter().map(|s| (s.key.to_string(), true)).collect(),
            waitlist: Vec::new(),
            blacklist: Vec::new(),
            statsheets: STATSHEET_POSITIONS
                .iter()
                .map(|p| (p.to_string(), Statsheet::default()))
                .collect(),
            teams: BTreeMap::new(),
            coaches: BTreeMap::new(),
            season: Season::default(),
            awards: BTreeMap::new(),
            games: BTreeMap::new(),
        }
    }

    /// Builds guild data from a stored document. Missing categories fall back to
    /// their defaults, stored ones are taken as they are.
    pub fn from_document(id: GuildId, doc: &Document) -> Result<Self> {
        fn field<T: DeserializeOwned>(doc: &Document, category: Category, default: T) -> Result<T> {
            match doc.get(category.as_str()) {
                Some(value) => Ok(serde_json::from_value(value.clone())?),
                None => Ok(default),
            }
        }

        let defaults = Self::new(id);
        Ok(Self {
            id,
            settings: field(doc, Category::Settings, defaults.settings)?,
            channels: field(doc, Category::Channels, defaults.channels)?,
            roles: field(doc, Category::Roles, defaults.roles)?,
            store: field(doc, Category::Store, defaults.store)?,
            notices: field(doc, Category::Notices, defaults.notices)?,
            status: field(doc, Category::Status, defaults.status)?,
            waitlist: field(doc, Category::Waitlist, defaults.waitlist)?,
            blacklist: field(doc, Category::Blacklist, defaults.blacklist)?,
            statsheets: field(doc, Category::Statsheets, defaults.statsheets)?,
            teams: field(doc, Category::Teams, defaults.teams)?,
            coaches: field(doc, Category::Coaches, defaults.coaches)?,
            season: field(doc, Category::Season, defaults.season)?,
            awards: field(doc, Category::Awards, defaults.awards)?,
            games: field(doc, Category::Games, defaults.games)?,
        })
    }

    pub fn category_value(&self, category: Category) -> Result<Value> {
        let value = match category {
            Category::Settings => serde_json::to_value(&self.settings)?,
            Category::Channels => serde_json::to_value(&self.channels)?,
            Category::Roles => serde_json::to_value(&self.roles)?,
            Category::Store => serde_json::to_value(&self.store)?,
            Category::Notices => serde_json::to_value(&self.notices)?,
            Category::Status => serde_json::to_value(&self.status)?,
            Category::Waitlist => serde_json::to_value(&self.waitlist)?,
            Category::Blacklist => serde_json::to_value(&self.blacklist)?,
            Category::Statsheets => serde_json::to_value(&self.statsheets)?,
            Category::Teams => serde_json::to_value(&self.teams)?,
            Category::Coaches => serde_json::to_value(&self.coaches)?,
            Category::Season => serde_json::to_value(&self.season)?,
            Category::Awards => serde_json::to_value(&self.awards)?,
            Category::Games => serde_json::to_value(&self.games)?,
        };
        Ok(value)
    }

    pub fn to_document(&self) -> Result<Document> {
        let mut doc = Document::new();
        for category in Category::ALL {
            doc.insert(category.as_str().to_string(), self.category_value(category)?);
        }
        Ok(doc)
    }

    pub fn notice_enabled(&self, event: &str) -> bool {
        self.notices.get(event).copied().unwrap_or(false)
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    pub fn webhook_key(event: &str) -> String {
        format!("{event}_webhook")
    }

    pub fn find_role(&self, role: RoleId) -> Option<RoleUse<'_>> {
        if let Some(team) = self.teams.get(&role) {
            return Some(RoleUse::Team(team));
        }
        if let Some(abbr) = self.coaches.get(&role) {
            return Some(RoleUse::Coach(abbr));
        }
        self.roles
            .iter()
            .find(|(_, id)| **id == role)
            .map(|(key, _)| RoleUse::Setting(key.as_str()))
    }

    /// Drops every binding of `role`, returning the category that changed.
    pub fn remove_unused_role(&mut self, role: RoleId) -> Option<Category> {
        if self.teams.remove(&role).is_some() {
            return Some(Category::Teams);
        }
        if self.coaches.remove(&role).is_some() {
            return Some(Category::Coaches);
        }
        let before = self.roles.len();
        self.roles.retain(|_, id| *id != role);
        (self.roles.len() != before).then_some(Category::Roles)
    }

    /// The live team whose emoji is `emoji_id`, if any.
    pub fn team_with_emoji(&self, emoji_id: &str) -> Option<RoleId> {
        self.teams
            .iter()
            .find(|(_, team)| team.emoji == emoji_id)
            .map(|(role, _)| *role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guild() -> GuildData {
        GuildData::new(GuildId::new(10))
    }

    #[test]
    fn defaults_enable_every_notice_and_status() {
        let guild = guild();
        assert_eq!(guild.notices.len(), 13);
        assert!(guild.notices.values().all(|v| *v));
        assert_eq!(guild.status.len(), 11);
        assert_eq!(guild.setting("roster_cap"), Some("20"));
        assert_eq!(guild.setting("waitlist_type"), Some("queue"));
        assert_eq!(guild.season.week, "1");
        assert_eq!(guild.statsheets.len(), 6);
    }

    #[test]
    fn find_role_prefers_teams_then_coaches_then_settings() {
        let mut guild = guild();
        let role = RoleId::new(5);
        guild.roles.insert("referee".into(), role);
        assert_eq!(guild.find_role(role), Some(RoleUse::Setting("referee")));

        guild.coaches.insert(role, "ABC".into());
        assert_eq!(guild.find_role(role), Some(RoleUse::Coach("ABC")));

        guild.teams.insert(role, Team::new("77"));
        assert!(matches!(guild.find_role(role), Some(RoleUse::Team(t)) if t.emoji == "77"));

        assert_eq!(guild.find_role(RoleId::new(6)), None);
    }

    #[test]
    fn remove_unused_role_removes_one_binding_at_a_time() {
        let mut guild = guild();
        let role = RoleId::new(5);
        guild.teams.insert(role, Team::new("1"));
        guild.roles.insert("streamer".into(), role);

        assert_eq!(guild.remove_unused_role(role), Some(Category::Teams));
        assert!(guild.roles.contains_key("streamer"));
        assert_eq!(guild.remove_unused_role(role), Some(Category::Roles));
        assert!(guild.roles.is_empty());
        assert_eq!(guild.remove_unused_role(role), None);
    }

    #[test]
    fn from_document_keeps_stored_categories_and_defaults_the_rest() {
        let mut doc = Document::new();
        doc.insert("notices".into(), json!({ "appoints": false }));
        doc.insert("teams".into(), json!({ "42": { "emoji": "9", "division": null, "elo": null } }));

        let guild = GuildData::from_document(GuildId::new(1), &doc).unwrap();
        assert_eq!(guild.notices.len(), 1);
        assert!(!guild.notice_enabled("appoints"));
        assert!(!guild.notice_enabled("setting_changes"));
        assert_eq!(guild.teams[&RoleId::new(42)].emoji, "9");
        assert_eq!(guild.setting("demand_amount"), Some("3"));
    }

    #[test]
    fn document_survives_a_store_round() {
        let mut guild = guild();
        guild.channels.insert("notices".into(), ChannelId::new(3));
        guild.coaches.insert(RoleId::new(8), "XYZ".into());
        guild.waitlist.push(UserId::new(4));

        let doc = guild.to_document().unwrap();
        let back = GuildData::from_document(guild.id, &doc).unwrap();
        assert_eq!(back, guild);
    }

    #[test]
    fn unset_lists_are_stored_as_arrays() {
        assert_eq!(Category::Waitlist.empty_value(), json!([]));
        assert_eq!(Category::Teams.empty_value(), json!({}));
    }
}
