use chrono::{DateTime, Utc};
use poise::serenity_prelude::{GuildId, RoleId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Document;
use crate::error::Result;

pub const GUILDS: &str = "guilds";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suspension {
    pub suspended_until: Option<DateTime<Utc>>,
    pub banned_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub role_id: Option<RoleId>,
    pub terms: Option<String>,
}

/// A user's standing inside one guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildMembership {
    pub demands_remaining: String,
    pub demands_wait_time: DateTime<Utc>,
    #[serde(default)]
    pub suspension: Suspension,
    #[serde(default)]
    pub contract: Contract,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserData {
    pub id: UserId,
    pub guilds: BTreeMap<GuildId, GuildMembership>,
}

impl UserData {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            guilds: BTreeMap::new(),
        }
    }

    pub fn from_document(id: UserId, doc: &Document) -> Result<Self> {
        let guilds = match doc.get(GUILDS) {
            Some(value) => serde_json::from_value(value.clone())?,
            None => BTreeMap::new(),
        };
        Ok(Self { id, guilds })
    }

    pub fn guilds_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.guilds)?)
    }

    pub fn to_document(&self) -> Result<Document> {
        let mut doc = Document::new();
        doc.insert(GUILDS.to_string(), self.guilds_value()?);
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_defaults_missing_nested_sections() {
        let mut doc = Document::new();
        doc.insert(
            GUILDS.into(),
            serde_json::json!({
                "7": { "demands_remaining": "3", "demands_wait_time": "2024-01-01T00:00:00Z" }
            }),
        );

        let user = UserData::from_document(UserId::new(1), &doc).unwrap();
        let membership = &user.guilds[&GuildId::new(7)];
        assert_eq!(membership.demands_remaining, "3");
        assert_eq!(membership.suspension, Suspension::default());
        assert_eq!(membership.contract.role_id, None);
    }
}
