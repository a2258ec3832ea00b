use poise::serenity_prelude::{GuildId, UserId};
use std::str::FromStr;

use crate::error::{BotError, Result};

const DEFAULT_DATABASE_URL: &str = "sqlite://peerless.db?mode=rwc";

/// Which bot application to log in as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Main,
    Beta,
    Alpha,
    Support,
}

impl Profile {
    pub fn token_var(&self) -> &'static str {
        match self {
            Self::Main => "MAIN_TOKEN",
            Self::Beta => "BETA_TOKEN",
            Self::Alpha => "ALPHA_TOKEN",
            Self::Support => "SUPPORT_TOKEN",
        }
    }

    pub fn is_testing(&self) -> bool {
        matches!(self, Self::Beta | Self::Alpha)
    }
}

impl FromStr for Profile {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "1" | "main" => Ok(Self::Main),
            "2" | "beta" => Ok(Self::Beta),
            "3" | "alpha" => Ok(Self::Alpha),
            "4" | "support" => Ok(Self::Support),
            other => Err(BotError::Config(format!("unknown bot profile '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub profile: Profile,
    pub fail_to_discord: bool,
    pub fail_webhook: Option<String>,
    pub database_url: String,
    pub home_guild: Option<GuildId>,
    pub test_guild: Option<GuildId>,
    pub owners: Vec<UserId>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let profile = var("BOT_PROFILE").unwrap_or_default().parse::<Profile>()?;
        let token = var(profile.token_var())
            .ok_or_else(|| BotError::Config(format!("{} not set", profile.token_var())))?;

        let fail_to_discord = var("FAIL_TO_DISCORD").is_some_and(|v| parse_flag(&v));
        let fail_webhook = var("FAIL_LOG_WEBHOOK").filter(|v| !v.is_empty());
        if fail_to_discord && fail_webhook.is_none() {
            return Err(BotError::Config(
                "FAIL_LOG_WEBHOOK must be set when FAIL_TO_DISCORD is enabled".to_string(),
            ));
        }

        Ok(Self {
            token,
            profile,
            fail_to_discord,
            fail_webhook,
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            home_guild: parse_id(var("HOME_GUILD_ID"))?.map(GuildId::new),
            test_guild: parse_id(var("TEST_GUILD_ID"))?.map(GuildId::new),
            owners: parse_id_list(&var("OWNER_IDS").unwrap_or_default())
                .into_iter()
                .map(UserId::new)
                .collect(),
        })
    }

    /// The guild owner-only commands are registered in.
    pub fn command_guild(&self) -> Option<GuildId> {
        if self.profile.is_testing() {
            self.test_guild
        } else {
            self.home_guild
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "y" | "yes" | "true" | "1")
}

fn parse_id(value: Option<String>) -> Result<Option<u64>> {
    match value.filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map(Some)
            .ok_or_else(|| BotError::Config(format!("invalid id '{v}'"))),
    }
}

fn parse_id_list(value: &str) -> Vec<u64> {
    value
        .split(',')
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .filter(|id| *id != 0)
        .collect()
}
