use poise::serenity_prelude::{self as serenity, ChannelId, RoleId};
use thiserror::Error;

/// Named permission gates that can reject a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Operator,
}

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Discord API error: {0}")]
    Discord(#[from] Box<serenity::Error>),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{kind} {id} already exists")]
    DuplicateDocument { kind: &'static str, id: String },

    #[error("Role {0} is above the bot's highest role")]
    RoleNotAssignable(RoleId),

    #[error("Role {0} is managed")]
    RoleIsManaged(RoleId),

    #[error("No {key} available (see /{command})")]
    NotEnough { key: &'static str, command: &'static str },

    #[error("Check failed: {0:?}")]
    CheckFailure(Check),

    #[error("Missing permissions: {}", permissions.join(", "))]
    BotMissingPermissions {
        permissions: Vec<String>,
        channel: Option<ChannelId>,
    },
}

impl From<serenity::Error> for BotError {
    fn from(err: serenity::Error) -> Self {
        BotError::Discord(Box::new(err))
    }
}

/// HTTP status of a failed Discord request, if it is one.
pub fn discord_status(err: &serenity::Error) -> Option<u16> {
    match err {
        serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response)) => {
            Some(response.status_code.as_u16())
        }
        _ => None,
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
