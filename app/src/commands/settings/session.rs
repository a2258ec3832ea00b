use poise::serenity_prelude::{
    self as serenity, ComponentInteraction, CreateInteractionResponse, CreateInteractionResponseMessage,
    EditInteractionResponse, GuildId, Message, User,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::commands::errors::{feedback, report_failure};
use crate::error::{BotError, Result};
use crate::models::GuildData;
use crate::notices::{Notice, NoticeRouter, SerenityGateway};
use crate::reply::{fail, Responder};
use crate::Data;

pub const EXPIRED: &str = "**this message has expired**";

/// Everything a settings view needs once it outlives the command invocation.
#[derive(Clone)]
pub struct Session {
    pub ctx: serenity::Context,
    pub data: Data,
    pub guild_id: GuildId,
    pub author: User,
}

impl Session {
    pub async fn guild(&self) -> Result<GuildData> {
        self.data.db.get_or_create_guild(self.guild_id).await
    }

    /// The next interaction with `message` by the invoking user. Anyone else
    /// is turned away.
    pub async fn next(&self, message: &Message, timeout: Duration) -> Option<ComponentInteraction> {
        loop {
            let interaction = message
                .await_component_interaction(&self.ctx.shard)
                .timeout(timeout)
                .await?;
            if interaction.user.id == self.author.id {
                return Some(interaction);
            }

            let reply = CreateInteractionResponseMessage::new()
                .content(fail("You don't have permission to do that"))
                .ephemeral(true);
            if let Err(e) = interaction
                .create_response(&self.ctx, CreateInteractionResponse::Message(reply))
                .await
            {
                warn!("Failed to turn away {}: {}", interaction.user.id, e);
            }
        }
    }

    /// Marks the message owned by `owner` as expired and drops its components.
    pub async fn expire(&self, owner: &Responder) {
        let builder = EditInteractionResponse::new()
            .content(EXPIRED)
            .components(Vec::new());
        if let Err(e) = owner.edit(&self.ctx, builder).await {
            debug!("Could not expire a settings view: {}", e);
        }
    }

    pub async fn reject(&self, interaction: &ComponentInteraction, message: impl AsRef<str>) -> Result<()> {
        let reply = CreateInteractionResponseMessage::new()
            .content(fail(message))
            .ephemeral(true);
        interaction
            .create_response(&self.ctx, CreateInteractionResponse::Message(reply))
            .await?;
        Ok(())
    }

    /// Tells the user about `err` through `responder`, or reports it.
    pub async fn fail(&self, responder: &Responder, err: BotError) {
        match feedback(&self.ctx, &self.data, Some(self.guild_id), &err).await {
            Some(reply) => {
                if let Err(e) = responder.reply(&self.ctx, reply).await {
                    warn!("Failed to tell the user about an error: {}", e);
                }
            }
            None => report_failure(&self.data.config, "/settings", &err).await,
        }
    }

    pub fn operator_field(&self) -> String {
        format!("- <@{}> `{}`", self.author.id, self.author.name)
    }

    /// Sends a settings notice for `event` on behalf of `responder`.
    pub async fn announce(&self, responder: Responder, event: &str, notice: Notice) -> Result<()> {
        let gateway = SerenityGateway::new(&self.ctx, self.guild_id, responder);
        NoticeRouter::new(&self.data.db, &gateway)
            .announce(self.guild_id, event, &notice)
            .await?;
        Ok(())
    }

    /// Runs a view in the background. Errors it returns are answered through
    /// `owner`.
    pub fn spawn<F>(&self, owner: Responder, view: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let session = self.clone();
        tokio::spawn(async move {
            if let Err(e) = view.await {
                session.fail(&owner, e).await;
            }
        });
    }
}

/// The first value of a string select.
pub fn selected(interaction: &ComponentInteraction) -> Option<&str> {
    match &interaction.data.kind {
        serenity::ComponentInteractionDataKind::StringSelect { values } => {
            values.first().map(String::as_str)
        }
        _ => None,
    }
}
