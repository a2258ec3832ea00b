use async_trait::async_trait;
use poise::serenity_prelude::{
    self as serenity, Channel, ChannelId, ChannelType, CreateAttachment,
    CreateInteractionResponseFollowup, CreateWebhook, ExecuteWebhook, GuildId, Webhook,
};
use tracing::{error, warn};

use super::{DeliveryError, Notice, NoticeGateway, WebhookCredentials};
use crate::checks::bot_permissions_in;
use crate::error::{discord_status, BotError, Result};
use crate::reply::Responder;

const WEBHOOK_NAME: &str = "Peerless Notices";

/// Notice delivery on behalf of one interaction.
pub struct SerenityGateway {
    ctx: serenity::Context,
    guild_id: GuildId,
    responder: Responder,
}

impl SerenityGateway {
    pub fn new(ctx: &serenity::Context, guild_id: GuildId, responder: Responder) -> Self {
        Self {
            ctx: ctx.clone(),
            guild_id,
            responder,
        }
    }
}

/// Pulls `(id, token)` out of `https://discord.com/api/webhooks/{id}/{token}`.
fn credentials_from_url(url: &str) -> Option<WebhookCredentials> {
    let mut parts = url.trim_end_matches('/').rsplitn(3, '/');
    let token = parts.next()?;
    let id = parts.next()?;
    WebhookCredentials::parse(&format!("{id}:{token}"))
}

fn delivery_error(err: serenity::Error) -> DeliveryError {
    match discord_status(&err) {
        Some(404) => DeliveryError::NotFound,
        Some(403) => DeliveryError::Forbidden,
        _ => DeliveryError::Other(err.to_string()),
    }
}

#[async_trait]
impl NoticeGateway for SerenityGateway {
    async fn is_text_channel(&self, channel: ChannelId) -> bool {
        let cached = self
            .ctx
            .cache
            .guild(self.guild_id)
            .and_then(|guild| guild.channels.get(&channel).map(|c| c.kind));

        let kind = match cached {
            Some(kind) => Some(kind),
            None => match channel.to_channel(&self.ctx).await {
                Ok(Channel::Guild(c)) if c.guild_id == self.guild_id => Some(c.kind),
                _ => None,
            },
        };
        kind == Some(ChannelType::Text)
    }

    async fn can_manage_webhooks(&self, channel: ChannelId) -> bool {
        bot_permissions_in(&self.ctx, self.guild_id, channel)
            .is_some_and(|perms| perms.manage_webhooks())
    }

    async fn create_webhook(&self, channel: ChannelId) -> Result<WebhookCredentials> {
        let face = self.ctx.cache.current_user().face();
        let avatar = match CreateAttachment::url(&self.ctx.http, &face).await {
            Ok(avatar) => Some(avatar),
            Err(e) => {
                warn!("Could not fetch the bot avatar for a notice webhook: {}", e);
                None
            }
        };

        let mut builder = CreateWebhook::new(WEBHOOK_NAME).audit_log_reason("used for notices");
        if let Some(avatar) = &avatar {
            builder = builder.avatar(avatar);
        }

        let webhook = channel.create_webhook(&self.ctx, builder).await?;
        let url = webhook.url()?;
        credentials_from_url(&url)
            .ok_or_else(|| BotError::Config(format!("unexpected webhook url for {}", webhook.id)))
    }

    async fn execute(&self, webhook: &WebhookCredentials, notice: &Notice) -> std::result::Result<(), DeliveryError> {
        let hook = Webhook::from_id_with_token(&self.ctx.http, webhook.id, &webhook.token)
            .await
            .map_err(delivery_error)?;
        hook.execute(&self.ctx, false, ExecuteWebhook::new().embed(notice.embed()))
            .await
            .map_err(delivery_error)?;
        Ok(())
    }

    async fn warn(&self, message: String) {
        let builder = CreateInteractionResponseFollowup::new().content(message);
        if let Err(e) = self.responder.followup(&self.ctx, builder).await {
            error!("Failed to warn about a notice in guild {}: {}", self.guild_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poise::serenity_prelude::WebhookId;

    #[test]
    fn credentials_come_from_the_webhook_url() {
        let creds = credentials_from_url("https://discord.com/api/v10/webhooks/123/abc-DEF").unwrap();
        assert_eq!(creds.id, WebhookId::new(123));
        assert_eq!(creds.token, "abc-DEF");
        assert!(credentials_from_url("https://discord.com/api/webhooks/").is_none());
    }
}
