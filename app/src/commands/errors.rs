use chrono::Utc;
use poise::serenity_prelude::{self as serenity, CreateEmbed, GuildId};
use poise::{CreateReply, FrameworkError};
use reqwest::multipart::{Form, Part};
use tracing::{error, warn};

use crate::config::Config;
use crate::error::{BotError, Check};
use crate::models::colors;
use crate::reply::fail;
use crate::{Context, Data};

/// Above this a failure report is sent as an attachment.
const INLINE_REPORT_LIMIT: usize = 1700;

/// The reply a user gets for an error they can act on. `None` means the
/// error is ours and should be reported instead.
pub async fn feedback(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: Option<GuildId>,
    err: &BotError,
) -> Option<CreateReply> {
    let reply = CreateReply::default().ephemeral(true);
    let reply = match err {
        BotError::RoleNotAssignable(role) => {
            let me = ctx.cache.current_user().id;
            let self_role = guild_id
                .and_then(|id| ctx.cache.guild(id))
                .and_then(|guild| {
                    guild
                        .roles
                        .values()
                        .find(|r| r.tags.bot_id == Some(me))
                        .map(|r| format!("<@&{}>", r.id))
                })
                .unwrap_or_else(|| format!("<@{me}>"));
            reply.content(fail(format!(
                "I can't assign that role! Please drag {self_role} above <@&{role}>"
            )))
        }
        BotError::RoleIsManaged(_) => reply.content(fail(
            "That role is already managed by a bot, this server, discord, or an external application",
        )),
        BotError::NotEnough { key, command } => {
            let mention = data
                .command_mention(command)
                .unwrap_or_else(|| format!("the command -> `/{command}`"));
            reply.content(fail(format!(
                "There is no {key} available. In order to add more {key}, run {mention}"
            )))
        }
        BotError::BotMissingPermissions { permissions, channel } => {
            let description = match channel {
                Some(channel) => format!(
                    "i need the following permissions in the channel, <#{channel}>: **{}**",
                    permissions.join(", ")
                ),
                None => format!(
                    "i need the following permissions to run this command: **{}**",
                    permissions.join(", ")
                ),
            };
            reply.ephemeral(channel.is_some()).embed(
                CreateEmbed::new()
                    .title("Missing Permissions")
                    .description(description)
                    .colour(colors::RED),
            )
        }
        BotError::CheckFailure(Check::Operator) => {
            let operator = match guild_id {
                Some(id) => operator_mention(ctx, data, id).await,
                None => None,
            };
            reply.content(fail(format!(
                "You need to have the administrator permission or have the operator role ({})",
                operator.as_deref().unwrap_or("not setup")
            )))
        }
        _ => return None,
    };
    Some(reply)
}

async fn operator_mention(ctx: &serenity::Context, data: &Data, guild_id: GuildId) -> Option<String> {
    let guild = data.db.get_guild(guild_id, false).await.ok()??;
    let role = *guild.roles.get("operator")?;
    let exists = ctx
        .cache
        .guild(guild_id)
        .is_some_and(|g| g.roles.contains_key(&role));
    exists.then(|| format!("<@&{role}>"))
}

#[derive(Debug, PartialEq)]
enum Report {
    Inline(String),
    Attachment { content: String, text: String },
}

fn failure_report(timestamp: i64, text: String) -> Report {
    let stamp = format!("<t:{timestamp}:f>");
    if text.len() > INLINE_REPORT_LIMIT {
        Report::Attachment { content: stamp, text }
    } else {
        Report::Inline(format!("{stamp}\n\n```rust\n{text}```"))
    }
}

/// Sends an unexpected error to the failure webhook, or logs it when
/// reporting is off.
pub async fn report_failure(config: &Config, context: &str, err: &BotError) {
    let text = format!("{context}\n{err:?}");
    let Some(url) = config.fail_webhook.as_deref().filter(|_| config.fail_to_discord) else {
        error!("{}: {:?}", context, err);
        return;
    };

    if let Err(e) = post_report(url, text).await {
        error!("Failed to report an error to discord ({}): {:?}", e, err);
    }
}

async fn post_report(url: &str, text: String) -> crate::error::Result<()> {
    let client = reqwest::Client::new();
    let request = match failure_report(Utc::now().timestamp(), text) {
        Report::Inline(content) => client.post(url).json(&serde_json::json!({ "content": content })),
        Report::Attachment { content, text } => client.post(url).multipart(
            Form::new()
                .text("content", content)
                .part("files[0]", Part::text(text).file_name("error.txt")),
        ),
    };
    request.send().await?.error_for_status()?;
    Ok(())
}

/// Answers a failed command the way its error calls for.
async fn handle(ctx: Context<'_>, err: BotError) {
    match feedback(ctx.serenity_context(), ctx.data(), ctx.guild_id(), &err).await {
        Some(reply) => {
            if let Err(e) = ctx.send(reply).await {
                warn!("Failed to tell the user about an error: {}", e);
            }
        }
        None => {
            let context = format!("/{}", ctx.command().qualified_name);
            report_failure(&ctx.data().config, &context, &err).await;
        }
    }
}

pub async fn on_error(error: FrameworkError<'_, Data, BotError>) {
    match error {
        FrameworkError::Setup { error, .. } => {
            error!("Failed to set up the framework: {:?}", error);
        }
        FrameworkError::Command { error, ctx, .. } => handle(ctx, error).await,
        FrameworkError::CommandCheckFailed { error: Some(error), ctx, .. } => handle(ctx, error).await,
        FrameworkError::CommandCheckFailed { error: None, .. } => {}
        FrameworkError::MissingBotPermissions { missing_permissions, ctx, .. } => {
            let err = BotError::BotMissingPermissions {
                permissions: missing_permissions
                    .get_permission_names()
                    .into_iter()
                    .map(|p| p.to_lowercase())
                    .collect(),
                channel: None,
            };
            handle(ctx, err).await;
        }
        FrameworkError::NotAnOwner { ctx, .. } => {
            let reply = CreateReply::default()
                .content(fail("Only the bot owners can use this command"))
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                warn!("Failed to reject a non-owner: {}", e);
            }
        }
        FrameworkError::EventHandler { error, event, framework, .. } => {
            let context = format!("event {}", event.snake_case_name());
            report_failure(&framework.user_data.config, &context, &error).await;
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_failures_are_inlined() {
        let report = failure_report(10, "boom".to_string());
        assert_eq!(report, Report::Inline("<t:10:f>\n\n```rust\nboom```".to_string()));
    }

    #[test]
    fn long_failures_become_attachments() {
        let text = "x".repeat(INLINE_REPORT_LIMIT + 1);
        match failure_report(10, text.clone()) {
            Report::Attachment { content, text: attached } => {
                assert_eq!(content, "<t:10:f>");
                assert_eq!(attached, text);
            }
            other => panic!("expected an attachment, got {other:?}"),
        }
    }
}
