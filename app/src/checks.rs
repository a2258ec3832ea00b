//! Gates run before commands and helpers for judging roles and permissions.

use poise::serenity_prelude::{
    self as serenity, ChannelId, ChunkGuildFilter, GuildId, Member, Permissions, Role, RoleId,
};
use poise::CreateReply;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{BotError, Check, Result};
use crate::reply::fail;
use crate::Context;

const PRELOAD_TIMEOUT: Duration = Duration::from_secs(2);

pub const NOT_LOADED: &str = "This server has not been loaded! Please give me some time to load it.";

pub fn bot_permissions_in(ctx: &serenity::Context, guild_id: GuildId, channel: ChannelId) -> Option<Permissions> {
    let me = ctx.cache.current_user().id;
    let guild = ctx.cache.guild(guild_id)?;
    let channel = guild.channels.get(&channel)?;
    let member = guild.members.get(&me)?;
    Some(guild.user_permissions_in(channel, member))
}

/// Roles owned by Discord, a bot or an integration can never be handed out.
pub fn is_managed(role: &Role) -> bool {
    if role.managed || role.id.get() == role.guild_id.get() {
        return true;
    }
    let tags = &role.tags;
    tags.bot_id.is_some()
        || tags.premium_subscriber
        || tags.integration_id.is_some()
        || tags.available_for_purchase
        || tags.guild_connections
}

/// Whether the bot sits above `role` and can therefore assign it.
pub fn is_assignable(ctx: &serenity::Context, guild_id: GuildId, role: RoleId) -> bool {
    let me = ctx.cache.current_user().id;
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return false;
    };
    let (Some(role), Some(member)) = (guild.roles.get(&role), guild.members.get(&me)) else {
        return false;
    };
    if is_managed(role) {
        return false;
    }
    guild
        .member_highest_role(member)
        .is_some_and(|top| top.position > role.position)
}

pub fn cached_role(ctx: &serenity::Context, guild_id: GuildId, role: RoleId) -> Option<Role> {
    ctx.cache.guild(guild_id)?.roles.get(&role).cloned()
}

/// Rejects a role for a new binding when it is managed or above the bot.
pub fn ensure_assignable(ctx: &serenity::Context, guild_id: GuildId, role: &Role) -> Result<()> {
    if is_managed(role) {
        return Err(BotError::RoleIsManaged(role.id));
    }
    if !is_assignable(ctx, guild_id, role.id) {
        return Err(BotError::RoleNotAssignable(role.id));
    }
    Ok(())
}

fn is_admin(ctx: Context<'_>, guild_id: GuildId, member: &Member) -> bool {
    if let Some(perms) = member.permissions {
        return perms.administrator();
    }
    ctx.cache()
        .guild(guild_id)
        .is_some_and(|guild| guild.member_permissions(member).administrator())
}

/// Administrators or holders of the configured operator role.
pub async fn operator(ctx: Context<'_>) -> Result<bool> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(false);
    };
    let Some(member) = ctx.author_member().await else {
        return Err(BotError::CheckFailure(Check::Operator));
    };
    if is_admin(ctx, guild_id, &member) {
        return Ok(true);
    }

    let guild = ctx.data().db.get_or_create_guild(guild_id).await?;
    match guild.roles.get("operator") {
        Some(role) if member.roles.contains(role) => Ok(true),
        _ => Err(BotError::CheckFailure(Check::Operator)),
    }
}

fn is_chunked(ctx: &serenity::Context, guild_id: GuildId) -> bool {
    ctx.cache
        .guild(guild_id)
        .map_or(true, |guild| guild.members.len() as u64 >= guild.member_count)
}

/// Runs before every command: makes sure the guild's members are cached and
/// the documents the command will need exist.
pub async fn command_check(ctx: Context<'_>) -> Result<bool> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(true);
    };
    let data = ctx.data();
    let not_loaded = fail(NOT_LOADED);

    if data.chunking_guilds.lock().contains(&guild_id) {
        ctx.send(CreateReply::default().content(not_loaded).ephemeral(true)).await?;
        return Ok(false);
    }

    if !is_chunked(ctx.serenity_context(), guild_id) {
        debug!("Chunking guild {}", guild_id);
        data.chunking_guilds.lock().insert(guild_id);
        ctx.serenity_context()
            .shard
            .chunk_guild(guild_id, None, false, ChunkGuildFilter::None, None);
        ctx.send(CreateReply::default().content(not_loaded).ephemeral(true)).await?;
        return Ok(false);
    }

    match tokio::time::timeout(PRELOAD_TIMEOUT, preload(ctx, guild_id)).await {
        Ok(result) => result?,
        Err(_) => {
            warn!("Preparing /{} timed out in guild {}", ctx.command().qualified_name, guild_id);
            let retry = match data.command_mention(&ctx.command().qualified_name) {
                Some(mention) => format!("Click here to try again -> {mention}"),
                None => "Please try again".to_string(),
            };
            ctx.send(
                CreateReply::default()
                    .content(fail(format!("Preparing the command took too long. {retry}.")))
                    .ephemeral(true),
            )
            .await?;
            return Ok(false);
        }
    }

    Ok(true)
}

/// Creates the guild document and the membership entries of the author and
/// every member the command mentions.
async fn preload(ctx: Context<'_>, guild_id: GuildId) -> Result<()> {
    let db = &ctx.data().db;
    let guild = db.get_or_create_guild(guild_id).await?;

    let mut users = vec![ctx.author().id];
    if let poise::Context::Application(app) = ctx {
        let resolved = &app.interaction.data.resolved;
        users.extend(
            resolved
                .members
                .keys()
                .filter(|id| !resolved.users.get(id).is_some_and(|u| u.bot))
                .copied(),
        );
    }

    for user_id in users {
        let mut user = db.get_or_create_user(user_id).await?;
        if !user.guilds.contains_key(&guild_id) {
            db.user_guilds_append(&mut user, &guild).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use poise::serenity_prelude::{IntegrationId, UserId};

    fn role(id: u64) -> Role {
        serde_json::from_value(serde_json::json!({
            "id": id.to_string(),
            "guild_id": "1",
            "color": 0,
            "hoist": false,
            "managed": false,
            "mentionable": false,
            "name": "r",
            "permissions": "0",
            "position": 1,
            "tags": {},
            "icon": null,
            "unicode_emoji": null,
            "flags": 0
        }))
        .unwrap()
    }

    #[test]
    fn plain_roles_are_not_managed() {
        assert!(!is_managed(&role(5)));
    }

    #[test]
    fn everyone_and_integration_roles_are_managed() {
        assert!(is_managed(&role(1)));

        let mut managed = role(5);
        managed.managed = true;
        assert!(is_managed(&managed));

        let mut bot = role(5);
        bot.tags.bot_id = Some(UserId::new(9));
        assert!(is_managed(&bot));

        let mut integration = role(5);
        integration.tags.integration_id = Some(IntegrationId::new(9));
        assert!(is_managed(&integration));
    }

    #[test]
    fn booster_shop_and_linked_roles_are_managed() {
        let mut booster = role(5);
        booster.tags.premium_subscriber = true;
        assert!(is_managed(&booster));

        let mut shop = role(5);
        shop.tags.available_for_purchase = true;
        assert!(is_managed(&shop));

        let mut linked = role(5);
        linked.tags.guild_connections = true;
        assert!(is_managed(&linked));
    }
}
