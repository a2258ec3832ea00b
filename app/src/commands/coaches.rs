use poise::serenity_prelude::{self as serenity, CreateEmbed, RoleId, Timestamp};
use poise::CreateReply;
use tracing::info;

use super::{announce, claim_role, reject, role_colour};
use crate::checks::{ensure_assignable, operator};
use crate::embeds::{split_embed_text, EmbedText};
use crate::error::Result;
use crate::models::guild::MAX_COACHES;
use crate::models::{colors, Category};
use crate::notices::Notice;
use crate::Context;

const MAX_ABBREVIATION: usize = 10;

/// Trims and uppercases a team abbreviation.
pub fn normalize_abbreviation(input: &str) -> std::result::Result<String, String> {
    let abbr = input.trim().to_uppercase();
    if abbr.is_empty() {
        return Err("The abbreviation can not be empty".to_string());
    }
    if abbr.chars().count() > MAX_ABBREVIATION {
        return Err(format!(
            "The abbreviation can not be longer than {MAX_ABBREVIATION} characters"
        ));
    }
    Ok(abbr)
}

pub fn coach_lines(coaches: &[(RoleId, String)]) -> String {
    if coaches.is_empty() {
        return "*no coaches available*".to_string();
    }
    coaches
        .iter()
        .map(|(role, abbr)| format!("`{abbr}` | <@&{role}>\n"))
        .collect()
}

#[poise::command(slash_command, guild_only, subcommands("view", "add", "remove"), subcommand_required)]
pub async fn coaches(_ctx: Context<'_>) -> Result<()> {
    Ok(())
}

/// view the coach roles
#[poise::command(
    slash_command,
    guild_only,
    check = "operator",
    required_bot_permissions = "VIEW_CHANNEL | EMBED_LINKS | ATTACH_FILES"
)]
pub async fn view(ctx: Context<'_>) -> Result<()> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let data = ctx.data();
    let mut guild = data.db.get_or_create_guild(guild_id).await?;

    let mut live = Vec::new();
    let mut vanished = Vec::new();
    if let Some(cached) = ctx.cache().guild(guild_id) {
        for (role_id, abbr) in &guild.coaches {
            match cached.roles.get(role_id) {
                Some(role) => live.push((role.position, *role_id, abbr.clone())),
                None => vanished.push(*role_id),
            }
        }
    }
    if !vanished.is_empty() {
        guild.coaches.retain(|role, _| !vanished.contains(role));
        data.db.update_guild(&guild, Category::Coaches, false).await?;
        info!("Dropped {} vanished coach roles in guild {}", vanished.len(), guild_id);
    }
    live.sort_by(|a, b| b.0.cmp(&a.0));
    let coaches: Vec<(RoleId, String)> = live.into_iter().map(|(_, r, a)| (r, a)).collect();

    let mention = |name: &str| {
        data.command_mention(name)
            .unwrap_or_else(|| format!("**/{name}**"))
    };
    let description = format!(
        "`  adding:` {}\n`removing:` {}",
        mention("coaches add"),
        mention("coaches remove")
    );
    let text = split_embed_text(
        EmbedText::new(description).field("Current Coaches", coach_lines(&coaches), true),
        "\n",
    );
    let embed = text.apply(
        CreateEmbed::new()
            .title("Coaches")
            .colour(colors::BLANK)
            .timestamp(Timestamp::now()),
    );
    ctx.send(CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// pair a coach role with a team abbreviation
#[poise::command(
    slash_command,
    guild_only,
    check = "operator",
    required_bot_permissions = "VIEW_CHANNEL | EMBED_LINKS | ATTACH_FILES"
)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "the coach role"] role: serenity::Role,
    #[description = "the abbreviation of the team"] abbreviation: String,
) -> Result<()> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let sctx = ctx.serenity_context();
    let db = &ctx.data().db;
    let mut guild = db.get_or_create_guild(guild_id).await?;

    if guild.coaches.len() >= MAX_COACHES {
        return reject(ctx, format!("You have reached the maximum amount of coaches ({MAX_COACHES})")).await;
    }

    let abbr = match normalize_abbreviation(&abbreviation) {
        Ok(abbr) => abbr,
        Err(reason) => return reject(ctx, reason).await,
    };

    if let Some(message) = claim_role(sctx, db, &mut guild, role.id).await? {
        return reject(ctx, message).await;
    }

    ensure_assignable(sctx, guild_id, &role)?;

    if guild.coaches.values().any(|a| *a == abbr) {
        return reject(ctx, format!("The `{abbr}` abbreviation is already in use")).await;
    }

    guild.coaches.insert(role.id, abbr.clone());
    db.update_guild(&guild, Category::Coaches, false).await?;
    info!("Coach role {} added in guild {}", role.id, guild_id);

    ctx.send(
        CreateReply::default().embed(
            CreateEmbed::new()
                .description(format!("**<@&{}> now coaches `{abbr}`**", role.id))
                .colour(role_colour(&role)),
        ),
    )
    .await?;

    let notice = Notice::new(
        format!(
            "*Setting Changed*\n### Coach Added\n- `role:` <@&{}>\n- `team:` `{abbr}`",
            role.id
        ),
        colors::ORANGE,
    );
    announce(ctx, "setting_changes", notice).await
}

/// unpair a coach role
#[poise::command(
    slash_command,
    guild_only,
    check = "operator",
    required_bot_permissions = "VIEW_CHANNEL | EMBED_LINKS | ATTACH_FILES"
)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "the coach role to unpair"] role: serenity::Role,
) -> Result<()> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let db = &ctx.data().db;
    let mut guild = db.get_or_create_guild(guild_id).await?;

    let Some(abbr) = guild.coaches.remove(&role.id) else {
        return reject(ctx, "That role is already not a coach role").await;
    };
    db.update_guild(&guild, Category::Coaches, false).await?;
    info!("Coach role {} removed in guild {}", role.id, guild_id);

    ctx.send(
        CreateReply::default().embed(
            CreateEmbed::new()
                .description(format!("**removed <@&{}> from the `{abbr}` coaches**", role.id))
                .colour(role_colour(&role)),
        ),
    )
    .await?;

    let notice = Notice::new(
        format!("*Setting Changed*\n### Coach Removed\n- `role:` <@&{}>\n- `team:` `{abbr}`", role.id),
        colors::ORANGE,
    );
    announce(ctx, "setting_changes", notice).await
}
