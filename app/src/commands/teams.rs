use poise::serenity_prelude::{self as serenity, CreateEmbed, EmojiId, GuildId, RoleId, Timestamp};
use poise::CreateReply;
use tracing::info;
use unicode_normalization::UnicodeNormalization;

use super::{announce, claim_role, guild_emoji, live_teams, reject, role_colour};
use crate::checks::{ensure_assignable, operator, NOT_LOADED};
use crate::embeds::{split_embed_text, EmbedText};
use crate::error::Result;
use crate::models::guild::MAX_TEAMS;
use crate::models::{colors, Category, GuildData, Team};
use crate::notices::Notice;
use crate::Context;

/// Loose name comparison: decomposed, accents and other non-ASCII dropped,
/// case-insensitive.
fn fold(name: &str) -> String {
    name.nfkd().filter(char::is_ascii).collect::<String>().to_lowercase()
}

/// Finds an emoji by `<:name:id>` or by name.
pub fn find_emoji(emojis: &[(EmojiId, String)], input: &str) -> Option<EmojiId> {
    let input = input.trim();
    let parts: Vec<&str> = input.split(':').collect();
    let name = if parts.len() == 3 {
        let digits: String = parts[2].chars().filter(char::is_ascii_digit).collect();
        if let Some(id) = digits.parse::<u64>().ok().filter(|id| *id != 0) {
            return emojis.iter().find(|(e, _)| e.get() == id).map(|(e, _)| *e);
        }
        parts[1]
    } else {
        input
    };

    let wanted = fold(name);
    emojis
        .iter()
        .find(|(_, n)| fold(n) == wanted)
        .map(|(id, _)| *id)
}

/// Numbered team lines, the index right-aligned.
pub fn team_lines(teams: &[(RoleId, String)]) -> String {
    if teams.is_empty() {
        return "*no teams available*".to_string();
    }
    let width = (teams.len() + 1).to_string().len();
    teams
        .iter()
        .enumerate()
        .map(|(i, (role, emoji))| format!("`{:>width$}` | {emoji} <@&{role}>\n", i + 1))
        .collect()
}

/// The live teams and vanished team roles of a cached guild.
fn resolve_teams(
    ctx: &serenity::Context,
    guild_id: GuildId,
    guild: &GuildData,
) -> Option<(Vec<(RoleId, String)>, Vec<RoleId>)> {
    let cached = ctx.cache.guild(guild_id)?;
    let teams = live_teams(
        &guild.teams,
        |role| cached.roles.get(&role).map(|r| r.position),
        |emoji| {
            let id = emoji.parse::<u64>().ok().filter(|id| *id != 0)?;
            cached.emojis.get(&EmojiId::new(id)).map(|e| e.to_string())
        },
    );
    Some(teams)
}

fn cached_emojis(ctx: &serenity::Context, guild_id: GuildId) -> Vec<(EmojiId, String)> {
    ctx.cache
        .guild(guild_id)
        .map(|g| g.emojis.values().map(|e| (e.id, e.name.clone())).collect())
        .unwrap_or_default()
}

fn role_exists(ctx: &serenity::Context, guild_id: GuildId, role: RoleId) -> bool {
    ctx.cache
        .guild(guild_id)
        .is_some_and(|g| g.roles.contains_key(&role))
}

#[poise::command(slash_command, guild_only, subcommands("view", "add", "remove"), subcommand_required)]
pub async fn teams(_ctx: Context<'_>) -> Result<()> {
    Ok(())
}

/// view the teams
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

    let mention = |name: &str| {
        data.command_mention(name)
            .unwrap_or_else(|| format!("**/{name}**"))
    };
    let description = format!(
        "`  adding:` {} or {}\n`removing:` {}",
        mention("teams add"),
        mention("setup"),
        mention("teams remove")
    );

    let Some((teams, vanished)) = resolve_teams(ctx.serenity_context(), guild_id, &guild) else {
        return reject(ctx, NOT_LOADED).await;
    };
    if !vanished.is_empty() {
        guild.teams.retain(|role, _| !vanished.contains(role));
        data.db.update_guild(&guild, Category::Teams, false).await?;
        info!("Dropped {} vanished teams in guild {}", vanished.len(), guild_id);
    }

    let text = split_embed_text(
        EmbedText::new(description).field("Current Teams", team_lines(&teams), true),
        "\n",
    );
    let embed = text.apply(
        CreateEmbed::new()
            .title("Teams")
            .colour(colors::BLANK)
            .timestamp(Timestamp::now()),
    );
    ctx.send(CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// add a team & emoji pair
#[poise::command(
    slash_command,
    guild_only,
    check = "operator",
    required_bot_permissions = "VIEW_CHANNEL | EMBED_LINKS | ATTACH_FILES"
)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "the role to pair with the team"] role: serenity::Role,
    #[description = "the emoji to pair with the team"] emoji: String,
) -> Result<()> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let sctx = ctx.serenity_context();
    let db = &ctx.data().db;
    let mut guild = db.get_or_create_guild(guild_id).await?;

    if guild.teams.len() >= MAX_TEAMS {
        return reject(ctx, format!("You have reached the maximum amount of teams ({MAX_TEAMS})")).await;
    }

    if let Some(message) = claim_role(sctx, db, &mut guild, role.id).await? {
        return reject(ctx, message).await;
    }

    ensure_assignable(sctx, guild_id, &role)?;

    let found = find_emoji(&cached_emojis(sctx, guild_id), &emoji)
        .and_then(|id| guild_emoji(sctx, guild_id, &id.to_string()));
    let Some(emoji) = found else {
        return reject(ctx, "I could not find that emoji in this server").await;
    };

    if let Some(paired) = guild.team_with_emoji(&emoji.id.to_string()) {
        if role_exists(sctx, guild_id, paired) {
            return reject(ctx, format!("That emoji is already paired with the {emoji} <@&{paired}>")).await;
        }
        guild.remove_unused_role(paired);
        db.update_guild(&guild, Category::Teams, false).await?;
    }

    guild.teams.insert(role.id, Team::new(emoji.id.to_string()));
    db.update_guild(&guild, Category::Teams, false).await?;
    info!("Team {} added in guild {}", role.id, guild_id);

    ctx.send(
        CreateReply::default().embed(
            CreateEmbed::new()
                .description(format!("**{emoji} <@&{}> has been added to the teams**", role.id))
                .colour(role_colour(&role)),
        ),
    )
    .await?;

    let notice = Notice::new(
        format!(
            "*Setting Changed*\n### Team Added\n- `role:` <@&{}>\n- `emoji:` {emoji}",
            role.id
        ),
        colors::ORANGE,
    );
    announce(ctx, "setting_changes", notice).await
}

/// remove a team & emoji pair
#[poise::command(
    slash_command,
    guild_only,
    check = "operator",
    required_bot_permissions = "VIEW_CHANNEL | EMBED_LINKS | ATTACH_FILES"
)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "the team to unpair"] role: serenity::Role,
) -> Result<()> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let db = &ctx.data().db;
    let mut guild = db.get_or_create_guild(guild_id).await?;

    let Some(team) = guild.teams.remove(&role.id) else {
        return reject(ctx, "That role is already not a team").await;
    };
    let emoji = guild_emoji(ctx.serenity_context(), guild_id, &team.emoji)
        .map(|e| e.to_string())
        .unwrap_or_default();

    db.update_guild(&guild, Category::Teams, false).await?;
    info!("Team {} removed in guild {}", role.id, guild_id);

    ctx.send(
        CreateReply::default().embed(
            CreateEmbed::new()
                .description(format!("**removed the {emoji} <@&{}> from the teams**", role.id))
                .colour(role_colour(&role)),
        ),
    )
    .await?;

    let notice = Notice::new(
        format!("*Setting Changed*\n### Team Removed\n- `team:` {emoji} <@&{}>", role.id),
        colors::ORANGE,
    );
    announce(ctx, "setting_changes", notice).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emojis() -> Vec<(EmojiId, String)> {
        vec![
            (EmojiId::new(11), "Eagles".to_string()),
            (EmojiId::new(12), "sharks".to_string()),
        ]
    }

    #[test]
    fn emoji_found_by_markup_id() {
        assert_eq!(find_emoji(&emojis(), "<:whatever:12>"), Some(EmojiId::new(12)));
        assert_eq!(find_emoji(&emojis(), "<a:gone:99>"), None);
    }

    #[test]
    fn emoji_found_by_name_ignoring_case() {
        assert_eq!(find_emoji(&emojis(), "eagles"), Some(EmojiId::new(11)));
        assert_eq!(find_emoji(&emojis(), ":SHARKS:"), Some(EmojiId::new(12)));
        assert_eq!(find_emoji(&emojis(), "bears"), None);
    }

    #[test]
    fn emoji_names_match_without_accents() {
        let emojis = vec![(EmojiId::new(11), "Café".to_string())];
        assert_eq!(find_emoji(&emojis, "cafe"), Some(EmojiId::new(11)));
        assert_eq!(find_emoji(&emojis, "CAFÉ"), Some(EmojiId::new(11)));
    }

    #[test]
    fn team_lines_are_numbered_and_aligned() {
        let teams: Vec<(RoleId, String)> = (1..=9)
            .map(|i| (RoleId::new(i), format!("<:t:{i}>")))
            .collect();
        let lines = team_lines(&teams);
        assert!(lines.starts_with("` 1` | <:t:1> <@&1>\n"));
        assert!(lines.ends_with("` 9` | <:t:9> <@&9>\n"));
    }

    #[test]
    fn no_teams_has_a_placeholder() {
        assert_eq!(team_lines(&[]), "*no teams available*");
    }
}
