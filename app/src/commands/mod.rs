pub mod clear;
pub mod coaches;
pub mod errors;
pub mod settings;
pub mod sync;
pub mod teams;

use poise::serenity_prelude::{self as serenity, Emoji, EmojiId, GuildId, Role, RoleId};
use poise::CreateReply;
use std::collections::BTreeMap;

use crate::database::Database;
use crate::error::Result;
use crate::models::colors;
use crate::models::{Category, GuildData, RoleUse, Team};
use crate::notices::{Notice, NoticeRouter, SerenityGateway};
use crate::reply::{fail, Responder};
use crate::Context;

/// Why a role cannot be bound again.
#[derive(Debug, PartialEq, Eq)]
enum Conflict {
    Setting(String),
    Team { emoji: String },
    Coach(String),
}

/// Checks that `role` is free to bind. A team whose emoji no longer exists
/// does not hold on to its role: it is dropped from `guild` and `Ok(true)`
/// tells the caller to persist the teams.
fn free_role(
    guild: &mut GuildData,
    role: RoleId,
    emoji_exists: impl Fn(&str) -> bool,
) -> std::result::Result<bool, Conflict> {
    match guild.find_role(role) {
        None => Ok(false),
        Some(RoleUse::Setting(key)) => Err(Conflict::Setting(key.replace('_', " "))),
        Some(RoleUse::Coach(abbr)) => Err(Conflict::Coach(abbr.to_string())),
        Some(RoleUse::Team(team)) if emoji_exists(&team.emoji) => Err(Conflict::Team {
            emoji: team.emoji.clone(),
        }),
        Some(RoleUse::Team(_)) => {
            guild.remove_unused_role(role);
            Ok(true)
        }
    }
}

/// Claims `role` for a new binding, persisting any vanished team that held
/// it. Returns why the role was refused.
pub async fn claim_role(
    ctx: &serenity::Context,
    db: &Database,
    guild: &mut GuildData,
    role: RoleId,
) -> Result<Option<String>> {
    let guild_id = guild.id;
    let message = match free_role(guild, role, |e| guild_emoji(ctx, guild_id, e).is_some()) {
        Ok(true) => {
            db.update_guild(guild, Category::Teams, false).await?;
            None
        }
        Ok(false) => None,
        Err(Conflict::Setting(key)) => Some(format!("That role is already connected to the `{key}` setting")),
        Err(Conflict::Coach(abbr)) => Some(format!("That role is already connected to the `{abbr}` coaches")),
        Err(Conflict::Team { emoji }) => {
            let emoji = guild_emoji(ctx, guild_id, &emoji)
                .map(|e| e.to_string())
                .unwrap_or_default();
            Some(format!("That role is already connected to the {emoji} <@&{role}> team"))
        }
    };
    Ok(message)
}

/// Splits the stored teams into those whose role and emoji still exist,
/// highest role first, and the roles of those that do not.
pub fn live_teams(
    teams: &BTreeMap<RoleId, Team>,
    position: impl Fn(RoleId) -> Option<u16>,
    emoji: impl Fn(&str) -> Option<String>,
) -> (Vec<(RoleId, String)>, Vec<RoleId>) {
    let mut live = Vec::new();
    let mut vanished = Vec::new();
    for (role, team) in teams {
        match (position(*role), emoji(&team.emoji)) {
            (Some(position), Some(emoji)) => live.push((position, *role, emoji)),
            _ => vanished.push(*role),
        }
    }
    live.sort_by(|a, b| b.0.cmp(&a.0));
    (live.into_iter().map(|(_, role, emoji)| (role, emoji)).collect(), vanished)
}

pub fn guild_emoji(ctx: &serenity::Context, guild_id: GuildId, id: &str) -> Option<Emoji> {
    let id = id.parse::<u64>().ok().filter(|id| *id != 0)?;
    ctx.cache
        .guild(guild_id)?
        .emojis
        .get(&EmojiId::new(id))
        .cloned()
}

/// Sends a notice for `event` on behalf of the invoking command.
pub async fn announce(ctx: Context<'_>, event: &str, notice: Notice) -> Result<()> {
    let (Some(guild_id), poise::Context::Application(app)) = (ctx.guild_id(), ctx) else {
        return Ok(());
    };
    let gateway = SerenityGateway::new(
        ctx.serenity_context(),
        guild_id,
        Responder::Command(app.interaction.clone()),
    );
    NoticeRouter::new(&ctx.data().db, &gateway)
        .announce(guild_id, event, &notice)
        .await?;
    Ok(())
}

pub async fn reject(ctx: Context<'_>, message: impl AsRef<str>) -> Result<()> {
    ctx.send(CreateReply::default().content(fail(message)).ephemeral(true))
        .await?;
    Ok(())
}

pub fn role_colour(role: &Role) -> u32 {
    match role.colour.0 {
        0 => colors::BLANK,
        colour => colour,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guild() -> GuildData {
        let mut guild = GuildData::new(GuildId::new(1));
        guild.roles.insert("free_agent".into(), RoleId::new(10));
        guild.teams.insert(RoleId::new(20), Team::new("200"));
        guild.coaches.insert(RoleId::new(30), "HC".into());
        guild
    }

    #[test]
    fn unbound_role_is_free() {
        assert_eq!(free_role(&mut guild(), RoleId::new(99), |_| true), Ok(false));
    }

    #[test]
    fn bound_roles_conflict() {
        let mut guild = guild();
        assert_eq!(
            free_role(&mut guild, RoleId::new(10), |_| true),
            Err(Conflict::Setting("free agent".into()))
        );
        assert_eq!(
            free_role(&mut guild, RoleId::new(20), |_| true),
            Err(Conflict::Team { emoji: "200".into() })
        );
        assert_eq!(
            free_role(&mut guild, RoleId::new(30), |_| true),
            Err(Conflict::Coach("HC".into()))
        );
    }

    #[test]
    fn live_teams_drop_vanished_roles_and_emojis() {
        let mut teams = BTreeMap::new();
        teams.insert(RoleId::new(1), Team::new("11"));
        teams.insert(RoleId::new(2), Team::new("12"));
        teams.insert(RoleId::new(3), Team::new("13"));
        teams.insert(RoleId::new(4), Team::new("gone"));
        let positions = [(1, 3u16), (2, 9), (4, 5)];
        let (live, vanished) = live_teams(
            &teams,
            |role| positions.iter().find(|(r, _)| *r == role.get()).map(|(_, p)| *p),
            |emoji| (emoji != "gone").then(|| format!("<:e:{emoji}>")),
        );
        assert_eq!(
            live,
            vec![
                (RoleId::new(2), "<:e:12>".to_string()),
                (RoleId::new(1), "<:e:11>".to_string()),
            ]
        );
        assert_eq!(vanished, vec![RoleId::new(3), RoleId::new(4)]);
    }

    #[test]
    fn team_with_vanished_emoji_gives_up_its_role() {
        let mut guild = guild();
        assert_eq!(free_role(&mut guild, RoleId::new(20), |_| false), Ok(true));
        assert!(guild.teams.is_empty());
        assert_eq!(guild.remove_unused_role(RoleId::new(30)), Some(Category::Coaches));
    }
}
