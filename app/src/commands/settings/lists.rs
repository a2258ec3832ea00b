//! Member lists posted into the auto-update channels.

use poise::serenity_prelude::{
    ChannelId, ComponentInteraction, CreateEmbed, CreateEmbedFooter, CreateMessage, Emoji, EmojiId,
    MessageId, Role, RoleId, Timestamp, UserId,
};
use poise::CreateReply;
use std::collections::HashMap;
use tracing::{info, warn};

use super::Session;
use crate::checks::NOT_LOADED;
use crate::commands::{live_teams, role_colour};
use crate::embeds::{split_embed_text, EmbedText};
use crate::error::{BotError, Result};
use crate::models::{Category, GuildData};
use crate::reply::{fail, Responder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoList {
    Referees,
    Streamers,
    TeamOwners,
}

impl AutoList {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "referee_list" => Some(Self::Referees),
            "streamer_list" => Some(Self::Streamers),
            "team_owner_list" => Some(Self::TeamOwners),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListMember {
    pub id: UserId,
    pub name: String,
    pub roles: Vec<RoleId>,
}

pub fn role_members(role: RoleId, members: &[ListMember]) -> String {
    members
        .iter()
        .filter(|m| m.roles.contains(&role))
        .map(|m| format!("<@{}> `{}`\n", m.id, m.name))
        .collect()
}

/// One line per team: its emoji and the first member holding both the team
/// role and `owner`.
pub fn team_owners(teams: &[(RoleId, String)], owner: RoleId, members: &[ListMember]) -> String {
    teams
        .iter()
        .map(|(team, emoji)| {
            match members
                .iter()
                .find(|m| m.roles.contains(team) && m.roles.contains(&owner))
            {
                Some(m) => format!("{emoji} | <@{}> `{}`\n", m.id, m.name),
                None => format!("{emoji} |\n"),
            }
        })
        .collect()
}

struct Snapshot {
    roles: HashMap<RoleId, Role>,
    emojis: HashMap<EmojiId, Emoji>,
    members: Vec<ListMember>,
}

fn snapshot(session: &Session) -> Option<Snapshot> {
    let guild = session.ctx.cache.guild(session.guild_id)?;
    Some(Snapshot {
        roles: guild.roles.iter().map(|(id, r)| (*id, r.clone())).collect(),
        emojis: guild.emojis.iter().map(|(id, e)| (*id, e.clone())).collect(),
        members: guild
            .members
            .values()
            .map(|m| ListMember {
                id: m.user.id,
                name: m.user.name.clone(),
                roles: m.roles.clone(),
            })
            .collect(),
    })
}

fn emoji_of(snapshot: &Snapshot, id: &str) -> Option<String> {
    let id = id.parse::<u64>().ok().filter(|id| *id != 0)?;
    snapshot.emojis.get(&EmojiId::new(id)).map(|e| e.to_string())
}

fn no_teams() -> BotError {
    BotError::NotEnough { key: "teams", command: "teams add" }
}

fn no_coaches() -> BotError {
    BotError::NotEnough { key: "coaches", command: "coaches add" }
}

/// What the team owner list is built from once coaches and teams that no
/// longer exist are set aside.
#[derive(Debug)]
pub struct OwnerList {
    /// The highest live coach role.
    pub owner: Option<RoleId>,
    pub teams: Vec<(RoleId, String)>,
    pub vanished_coaches: Vec<RoleId>,
    pub vanished_teams: Vec<RoleId>,
}

impl OwnerList {
    pub fn owner(&self) -> Result<RoleId> {
        let owner = self.owner.ok_or_else(no_coaches)?;
        if self.teams.is_empty() {
            return Err(no_teams());
        }
        Ok(owner)
    }
}

pub fn owner_list(
    guild: &GuildData,
    position: impl Fn(RoleId) -> Option<u16>,
    emoji: impl Fn(&str) -> Option<String>,
) -> Result<OwnerList> {
    if guild.teams.is_empty() {
        return Err(no_teams());
    }
    if guild.coaches.is_empty() {
        return Err(no_coaches());
    }

    let (live_coaches, vanished_coaches): (Vec<RoleId>, Vec<RoleId>) =
        guild.coaches.keys().copied().partition(|r| position(*r).is_some());
    let owner = live_coaches.into_iter().max_by_key(|r| position(*r));
    let (teams, vanished_teams) = live_teams(&guild.teams, &position, emoji);

    Ok(OwnerList {
        owner,
        teams,
        vanished_coaches,
        vanished_teams,
    })
}

/// Builds the team owner list, dropping coaches and teams that no longer
/// exist on Discord.
async fn team_owner_list(session: &Session, guild: &mut GuildData, snapshot: &Snapshot) -> Result<(Role, String)> {
    let list = owner_list(
        guild,
        |role| snapshot.roles.get(&role).map(|r| r.position),
        |emoji| emoji_of(snapshot, emoji),
    )?;

    if !list.vanished_coaches.is_empty() {
        guild.coaches.retain(|r, _| !list.vanished_coaches.contains(r));
        session.data.db.update_guild(guild, Category::Coaches, false).await?;
    }
    if !list.vanished_teams.is_empty() {
        guild.teams.retain(|r, _| !list.vanished_teams.contains(r));
        session.data.db.update_guild(guild, Category::Teams, false).await?;
    }

    let owner = list.owner()?;
    let role = snapshot.roles.get(&owner).cloned().ok_or_else(no_coaches)?;
    Ok((role, team_owners(&list.teams, owner, &snapshot.members)))
}

/// Posts `list` into `channel`. `None` means the user was already told why
/// nothing was posted.
pub async fn post(
    session: &Session,
    interaction: &ComponentInteraction,
    guild: &mut GuildData,
    list: AutoList,
    channel: ChannelId,
) -> Result<Option<MessageId>> {
    let Some(snapshot) = snapshot(session) else {
        session
            .reject(interaction, NOT_LOADED)
            .await?;
        return Ok(None);
    };

    let (role, description) = match list {
        AutoList::TeamOwners => team_owner_list(session, guild, &snapshot).await?,
        AutoList::Referees | AutoList::Streamers => {
            let key = if list == AutoList::Referees { "referee" } else { "streamer" };
            let missing = format!("There is no {key} role setup");
            let Some(role_id) = guild.roles.get(key).copied() else {
                session.reject(interaction, missing).await?;
                return Ok(None);
            };
            let Some(role) = snapshot.roles.get(&role_id).cloned() else {
                guild.remove_unused_role(role_id);
                session.data.db.update_guild(guild, Category::Roles, false).await?;
                session.reject(interaction, missing).await?;
                return Ok(None);
            };
            (role, role_members(role_id, &snapshot.members))
        }
    };

    interaction.defer(&session.ctx).await?;

    let embed = split_embed_text(EmbedText::new(description), "\n").apply(
        CreateEmbed::new()
            .title(format!("{}s", role.name))
            .colour(role_colour(&role))
            .timestamp(Timestamp::now())
            .footer(CreateEmbedFooter::new("Last Updated")),
    );

    match channel
        .send_message(&session.ctx, CreateMessage::new().embed(embed))
        .await
    {
        Ok(message) => {
            info!("Posted the {:?} list in guild {}", list, session.guild_id);
            Ok(Some(message.id))
        }
        Err(e) => {
            warn!("Failed to post the {:?} list in guild {}: {}", list, session.guild_id, e);
            let reply = CreateReply::default()
                .content(fail(format!("I couldn't send the list into <#{channel}>")))
                .ephemeral(true);
            Responder::Component(interaction.clone())
                .reply(&session.ctx, reply)
                .await?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Team;
    use poise::serenity_prelude::GuildId;

    fn member(id: u64, name: &str, roles: &[u64]) -> ListMember {
        ListMember {
            id: UserId::new(id),
            name: name.to_string(),
            roles: roles.iter().map(|r| RoleId::new(*r)).collect(),
        }
    }

    #[test]
    fn role_members_lists_holders_only() {
        let members = [member(1, "ref", &[5]), member(2, "fan", &[6])];
        assert_eq!(role_members(RoleId::new(5), &members), "<@1> `ref`\n");
        assert_eq!(role_members(RoleId::new(7), &members), "");
    }

    #[test]
    fn team_owners_pairs_each_team_with_its_owner() {
        let members = [
            member(1, "owner", &[10, 99]),
            member(2, "player", &[20]),
            member(3, "other", &[20]),
        ];
        let teams = [
            (RoleId::new(10), "<:a:1>".to_string()),
            (RoleId::new(20), "<:b:2>".to_string()),
        ];
        assert_eq!(
            team_owners(&teams, RoleId::new(99), &members),
            "<:a:1> | <@1> `owner`\n<:b:2> |\n"
        );
    }

    fn league() -> GuildData {
        let mut guild = GuildData::new(GuildId::new(1));
        guild.teams.insert(RoleId::new(1), Team::new("101"));
        guild.teams.insert(RoleId::new(2), Team::new("102"));
        guild.coaches.insert(RoleId::new(10), "HC".into());
        guild.coaches.insert(RoleId::new(11), "GM".into());
        guild.coaches.insert(RoleId::new(12), "AC".into());
        guild
    }

    fn positions(live: &[(u64, u16)]) -> impl Fn(RoleId) -> Option<u16> + '_ {
        move |role| live.iter().find(|(r, _)| *r == role.get()).map(|(_, p)| *p)
    }

    fn emoji(id: &str) -> Option<String> {
        Some(format!("<:e:{id}>"))
    }

    #[test]
    fn owner_is_the_highest_live_coach_role() {
        let live = [(1, 2), (10, 5), (11, 8)];
        let list = owner_list(&league(), positions(&live), emoji).unwrap();
        assert_eq!(list.owner().unwrap(), RoleId::new(11));
        assert_eq!(list.teams, vec![(RoleId::new(1), "<:e:101>".to_string())]);
        assert_eq!(list.vanished_coaches, vec![RoleId::new(12)]);
        assert_eq!(list.vanished_teams, vec![RoleId::new(2)]);
    }

    #[test]
    fn missing_teams_or_coaches_are_not_enough() {
        let mut guild = league();
        guild.coaches.clear();
        let err = owner_list(&guild, positions(&[]), emoji).unwrap_err();
        assert!(matches!(err, BotError::NotEnough { key: "coaches", .. }));

        guild.teams.clear();
        let err = owner_list(&guild, positions(&[]), emoji).unwrap_err();
        assert!(matches!(err, BotError::NotEnough { key: "teams", .. }));
    }

    #[test]
    fn vanished_roles_leave_nothing_to_list() {
        let coaches_gone = owner_list(&league(), positions(&[(1, 2)]), emoji).unwrap();
        assert!(matches!(coaches_gone.owner(), Err(BotError::NotEnough { key: "coaches", .. })));
        assert_eq!(coaches_gone.vanished_coaches.len(), 3);

        let teams_gone = owner_list(&league(), positions(&[(10, 5)]), emoji).unwrap();
        assert!(matches!(teams_gone.owner(), Err(BotError::NotEnough { key: "teams", .. })));
        assert_eq!(teams_gone.vanished_teams, vec![RoleId::new(1), RoleId::new(2)]);
    }

    #[test]
    fn only_auto_update_channels_have_lists() {
        assert_eq!(AutoList::from_key("referee_list"), Some(AutoList::Referees));
        assert_eq!(AutoList::from_key("team_owner_list"), Some(AutoList::TeamOwners));
        assert_eq!(AutoList::from_key("notices"), None);
    }
}
