//! Role and channel settings: a listing view and its change/remove view.

use poise::serenity_prelude::{
    ButtonStyle, ChannelId, ChannelType, ComponentInteraction, ComponentInteractionDataKind,
    CreateActionRow, CreateAllowedMentions, CreateButton, CreateEmbed, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption,
    EditInteractionResponse, Permissions, ReactionType, RoleId,
};
use poise::CreateReply;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use super::lists::{self, AutoList};
use super::session::selected;
use super::Session;
use crate::checks::{bot_permissions_in, cached_role, ensure_assignable};
use crate::commands::claim_role;
use crate::error::{BotError, Result};
use crate::models::categories::{find_mentionable, MentionableOption, CHANNELS, ROLES};
use crate::models::{colors, Category, GuildData};
use crate::notices::{change_event, Notice};
use crate::reply::Responder;

const LISTING_TIMEOUT: Duration = Duration::from_secs(120);
const CHANGE_TIMEOUT: Duration = Duration::from_secs(60);

const CHANNEL_PERMISSIONS: &[(&str, Permissions)] = &[
    ("view channel", Permissions::VIEW_CHANNEL),
    ("send messages", Permissions::SEND_MESSAGES),
    ("embed links", Permissions::EMBED_LINKS),
    ("attach files", Permissions::ATTACH_FILES),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mentionable {
    Roles,
    Channels,
}

impl Mentionable {
    fn options(self) -> &'static [MentionableOption] {
        match self {
            Self::Roles => ROLES,
            Self::Channels => CHANNELS,
        }
    }

    fn category(self) -> Category {
        match self {
            Self::Roles => Category::Roles,
            Self::Channels => Category::Channels,
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Self::Roles => "role",
            Self::Channels => "channel",
        }
    }

    fn current(self, guild: &GuildData, key: &str) -> Option<u64> {
        match self {
            Self::Roles => guild.roles.get(key).map(|id| id.get()),
            Self::Channels => guild.channels.get(key).map(|id| id.get()),
        }
    }

    fn mention(self, id: u64) -> String {
        match self {
            Self::Roles => format!("<@&{id}>"),
            Self::Channels => format!("<#{id}>"),
        }
    }

    fn unset(self, guild: &mut GuildData, key: &str) {
        match self {
            Self::Roles => {
                guild.roles.remove(key);
            }
            Self::Channels => {
                guild.channels.remove(key);
            }
        }
    }
}

/// The listing shown by the role and channel views: every option with the
/// mention of its current value when that still exists.
pub fn listing(kind: Mentionable, guild: &GuildData, live: impl Fn(u64) -> bool) -> String {
    let noun = kind.noun();
    let mut content = format!("# {}{} Settings\n", noun[..1].to_uppercase(), &noun[1..]);
    for option in kind.options() {
        let mention = kind
            .current(guild, option.key)
            .filter(|id| live(*id))
            .map(|id| kind.mention(id))
            .unwrap_or_default();
        content.push_str(&format!("- **{}:** {}\n", option.label, mention));
    }
    content
}

/// Permissions the bot needs in a channel it posts into, by name.
pub fn missing_permissions(perms: Permissions) -> Vec<String> {
    CHANNEL_PERMISSIONS
        .iter()
        .filter(|(_, needed)| !perms.contains(*needed))
        .map(|(name, _)| name.to_string())
        .collect()
}

fn live_ids(session: &Session, kind: Mentionable) -> HashSet<u64> {
    let Some(guild) = session.ctx.cache.guild(session.guild_id) else {
        return HashSet::new();
    };
    match kind {
        Mentionable::Roles => guild.roles.keys().map(|id| id.get()).collect(),
        Mentionable::Channels => guild.channels.keys().map(|id| id.get()).collect(),
    }
}

fn render(session: &Session, kind: Mentionable, guild: &GuildData) -> String {
    let live = live_ids(session, kind);
    listing(kind, guild, |id| live.contains(&id))
}

fn option_select(kind: Mentionable) -> CreateActionRow {
    let options = kind
        .options()
        .iter()
        .map(|o| {
            CreateSelectMenuOption::new(o.label, o.key).emoji(ReactionType::Unicode(o.emoji.to_string()))
        })
        .collect();
    CreateActionRow::SelectMenu(
        CreateSelectMenu::new("option", CreateSelectMenuKind::String { options })
            .placeholder("select an option to change it or remove it"),
    )
}

pub async fn open(session: &Session, interaction: ComponentInteraction, kind: Mentionable) -> Result<()> {
    let guild = session.guild().await?;
    let reply = CreateInteractionResponseMessage::new()
        .content(render(session, kind, &guild))
        .components(vec![option_select(kind)])
        .allowed_mentions(CreateAllowedMentions::new())
        .ephemeral(true);
    interaction
        .create_response(&session.ctx, CreateInteractionResponse::Message(reply))
        .await?;

    let owner = Responder::Component(interaction);
    session.spawn(owner.clone(), run(session.clone(), owner, kind));
    Ok(())
}

async fn run(session: Session, owner: Responder, kind: Mentionable) -> Result<()> {
    let message = owner.message(&session.ctx).await?;

    while let Some(interaction) = session.next(&message, LISTING_TIMEOUT).await {
        let Some(option) = selected(&interaction).and_then(|key| find_mentionable(kind.options(), key)) else {
            interaction
                .create_response(&session.ctx, CreateInteractionResponse::Acknowledge)
                .await?;
            continue;
        };

        let reply = CreateInteractionResponseMessage::new()
            .content(format!(
                "would you like to **change** or **remove** the `{}` {}",
                option.label,
                kind.noun()
            ))
            .components(vec![CreateActionRow::Buttons(vec![
                CreateButton::new("change").label("change"),
                CreateButton::new("remove").label("remove").style(ButtonStyle::Danger),
            ])])
            .ephemeral(true);

        let child = Responder::Component(interaction.clone());
        match interaction
            .create_response(&session.ctx, CreateInteractionResponse::Message(reply))
            .await
        {
            Ok(()) => session.spawn(
                child.clone(),
                change_or_remove(session.clone(), child, owner.clone(), kind, option),
            ),
            Err(e) => session.fail(&child, e.into()).await,
        }
    }

    session.expire(&owner).await;
    Ok(())
}

async fn change_or_remove(
    session: Session,
    this: Responder,
    parent: Responder,
    kind: Mentionable,
    option: &'static MentionableOption,
) -> Result<()> {
    let message = this.message(&session.ctx).await?;

    while let Some(interaction) = session.next(&message, CHANGE_TIMEOUT).await {
        let result = match interaction.data.custom_id.as_str() {
            "change" => prompt_change(&session, &interaction, kind, option).await,
            "remove" => remove(&session, &interaction, &parent, kind, option).await,
            "value" => change(&session, &interaction, &parent, kind, option).await,
            _ => Ok(()),
        };
        if let Err(e) = result {
            session.fail(&Responder::Component(interaction), e).await;
        }
    }

    session.expire(&this).await;
    Ok(())
}

async fn prompt_change(
    session: &Session,
    interaction: &ComponentInteraction,
    kind: Mentionable,
    option: &MentionableOption,
) -> Result<()> {
    let menu = match kind {
        Mentionable::Roles => CreateSelectMenuKind::Role { default_roles: None },
        Mentionable::Channels => CreateSelectMenuKind::Channel {
            channel_types: Some(vec![ChannelType::Text]),
            default_channels: None,
        },
    };
    let noun = kind.noun();
    let update = CreateInteractionResponseMessage::new()
        .content(format!(
            "select a {noun} to **set** as the new `{}` {noun}",
            option.label
        ))
        .components(vec![CreateActionRow::SelectMenu(
            CreateSelectMenu::new("value", menu).placeholder(format!("{noun}s")),
        )]);
    interaction
        .create_response(&session.ctx, CreateInteractionResponse::UpdateMessage(update))
        .await?;
    Ok(())
}

/// Checks a role picked for a role setting. `false` means the user was told
/// why it was refused.
async fn accept_role(
    session: &Session,
    interaction: &ComponentInteraction,
    guild: &mut GuildData,
    role: RoleId,
) -> Result<bool> {
    if let Some(message) = claim_role(&session.ctx, &session.data.db, guild, role).await? {
        session.reject(interaction, message).await?;
        return Ok(false);
    }

    let Some(role) = cached_role(&session.ctx, session.guild_id, role) else {
        session.reject(interaction, "I could not find that role").await?;
        return Ok(false);
    };
    ensure_assignable(&session.ctx, session.guild_id, &role)?;
    Ok(true)
}

/// Checks a channel picked for a channel setting and posts its member list
/// when it is an auto-update channel.
async fn accept_channel(
    session: &Session,
    interaction: &ComponentInteraction,
    guild: &mut GuildData,
    option: &MentionableOption,
    channel: ChannelId,
) -> Result<bool> {
    if guild.channels.get(option.key) == Some(&channel) {
        session
            .reject(interaction, format!("That is already the `{}` channel", option.label))
            .await?;
        return Ok(false);
    }

    let perms = bot_permissions_in(&session.ctx, session.guild_id, channel).unwrap_or_else(Permissions::empty);
    let missing = missing_permissions(perms);
    if !missing.is_empty() {
        return Err(BotError::BotMissingPermissions {
            permissions: missing,
            channel: Some(channel),
        });
    }

    if let Some(list) = AutoList::from_key(option.key) {
        let Some(message) = lists::post(session, interaction, guild, list, channel).await? else {
            return Ok(false);
        };
        guild
            .store
            .insert(format!("{}_message", option.key), message.to_string());
        session.data.db.update_guild(guild, Category::Store, false).await?;
    }
    Ok(true)
}

async fn change(
    session: &Session,
    interaction: &ComponentInteraction,
    parent: &Responder,
    kind: Mentionable,
    option: &MentionableOption,
) -> Result<()> {
    let mut guild = session.guild().await?;

    let id = match (&interaction.data.kind, kind) {
        (ComponentInteractionDataKind::RoleSelect { values }, Mentionable::Roles) => {
            let Some(role) = values.first().copied() else {
                return Ok(());
            };
            if !accept_role(session, interaction, &mut guild, role).await? {
                return Ok(());
            }
            guild.roles.insert(option.key.to_string(), role);
            role.get()
        }
        (ComponentInteractionDataKind::ChannelSelect { values }, Mentionable::Channels) => {
            let Some(channel) = values.first().copied() else {
                return Ok(());
            };
            if !accept_channel(session, interaction, &mut guild, option, channel).await? {
                return Ok(());
            }
            guild.channels.insert(option.key.to_string(), channel);
            channel.get()
        }
        _ => return Ok(()),
    };

    let category = kind.category();
    session.data.db.update_guild(&guild, category, false).await?;
    info!("{} set to {} in guild {}", option.key, id, session.guild_id);

    let mention = kind.mention(id);
    let noun = kind.noun();
    let responder = Responder::Component(interaction.clone());
    responder
        .reply(
            &session.ctx,
            CreateReply::default().embed(
                CreateEmbed::new()
                    .description(format!(
                        "the `{}` {noun} has been **set** to {mention} by <@{}>",
                        option.label, session.author.id
                    ))
                    .colour(colors::BLANK),
            ),
        )
        .await?;
    refresh(session, parent, kind, &guild).await;

    let notice = Notice::new(
        format!(
            "*Setting Changed*\n### {}\n- the `{}` {noun} has been **set** to {mention}",
            category_title(category),
            option.label
        ),
        colors::ORANGE,
    )
    .field("Operator", session.operator_field(), true);
    session.announce(responder, change_event(category), notice).await
}

async fn remove(
    session: &Session,
    interaction: &ComponentInteraction,
    parent: &Responder,
    kind: Mentionable,
    option: &MentionableOption,
) -> Result<()> {
    let mut guild = session.guild().await?;
    kind.unset(&mut guild, option.key);

    let category = kind.category();
    session.data.db.update_guild(&guild, category, false).await?;
    info!("{} removed in guild {}", option.key, session.guild_id);

    let noun = kind.noun();
    let responder = Responder::Component(interaction.clone());
    responder
        .reply(
            &session.ctx,
            CreateReply::default().embed(
                CreateEmbed::new()
                    .description(format!(
                        "the `{}` {noun} has been **removed** by <@{}>",
                        option.label, session.author.id
                    ))
                    .colour(colors::BLANK),
            ),
        )
        .await?;
    refresh(session, parent, kind, &guild).await;

    let notice = Notice::new(
        format!(
            "*Setting Changed*\n### {}\n- the `{}` {noun} has been **removed**",
            category_title(category),
            option.label
        ),
        colors::ORANGE,
    )
    .field("Operator", session.operator_field(), true);
    session.announce(responder, change_event(category), notice).await
}

async fn refresh(session: &Session, parent: &Responder, kind: Mentionable, guild: &GuildData) {
    let builder = EditInteractionResponse::new().content(render(session, kind, guild));
    if let Err(e) = parent.edit(&session.ctx, builder).await {
        debug!("Could not refresh the {:?} listing: {}", kind, e);
    }
}

fn category_title(category: Category) -> String {
    let name = category.as_str();
    format!("{}{}", name[..1].to_uppercase(), &name[1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_mentions_live_values_only() {
        let mut guild = GuildData::new(poise::serenity_prelude::GuildId::new(1));
        guild.roles.insert("operator".into(), RoleId::new(5));
        guild.roles.insert("referee".into(), RoleId::new(6));

        let content = listing(Mentionable::Roles, &guild, |id| id == 5);
        assert!(content.starts_with("# Role Settings\n"));
        assert!(content.contains("- **operator:** <@&5>\n"));
        assert!(content.contains("- **referee:** \n"));
        assert_eq!(content.lines().count(), ROLES.len() + 1);
    }

    #[test]
    fn channel_listing_uses_channel_mentions() {
        let mut guild = GuildData::new(poise::serenity_prelude::GuildId::new(1));
        guild.channels.insert("notices".into(), ChannelId::new(9));
        let content = listing(Mentionable::Channels, &guild, |_| true);
        assert!(content.starts_with("# Channel Settings\n"));
        assert!(content.contains("- **notices:** <#9>\n"));
    }

    #[test]
    fn missing_permissions_are_named() {
        let perms = Permissions::VIEW_CHANNEL | Permissions::EMBED_LINKS;
        assert_eq!(missing_permissions(perms), vec!["send messages", "attach files"]);
        assert!(missing_permissions(Permissions::all()).is_empty());
    }

    #[test]
    fn category_titles_are_capitalised() {
        assert_eq!(category_title(Category::Roles), "Roles");
        assert_eq!(category_title(Category::Channels), "Channels");
    }
}
