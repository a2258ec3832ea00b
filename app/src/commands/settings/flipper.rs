//! Notice and status flags, flipped one at a time.

use poise::serenity_prelude::{
    ComponentInteraction, CreateActionRow, CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

use super::session::selected;
use super::Session;
use crate::error::Result;
use crate::models::categories::{find_simple, SimpleOption, NOTICES, STATUS};
use crate::models::{colors, Category, GuildData};
use crate::notices::{change_event, Notice};
use crate::reply::Responder;

const FLIPPER_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flags {
    Notices,
    Status,
}

impl Flags {
    fn options(self) -> &'static [SimpleOption] {
        match self {
            Self::Notices => NOTICES,
            Self::Status => STATUS,
        }
    }

    fn category(self) -> Category {
        match self {
            Self::Notices => Category::Notices,
            Self::Status => Category::Status,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Notices => "Notice",
            Self::Status => "Status",
        }
    }

    fn map(self, guild: &GuildData) -> &BTreeMap<String, bool> {
        match self {
            Self::Notices => &guild.notices,
            Self::Status => &guild.status,
        }
    }

    fn map_mut(self, guild: &mut GuildData) -> &mut BTreeMap<String, bool> {
        match self {
            Self::Notices => &mut guild.notices,
            Self::Status => &mut guild.status,
        }
    }
}

pub fn listing(flags: Flags, guild: &GuildData) -> String {
    let values = flags.map(guild);
    let mut content = format!("# {} Settings\n", flags.title());
    for option in flags.options() {
        let on = values.get(option.key).copied().unwrap_or(false);
        content.push_str(&format!("- **{}:** {}\n", option.label, if on { "✅" } else { "❌" }));
    }
    content
}

/// Inverts the flag `key`, returning its new state.
pub fn flip(flags: Flags, guild: &mut GuildData, key: &str) -> bool {
    let value = flags.map_mut(guild).entry(key.to_string()).or_insert(false);
    *value = !*value;
    *value
}

fn state(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

fn flag_select(flags: Flags) -> CreateActionRow {
    let options = flags
        .options()
        .iter()
        .map(|o| CreateSelectMenuOption::new(o.label, o.key))
        .collect();
    CreateActionRow::SelectMenu(
        CreateSelectMenu::new("flip", CreateSelectMenuKind::String { options })
            .placeholder("select an option to flip its status"),
    )
}

pub async fn open(session: &Session, interaction: ComponentInteraction, flags: Flags) -> Result<()> {
    let guild = session.guild().await?;
    let reply = CreateInteractionResponseMessage::new()
        .content(listing(flags, &guild))
        .components(vec![flag_select(flags)])
        .ephemeral(true);
    interaction
        .create_response(&session.ctx, CreateInteractionResponse::Message(reply))
        .await?;

    let owner = Responder::Component(interaction);
    session.spawn(owner.clone(), run(session.clone(), owner, flags));
    Ok(())
}

async fn run(session: Session, owner: Responder, flags: Flags) -> Result<()> {
    let message = owner.message(&session.ctx).await?;

    while let Some(interaction) = session.next(&message, FLIPPER_TIMEOUT).await {
        if let Err(e) = toggle(&session, &interaction, flags).await {
            session.fail(&Responder::Component(interaction), e).await;
        }
    }

    session.expire(&owner).await;
    Ok(())
}

async fn toggle(session: &Session, interaction: &ComponentInteraction, flags: Flags) -> Result<()> {
    let Some(option) = selected(interaction).and_then(|key| find_simple(flags.options(), key)) else {
        interaction
            .create_response(&session.ctx, CreateInteractionResponse::Acknowledge)
            .await?;
        return Ok(());
    };

    let mut guild = session.guild().await?;
    let enabled = flip(flags, &mut guild, option.key);
    let category = flags.category();
    session.data.db.update_guild(&guild, category, false).await?;
    info!("{} {} in guild {}", option.key, state(enabled), session.guild_id);

    let update = CreateInteractionResponseMessage::new().content(listing(flags, &guild));
    interaction
        .create_response(&session.ctx, CreateInteractionResponse::UpdateMessage(update))
        .await?;
    interaction
        .create_followup(
            &session.ctx,
            CreateInteractionResponseFollowup::new().content(format!(
                "`{}` have been **{}**",
                option.label.to_lowercase(),
                state(enabled)
            )),
        )
        .await?;

    let notice = Notice::new(
        format!(
            "*Setting Changed*\n### {}\n- `{}` have been **{}**",
            if flags == Flags::Notices { "Notices" } else { "Status" },
            option.label,
            state(enabled)
        ),
        colors::GREEN,
    );
    session
        .announce(Responder::Component(interaction.clone()), change_event(category), notice)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use poise::serenity_prelude::GuildId;

    #[test]
    fn flip_toggles_and_reports_the_new_state() {
        let mut guild = GuildData::new(GuildId::new(1));
        assert!(!flip(Flags::Notices, &mut guild, "team_swap"));
        assert!(!guild.notice_enabled("team_swap"));
        assert!(flip(Flags::Notices, &mut guild, "team_swap"));
        assert!(guild.notice_enabled("team_swap"));
    }

    #[test]
    fn listing_marks_each_flag() {
        let mut guild = GuildData::new(GuildId::new(1));
        flip(Flags::Status, &mut guild, "signing");
        let content = listing(Flags::Status, &guild);
        assert!(content.starts_with("# Status Settings\n"));
        assert!(content.contains("- **signing:** ❌\n"));
        assert!(content.contains("- **releasing:** ✅\n"));
    }
}
