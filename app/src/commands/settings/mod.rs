//! The `/settings` editor.
//!
//! `/settings` answers with a section select. Each section opens its own
//! ephemeral view, which may open further views; a child view refreshes the
//! listing of its parent whenever it changes something.

mod flipper;
mod lists;
mod mentionables;
mod other;
mod session;

use poise::serenity_prelude::{
    CreateActionRow, CreateInteractionResponse, CreateInteractionResponseMessage, CreateSelectMenu,
    CreateSelectMenuKind, CreateSelectMenuOption, ReactionType,
};
use poise::CreateReply;
use std::time::Duration;
use tracing::debug;

use crate::checks::operator;
use crate::error::Result;
use crate::reply::Responder;
use crate::Context;

use flipper::Flags;
use mentionables::Mentionable;
use session::{selected, Session};

const SECTION_TIMEOUT: Duration = Duration::from_secs(300);

/// (label, value, description, emoji)
const SECTIONS: &[(&str, &str, &str, &str)] = &[
    ("Season Settings", "season", "scheduling type", "📅"),
    ("Role Settings", "roles", "operator, free agent, eligible, waitlist, and more", "🎭"),
    ("Channel Settings", "channels", "transactions, notices, schedule, auto-update, and more", "💬"),
    ("Notice Settings", "notices", "league events, team events, suspensions, and more", "🔔"),
    ("Status Settings", "status", "turn on/off: transactions, league events, and more", "🚥"),
    ("Other Settings", "settings", "roster cap, demands, and waitlist", "⚙️"),
];

fn section_select() -> CreateActionRow {
    let options = SECTIONS
        .iter()
        .map(|(label, value, description, emoji)| {
            CreateSelectMenuOption::new(*label, *value)
                .description(*description)
                .emoji(ReactionType::Unicode(emoji.to_string()))
        })
        .collect();

    CreateActionRow::SelectMenu(
        CreateSelectMenu::new("section", CreateSelectMenuKind::String { options })
            .placeholder("select a category to view or edit"),
    )
}

/// View or edit settings
#[poise::command(
    slash_command,
    guild_only,
    check = "operator",
    required_bot_permissions = "VIEW_CHANNEL | EMBED_LINKS | ATTACH_FILES"
)]
pub async fn settings(ctx: Context<'_>) -> Result<()> {
    let (Some(guild_id), poise::Context::Application(app)) = (ctx.guild_id(), ctx) else {
        return Ok(());
    };

    let handle = ctx
        .send(
            CreateReply::default()
                .components(vec![section_select()])
                .ephemeral(true),
        )
        .await?;
    let message = handle.message().await?.into_owned();

    let session = Session {
        ctx: ctx.serenity_context().clone(),
        data: ctx.data().clone(),
        guild_id,
        author: ctx.author().clone(),
    };
    let owner = Responder::Command(app.interaction.clone());

    while let Some(interaction) = session.next(&message, SECTION_TIMEOUT).await {
        let section = selected(&interaction).unwrap_or_default().to_string();
        debug!("Opening the {} settings in guild {}", section, guild_id);

        let opened = match section.as_str() {
            "roles" => mentionables::open(&session, interaction.clone(), Mentionable::Roles).await,
            "channels" => mentionables::open(&session, interaction.clone(), Mentionable::Channels).await,
            "notices" => flipper::open(&session, interaction.clone(), Flags::Notices).await,
            "status" => flipper::open(&session, interaction.clone(), Flags::Status).await,
            "settings" => other::open(&session, interaction.clone()).await,
            _ => {
                let reply = CreateInteractionResponseMessage::new()
                    .content("not completed...")
                    .ephemeral(true);
                interaction
                    .create_response(&session.ctx, CreateInteractionResponse::Message(reply))
                    .await
                    .map_err(Into::into)
            }
        };

        if let Err(e) = opened {
            session.fail(&Responder::Component(interaction), e).await;
        }
    }

    session.expire(&owner).await;
    Ok(())
}
