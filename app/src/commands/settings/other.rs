//! Roster cap, demands and waitlist settings.

use poise::serenity_prelude::{
    ActionRowComponent, ComponentInteraction, CreateActionRow, CreateEmbed, CreateInputText,
    CreateInteractionResponse, CreateInteractionResponseMessage, CreateModal, CreateSelectMenu,
    CreateSelectMenuKind, CreateSelectMenuOption, EditInteractionResponse, InputTextStyle,
    ModalInteraction, ModalInteractionCollector,
};
use poise::CreateReply;
use std::time::Duration;
use tracing::{debug, info};

use super::session::selected;
use super::Session;
use crate::error::Result;
use crate::models::categories::{find_simple, type_choices, SimpleOption, NUMERIC_SETTINGS, SETTINGS};
use crate::models::{colors, Category, GuildData};
use crate::notices::{change_event, Notice};
use crate::reply::{fail, Responder};

const SETTINGS_TIMEOUT: Duration = Duration::from_secs(120);
const TYPES_TIMEOUT: Duration = Duration::from_secs(120);
const MODAL_TIMEOUT: Duration = Duration::from_secs(60);

pub fn listing(guild: &GuildData) -> String {
    let mut content = "# Setting Settings\n".to_string();
    for option in SETTINGS {
        let value = guild.setting(option.key).unwrap_or_default();
        if option.key == "demand_wait" {
            content.push_str(&format!("- **{}:** `{value} days`\n", option.label));
        } else {
            content.push_str(&format!("- **{}:** `{value}`\n", option.label));
        }
    }
    content
}

/// Accepts whole numbers from 1 to 100.
pub fn validate_number(value: &str) -> std::result::Result<u32, &'static str> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err("That was not a number");
    }
    match value.parse::<u32>() {
        Ok(n) if (1..=100).contains(&n) => Ok(n),
        _ => Err("That was not a number between 1-100"),
    }
}

pub fn types_prompt(key: &str) -> String {
    match key.split('_').next().unwrap_or(key) {
        "waitlist" => "select a new type for the `waitlist`".to_string(),
        other => format!("select a new type for `{other}s`"),
    }
}

fn setting_select() -> CreateActionRow {
    let options = SETTINGS
        .iter()
        .map(|o| CreateSelectMenuOption::new(o.label, o.key))
        .collect();
    CreateActionRow::SelectMenu(
        CreateSelectMenu::new("setting", CreateSelectMenuKind::String { options })
            .placeholder("select an option to change its setting"),
    )
}

pub async fn open(session: &Session, interaction: ComponentInteraction) -> Result<()> {
    let guild = session.guild().await?;
    let reply = CreateInteractionResponseMessage::new()
        .content(listing(&guild))
        .components(vec![setting_select()])
        .ephemeral(true);
    interaction
        .create_response(&session.ctx, CreateInteractionResponse::Message(reply))
        .await?;

    let owner = Responder::Component(interaction);
    session.spawn(owner.clone(), run(session.clone(), owner));
    Ok(())
}

async fn run(session: Session, owner: Responder) -> Result<()> {
    let message = owner.message(&session.ctx).await?;

    while let Some(interaction) = session.next(&message, SETTINGS_TIMEOUT).await {
        if let Err(e) = choose(&session, &interaction, &owner).await {
            session.fail(&Responder::Component(interaction), e).await;
        }
    }

    session.expire(&owner).await;
    Ok(())
}

async fn choose(session: &Session, interaction: &ComponentInteraction, owner: &Responder) -> Result<()> {
    let Some(option) = selected(interaction).and_then(|key| find_simple(SETTINGS, key)) else {
        interaction
            .create_response(&session.ctx, CreateInteractionResponse::Acknowledge)
            .await?;
        return Ok(());
    };

    if NUMERIC_SETTINGS.contains(&option.key) {
        let custom_id = format!("number:{}", interaction.id);
        let modal = CreateModal::new(&custom_id, "Settings").components(vec![CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Short, option.label, "number")
                .placeholder("type a number between 1-100")
                .min_length(1)
                .max_length(3),
        )]);
        interaction
            .create_response(&session.ctx, CreateInteractionResponse::Modal(modal))
            .await?;
        session.spawn(
            Responder::Component(interaction.clone()),
            number(session.clone(), custom_id, owner.clone(), option),
        );
        return Ok(());
    }

    let options = type_choices(option.key)
        .into_iter()
        .map(|(label, value)| CreateSelectMenuOption::new(label, value))
        .collect();
    let reply = CreateInteractionResponseMessage::new()
        .content(types_prompt(option.key))
        .components(vec![CreateActionRow::SelectMenu(
            CreateSelectMenu::new("type", CreateSelectMenuKind::String { options }).placeholder("types"),
        )])
        .ephemeral(true);
    interaction
        .create_response(&session.ctx, CreateInteractionResponse::Message(reply))
        .await?;

    let child = Responder::Component(interaction.clone());
    session.spawn(child.clone(), types(session.clone(), child, owner.clone(), option));
    Ok(())
}

fn modal_value(submit: &ModalInteraction) -> String {
    submit
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            ActionRowComponent::InputText(input) => input.value.clone(),
            _ => None,
        })
        .unwrap_or_default()
}

async fn number(session: Session, custom_id: String, parent: Responder, option: &'static SimpleOption) -> Result<()> {
    let Some(submit) = ModalInteractionCollector::new(&session.ctx.shard)
        .author_id(session.author.id)
        .filter(move |m| m.data.custom_id == custom_id)
        .timeout(MODAL_TIMEOUT)
        .await
    else {
        debug!("The {} modal was never submitted", option.key);
        return Ok(());
    };

    let value = modal_value(&submit);
    let responder = Responder::Modal(submit);
    match validate_number(&value) {
        Ok(n) => set(&session, responder, &parent, option, n.to_string(), n.to_string()).await,
        Err(reason) => {
            responder
                .reply(&session.ctx, CreateReply::default().content(fail(reason)).ephemeral(true))
                .await
        }
    }
}

async fn types(session: Session, this: Responder, parent: Responder, option: &'static SimpleOption) -> Result<()> {
    let message = this.message(&session.ctx).await?;
    let choices = type_choices(option.key);

    while let Some(interaction) = session.next(&message, TYPES_TIMEOUT).await {
        let choice = selected(&interaction).and_then(|value| choices.iter().find(|(_, v)| v == value));
        let result = match choice {
            Some((label, value)) => {
                let responder = Responder::Component(interaction.clone());
                set(&session, responder, &parent, option, value.clone(), label.clone()).await
            }
            None => interaction
                .create_response(&session.ctx, CreateInteractionResponse::Acknowledge)
                .await
                .map_err(Into::into),
        };
        if let Err(e) = result {
            session.fail(&Responder::Component(interaction), e).await;
        }
    }

    session.expire(&this).await;
    Ok(())
}

fn changed(option: &SimpleOption, shown: &str) -> String {
    format!("the `{}` has been **set** to `{shown}`", option.label)
}

/// Stores `value` for `option`, announces it as `shown` and refreshes the
/// settings listing.
async fn set(
    session: &Session,
    responder: Responder,
    parent: &Responder,
    option: &SimpleOption,
    value: String,
    shown: String,
) -> Result<()> {
    let mut guild = session.guild().await?;
    guild.settings.insert(option.key.to_string(), value);
    session.data.db.update_guild(&guild, Category::Settings, false).await?;
    info!("{} set to {} in guild {}", option.key, shown, session.guild_id);

    responder
        .reply(
            &session.ctx,
            CreateReply::default().embed(
                CreateEmbed::new()
                    .description(format!("{} by <@{}>", changed(option, &shown), session.author.id))
                    .colour(colors::BLANK),
            ),
        )
        .await?;

    let builder = EditInteractionResponse::new().content(listing(&guild));
    if let Err(e) = parent.edit(&session.ctx, builder).await {
        debug!("Could not refresh the settings listing: {}", e);
    }

    let notice = Notice::new(
        format!("*Setting Changed*\n### Settings\n- {}", changed(option, &shown)),
        colors::ORANGE,
    )
    .field("Operator", session.operator_field(), true);
    session
        .announce(responder, change_event(Category::Settings), notice)
        .await
}
