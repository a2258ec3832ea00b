use poise::serenity_prelude::{self as serenity, CommandId, CommandOptionType, CreateCommand};
use poise::ChoiceParameter;
use tracing::info;

use crate::error::{BotError, Result};
use crate::reply::{fail, success};
use crate::{Context, Data};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ChoiceParameter)]
pub enum SyncAction {
    #[name = "sync"]
    Sync,
    #[name = "unsync"]
    Unsync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ChoiceParameter)]
pub enum Scope {
    #[name = "yes"]
    Globally,
    #[name = "no"]
    Guild,
}

/// Slash command builders for either the public or the owner-only commands.
pub fn command_builders(commands: &[poise::Command<Data, BotError>], owners_only: bool) -> Vec<CreateCommand> {
    commands
        .iter()
        .filter(|c| c.owners_only == owners_only)
        .filter_map(|c| c.create_as_slash_command())
        .collect()
}

/// What `/extensions` registers for `action` in `scope`. The guild that holds
/// the owner-only commands keeps them whatever is synced there.
pub fn scoped_builders(
    commands: &[poise::Command<Data, BotError>],
    action: SyncAction,
    scope: Scope,
    command_guild: bool,
) -> Vec<CreateCommand> {
    let mut builders = match action {
        SyncAction::Sync => command_builders(commands, false),
        SyncAction::Unsync => Vec::new(),
    };
    if scope == Scope::Guild && command_guild {
        builders.extend(command_builders(commands, true));
    }
    builders
}

/// Clickable mentions for a command and each of its subcommands.
pub fn mention_entries(name: &str, id: CommandId, subcommands: &[&str]) -> Vec<(String, String)> {
    let mut entries = vec![(name.to_string(), format!("</{name}:{id}>"))];
    for sub in subcommands {
        let full = format!("{name} {sub}");
        entries.push((full.clone(), format!("</{full}:{id}>")));
    }
    entries
}

/// Stores the mentions of registered commands, returning how many were seen.
pub fn record_mentions(data: &Data, commands: &[serenity::Command]) -> usize {
    let mut mentions = data.command_mentions.write();
    for command in commands {
        let subcommands: Vec<&str> = command
            .options
            .iter()
            .filter(|o| o.kind == CommandOptionType::SubCommand)
            .map(|o| o.name.as_str())
            .collect();
        mentions.extend(mention_entries(&command.name, command.id, &subcommands));
    }
    commands.len()
}

/// sync or unsync the application commands
#[poise::command(slash_command, guild_only, owners_only)]
pub async fn extensions(
    ctx: Context<'_>,
    #[description = "what to do with the commands"] command: SyncAction,
    #[description = "apply to every server"] globally: Scope,
) -> Result<()> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    ctx.defer_ephemeral().await?;

    let command_guild = ctx.data().config.command_guild() == Some(guild_id);
    let builders = scoped_builders(&ctx.framework().options().commands, command, globally, command_guild);
    let registered = match globally {
        Scope::Globally => serenity::Command::set_global_commands(ctx.http(), builders).await,
        Scope::Guild => guild_id.set_commands(ctx.http(), builders).await,
    };

    let reply = match registered {
        Ok(commands) => {
            let count = record_mentions(ctx.data(), &commands);
            info!("Extensions Synced: {:?} {:?} ({} commands)", command, globally, count);
            match command {
                SyncAction::Sync => success(format!("synced **{count}** commands")),
                SyncAction::Unsync => success("unsynced the commands"),
            }
        }
        Err(e) => {
            info!("Could not {:?} the commands: {}", command, e);
            fail(format!("I could not {} the commands", command.name()))
        }
    };
    ctx.say(reply).await?;
    Ok(())
}
