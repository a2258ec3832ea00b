use crate::commands::sync::record_mentions;
use crate::error::{BotError, Result};
use crate::Data;
use poise::serenity_prelude::{self as serenity, ActivityData, OnlineStatus};
use tracing::{debug, info};

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, BotError>,
    data: &Data,
) -> Result<()> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            info!("{} is ready", data_about_bot.user.name);
            ctx.set_presence(Some(ActivityData::listening("/setup")), OnlineStatus::Online);

            if !data.config.profile.is_testing() {
                let mut commands = serenity::Command::get_global_commands(&ctx.http).await?;
                if let Some(guild_id) = data.config.command_guild() {
                    commands.extend(guild_id.get_commands(&ctx.http).await?);
                }
                let count = record_mentions(data, &commands);
                info!("Loaded the mentions of {} commands", count);
            }
        }
        serenity::FullEvent::GuildMembersChunk { chunk } => {
            if chunk.chunk_index + 1 == chunk.chunk_count {
                data.chunking_guilds.lock().remove(&chunk.guild_id);
                debug!("Finished chunking guild {}", chunk.guild_id);
            }
        }
        _ => {}
    }
    Ok(())
}
