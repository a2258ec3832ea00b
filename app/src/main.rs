mod checks;
mod commands;
mod config;
mod database;
mod embeds;
mod error;
mod events;
mod models;
mod notices;
mod reply;

use config::Config;
use database::{Database, MemoryStore};
use error::BotError;
use events::event_handler;
use parking_lot::{Mutex, RwLock};
use poise::serenity_prelude::{self as serenity, GuildId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
pub struct Data {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    /// Command name (with subcommand) to its clickable mention.
    pub command_mentions: Arc<RwLock<HashMap<String, String>>>,
    pub chunking_guilds: Arc<Mutex<HashSet<GuildId>>>,
}

impl Data {
    pub fn command_mention(&self, name: &str) -> Option<String> {
        self.command_mentions.read().get(name).cloned()
    }
}

pub type Error = BotError;
pub type Context<'a> = poise::Context<'a, Data, Error>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let default_filter = if config.profile.is_testing() {
        "info,peerless=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting as the {:?} profile", config.profile);

    let db = if config.database_url == "memory" {
        warn!("Using an in-memory document store, nothing will be persisted");
        Database::new(MemoryStore::default())
    } else {
        Database::connect(&config.database_url).await?
    };
    db.flush_cache();

    let intents = serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::GUILD_MEMBERS;
    let token = config.token.clone();
    let owners = config.owners.iter().copied().collect();

    let data = Data {
        db: Arc::new(db),
        config: Arc::new(config),
        command_mentions: Arc::new(RwLock::new(HashMap::new())),
        chunking_guilds: Arc::new(Mutex::new(HashSet::new())),
    };

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::settings::settings(),
                commands::teams::teams(),
                commands::coaches::coaches(),
                commands::sync::extensions(),
                commands::clear::clear(),
            ],
            owners,
            command_check: Some(|ctx| Box::pin(checks::command_check(ctx))),
            on_error: |error| Box::pin(commands::errors::on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                let all = &framework.options().commands;
                let mut registered = match data.config.test_guild.filter(|_| data.config.profile.is_testing()) {
                    Some(guild_id) => {
                        let mut builders = commands::sync::command_builders(all, false);
                        builders.extend(commands::sync::command_builders(all, true));
                        guild_id.set_commands(&ctx.http, builders).await?
                    }
                    None => {
                        let builders = commands::sync::command_builders(all, false);
                        serenity::Command::set_global_commands(&ctx.http, builders).await?
                    }
                };
                if let Some(guild_id) = data.config.home_guild.filter(|_| !data.config.profile.is_testing()) {
                    let builders = commands::sync::command_builders(all, true);
                    registered.extend(guild_id.set_commands(&ctx.http, builders).await?);
                }

                let count = commands::sync::record_mentions(&data, &registered);
                info!("Registered {} commands", count);
                Ok(data)
            })
        })
        .build();

    serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?
        .start()
        .await?;

    Ok(())
}
