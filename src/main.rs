use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Discord bot that announces verified POG card drops
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Register commands per-guild instead of globally (faster for testing)
    #[arg(long)]
    guild_commands: bool,

    /// Specific guild ID to register commands to (for testing)
    #[arg(long)]
    guild_id: Option<u64>,
}

mod commands;
mod config;
mod error;
mod events;
mod managers;
mod messages;
mod ocr;
mod pog;
mod state;

use commands::set_channel;
use config::BotSettings;
use events::discord::SerenityAlertSink;
use events::message::handle_message;
use managers::{create_shared_guild_config_cache, SharedGuildConfigCache};
use ocr::TesseractEngine;
use pog::{AlertPublisher, CardLayout, DropDetector, FieldExtractor, HttpImageFetcher, Verifier};
use state::JsonDocumentStore;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared application state
pub struct Data {
    pub guild_configs: SharedGuildConfigCache,
    pub detector: DropDetector,
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Message { new_message } = event {
        if let Err(e) = handle_message(ctx, new_message, data).await {
            error!("Failed to handle message: {}", e);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let token = std::env::var("DISCORD_TOKEN")
        .map_err(|_| anyhow::anyhow!("Missing DISCORD_TOKEN environment variable"))?;
    let settings = BotSettings::from_env()?;

    // Bot/application ID is the first, base64 encoded, part of the token
    if let Some(bot_id_b64) = token.split('.').next() {
        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD_NO_PAD
            .decode(bot_id_b64)
            .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(bot_id_b64));
        if let Ok(Ok(id_str)) = decoded.map(String::from_utf8) {
            info!("Bot ID: {} (configure intents at https://discord.com/developers/applications/{}/bot)", id_str, id_str);
        }
    }

    info!("Using document store at {}", settings.data_path);
    let store = Arc::new(JsonDocumentStore::new(&settings.data_path));
    let guild_configs = create_shared_guild_config_cache(store);

    let ocr = TesseractEngine::new(settings.tessdata_path.clone(), &settings.tesseract_lang);
    match ocr.check().await {
        Ok(()) => info!("OCR engine: Tesseract ({})", ocr.lang()),
        Err(e) => warn!("OCR engine unavailable, every verification will fail: {}", e),
    }
    let fetcher = HttpImageFetcher::new(settings.image_fetch_timeout)?;

    let guild_commands = args.guild_commands;
    let target_guild_id = args.guild_id;
    if guild_commands {
        info!("--guild-commands: Will register commands per-guild (faster for testing)");
    } else {
        info!("Registering commands globally by default (takes up to 1 hour to propagate)");
    }
    if let Some(gid) = target_guild_id {
        info!("--guild-id: Targeting specific guild {}", gid);
    }

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![set_channel()],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' invoked by {} (ID: {}) in {}",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id,
                        ctx.guild_id().map(|g| g.to_string()).unwrap_or_else(|| "DM".to_string())
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Error in command '{}': {}", ctx.command().qualified_name, error);
                            let _ = ctx.say(format!("An error occurred: {}", error)).await;
                        }
                        poise::FrameworkError::ArgumentParse { error, input, ctx, .. } => {
                            error!("Argument parse error in '{}': {} (input: {:?})", ctx.command().qualified_name, error, input);
                        }
                        poise::FrameworkError::GuildOnly { ctx, .. } => {
                            error!("Command '{}' is guild-only, used in DM by {}", ctx.command().qualified_name, ctx.author().name);
                        }
                        other => {
                            error!("Other framework error: {}", other);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let settings = settings.clone();
            let guild_configs = guild_configs.clone();

            Box::pin(async move {
                info!("Bot logged in as: {}", ready.user.name);

                let guilds_to_register: Vec<serenity::GuildId> = match target_guild_id {
                    Some(gid) => vec![serenity::GuildId::new(gid)],
                    None => ready.guilds.iter().map(|g| g.id).collect(),
                };

                if guild_commands || target_guild_id.is_some() {
                    for guild_id in &guilds_to_register {
                        if let Err(e) = poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            *guild_id,
                        )
                        .await
                        {
                            error!("Failed to register commands for guild {}: {}", guild_id, e);
                        } else {
                            info!("Registered {} commands for guild {}",
                                  framework.options().commands.len(), guild_id);
                        }
                    }
                } else if let Err(e) =
                    poise::builtins::register_globally(ctx, &framework.options().commands).await
                {
                    error!("Failed to register commands globally: {}", e);
                } else {
                    info!("Registered {} commands globally", framework.options().commands.len());
                }

                let verifier = Verifier::new(
                    Arc::new(fetcher),
                    FieldExtractor::new(Arc::new(ocr), CardLayout::default(), settings.ocr_timeout),
                    AlertPublisher::new(Arc::new(SerenityAlertSink::new(ctx.http.clone()))),
                );
                let detector = DropDetector::start(&settings, guild_configs.clone(), verifier);

                Ok(Data {
                    guild_configs,
                    detector,
                })
            })
        })
        .build();

    // Message content is privileged and must be enabled in the Developer Portal
    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting bot...");
    if let Err(e) = client.start().await {
        let err_str = e.to_string();
        if err_str.contains("Disallowed") || err_str.contains("intents") {
            error!("Failed to start bot: {}", e);
            error!("Enable the MESSAGE_CONTENT privileged intent at https://discord.com/developers/applications -> Your App -> Bot");
            return Err(anyhow::anyhow!("Disallowed gateway intents: MESSAGE_CONTENT"));
        }
        return Err(e.into());
    }
    warn!("Bot ended.");

    Ok(())
}
