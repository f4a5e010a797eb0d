use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use tracing::{error, info, warn};

use crate::managers::GuildConfigCache;
use crate::messages;
use crate::{Context, Error};

/// Set the target channel for POG alerts
#[poise::command(
    slash_command,
    guild_only,
    rename = "setchannel",
    default_member_permissions = "MANAGE_GUILD"
)]
pub async fn set_channel(
    ctx: Context<'_>,
    #[description = "ID (or mention) of the channel that receives alerts"] channelid: String,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    let assignment = assign_alert_channel(
        ctx.serenity_context(),
        &ctx.data().guild_configs,
        &guild_id.to_string(),
        &channelid,
    )
    .await;
    if let Assignment::Saved(channel_id) = assignment {
        info!(
            "{} set the alert channel of guild {} to {}",
            ctx.author().name,
            guild_id,
            channel_id
        );
    }
    ctx.say(assignment.reply()).await?;

    Ok(())
}

/// Answers whether a channel exists and can receive messages
#[async_trait]
pub trait ChannelLookup: Send + Sync {
    async fn accepts_messages(&self, channel_id: u64) -> crate::error::Result<bool>;
}

#[async_trait]
impl ChannelLookup for serenity::Context {
    async fn accepts_messages(&self, channel_id: u64) -> crate::error::Result<bool> {
        let channel = serenity::ChannelId::new(channel_id).to_channel(self).await?;
        Ok(is_messageable(&channel))
    }
}

/// Result of a `/setchannel` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Saved(u64),
    InvalidId,
    NotMessageable,
    SaveFailed,
}

impl Assignment {
    pub fn reply(&self) -> String {
        match self {
            Assignment::Saved(channel_id) => messages::channel_set_message(*channel_id),
            Assignment::InvalidId => messages::INVALID_CHANNEL_ID.to_string(),
            Assignment::NotMessageable => messages::CHANNEL_NOT_MESSAGEABLE.to_string(),
            Assignment::SaveFailed => messages::CHANNEL_SAVE_FAILED.to_string(),
        }
    }
}

/// Validate the requested channel and persist it; nothing is written unless
/// the channel resolves and accepts messages
pub async fn assign_alert_channel(
    lookup: &dyn ChannelLookup,
    guild_configs: &GuildConfigCache,
    guild_id: &str,
    input: &str,
) -> Assignment {
    let Some(channel_id) = parse_channel_id(input) else {
        return Assignment::InvalidId;
    };

    match lookup.accepts_messages(channel_id).await {
        Ok(true) => {}
        Ok(false) => return Assignment::NotMessageable,
        Err(e) => {
            warn!("Could not resolve channel {}: {}", channel_id, e);
            return Assignment::InvalidId;
        }
    }

    match guild_configs.set(guild_id, channel_id).await {
        Ok(_) => Assignment::Saved(channel_id),
        Err(e) => {
            error!("Failed to save alert channel for guild {}: {}", guild_id, e);
            Assignment::SaveFailed
        }
    }
}

/// Accept a raw id or a `<#id>` mention
fn parse_channel_id(input: &str) -> Option<u64> {
    let input = input.trim();
    let digits = input
        .strip_prefix("<#")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(input);
    digits.parse::<u64>().ok().filter(|id| *id != 0)
}

fn is_messageable(channel: &serenity::Channel) -> bool {
    match channel {
        serenity::Channel::Guild(guild_channel) => accepts_messages(guild_channel.kind),
        serenity::Channel::Private(_) => true,
        _ => false,
    }
}

fn accepts_messages(kind: serenity::ChannelType) -> bool {
    matches!(
        kind,
        serenity::ChannelType::Text
            | serenity::ChannelType::News
            | serenity::ChannelType::Voice
            | serenity::ChannelType::Stage
            | serenity::ChannelType::PublicThread
            | serenity::ChannelType::PrivateThread
            | serenity::ChannelType::NewsThread
    )
}
