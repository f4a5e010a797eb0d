use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

use crate::error::{BotError, Result};
use crate::pog::{Alert, AlertSink, DropChannel, DropMessage, HistoryMessage, MentionedUser};

/// Convert a gateway message into the detector's view of it
pub fn drop_message(msg: &serenity::Message) -> DropMessage {
    DropMessage {
        id: msg.id.get(),
        guild_id: msg.guild_id.map(|id| id.get()),
        channel_id: msg.channel_id.get(),
        author_id: msg.author.id.get(),
        content: msg.content.clone(),
        jump_url: msg.link(),
    }
}

/// Convert a message fetched from channel history
pub fn history_message(msg: &serenity::Message) -> HistoryMessage {
    HistoryMessage {
        id: msg.id.get(),
        author_id: msg.author.id.get(),
        attachment_urls: msg.attachments.iter().map(|a| a.url.clone()).collect(),
        embed_image_url: msg
            .embeds
            .first()
            .and_then(|embed| embed.image.as_ref())
            .map(|image| image.url.clone()),
        mentions: msg
            .mentions
            .iter()
            .map(|user| MentionedUser {
                id: user.id.get(),
                display_name: user.global_name.clone().unwrap_or_else(|| user.name.clone()),
            })
            .collect(),
    }
}

/// The Discord channel a drop arrived in
pub struct SerenityDropChannel {
    http: Arc<serenity::Http>,
    channel_id: serenity::ChannelId,
    /// The drop itself; history is read strictly before it
    before: serenity::MessageId,
}

impl SerenityDropChannel {
    pub fn new(
        http: Arc<serenity::Http>,
        channel_id: serenity::ChannelId,
        before: serenity::MessageId,
    ) -> Self {
        Self {
            http,
            channel_id,
            before,
        }
    }
}

#[async_trait]
impl DropChannel for SerenityDropChannel {
    async fn preceding_messages(&self, limit: usize) -> Result<Vec<HistoryMessage>> {
        let limit = u8::try_from(limit).unwrap_or(u8::MAX);
        let messages = self
            .channel_id
            .messages(
                &self.http,
                serenity::GetMessages::new().before(self.before).limit(limit),
            )
            .await?;
        Ok(messages.iter().map(history_message).collect())
    }

    async fn say(&self, content: &str) -> Result<()> {
        self.channel_id.say(&self.http, content).await?;
        Ok(())
    }
}

/// Sends alerts through the Discord HTTP API
pub struct SerenityAlertSink {
    http: Arc<serenity::Http>,
}

impl SerenityAlertSink {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AlertSink for SerenityAlertSink {
    async fn send_alert(&self, channel_id: u64, alert: &Alert) -> Result<()> {
        if channel_id == 0 {
            return Err(BotError::InvalidChannel {
                message: "channel id 0".to_string(),
            });
        }
        serenity::ChannelId::new(channel_id)
            .send_message(&self.http, alert.to_message())
            .await?;
        Ok(())
    }
}
