use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::info;

use super::locator::MentionedUser;
use crate::error::Result;
use crate::messages;

/// Public alert for a verified drop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub footer: String,
    pub color: u32,
    /// Deep link back to the drop message
    pub jump_url: String,
}

impl Alert {
    pub fn new(
        drop_content: &str,
        image_url: &str,
        dropper: Option<&MentionedUser>,
        jump_url: &str,
    ) -> Self {
        let mention = dropper
            .map(MentionedUser::mention)
            .unwrap_or_else(|| messages::UNKNOWN_USER.to_string());
        let display_name = dropper
            .map(|user| user.display_name.as_str())
            .unwrap_or(messages::UNKNOWN_USER);

        Self {
            title: messages::ALERT_TITLE.to_string(),
            description: messages::alert_description(&mention, drop_content),
            image_url: image_url.to_string(),
            footer: messages::alert_footer(display_name),
            color: messages::ALERT_COLOR,
            jump_url: jump_url.to_string(),
        }
    }

    /// Render as a message with an embed and a link button
    pub fn to_message(&self) -> serenity::CreateMessage {
        let embed = serenity::CreateEmbed::new()
            .title(&self.title)
            .description(&self.description)
            .image(&self.image_url)
            .footer(serenity::CreateEmbedFooter::new(&self.footer))
            .color(self.color);

        let button = serenity::CreateButton::new_link(&self.jump_url)
            .label(messages::JUMP_BUTTON_LABEL);

        serenity::CreateMessage::new()
            .embed(embed)
            .components(vec![serenity::CreateActionRow::Buttons(vec![button])])
    }
}

/// Where alerts are delivered
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(&self, channel_id: u64, alert: &Alert) -> Result<()>;
}

/// Sends alerts to a guild's configured channel
pub struct AlertPublisher {
    sink: Arc<dyn AlertSink>,
}

impl AlertPublisher {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self { sink }
    }

    pub async fn publish(&self, target_channel_id: u64, alert: &Alert) -> Result<()> {
        self.sink.send_alert(target_channel_id, alert).await?;
        info!("Published POG alert to channel {}", target_channel_id);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records every alert instead of sending it
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub sent: Mutex<Vec<(u64, Alert)>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn send_alert(&self, channel_id: u64, alert: &Alert) -> Result<()> {
            self.sent.lock().push((channel_id, alert.clone()));
            Ok(())
        }
    }

    #[test]
    fn test_alert_with_dropper() {
        let dropper = MentionedUser {
            id: 77,
            display_name: "Mika".to_string(),
        };
        let alert = Alert::new(
            "`1] :heart: `150`",
            "https://cdn/card.png",
            Some(&dropper),
            "https://discord.com/channels/1/2/3",
        );

        assert!(alert.description.starts_with("<@77> triggered a POG!"));
        assert!(alert.description.contains("`1] :heart: `150`"));
        assert_eq!(alert.footer, "Dropped by: Mika");
        assert_eq!(alert.image_url, "https://cdn/card.png");
        assert_eq!(alert.color, 0x87CEEB);
    }

    #[test]
    fn test_alert_without_dropper() {
        let alert = Alert::new("drop", "https://cdn/card.png", None, "https://jump");
        assert!(alert.description.starts_with("Unknown triggered a POG!"));
        assert_eq!(alert.footer, "Dropped by: Unknown");
        assert_eq!(alert.jump_url, "https://jump");
    }

    #[tokio::test]
    async fn test_publisher_targets_channel() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = AlertPublisher::new(sink.clone());
        let alert = Alert::new("drop", "https://cdn/card.png", None, "https://jump");

        publisher.publish(555, &alert).await.unwrap();

        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 555);
    }
}
