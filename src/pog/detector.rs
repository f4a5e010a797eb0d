use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::alert::{Alert, AlertPublisher};
use super::claims::{qualifying_claims, Claim};
use super::extractor::{decode_image, FieldExtractor, DEFAULT_SLOT_COUNT};
use super::fetch::ImageFetcher;
use super::locator::{locate_image, HistoryMessage, ImageReference, HISTORY_WINDOW};
use super::matcher::{verify, VerificationOutcome};
use crate::config::BotSettings;
use crate::error::Result;
use crate::managers::{SharedGuildConfigCache, VerificationPool};
use crate::messages;

/// The channel a drop was posted in
#[async_trait]
pub trait DropChannel: Send + Sync {
    /// Up to `limit` messages right before the drop, newest first
    async fn preceding_messages(&self, limit: usize) -> Result<Vec<HistoryMessage>>;

    /// Post a plain message in the channel
    async fn say(&self, content: &str) -> Result<()>;
}

/// Platform-neutral view of an inbound message
#[derive(Debug, Clone, Default)]
pub struct DropMessage {
    pub id: u64,
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    pub author_id: u64,
    pub content: String,
    pub jump_url: String,
}

/// Why a message was not acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    UntrustedAuthor,
    NotInGuild,
    NoQualifyingClaims,
    AlertsDisabled,
    NoImage,
}

/// What happened to an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Ignored(IgnoreReason),
    /// Acknowledged and handed to the worker pool
    Dispatched,
    /// Acknowledged, but the worker pool had no room
    QueueFull,
}

/// Everything a background verification needs, owned
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub target_channel_id: u64,
    pub claims: Vec<Claim>,
    pub image: ImageReference,
    pub drop_content: String,
    pub drop_jump_url: String,
}

/// Fetch, read, match and publish for one drop
pub struct Verifier {
    fetcher: Arc<dyn ImageFetcher>,
    extractor: FieldExtractor,
    publisher: AlertPublisher,
}

impl Verifier {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        extractor: FieldExtractor,
        publisher: AlertPublisher,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            publisher,
        }
    }

    pub async fn run(&self, request: VerificationRequest) -> Result<VerificationOutcome> {
        let bytes = self.fetcher.fetch(request.image.image_url()).await?;
        let image = decode_image(bytes).await?;
        let fields = self.extractor.extract(&image, DEFAULT_SLOT_COUNT).await?;

        let outcome = verify(&request.claims, &fields);
        if !outcome.accepted {
            info!(
                "OCR verification failed for all cards, no alert for {}",
                request.drop_jump_url
            );
            return Ok(outcome);
        }

        let alert = Alert::new(
            &request.drop_content,
            request.image.image_url(),
            request.image.attributed_user.as_ref(),
            &request.drop_jump_url,
        );
        self.publisher
            .publish(request.target_channel_id, &alert)
            .await?;
        info!("Verified claim {:?}", outcome.matched_claim);

        Ok(outcome)
    }
}

/// Watches drops, acknowledges qualifying ones and verifies them in the background
pub struct DropDetector {
    source_bot_id: u64,
    relay_bot_id: u64,
    guild_configs: SharedGuildConfigCache,
    verifier: Arc<Verifier>,
    pool: Option<VerificationPool>,
    sweeper: JoinHandle<()>,
}

impl DropDetector {
    /// Start the cache sweeper and worker pool; needs a tokio runtime
    pub fn start(
        settings: &BotSettings,
        guild_configs: SharedGuildConfigCache,
        verifier: Verifier,
    ) -> Self {
        let sweeper = guild_configs.spawn_sweeper(settings.cache_sweep_interval);
        let pool = VerificationPool::start(
            settings.max_concurrent_verifications,
            settings.verification_queue_capacity,
        );
        info!(
            "Drop detector started (source={}, relay={}, max_concurrent={}, queue={})",
            settings.source_bot_id,
            settings.relay_bot_id,
            settings.max_concurrent_verifications,
            settings.verification_queue_capacity
        );

        Self {
            source_bot_id: settings.source_bot_id,
            relay_bot_id: settings.relay_bot_id,
            guild_configs,
            verifier: Arc::new(verifier),
            pool: Some(pool),
            sweeper,
        }
    }

    /// Whether messages from this author are parsed at all
    pub fn is_source(&self, author_id: u64) -> bool {
        author_id == self.source_bot_id
    }

    /// Process one inbound message; never waits on verification
    pub async fn handle(&self, msg: &DropMessage, channel: &dyn DropChannel) -> Result<DropOutcome> {
        if !self.is_source(msg.author_id) {
            return Ok(DropOutcome::Ignored(IgnoreReason::UntrustedAuthor));
        }
        let Some(guild_id) = msg.guild_id else {
            return Ok(DropOutcome::Ignored(IgnoreReason::NotInGuild));
        };

        let claims = qualifying_claims(&msg.content);
        if claims.is_empty() {
            debug!("No qualifying claims in message {}", msg.id);
            return Ok(DropOutcome::Ignored(IgnoreReason::NoQualifyingClaims));
        }

        let Some(config) = self.guild_configs.get(&guild_id.to_string()).await? else {
            debug!("Guild {} has no alert channel, skipping drop {}", guild_id, msg.id);
            return Ok(DropOutcome::Ignored(IgnoreReason::AlertsDisabled));
        };
        info!(
            "POG detected in message {} (channel {}): {:?}",
            msg.id, msg.channel_id, claims
        );

        let history = channel.preceding_messages(HISTORY_WINDOW).await?;
        let Some(image) = locate_image(&history, self.source_bot_id, self.relay_bot_id) else {
            info!("No card image found before drop {}", msg.id);
            return Ok(DropOutcome::Ignored(IgnoreReason::NoImage));
        };
        debug!(
            "Card image for drop {} found on message {}",
            msg.id, image.source_message_id
        );

        let mention = image
            .attributed_user
            .as_ref()
            .map(|user| user.mention())
            .unwrap_or_else(|| format!("<@{}>", self.relay_bot_id));
        let ack = messages::pog_acknowledgement(&mention, config.target_channel_id);
        if let Err(e) = channel.say(&ack).await {
            debug!("Acknowledgement for drop {} not sent: {}", msg.id, e);
        }

        let request = VerificationRequest {
            target_channel_id: config.target_channel_id,
            claims,
            image,
            drop_content: msg.content.clone(),
            drop_jump_url: msg.jump_url.clone(),
        };
        let verifier = Arc::clone(&self.verifier);
        let job = Box::pin(async move { verifier.run(request).await.map(|_| ()) });

        let Some(pool) = &self.pool else {
            warn!("Drop detector is shut down, not verifying drop {}", msg.id);
            return Ok(DropOutcome::QueueFull);
        };
        match pool.submit(format!("drop {}", msg.id), job) {
            Ok(()) => Ok(DropOutcome::Dispatched),
            Err(_) => Ok(DropOutcome::QueueFull),
        }
    }

    /// Stop the cache sweeper and let queued verifications finish
    pub async fn shutdown(mut self) {
        self.sweeper.abort();
        if let Some(pool) = self.pool.take() {
            pool.shutdown().await;
        }
        info!("Drop detector stopped");
    }
}

impl Drop for DropDetector {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}
