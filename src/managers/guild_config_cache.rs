use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{BotError, Result};
use crate::state::{DocumentStore, GuildConfig, SERVERS_COLLECTION};

/// Read-through cache of guild alert configs
///
/// Entries are replaced wholesale, never mutated in place. A guild without a
/// stored config is cached as `None` so repeated lookups stay off the store.
pub struct GuildConfigCache {
    store: Arc<dyn DocumentStore>,

    /// guild_id -> config (None = alerts disabled)
    entries: DashMap<String, Option<GuildConfig>>,
}

impl GuildConfigCache {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            entries: DashMap::new(),
        }
    }

    /// Get the config for a guild, querying the store on a miss
    pub async fn get(&self, guild_id: &str) -> Result<Option<GuildConfig>> {
        if let Some(entry) = self.entries.get(guild_id) {
            return Ok(entry.value().clone());
        }

        let config = match self.store.find_one(SERVERS_COLLECTION, guild_id).await? {
            Some(document) => match serde_json::from_value::<GuildConfig>(document) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Ignoring malformed config for guild {}: {}", guild_id, e);
                    None
                }
            },
            None => None,
        };

        // A `set` that landed while the store was being read wins
        let cached = self
            .entries
            .entry(guild_id.to_string())
            .or_insert(config)
            .value()
            .clone();
        debug!("Cached config for guild {}: {:?}", guild_id, cached);
        Ok(cached)
    }

    /// Persist a target channel, then replace the cached entry
    pub async fn set(&self, guild_id: &str, target_channel_id: u64) -> Result<GuildConfig> {
        let config = GuildConfig::new(guild_id, target_channel_id);
        let document = serde_json::to_value(&config).map_err(|e| BotError::StoreWrite {
            collection: SERVERS_COLLECTION.to_string(),
            message: e.to_string(),
        })?;

        self.store
            .upsert(SERVERS_COLLECTION, guild_id, document)
            .await?;
        self.entries
            .insert(guild_id.to_string(), Some(config.clone()));

        info!(
            "Guild {} now routes alerts to channel {}",
            guild_id, target_channel_id
        );
        Ok(config)
    }

    /// Drop every cached entry
    pub fn sweep(&self) {
        let count = self.entries.len();
        self.entries.clear();
        debug!("Swept {} guild config cache entries", count);
    }

    /// Number of cached guilds (including cached misses)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start the periodic sweep; the caller owns the returned handle
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                cache.sweep();
            }
        })
    }
}

/// Shared guild config cache type
pub type SharedGuildConfigCache = Arc<GuildConfigCache>;

pub fn create_shared_guild_config_cache(store: Arc<dyn DocumentStore>) -> SharedGuildConfigCache {
    Arc::new(GuildConfigCache::new(store))
}
