use serde::{Deserialize, Serialize};

/// Document collection holding one config per guild
pub const SERVERS_COLLECTION: &str = "servers";

/// Per-guild alert routing, stored as `{"guild_id": "...", "targetChannelId": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    pub guild_id: String,
    #[serde(rename = "targetChannelId")]
    pub target_channel_id: u64,
}

impl GuildConfig {
    pub fn new(guild_id: impl Into<String>, target_channel_id: u64) -> Self {
        Self {
            guild_id: guild_id.into(),
            target_channel_id,
        }
    }
}
