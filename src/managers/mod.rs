pub mod guild_config_cache;
pub mod verification_pool;

pub use guild_config_cache::{
    create_shared_guild_config_cache, GuildConfigCache, SharedGuildConfigCache,
};
pub use verification_pool::VerificationPool;
