pub mod document_store;
pub mod guild_config;

pub use document_store::{DocumentStore, JsonDocumentStore};
pub use guild_config::{GuildConfig, SERVERS_COLLECTION};
