pub mod discord;
pub mod message;
