use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    // Configuration errors
    #[error("Invalid config: {message}")]
    ConfigValidation { message: String },

    // Document store errors
    #[error("Failed to read collection '{collection}': {message}")]
    StoreRead { collection: String, message: String },

    #[error("Failed to write collection '{collection}': {message}")]
    StoreWrite { collection: String, message: String },

    // Discord errors
    #[error("Discord API error: {message}")]
    Discord { message: String },

    #[error("Invalid channel: {message}")]
    InvalidChannel { message: String },

    // Verification pipeline errors
    #[error("Failed to fetch image '{url}': {message}")]
    ImageFetch { url: String, message: String },

    #[error("Failed to decode image: {message}")]
    ImageDecode { message: String },

    #[error("OCR failed: {message}")]
    Ocr { message: String },

    #[error("Verification queue rejected job: {message}")]
    QueueRejected { message: String },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<serenity::Error> for BotError {
    fn from(err: serenity::Error) -> Self {
        BotError::Discord {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<image::ImageError> for BotError {
    fn from(err: image::ImageError) -> Self {
        BotError::ImageDecode {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

use poise::serenity_prelude as serenity;
