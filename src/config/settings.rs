use std::str::FromStr;
use std::time::Duration;

use crate::error::{BotError, Result};

/// Account that posts drop messages (the only author whose text is parsed)
pub const DEFAULT_SOURCE_BOT_ID: u64 = 742070928111960155;

/// Account that posts the card image separately from the drop text
pub const DEFAULT_RELAY_BOT_ID: u64 = 853629533855809596;

/// Runtime settings, read once at startup from the environment
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Root directory of the JSON document store
    pub data_path: String,

    /// Identity gate for drop parsing
    pub source_bot_id: u64,

    /// Secondary author accepted during image location
    pub relay_bot_id: u64,

    /// How often the guild config cache is cleared
    pub cache_sweep_interval: Duration,

    /// Maximum number of verifications running at once
    pub max_concurrent_verifications: usize,

    /// Queued verifications beyond this are dropped
    pub verification_queue_capacity: usize,

    pub image_fetch_timeout: Duration,
    pub ocr_timeout: Duration,

    /// Directory holding `*.traineddata`; None uses the Tesseract default
    pub tessdata_path: Option<String>,
    pub tesseract_lang: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            data_path: "data".to_string(),
            source_bot_id: DEFAULT_SOURCE_BOT_ID,
            relay_bot_id: DEFAULT_RELAY_BOT_ID,
            cache_sweep_interval: Duration::from_secs(300),
            max_concurrent_verifications: 4,
            verification_queue_capacity: 32,
            image_fetch_timeout: Duration::from_secs(15),
            ocr_timeout: Duration::from_secs(10),
            tessdata_path: None,
            tesseract_lang: "eng".to_string(),
        }
    }
}

impl BotSettings {
    /// Build settings from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let settings = Self {
            data_path: lookup("DATA_PATH").unwrap_or(defaults.data_path),
            source_bot_id: parse_or(&lookup, "SOURCE_BOT_ID", defaults.source_bot_id)?,
            relay_bot_id: parse_or(&lookup, "RELAY_BOT_ID", defaults.relay_bot_id)?,
            cache_sweep_interval: Duration::from_secs(parse_or(
                &lookup,
                "CACHE_SWEEP_SECS",
                defaults.cache_sweep_interval.as_secs(),
            )?),
            max_concurrent_verifications: parse_or(
                &lookup,
                "MAX_CONCURRENT_VERIFICATIONS",
                defaults.max_concurrent_verifications,
            )?,
            verification_queue_capacity: parse_or(
                &lookup,
                "VERIFICATION_QUEUE_CAPACITY",
                defaults.verification_queue_capacity,
            )?,
            image_fetch_timeout: Duration::from_secs(parse_or(
                &lookup,
                "IMAGE_FETCH_TIMEOUT_SECS",
                defaults.image_fetch_timeout.as_secs(),
            )?),
            ocr_timeout: Duration::from_secs(parse_or(
                &lookup,
                "OCR_TIMEOUT_SECS",
                defaults.ocr_timeout.as_secs(),
            )?),
            tessdata_path: lookup("TESSDATA_PATH").filter(|path| !path.trim().is_empty()),
            tesseract_lang: lookup("TESSERACT_LANG").unwrap_or(defaults.tesseract_lang),
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.cache_sweep_interval.is_zero() {
            return Err(BotError::ConfigValidation {
                message: "CACHE_SWEEP_SECS must be greater than 0".to_string(),
            });
        }
        if self.max_concurrent_verifications == 0 {
            return Err(BotError::ConfigValidation {
                message: "MAX_CONCURRENT_VERIFICATIONS must be greater than 0".to_string(),
            });
        }
        if self.verification_queue_capacity == 0 {
            return Err(BotError::ConfigValidation {
                message: "VERIFICATION_QUEUE_CAPACITY must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| BotError::ConfigValidation {
                message: format!("{} has invalid value '{}': {}", key, raw, e),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = BotSettings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings.source_bot_id, DEFAULT_SOURCE_BOT_ID);
        assert_eq!(settings.relay_bot_id, DEFAULT_RELAY_BOT_ID);
        assert_eq!(settings.cache_sweep_interval, Duration::from_secs(300));
        assert_eq!(settings.data_path, "data");
        assert_eq!(settings.tessdata_path, None);
        assert_eq!(settings.tesseract_lang, "eng");
    }

    #[test]
    fn test_overrides() {
        let settings = BotSettings::from_lookup(lookup_from(&[
            ("SOURCE_BOT_ID", "1"),
            ("MAX_CONCURRENT_VERIFICATIONS", "2"),
            ("OCR_TIMEOUT_SECS", " 30 "),
        ]))
        .unwrap();
        assert_eq!(settings.source_bot_id, 1);
        assert_eq!(settings.max_concurrent_verifications, 2);
        assert_eq!(settings.ocr_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_malformed_value_is_rejected() {
        let result = BotSettings::from_lookup(lookup_from(&[("RELAY_BOT_ID", "abc")]));
        assert!(matches!(result, Err(BotError::ConfigValidation { .. })));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let result =
            BotSettings::from_lookup(lookup_from(&[("MAX_CONCURRENT_VERIFICATIONS", "0")]));
        assert!(result.is_err());
    }
}
