//! Parsing of drop messages into rarity claims.
//!
//! A drop message lists up to three cards, one per line:
//!
//! ```text
//! `1] :heart: `150` • `ɢ42` • **Raiden Shogun** • Genshin Impact
//! ```
//!
//! The text is untrusted; a claim only says what the message asserts.

use once_cell::sync::Lazy;
use regex::Regex;

/// Marker the source bot puts on messages that are not real drops
pub const NO_DROP_MARKER: &str = "<:noriclock:";

/// Hearts above this make a card worth an alert
pub const HEART_THRESHOLD: u64 = 99;

/// Generation ids below this make a card worth an alert
pub const GENERATION_THRESHOLD: u64 = 100;

static LINE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^`?[123]\]").unwrap());
static HEARTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?::heart:|\x{2764}\x{FE0F}?)\s*`(\d+)").unwrap());
static GENERATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"`?ɢ\s*(\d+)").unwrap());
static NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`?[0-9]+\]\s+.+?•\s+\*\*(.+?)\*\*").unwrap());

/// What one drop line claims about its card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub name: Option<String>,
    pub generation_id: Option<u64>,
    pub hearts: u64,
}

impl Claim {
    /// Whether the claimed rarity crosses the alert threshold
    pub fn is_qualifying(&self) -> bool {
        self.hearts > HEART_THRESHOLD
            || self
                .generation_id
                .is_some_and(|gid| gid < GENERATION_THRESHOLD)
    }
}

/// Parse every claim in a drop message, in line order
///
/// Returns nothing for empty text, non-drop messages, messages containing a
/// `0]` index, or text without any `1]`/`2]`/`3]` token.
pub fn parse_claims(content: &str) -> Vec<Claim> {
    if content.trim().is_empty()
        || content.contains(NO_DROP_MARKER)
        || content.contains("0]")
        || !["1]", "2]", "3]"].iter().any(|token| content.contains(token))
    {
        return Vec::new();
    }

    content.lines().filter_map(parse_line).collect()
}

/// Parse only the claims worth verifying
pub fn qualifying_claims(content: &str) -> Vec<Claim> {
    parse_claims(content)
        .into_iter()
        .filter(Claim::is_qualifying)
        .collect()
}

fn parse_line(line: &str) -> Option<Claim> {
    let line = line.trim();
    if !LINE_PREFIX.is_match(line) {
        return None;
    }

    let hearts = capture_number(&HEARTS, line);
    let generation_id = capture_number(&GENERATION, line);
    if hearts.is_none() && generation_id.is_none() {
        return None;
    }

    let name = NAME
        .captures(line)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty());

    Some(Claim {
        name,
        generation_id,
        hearts: hearts.unwrap_or(0),
    })
}

/// Digit runs too long for a u64 saturate instead of being lost
fn capture_number(pattern: &Regex, line: &str) -> Option<u64> {
    pattern
        .captures(line)
        .map(|caps| caps[1].parse().unwrap_or(u64::MAX))
}
