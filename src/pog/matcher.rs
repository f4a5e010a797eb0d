use tracing::{debug, info};

use super::claims::Claim;
use super::extractor::ExtractedField;

/// Names must score strictly above this to match
pub const NAME_MATCH_THRESHOLD: u8 = 70;

/// Result of checking claims against what the image actually shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub accepted: bool,
    pub matched_claim: Option<Claim>,
}

impl VerificationOutcome {
    fn accepted(claim: &Claim) -> Self {
        Self {
            accepted: true,
            matched_claim: Some(claim.clone()),
        }
    }

    fn rejected() -> Self {
        Self {
            accepted: false,
            matched_claim: None,
        }
    }
}

/// Best similarity (0-100) of the shorter string against any equally long
/// window of the longer one
///
/// Case-sensitive; callers lowercase first.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let needle: String = short.iter().collect();

    let best = long
        .windows(short.len())
        .map(|window| {
            let window: String = window.iter().collect();
            strsim::normalized_levenshtein(&needle, &window)
        })
        .fold(0.0_f64, f64::max);

    (best * 100.0).round() as u8
}

/// Accept on the first (claim, field) pair that matches
///
/// Claims are tried in order, each against every field. A field may confirm
/// a claim for a different card slot.
pub fn verify(claims: &[Claim], fields: &[ExtractedField]) -> VerificationOutcome {
    for claim in claims {
        for field in fields {
            if let Some(name) = &claim.name {
                let score = partial_ratio(&name.to_lowercase(), &field.name.to_lowercase());
                if score > NAME_MATCH_THRESHOLD {
                    info!(
                        "OCR name matched: {} ~ {} / {} (score {}, card {})",
                        name, field.name, field.series, score, field.card_slot
                    );
                    return VerificationOutcome::accepted(claim);
                }
            }

            if let Some(gid) = claim.generation_id {
                if gid.to_string() == field.generation {
                    info!(
                        "OCR generation matched: {} ~ {} (card {})",
                        gid, field.generation, field.card_slot
                    );
                    return VerificationOutcome::accepted(claim);
                }
            }
        }
    }

    debug!(
        "No match for {} claim(s) against {} field(s)",
        claims.len(),
        fields.len()
    );
    VerificationOutcome::rejected()
}
