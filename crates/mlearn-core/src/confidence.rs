//! Confidence scoring for detected retry patterns.

use crate::template::match_any;

/// Confidence never reaches certainty.
pub const MAX_CONFIDENCE: f64 = 0.95;

const BASE_CONFIDENCE: f64 = 0.4;
const PER_FAILURE: f64 = 0.1;
const FAILURE_CEILING: f64 = 0.8;
const TEMPLATE_BONUS: f64 = 0.1;
const CONSISTENCY_BONUS: f64 = 0.05;

/// Scores a retry pattern in `[0.0, 0.95]`.
///
/// - base: `min(0.4 + 0.1 * failures, 0.8)`
/// - `+0.10` if any error message matches a known template
/// - `+0.05` if there is more than one message and all are identical
pub fn calculate_confidence(failure_count: usize, error_messages: &[String]) -> f64 {
    let mut confidence =
        (BASE_CONFIDENCE + PER_FAILURE * failure_count as f64).min(FAILURE_CEILING);

    if match_any(error_messages.iter().map(String::as_str)).is_some() {
        confidence += TEMPLATE_BONUS;
    }

    let consistent = error_messages
        .first()
        .is_some_and(|first| error_messages.iter().all(|m| m == first));
    if error_messages.len() > 1 && consistent {
        confidence += CONSISTENCY_BONUS;
    }

    confidence.min(MAX_CONFIDENCE)
}

/// Converts a confidence score into the whole percentage shown in lessons.
pub fn confidence_percent(confidence: f64) -> u8 {
    (confidence.clamp(0.0, 1.0) * 100.0 + 1e-9).floor() as u8
}
