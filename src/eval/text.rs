//! Text recognition scoring over region crops.
//!
//! The recognition engine itself is behind the [`TextRecognizer`] trait:
//! it is expensive to initialize, so one instance is constructed up front,
//! owned by the evaluation context, and shared read-only across regions
//! and cycles.

use crate::image::ImageView;
use crate::region::{OcrConfig, TextMatchMode};

/// One recognized text fragment with its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct TextDetection {
    pub text: String,
    pub confidence: f32,
}

/// Recognition engine seam.
///
/// Implementations must be safe for concurrent read-only use; the context
/// may evaluate regions in parallel.
pub trait TextRecognizer: Send + Sync {
    /// Runs detection and recognition over a grayscale crop.
    fn recognize(&self, crop: ImageView<'_, u8>) -> Vec<TextDetection>;
}

/// Recognizer that never detects anything.
///
/// Useful for offline runs and tests where no engine is wired up; OCR
/// regions then evaluate as zero-confidence non-matches.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecognizer;

impl TextRecognizer for NullRecognizer {
    fn recognize(&self, _crop: ImageView<'_, u8>) -> Vec<TextDetection> {
        Vec::new()
    }
}

/// Outcome of scoring detections against an expected-text condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextScore {
    pub matched: bool,
    /// Best confidence among detections whose text matched the condition,
    /// even when below the configured minimum. Surfaced for diagnostics.
    pub confidence: f32,
}

fn text_matches(text: &str, cfg: &OcrConfig) -> bool {
    match &cfg.mode {
        TextMatchMode::Exact => text == cfg.expected.trim(),
        TextMatchMode::Contains => text.to_lowercase().contains(&cfg.expected.to_lowercase()),
        TextMatchMode::Regex(re) => re.is_match(text),
    }
}

/// Scores a detection list against the configured condition.
///
/// Empty texts are ignored. `matched` requires at least one matching
/// detection at or above the minimum confidence; `confidence` tracks the
/// best matching detection regardless of the minimum.
pub fn score_detections(detections: &[TextDetection], cfg: &OcrConfig) -> TextScore {
    let mut best = 0.0f32;
    let mut matched = false;
    for det in detections {
        let text = det.text.trim();
        if text.is_empty() || !text_matches(text, cfg) {
            continue;
        }
        let confidence = det.confidence.clamp(0.0, 1.0);
        if confidence > best {
            best = confidence;
        }
        if confidence >= cfg.min_confidence {
            matched = true;
        }
    }
    TextScore {
        matched,
        confidence: best,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(expected: &str, mode: TextMatchMode, min_confidence: f32) -> OcrConfig {
        OcrConfig {
            expected: expected.to_string(),
            mode,
            min_confidence,
        }
    }

    fn det(text: &str, confidence: f32) -> TextDetection {
        TextDetection {
            text: text.to_string(),
            confidence,
        }
    }

    #[test]
    fn exact_mode_trims_before_comparing() {
        let cfg = cfg("Continue", TextMatchMode::Exact, 0.5);
        let score = score_detections(&[det("  Continue  ", 0.9)], &cfg);
        assert!(score.matched);
        assert_eq!(score.confidence, 0.9);

        let score = score_detections(&[det("continue", 0.9)], &cfg);
        assert!(!score.matched);
        assert_eq!(score.confidence, 0.0);
    }

    #[test]
    fn contains_mode_is_case_insensitive() {
        let cfg = cfg("Game Over", TextMatchMode::Contains, 0.5);
        let score = score_detections(&[det("GAME OVER - retry?", 0.8)], &cfg);
        assert!(score.matched);
    }

    #[test]
    fn regex_mode_is_case_sensitive_search() {
        let re = regex::Regex::new(r"Score: \d+").unwrap();
        let cfg = cfg(r"Score: \d+", TextMatchMode::Regex(re), 0.5);
        assert!(score_detections(&[det("Final Score: 120", 0.7)], &cfg).matched);
        assert!(!score_detections(&[det("final score: 120", 0.7)], &cfg).matched);
    }

    #[test]
    fn best_confidence_is_surfaced_below_the_minimum() {
        let cfg = cfg("ok", TextMatchMode::Contains, 0.8);
        let score = score_detections(&[det("ok", 0.6), det("ok!", 0.4)], &cfg);
        assert!(!score.matched);
        assert_eq!(score.confidence, 0.6);
    }

    #[test]
    fn empty_detections_score_zero() {
        let cfg = cfg("ok", TextMatchMode::Contains, 0.5);
        let score = score_detections(&[], &cfg);
        assert!(!score.matched);
        assert_eq!(score.confidence, 0.0);
    }
}
