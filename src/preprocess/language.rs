//! Language Filter
//!
//! Keeps reviews whose text is classified as the target language. Only a
//! leading prefix of each text is classified. A text the detector cannot
//! classify confidently is excluded rather than reported as an error.

use crate::config::LanguageConfig;
use crate::dataset::text_column;
use crate::error::Result;
use crate::model::COL_REVIEW;
use polars::prelude::*;
use tracing::{debug, info};

/// A detected language tag with the detector's confidence
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// ISO 639-3 code
    pub lang: String,
    pub confidence: f64,
    /// Whether the classifier considers the answer trustworthy
    pub reliable: bool,
}

/// Text language classifier. Must return the same answer for the same text.
pub trait LanguageDetector {
    fn detect(&self, text: &str) -> Option<Detection>;
}

/// Trigram classifier from `whatlang`; deterministic, no random state
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Option<Detection> {
        let info = whatlang::detect(text)?;
        Some(Detection {
            lang: info.lang().code().to_string(),
            confidence: info.confidence(),
            reliable: info.is_reliable(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageStats {
    pub rows_in: usize,
    pub kept: usize,
    pub dropped: usize,
}

/// The first `max_chars` characters of `text`, never splitting a character
pub fn text_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Whether `text` is in the configured target language
pub fn is_target_language(
    detector: &dyn LanguageDetector,
    text: &str,
    config: &LanguageConfig,
) -> bool {
    if text.trim().is_empty() {
        return false;
    }

    match detector.detect(text_prefix(text, config.prefix_chars)) {
        Some(detection) => {
            detection.lang == config.target
                && detection.confidence >= config.min_confidence
                && (detection.reliable || !config.require_reliable)
        }
        None => {
            debug!(
                "Language undetectable for text: {}...",
                text_prefix(text, 30)
            );
            false
        }
    }
}

pub fn filter_language(
    df: DataFrame,
    detector: &dyn LanguageDetector,
    config: &LanguageConfig,
) -> Result<(DataFrame, LanguageStats)> {
    let rows_in = df.height();
    if rows_in == 0 {
        return Ok((df, LanguageStats::default()));
    }

    let texts = text_column(&df, COL_REVIEW)?;
    let keep: Vec<bool> = texts
        .into_iter()
        .map(|text| text.map_or(false, |t| is_target_language(detector, t, config)))
        .collect();

    let filtered = df.filter(&BooleanChunked::from_slice("keep", &keep))?;
    let stats = LanguageStats {
        rows_in,
        kept: filtered.height(),
        dropped: rows_in - filtered.height(),
    };

    info!(
        "Language filtering: kept {} '{}' reviews (dropped {} other/undetectable)",
        stats.kept, config.target, stats.dropped
    );
    Ok((filtered, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tags text containing "hello" as English, "selam" as Amharic, nothing otherwise
    struct KeywordDetector;

    impl LanguageDetector for KeywordDetector {
        fn detect(&self, text: &str) -> Option<Detection> {
            let lang = if text.contains("hello") {
                "eng"
            } else if text.contains("selam") {
                "amh"
            } else {
                return None;
            };
            Some(Detection {
                lang: lang.to_string(),
                confidence: 1.0,
                reliable: true,
            })
        }
    }

    #[test]
    fn test_prefix_respects_char_boundaries() {
        assert_eq!(text_prefix("ሰላም hello", 3), "ሰላም");
        assert_eq!(text_prefix("short", 500), "short");
        assert_eq!(text_prefix("", 5), "");
    }

    #[test]
    fn test_only_prefix_is_classified() {
        let config = LanguageConfig {
            prefix_chars: 5,
            ..Default::default()
        };
        assert!(is_target_language(&KeywordDetector, "hello and more", &config));
        assert!(!is_target_language(&KeywordDetector, "xxxxx hello", &config));
    }

    #[test]
    fn test_filter_excludes_other_and_undetectable() {
        let df = df![
            "review" => ["hello great app", "selam", "12345", "   ", "hello again"],
            "bank" => ["A", "A", "A", "A", "B"],
        ]
        .unwrap();

        let (filtered, stats) =
            filter_language(df, &KeywordDetector, &LanguageConfig::default()).unwrap();
        assert_eq!(filtered.height(), 2);
        assert_eq!(stats.dropped, 3);
    }

    #[test]
    fn test_low_confidence_is_excluded() {
        let config = LanguageConfig {
            min_confidence: 0.5,
            ..Default::default()
        };
        struct Unsure;
        impl LanguageDetector for Unsure {
            fn detect(&self, _text: &str) -> Option<Detection> {
                Some(Detection {
                    lang: "eng".to_string(),
                    confidence: 0.2,
                    reliable: true,
                })
            }
        }
        assert!(!is_target_language(&Unsure, "anything", &config));
    }

    /// Confident-looking English that the classifier marks unreliable
    struct Unreliable;

    impl LanguageDetector for Unreliable {
        fn detect(&self, _text: &str) -> Option<Detection> {
            Some(Detection {
                lang: "eng".to_string(),
                confidence: 0.9,
                reliable: false,
            })
        }
    }

    #[test]
    fn test_unreliable_detection_is_excluded() {
        assert!(!is_target_language(&Unreliable, "ok", &LanguageConfig::default()));

        let lenient = LanguageConfig {
            require_reliable: false,
            ..Default::default()
        };
        assert!(is_target_language(&Unreliable, "ok", &lenient));
    }

    #[test]
    fn test_whatlang_marks_long_english_reliable() {
        let text = "The app keeps crashing whenever I try to transfer money to another account, \
                    and customer support never answers the phone when I call them.";
        let detection = WhatlangDetector.detect(text).unwrap();
        assert_eq!(detection.lang, "eng");
        assert!(detection.reliable);
        assert!(is_target_language(&WhatlangDetector, text, &LanguageConfig::default()));
    }

    #[test]
    fn test_whatlang_detector_is_repeatable() {
        let text = "The app keeps crashing whenever I try to transfer money to another account.";
        let first = WhatlangDetector.detect(text);
        let second = WhatlangDetector.detect(text);
        assert_eq!(first, second);
        assert_eq!(first.map(|d| d.lang), Some("eng".to_string()));
    }
}
