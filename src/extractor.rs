//! Pattern-based attribute extraction from localized description text.
//!
//! Extraction is pure string matching over a static surface-pattern table:
//! no network, no state, deterministic for identical input. The content
//! tooling embeds markup tags and `{placeholder}` template variables in
//! description text, so text is normalized before matching.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static MARKUP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<[^>]*>|\{[^}]*\}").unwrap()
});

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").unwrap()
});

/// Languages with a surface-pattern table. Text in any other language
/// yields an empty result plus a warning, never an error.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en"];

/// One attribute category and the lowercase surface strings that signal it.
struct CategoryPatterns {
    tag: &'static str,
    surfaces: &'static [&'static str],
}

static CATEGORY_PATTERNS: &[CategoryPatterns] = &[
    CategoryPatterns {
        tag: "fire",
        surfaces: &["fire damage", "fire dmg", "burn", "ignite"],
    },
    CategoryPatterns {
        tag: "ice",
        surfaces: &["ice damage", "ice dmg", "frost", "freeze"],
    },
    CategoryPatterns {
        tag: "electric",
        surfaces: &["electric damage", "electric dmg", "shock", "electrocute"],
    },
    CategoryPatterns {
        tag: "physical",
        surfaces: &["physical damage", "physical dmg", "daze"],
    },
    CategoryPatterns {
        tag: "ether",
        surfaces: &["ether damage", "ether dmg", "corruption"],
    },
];

/// One surface pattern that matched, with occurrence evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPattern {
    pub pattern: String,
    pub occurrence_count: usize,
    /// Byte offsets of each occurrence within the normalized text.
    pub positions: Vec<usize>,
}

/// Extraction result: deduplicated ordered tags plus diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedAttributes {
    /// Category tags in table order, never containing a duplicate.
    pub tags: Vec<String>,
    /// In [0, 1]; exactly 0.0 when nothing matched.
    pub confidence: f64,
    pub matched_patterns: Vec<MatchedPattern>,
    pub warnings: Vec<String>,
}

impl ExtractedAttributes {
    pub fn empty() -> Self {
        ExtractedAttributes {
            tags: Vec::new(),
            confidence: 0.0,
            matched_patterns: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn empty_with_warning(warning: String) -> Self {
        ExtractedAttributes {
            warnings: vec![warning],
            ..Self::empty()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeExtractor;

impl AttributeExtractor {
    pub fn new() -> Self {
        AttributeExtractor
    }

    /// Extract category tags from one description text.
    ///
    /// Unsupported languages and empty text return an empty result with a
    /// descriptive warning. A category is included once no matter how often
    /// its patterns occur; occurrence counts and offsets are kept per
    /// pattern for diagnostics.
    pub fn extract(&self, text: &str, language: &str) -> ExtractedAttributes {
        if !SUPPORTED_LANGUAGES.contains(&language) {
            return ExtractedAttributes::empty_with_warning(format!(
                "no pattern table for language '{}'",
                language
            ));
        }

        let normalized = normalize(text);
        if normalized.is_empty() {
            return ExtractedAttributes::empty_with_warning(
                "description text is empty".to_string(),
            );
        }

        let mut tags: Vec<String> = Vec::new();
        let mut matched_patterns = Vec::new();
        let mut total_occurrences = 0usize;

        for category in CATEGORY_PATTERNS {
            let mut category_matched = false;

            for surface in category.surfaces {
                let positions: Vec<usize> = normalized
                    .match_indices(surface)
                    .map(|(offset, _)| offset)
                    .collect();
                if positions.is_empty() {
                    continue;
                }

                category_matched = true;
                total_occurrences += positions.len();
                matched_patterns.push(MatchedPattern {
                    pattern: (*surface).to_string(),
                    occurrence_count: positions.len(),
                    positions,
                });
            }

            // One tag per category regardless of how many surfaces hit
            if category_matched && !tags.iter().any(|t| t == category.tag) {
                tags.push(category.tag.to_string());
            }
        }

        let confidence = confidence_score(tags.len(), total_occurrences);
        debug!(
            "extracted {} tag(s) from {} chars of '{}' text (confidence {:.2})",
            tags.len(),
            normalized.len(),
            language,
            confidence
        );

        ExtractedAttributes {
            tags,
            confidence,
            matched_patterns,
            warnings: Vec::new(),
        }
    }

    /// Walk the configured language priority and extract from the first
    /// language that has non-empty text. Later languages are not consulted
    /// even when the chosen one yields nothing: first available wins, there
    /// is no union across languages.
    pub fn extract_from_multi_lang(
        &self,
        texts: &BTreeMap<String, String>,
        priority: &[String],
    ) -> ExtractedAttributes {
        for language in priority {
            if let Some(text) = texts.get(language) {
                if !text.trim().is_empty() {
                    return self.extract(text, language);
                }
            }
        }

        ExtractedAttributes::empty_with_warning(
            "no usable description text in any configured language".to_string(),
        )
    }
}

fn normalize(text: &str) -> String {
    let stripped = MARKUP_RE.replace_all(text, " ");
    let lowered = stripped.to_lowercase();
    WHITESPACE_RE.replace_all(lowered.trim(), " ").into_owned()
}

/// Confidence grows with category breadth and with occurrences beyond the
/// first per category, clamped to [0, 1]. Zero only when nothing matched.
fn confidence_score(tag_count: usize, total_occurrences: usize) -> f64 {
    if tag_count == 0 {
        return 0.0;
    }
    let breadth = 0.4 + 0.15 * (tag_count as f64 - 1.0);
    let repetition = 0.1 * total_occurrences.saturating_sub(tag_count) as f64;
    (breadth + repetition).min(1.0)
}
