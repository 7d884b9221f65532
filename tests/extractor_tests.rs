//! Attribute extraction over realistic catalog description text: embedded
//! markup, template placeholders, and multi-language fallback.

use std::collections::BTreeMap;

use dexharvest::extractor::AttributeExtractor;

fn texts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(lang, text)| (lang.to_string(), text.to_string()))
        .collect()
}

fn priority(langs: &[&str]) -> Vec<String> {
    langs.iter().map(|l| l.to_string()).collect()
}

#[test]
fn test_markup_and_placeholders_are_stripped() {
    let text = "<color=#98EFF0>Frost</color> bite deals {value}% Ice DMG to all enemies.";
    let result = AttributeExtractor::new().extract(text, "en");

    assert_eq!(result.tags, vec!["ice"]);
    // Both surfaces survive normalization: the markup around "Frost" and
    // the placeholder before "Ice DMG" are replaced, not glued to words.
    let patterns: Vec<&str> = result
        .matched_patterns
        .iter()
        .map(|m| m.pattern.as_str())
        .collect();
    assert!(patterns.contains(&"frost"));
    assert!(patterns.contains(&"ice dmg"));
}

#[test]
fn test_matching_is_case_insensitive() {
    let result = AttributeExtractor::new().extract("BURN! IGNITE! BURN AGAIN!", "en");
    assert_eq!(result.tags, vec!["fire"]);
}

#[test]
fn test_unsupported_language_warns_instead_of_failing() {
    let result = AttributeExtractor::new().extract("燃焼ダメージを与える", "ja");

    assert!(result.tags.is_empty());
    assert_eq!(result.confidence, 0.0);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("no pattern table for language 'ja'")));
}

#[test]
fn test_first_available_language_wins_even_when_unsupported() {
    // "ja" comes first in the priority and has text, so it is chosen and
    // produces a warning. Later languages are never consulted: first
    // available wins, there is no union across languages.
    let texts = texts(&[
        ("ja", "燃焼ダメージ"),
        ("en", "burn damage over time"),
    ]);
    let result = AttributeExtractor::new().extract_from_multi_lang(&texts, &priority(&["ja", "en"]));

    assert!(result.tags.is_empty());
    assert!(!result.warnings.is_empty());
}

#[test]
fn test_blank_text_falls_through_to_the_next_language() {
    let texts = texts(&[("ja", "   "), ("en", "Ignite stacks burn on every hit.")]);
    let result = AttributeExtractor::new().extract_from_multi_lang(&texts, &priority(&["ja", "en"]));

    assert_eq!(result.tags, vec!["fire"]);
    assert!(result.warnings.is_empty());
}

#[test]
fn test_no_text_in_any_language_is_a_warning() {
    let texts = texts(&[("ko", "얼음 피해")]);
    let result = AttributeExtractor::new().extract_from_multi_lang(&texts, &priority(&["en"]));

    assert!(result.tags.is_empty());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("no usable description text")));
}

#[test]
fn test_confidence_grows_with_breadth_and_repetition() {
    let extractor = AttributeExtractor::new();

    let narrow = extractor.extract("burn", "en");
    let broad = extractor.extract("burn, frost, shock and daze", "en");
    let repeated = extractor.extract(
        "burn burn burn frost frost shock shock daze daze corruption corruption",
        "en",
    );

    assert!(narrow.confidence > 0.0);
    assert!(broad.confidence > narrow.confidence);
    assert!(repeated.confidence > broad.confidence);
    assert!(repeated.confidence <= 1.0);
}

#[test]
fn test_tags_follow_table_order_not_text_order() {
    // "frost" appears before "burn" in the text, but the category table
    // orders fire ahead of ice.
    let result = AttributeExtractor::new().extract("frost first, burn second", "en");
    assert_eq!(result.tags, vec!["fire", "ice"]);
}
