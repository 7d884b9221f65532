//! Static label → enum mapping tables.
//!
//! The content API ships enum-like values as free strings ("Fire",
//! "Rank_S", "Adv_CritRate"). Each category gets one exhaustive mapping
//! function over a closed enum; an unrecognized label is a typed error, not
//! a silent sentinel. Callers recover locally (substitute a default or run
//! the degradation chain), so these errors never propagate past the call site.

use thiserror::Error;

use crate::record::{Element, Rarity, Specialty, StatKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no {category} mapping for label '{raw_label}'")]
pub struct UnmappedValueError {
    pub category: &'static str,
    pub raw_label: String,
}

impl UnmappedValueError {
    fn new(category: &'static str, raw_label: &str) -> Self {
        UnmappedValueError {
            category,
            raw_label: raw_label.to_string(),
        }
    }
}

pub fn map_element(raw: &str) -> Result<Element, UnmappedValueError> {
    match raw.trim() {
        "Fire" => Ok(Element::Fire),
        "Ice" => Ok(Element::Ice),
        "Electric" => Ok(Element::Electric),
        "Physical" => Ok(Element::Physical),
        "Ether" => Ok(Element::Ether),
        other => Err(UnmappedValueError::new("element", other)),
    }
}

pub fn map_specialty(raw: &str) -> Result<Specialty, UnmappedValueError> {
    match raw.trim() {
        "Attack" => Ok(Specialty::Attack),
        "Stun" => Ok(Specialty::Stun),
        "Anomaly" => Ok(Specialty::Anomaly),
        "Support" => Ok(Specialty::Support),
        "Defense" => Ok(Specialty::Defense),
        other => Err(UnmappedValueError::new("specialty", other)),
    }
}

/// Rarity labels arrive both bare ("S") and namespaced ("Rank_S"); the
/// namespaced form goes through [`map_with_prefix_strip`].
pub fn map_rarity(raw: &str) -> Result<Rarity, UnmappedValueError> {
    match raw.trim() {
        "S" => Ok(Rarity::S),
        "A" => Ok(Rarity::A),
        "B" => Ok(Rarity::B),
        other => Err(UnmappedValueError::new("rarity", other)),
    }
}

/// One stat table serves both the base-stat and advanced-stat categories;
/// advanced labels are prefixed `Adv_` and stripped before lookup.
pub fn map_stat(raw: &str) -> Result<StatKind, UnmappedValueError> {
    match raw.trim() {
        "ATK" => Ok(StatKind::Atk),
        "HP" => Ok(StatKind::Hp),
        "DEF" => Ok(StatKind::Def),
        "Impact" => Ok(StatKind::Impact),
        "CritRate" => Ok(StatKind::CritRate),
        "CritDmg" => Ok(StatKind::CritDmg),
        "PEN" => Ok(StatKind::Pen),
        "AnomalyProficiency" => Ok(StatKind::AnomalyProficiency),
        "EnergyRegen" => Ok(StatKind::EnergyRegen),
        other => Err(UnmappedValueError::new("stat", other)),
    }
}

/// Strip a known qualifying prefix before lookup, so one table covers two
/// related categories. Labels without the prefix fall through unchanged.
pub fn map_with_prefix_strip<T>(
    raw: &str,
    prefix: &str,
    table: fn(&str) -> Result<T, UnmappedValueError>,
) -> Result<T, UnmappedValueError> {
    let label = raw.trim();
    let stripped = label.strip_prefix(prefix).unwrap_or(label);
    table(stripped)
}

/// Lowercase extractor tags ("fire") back to elements. Used by degradation
/// tier 2 when an element must be derived from description text.
pub fn element_from_tag(tag: &str) -> Option<Element> {
    match tag {
        "fire" => Some(Element::Fire),
        "ice" => Some(Element::Ice),
        "electric" => Some(Element::Electric),
        "physical" => Some(Element::Physical),
        "ether" => Some(Element::Ether),
        _ => None,
    }
}
