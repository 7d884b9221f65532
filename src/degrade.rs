//! Tiered, non-network degradation.
//!
//! When a value or a whole record cannot be obtained the strict way, the
//! coordinator walks a fixed fallback chain: alternate payload fields, then
//! text-derived heuristics, then a static id-keyed table, then a documented
//! sentinel. It never re-fetches. The first tier that produces a value
//! wins, and the resolving tier is kept on the record for audit.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::extractor::{AttributeExtractor, SUPPORTED_LANGUAGES};
use crate::mapper;
use crate::partial::ViabilityTier;
use crate::payload::RawPayload;
use crate::profile::{profile_for, FieldValue};
use crate::record::{Element, EntityId, EntityKind, Rarity, Record, Specialty};

/// One fallback strategy, ordered shallow to deep. A deeper tier means a
/// less trustworthy source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationTier {
    AlternateField,
    TextHeuristic,
    StaticTable,
    DefaultSentinel,
}

impl DegradationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradationTier::AlternateField => "alternate_field",
            DegradationTier::TextHeuristic => "text_heuristic",
            DegradationTier::StaticTable => "static_table",
            DegradationTier::DefaultSentinel => "default_sentinel",
        }
    }
}

impl std::fmt::Display for DegradationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeuristicConfidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for HeuristicConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            HeuristicConfidence::High => "high",
            HeuristicConfidence::Medium => "medium",
            HeuristicConfidence::Low => "low",
        };
        write!(f, "{}", label)
    }
}

/// A value produced by the fallback chain, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredValue {
    pub value: FieldValue,
    pub tier: DegradationTier,
    pub confidence: HeuristicConfidence,
}

/// The enum-valued fields the chain knows how to stand in for. Each has a
/// documented Unknown sentinel at the bottom tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverableField {
    Element,
    Specialty,
    Rarity,
}

impl RecoverableField {
    fn label(&self) -> &'static str {
        match self {
            RecoverableField::Element => "element",
            RecoverableField::Specialty => "specialty",
            RecoverableField::Rarity => "rarity",
        }
    }

    fn alternate_paths(&self) -> &'static [&'static [&'static str]] {
        match self {
            RecoverableField::Element => &[
                &["basic", "element"],
                &["element"],
                &["basic", "attribute"],
                &["attribute"],
            ],
            RecoverableField::Specialty => &[
                &["basic", "specialty"],
                &["specialty"],
                &["basic", "profession"],
                &["profession"],
            ],
            RecoverableField::Rarity => &[
                &["basic", "rarity"],
                &["rarity"],
                &["basic", "rank"],
                &["rank"],
            ],
        }
    }

    fn component_keys(&self) -> &'static [&'static str] {
        match self {
            RecoverableField::Element => &["element", "attribute"],
            RecoverableField::Specialty => &["specialty", "profession"],
            RecoverableField::Rarity => &["rarity", "rank"],
        }
    }

    fn map_label(&self, raw: &str) -> Option<FieldValue> {
        match self {
            RecoverableField::Element => mapper::map_element(raw).ok().map(FieldValue::Element),
            RecoverableField::Specialty => {
                mapper::map_specialty(raw).ok().map(FieldValue::Specialty)
            }
            RecoverableField::Rarity => {
                mapper::map_with_prefix_strip(raw, "Rank_", mapper::map_rarity)
                    .ok()
                    .map(FieldValue::Rarity)
            }
        }
    }

    fn sentinel(&self) -> FieldValue {
        match self {
            RecoverableField::Element => FieldValue::Element(Element::Unknown),
            RecoverableField::Specialty => FieldValue::Specialty(Specialty::Unknown),
            RecoverableField::Rarity => FieldValue::Rarity(Rarity::Unknown),
        }
    }
}

struct HeuristicEntry {
    id: &'static str,
    name: &'static str,
    element: Element,
    specialty: Specialty,
    rarity: Rarity,
    confidence: HeuristicConfidence,
}

/// Curated from previously ingested catalog snapshots. Exact id matches
/// carry the entry's own confidence; substring matches are always low.
static HEURISTIC_TABLE: Lazy<Vec<HeuristicEntry>> = Lazy::new(|| {
    use HeuristicConfidence::*;
    vec![
        HeuristicEntry { id: "ember-wolf", name: "Ember Wolf", element: Element::Fire, specialty: Specialty::Attack, rarity: Rarity::S, confidence: High },
        HeuristicEntry { id: "frost-maiden", name: "Frost Maiden", element: Element::Ice, specialty: Specialty::Support, rarity: Rarity::S, confidence: High },
        HeuristicEntry { id: "volt-reaper", name: "Volt Reaper", element: Element::Electric, specialty: Specialty::Stun, rarity: Rarity::S, confidence: High },
        HeuristicEntry { id: "stone-sentinel", name: "Stone Sentinel", element: Element::Physical, specialty: Specialty::Defense, rarity: Rarity::A, confidence: High },
        HeuristicEntry { id: "ether-witch", name: "Ether Witch", element: Element::Ether, specialty: Specialty::Anomaly, rarity: Rarity::S, confidence: High },
        HeuristicEntry { id: "cinder-hound", name: "Cinder Hound", element: Element::Fire, specialty: Specialty::Stun, rarity: Rarity::A, confidence: Medium },
        HeuristicEntry { id: "glacier-monk", name: "Glacier Monk", element: Element::Ice, specialty: Specialty::Defense, rarity: Rarity::A, confidence: Medium },
        HeuristicEntry { id: "static-dancer", name: "Static Dancer", element: Element::Electric, specialty: Specialty::Anomaly, rarity: Rarity::A, confidence: Medium },
        HeuristicEntry { id: "iron-vagrant", name: "Iron Vagrant", element: Element::Physical, specialty: Specialty::Attack, rarity: Rarity::B, confidence: Medium },
        HeuristicEntry { id: "hollow-courier", name: "Hollow Courier", element: Element::Ether, specialty: Specialty::Support, rarity: Rarity::B, confidence: Medium },
        HeuristicEntry { id: "pyre-twins", name: "Pyre Twins", element: Element::Fire, specialty: Specialty::Anomaly, rarity: Rarity::A, confidence: Medium },
        HeuristicEntry { id: "rime-archivist", name: "Rime Archivist", element: Element::Ice, specialty: Specialty::Anomaly, rarity: Rarity::A, confidence: Low },
    ]
});

fn table_lookup(id: &str) -> Option<(&'static HeuristicEntry, HeuristicConfidence)> {
    let normalized = id.trim().to_lowercase();
    // A blank id would substring-match every entry.
    if normalized.is_empty() {
        return None;
    }
    if let Some(entry) = HEURISTIC_TABLE.iter().find(|e| e.id == normalized) {
        return Some((entry, entry.confidence));
    }
    HEURISTIC_TABLE
        .iter()
        .find(|e| normalized.contains(e.id) || e.id.contains(normalized.as_str()))
        .map(|entry| (entry, HeuristicConfidence::Low))
}

pub struct DegradationCoordinator {
    languages: Vec<String>,
}

impl DegradationCoordinator {
    pub fn new(languages: &[String]) -> Self {
        Self {
            languages: languages.to_vec(),
        }
    }

    /// Stands in for one enum field. Always produces a value; the bottom
    /// tier is the field's Unknown sentinel.
    pub fn recover_value(
        &self,
        id: &EntityId,
        field: RecoverableField,
        payload: Option<&RawPayload>,
    ) -> RecoveredValue {
        let usable = payload.filter(|p| p.is_object());

        if let Some(p) = usable {
            if let Some(value) = self.from_alternate_fields(field, p) {
                return self.resolved(id, field, value, DegradationTier::AlternateField, HeuristicConfidence::High);
            }
            if field == RecoverableField::Element {
                if let Some(value) = self.from_adjacent_text(p) {
                    return self.resolved(id, field, value, DegradationTier::TextHeuristic, HeuristicConfidence::Medium);
                }
            }
        }

        if let Some((entry, confidence)) = table_lookup(id.as_str()) {
            let value = match field {
                RecoverableField::Element => FieldValue::Element(entry.element),
                RecoverableField::Specialty => FieldValue::Specialty(entry.specialty),
                RecoverableField::Rarity => FieldValue::Rarity(entry.rarity),
            };
            return self.resolved(id, field, value, DegradationTier::StaticTable, confidence);
        }

        self.resolved(
            id,
            field,
            field.sentinel(),
            DegradationTier::DefaultSentinel,
            HeuristicConfidence::Low,
        )
    }

    /// Stands in for a whole record after the fetch or transform gave up.
    ///
    /// Declines (None) when the payload still has its critical fields: the
    /// partial builder is the right tool there. Also declines when no tier
    /// can resolve the entity's identity; identity has no sentinel. Tracks
    /// are carried over only when the payload has them well formed, never
    /// invented.
    pub fn recover_record(
        &self,
        id: &EntityId,
        kind: EntityKind,
        payload: Option<&RawPayload>,
    ) -> Option<Record> {
        let usable = payload.filter(|p| p.is_object());
        let profile = profile_for(kind);

        let criticals_present = usable.map_or(false, |p| {
            profile
                .fields
                .iter()
                .filter(|f| f.requirement == crate::profile::FieldRequirement::Critical)
                .all(|f| (f.extract)(p).is_some())
        });
        if criticals_present {
            debug!(entity = %id, "payload keeps its critical fields, leaving recovery to the partial builder");
            return None;
        }

        let (name, identity_tier, identity_confidence) = self.resolve_identity(id, usable)?;

        let mut record = Record::new(id.clone(), kind, name);
        record.degraded = true;
        record.viability = Some(ViabilityTier::Minimal);
        record.note_recovery_tier(identity_tier);

        let recoverables: &[(RecoverableField, fn(&mut Record, FieldValue))] = match kind {
            EntityKind::Character => &[
                (RecoverableField::Element, assign_element),
                (RecoverableField::Specialty, assign_specialty),
                (RecoverableField::Rarity, assign_rarity),
            ],
            EntityKind::Weapon => &[
                (RecoverableField::Specialty, assign_specialty),
                (RecoverableField::Rarity, assign_rarity),
            ],
            EntityKind::Disc => &[(RecoverableField::Rarity, assign_rarity)],
        };
        for (field, assign) in recoverables {
            let recovered = self.recover_value(id, *field, payload);
            record.note_recovery_tier(recovered.tier);
            assign(&mut record, recovered.value);
        }

        if let Some(p) = usable {
            for spec in profile.fields.iter().filter(|f| f.key.starts_with("modules.")) {
                if let Some(value) = (spec.extract)(p) {
                    (spec.assign)(&mut record, value);
                }
            }
            if let Some(texts) = p.text_map_at(&["description"]) {
                record.attributes =
                    AttributeExtractor.extract_from_multi_lang(&texts, &self.languages);
            }
        }

        info!(
            entity = %id,
            tier = %identity_tier,
            confidence = %identity_confidence,
            "recovered degraded record"
        );
        Some(record)
    }

    fn resolve_identity(
        &self,
        id: &EntityId,
        payload: Option<&RawPayload>,
    ) -> Option<(String, DegradationTier, HeuristicConfidence)> {
        if let Some(p) = payload {
            let alternate = p
                .first_str(&[&["name"], &["basic", "title"], &["title"]])
                .or_else(|| p.find_in_components("name"))
                .or_else(|| p.find_in_components("title"));
            if let Some(name) = alternate {
                return Some((
                    name.to_string(),
                    DegradationTier::AlternateField,
                    HeuristicConfidence::High,
                ));
            }
        }

        table_lookup(id.as_str()).map(|(entry, confidence)| {
            (
                entry.name.to_string(),
                DegradationTier::StaticTable,
                confidence,
            )
        })
    }

    fn from_alternate_fields(&self, field: RecoverableField, payload: &RawPayload) -> Option<FieldValue> {
        // A present but unmappable candidate must not mask a later one,
        // so every path is tried until one maps.
        let from_paths = field
            .alternate_paths()
            .iter()
            .filter_map(|path| payload.str_at(path))
            .find_map(|raw| field.map_label(raw));
        if from_paths.is_some() {
            return from_paths;
        }

        field
            .component_keys()
            .iter()
            .find_map(|key| payload.find_in_components(key))
            .and_then(|raw| field.map_label(raw))
    }

    fn from_adjacent_text(&self, payload: &RawPayload) -> Option<FieldValue> {
        let mut text = String::new();
        for path in [&["basic", "title"][..], &["title"][..], &["name"][..]] {
            if let Some(fragment) = payload.str_at(path) {
                text.push_str(fragment);
                text.push(' ');
            }
        }
        if let Some(texts) = payload.text_map_at(&["description"]) {
            for fragment in texts.values() {
                text.push_str(fragment);
                text.push(' ');
            }
        }
        if text.trim().is_empty() {
            return None;
        }

        let language = self
            .languages
            .iter()
            .map(String::as_str)
            .find(|l| SUPPORTED_LANGUAGES.contains(l))
            .unwrap_or("en");
        let extracted = AttributeExtractor.extract(&text, language);
        extracted
            .tags
            .iter()
            .find_map(|tag| mapper::element_from_tag(tag))
            .map(FieldValue::Element)
    }

    fn resolved(
        &self,
        id: &EntityId,
        field: RecoverableField,
        value: FieldValue,
        tier: DegradationTier,
        confidence: HeuristicConfidence,
    ) -> RecoveredValue {
        debug!(
            entity = %id,
            field = field.label(),
            tier = %tier,
            confidence = %confidence,
            "value recovered"
        );
        RecoveredValue {
            value,
            tier,
            confidence,
        }
    }
}

fn assign_element(record: &mut Record, value: FieldValue) {
    if let FieldValue::Element(element) = value {
        record.element = Some(element);
    }
}

fn assign_specialty(record: &mut Record, value: FieldValue) {
    if let FieldValue::Specialty(specialty) = value {
        record.specialty = Some(specialty);
    }
}

fn assign_rarity(record: &mut Record, value: FieldValue) {
    if let FieldValue::Rarity(rarity) = value {
        record.rarity = Some(rarity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::STAGE_COUNT;
    use serde_json::json;

    fn coordinator() -> DegradationCoordinator {
        DegradationCoordinator::new(&["en".to_string()])
    }

    #[test]
    fn test_tier_ordering_shallow_to_deep() {
        assert!(DegradationTier::AlternateField < DegradationTier::TextHeuristic);
        assert!(DegradationTier::TextHeuristic < DegradationTier::StaticTable);
        assert!(DegradationTier::StaticTable < DegradationTier::DefaultSentinel);
    }

    #[test]
    fn test_alternate_field_wins_first() {
        let payload = RawPayload::from_value(json!({
            "basic": { "attribute": "Fire" }
        }));
        let recovered = coordinator().recover_value(
            &EntityId::new("nobody"),
            RecoverableField::Element,
            Some(&payload),
        );
        assert_eq!(recovered.value, FieldValue::Element(Element::Fire));
        assert_eq!(recovered.tier, DegradationTier::AlternateField);
    }

    #[test]
    fn test_component_scan_counts_as_alternate_field() {
        let payload = RawPayload::from_value(json!({
            "components": [
                { "slot": "portrait" },
                { "element": "Electric" }
            ]
        }));
        let recovered = coordinator().recover_value(
            &EntityId::new("nobody"),
            RecoverableField::Element,
            Some(&payload),
        );
        assert_eq!(recovered.value, FieldValue::Element(Element::Electric));
        assert_eq!(recovered.tier, DegradationTier::AlternateField);
    }

    #[test]
    fn test_text_heuristic_derives_element_from_title() {
        let payload = RawPayload::from_value(json!({
            "basic": { "title": "Mistress of frost and freeze" }
        }));
        let recovered = coordinator().recover_value(
            &EntityId::new("nobody"),
            RecoverableField::Element,
            Some(&payload),
        );
        assert_eq!(recovered.value, FieldValue::Element(Element::Ice));
        assert_eq!(recovered.tier, DegradationTier::TextHeuristic);
        assert_eq!(recovered.confidence, HeuristicConfidence::Medium);
    }

    #[test]
    fn test_static_table_exact_match_keeps_entry_confidence() {
        let recovered = coordinator().recover_value(
            &EntityId::new("volt-reaper"),
            RecoverableField::Element,
            None,
        );
        assert_eq!(recovered.value, FieldValue::Element(Element::Electric));
        assert_eq!(recovered.tier, DegradationTier::StaticTable);
        assert_eq!(recovered.confidence, HeuristicConfidence::High);
    }

    #[test]
    fn test_static_table_substring_match_is_low_confidence() {
        let recovered = coordinator().recover_value(
            &EntityId::new("volt-reaper-mk2"),
            RecoverableField::Element,
            None,
        );
        assert_eq!(recovered.value, FieldValue::Element(Element::Electric));
        assert_eq!(recovered.confidence, HeuristicConfidence::Low);
    }

    #[test]
    fn test_blank_id_never_matches_the_table() {
        for id in ["", "   "] {
            let recovered = coordinator().recover_value(
                &EntityId::new(id),
                RecoverableField::Element,
                None,
            );
            assert_eq!(recovered.value, FieldValue::Element(Element::Unknown));
            assert_eq!(recovered.tier, DegradationTier::DefaultSentinel);

            let record =
                coordinator().recover_record(&EntityId::new(id), EntityKind::Character, None);
            assert!(record.is_none());
        }
    }

    #[test]
    fn test_sentinel_closes_the_chain() {
        let recovered = coordinator().recover_value(
            &EntityId::new("nobody-anywhere"),
            RecoverableField::Specialty,
            None,
        );
        assert_eq!(recovered.value, FieldValue::Specialty(Specialty::Unknown));
        assert_eq!(recovered.tier, DegradationTier::DefaultSentinel);
    }

    #[test]
    fn test_record_recovery_declines_when_criticals_survive() {
        let payload = RawPayload::from_value(json!({
            "basic": { "id": "ember-wolf", "name": "Ember Wolf" }
        }));
        let record = coordinator().recover_record(
            &EntityId::new("ember-wolf"),
            EntityKind::Character,
            Some(&payload),
        );
        assert!(record.is_none());
    }

    #[test]
    fn test_record_recovery_from_table_alone() {
        let record = coordinator()
            .recover_record(&EntityId::new("frost-maiden"), EntityKind::Character, None)
            .unwrap();

        assert_eq!(record.name, "Frost Maiden");
        assert_eq!(record.element, Some(Element::Ice));
        assert_eq!(record.specialty, Some(Specialty::Support));
        assert!(record.degraded);
        assert!(record.progressions.is_empty());
        assert_eq!(record.viability, Some(ViabilityTier::Minimal));
        assert_eq!(record.recovery_tier, Some(DegradationTier::StaticTable));
    }

    #[test]
    fn test_record_recovery_uses_alternate_name_and_keeps_tracks() {
        let payload = RawPayload::from_value(json!({
            "title": "The Unlisted One",
            "basic": { "element": "Ether" },
            "modules": {
                "ascension": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]
            }
        }));
        let record = coordinator()
            .recover_record(&EntityId::new("unlisted-one"), EntityKind::Character, Some(&payload))
            .unwrap();

        assert_eq!(record.name, "The Unlisted One");
        assert_eq!(record.element, Some(Element::Ether));
        let track = record.track("ascension").unwrap();
        assert_eq!(track.values.len(), STAGE_COUNT);
    }

    #[test]
    fn test_record_recovery_gives_up_without_identity() {
        let record = coordinator().recover_record(
            &EntityId::new("totally-unknown"),
            EntityKind::Character,
            None,
        );
        assert!(record.is_none());
    }
}
