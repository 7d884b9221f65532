//! Per-kind entity profiles.
//!
//! One pipeline serves characters, weapons, and discs; everything
//! kind-specific lives here as data: which fields exist, how they are read
//! from a payload, what their declared defaults are, and how they land in a
//! record. The completeness scoring and the partial builder are generic
//! over these specs.

use once_cell::sync::Lazy;

use crate::mapper;
use crate::payload::RawPayload;
use crate::record::{
    Element, EntityKind, ProgressionTrack, Rarity, Record, Specialty, STAGE_COUNT,
};

/// A single value read out of a payload field or produced as a default.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Element(Element),
    Specialty(Specialty),
    Rarity(Rarity),
    Stat(crate::record::StatKind),
    Track(Vec<f64>),
}

/// How much a field matters to payload viability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRequirement {
    /// Missing → the payload is unusable.
    Critical,
    /// Counts toward the partial/minimal scoring.
    Basic,
    /// Never affects viability.
    Optional,
}

/// Declares how one field is read, defaulted, and assigned.
///
/// `extract` returns None for absent AND malformed values: a ragged
/// progression track (length neither 0 nor 7) reads as missing so the
/// declared default can repair it.
pub struct FieldSpec {
    pub key: &'static str,
    pub requirement: FieldRequirement,
    pub extract: fn(&RawPayload) -> Option<FieldValue>,
    pub default: fn() -> FieldValue,
    pub assign: fn(&mut Record, FieldValue),
}

pub struct EntityProfile {
    pub kind: EntityKind,
    pub fields: Vec<FieldSpec>,
    /// Kind-specific validation issues, appended after the shared checks.
    pub extra_checks: fn(&Record) -> Vec<String>,
}

impl EntityProfile {
    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn keys_with(&self, requirement: FieldRequirement) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.requirement == requirement)
            .map(|f| f.key)
            .collect()
    }
}

pub fn profile_for(kind: EntityKind) -> &'static EntityProfile {
    match kind {
        EntityKind::Character => &CHARACTER_PROFILE,
        EntityKind::Weapon => &WEAPON_PROFILE,
        EntityKind::Disc => &DISC_PROFILE,
    }
}

fn extract_track(payload: &RawPayload, name: &str) -> Option<FieldValue> {
    payload
        .number_track_at(&["modules", name])
        .filter(|values| values.is_empty() || values.len() == STAGE_COUNT)
        .map(FieldValue::Track)
}

fn default_track() -> FieldValue {
    FieldValue::Track(vec![0.0; STAGE_COUNT])
}

fn push_track(record: &mut Record, name: &'static str, value: FieldValue) {
    if let FieldValue::Track(values) = value {
        record.progressions.push(ProgressionTrack::new(name, values));
    }
}

fn id_spec() -> FieldSpec {
    FieldSpec {
        key: "basic.id",
        requirement: FieldRequirement::Critical,
        extract: |p| p.str_at(&["basic", "id"]).map(|s| FieldValue::Text(s.to_string())),
        default: || FieldValue::Text(String::new()),
        // Identity comes from the roster; payload presence only gates viability
        assign: |_record, _value| {},
    }
}

fn name_spec() -> FieldSpec {
    FieldSpec {
        key: "basic.name",
        requirement: FieldRequirement::Critical,
        extract: |p| p.str_at(&["basic", "name"]).map(|s| FieldValue::Text(s.to_string())),
        default: || FieldValue::Text(String::new()),
        assign: |record, value| {
            if let FieldValue::Text(name) = value {
                record.name = name;
            }
        },
    }
}

fn rarity_spec() -> FieldSpec {
    FieldSpec {
        key: "basic.rarity",
        requirement: FieldRequirement::Basic,
        extract: |p| {
            p.str_at(&["basic", "rarity"])
                .and_then(|raw| mapper::map_with_prefix_strip(raw, "Rank_", mapper::map_rarity).ok())
                .map(FieldValue::Rarity)
        },
        default: || FieldValue::Rarity(Rarity::Unknown),
        assign: |record, value| {
            if let FieldValue::Rarity(rarity) = value {
                record.rarity = Some(rarity);
            }
        },
    }
}

fn specialty_spec() -> FieldSpec {
    FieldSpec {
        key: "basic.specialty",
        requirement: FieldRequirement::Basic,
        extract: |p| {
            p.str_at(&["basic", "specialty"])
                .and_then(|raw| mapper::map_specialty(raw).ok())
                .map(FieldValue::Specialty)
        },
        default: || FieldValue::Specialty(Specialty::Unknown),
        assign: |record, value| {
            if let FieldValue::Specialty(specialty) = value {
                record.specialty = Some(specialty);
            }
        },
    }
}

static CHARACTER_PROFILE: Lazy<EntityProfile> = Lazy::new(|| EntityProfile {
    kind: EntityKind::Character,
    fields: vec![
        id_spec(),
        name_spec(),
        rarity_spec(),
        FieldSpec {
            key: "basic.element",
            requirement: FieldRequirement::Basic,
            extract: |p| {
                p.str_at(&["basic", "element"])
                    .and_then(|raw| mapper::map_element(raw).ok())
                    .map(FieldValue::Element)
            },
            default: || FieldValue::Element(Element::Unknown),
            assign: |record, value| {
                if let FieldValue::Element(element) = value {
                    record.element = Some(element);
                }
            },
        },
        specialty_spec(),
        FieldSpec {
            key: "modules.ascension",
            requirement: FieldRequirement::Basic,
            extract: |p| extract_track(p, "ascension"),
            default: default_track,
            assign: |record, value| push_track(record, "ascension", value),
        },
        FieldSpec {
            key: "modules.potential",
            requirement: FieldRequirement::Optional,
            extract: |p| extract_track(p, "potential"),
            default: default_track,
            assign: |record, value| push_track(record, "potential", value),
        },
    ],
    extra_checks: |record| {
        let mut issues = Vec::new();
        match record.element {
            None => issues.push("element missing".to_string()),
            Some(Element::Unknown) => issues.push("element unresolved".to_string()),
            Some(_) => {}
        }
        match record.specialty {
            None => issues.push("specialty missing".to_string()),
            Some(Specialty::Unknown) => issues.push("specialty unresolved".to_string()),
            Some(_) => {}
        }
        issues
    },
});

static WEAPON_PROFILE: Lazy<EntityProfile> = Lazy::new(|| EntityProfile {
    kind: EntityKind::Weapon,
    fields: vec![
        id_spec(),
        name_spec(),
        rarity_spec(),
        specialty_spec(),
        FieldSpec {
            key: "basic.main_stat",
            requirement: FieldRequirement::Basic,
            extract: |p| {
                p.str_at(&["basic", "main_stat"])
                    .and_then(|raw| mapper::map_stat(raw).ok())
                    .map(FieldValue::Stat)
            },
            default: || FieldValue::Stat(crate::record::StatKind::Atk),
            assign: |record, value| {
                if let FieldValue::Stat(stat) = value {
                    record.main_stat = Some(stat);
                }
            },
        },
        FieldSpec {
            key: "basic.sub_stat",
            requirement: FieldRequirement::Optional,
            extract: |p| {
                p.str_at(&["basic", "sub_stat"])
                    .and_then(|raw| {
                        mapper::map_with_prefix_strip(raw, "Adv_", mapper::map_stat).ok()
                    })
                    .map(FieldValue::Stat)
            },
            default: || FieldValue::Stat(crate::record::StatKind::Atk),
            assign: |record, value| {
                if let FieldValue::Stat(stat) = value {
                    record.sub_stat = Some(stat);
                }
            },
        },
        FieldSpec {
            key: "modules.base_atk",
            requirement: FieldRequirement::Basic,
            extract: |p| extract_track(p, "base_atk"),
            default: default_track,
            assign: |record, value| push_track(record, "base_atk", value),
        },
        FieldSpec {
            key: "modules.sub_value",
            requirement: FieldRequirement::Optional,
            extract: |p| extract_track(p, "sub_value"),
            default: default_track,
            assign: |record, value| push_track(record, "sub_value", value),
        },
    ],
    extra_checks: |record| {
        let mut issues = Vec::new();
        if record.main_stat.is_none() {
            issues.push("main stat missing".to_string());
        }
        if record.rarity == Some(Rarity::Unknown) {
            issues.push("rarity unresolved".to_string());
        }
        issues
    },
});

static DISC_PROFILE: Lazy<EntityProfile> = Lazy::new(|| EntityProfile {
    kind: EntityKind::Disc,
    // Discs carry no progression modules; their element shows up only in
    // the set-bonus description text, via the extractor.
    fields: vec![id_spec(), name_spec(), rarity_spec()],
    extra_checks: |record| {
        let mut issues = Vec::new();
        match record.rarity {
            None => issues.push("rarity missing".to_string()),
            Some(Rarity::Unknown) => issues.push("rarity unresolved".to_string()),
            Some(_) => {}
        }
        issues
    },
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EntityId, StatKind};
    use serde_json::json;

    fn character_payload() -> RawPayload {
        RawPayload::from_value(json!({
            "basic": {
                "id": "ember-wolf",
                "name": "Ember Wolf",
                "rarity": "S",
                "element": "Fire",
                "specialty": "Attack"
            },
            "modules": {
                "ascension": [100.0, 120.0, 140.0, 160.0, 180.0, 200.0, 220.0]
            }
        }))
    }

    #[test]
    fn test_profile_registry_by_kind() {
        assert_eq!(profile_for(EntityKind::Character).kind, EntityKind::Character);
        assert_eq!(profile_for(EntityKind::Weapon).kind, EntityKind::Weapon);
        assert_eq!(profile_for(EntityKind::Disc).kind, EntityKind::Disc);
    }

    #[test]
    fn test_requirement_key_sets() {
        let profile = profile_for(EntityKind::Character);
        assert_eq!(
            profile.keys_with(FieldRequirement::Critical),
            vec!["basic.id", "basic.name"]
        );
        let basic = profile.keys_with(FieldRequirement::Basic);
        assert!(basic.contains(&"basic.element"));
        assert!(basic.contains(&"modules.ascension"));
        assert!(!basic.contains(&"modules.potential"));
    }

    #[test]
    fn test_character_extracts_mapped_values() {
        let payload = character_payload();
        let profile = profile_for(EntityKind::Character);

        let element = profile.field("basic.element").unwrap();
        assert_eq!(
            (element.extract)(&payload),
            Some(FieldValue::Element(Element::Fire))
        );

        let ascension = profile.field("modules.ascension").unwrap();
        match (ascension.extract)(&payload) {
            Some(FieldValue::Track(values)) => assert_eq!(values.len(), STAGE_COUNT),
            other => panic!("expected a track, got {:?}", other),
        }
    }

    #[test]
    fn test_ragged_track_reads_as_missing() {
        let payload = RawPayload::from_value(json!({
            "modules": { "ascension": [1.0, 2.0, 3.0] }
        }));
        let profile = profile_for(EntityKind::Character);
        let spec = profile.field("modules.ascension").unwrap();

        assert_eq!((spec.extract)(&payload), None);
        assert_eq!((spec.default)(), FieldValue::Track(vec![0.0; STAGE_COUNT]));
    }

    #[test]
    fn test_unmapped_label_reads_as_missing() {
        let payload = RawPayload::from_value(json!({
            "basic": { "element": "Shadow" }
        }));
        let profile = profile_for(EntityKind::Character);
        let spec = profile.field("basic.element").unwrap();
        assert_eq!((spec.extract)(&payload), None);
    }

    #[test]
    fn test_weapon_sub_stat_prefix_strip() {
        let payload = RawPayload::from_value(json!({
            "basic": { "sub_stat": "Adv_CritRate" }
        }));
        let profile = profile_for(EntityKind::Weapon);
        let spec = profile.field("basic.sub_stat").unwrap();
        assert_eq!(
            (spec.extract)(&payload),
            Some(FieldValue::Stat(StatKind::CritRate))
        );
    }

    #[test]
    fn test_assign_writes_into_record() {
        let mut record = Record::new(EntityId::new("x"), EntityKind::Character, "placeholder");
        let profile = profile_for(EntityKind::Character);

        let name = profile.field("basic.name").unwrap();
        (name.assign)(&mut record, FieldValue::Text("Ember Wolf".to_string()));
        assert_eq!(record.name, "Ember Wolf");

        let track = profile.field("modules.ascension").unwrap();
        (track.assign)(&mut record, (track.default)());
        let stored = record.track("ascension").unwrap();
        assert_eq!(stored.values, vec![0.0; STAGE_COUNT]);
    }
}
