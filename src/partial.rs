//! Best-effort record construction from incomplete payloads.
//!
//! When the strict transform cannot run (fetch exhausted with salvaged
//! partial data, or a payload with holes), the builder scores what is
//! actually present against the kind's profile and either refuses (a
//! critical field is gone) or assembles a record with declared defaults
//! in the gaps.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extractor::AttributeExtractor;
use crate::payload::RawPayload;
use crate::profile::{profile_for, EntityProfile, FieldRequirement};
use crate::record::{EntityId, EntityKind, Record};

/// Coarse usability classification of a fetched payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViabilityTier {
    Full,
    Partial,
    Minimal,
    Impossible,
}

impl ViabilityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViabilityTier::Full => "full",
            ViabilityTier::Partial => "partial",
            ViabilityTier::Minimal => "minimal",
            ViabilityTier::Impossible => "impossible",
        }
    }
}

impl std::fmt::Display for ViabilityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a payload does and does not contain, measured against a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletenessReport {
    pub available_fields: Vec<&'static str>,
    pub missing_fields: Vec<&'static str>,
    pub completeness_percent: f64,
    pub viability: ViabilityTier,
}

impl CompletenessReport {
    pub fn is_buildable(&self) -> bool {
        self.viability != ViabilityTier::Impossible
    }
}

pub struct PartialRecordBuilder {
    profile: &'static EntityProfile,
}

impl PartialRecordBuilder {
    pub fn for_kind(kind: EntityKind) -> Self {
        Self {
            profile: profile_for(kind),
        }
    }

    /// Checks every field the profile declares. Never fails: an absent or
    /// non-object payload fails closed, marking every field missing.
    pub fn detect_missing(&self, payload: Option<&RawPayload>) -> CompletenessReport {
        let usable = payload.filter(|p| p.is_object());

        let mut available = Vec::new();
        let mut missing = Vec::new();
        for field in &self.profile.fields {
            let present = usable.and_then(|p| (field.extract)(p)).is_some();
            if present {
                available.push(field.key);
            } else {
                missing.push(field.key);
            }
        }

        let total = self.profile.fields.len();
        let completeness_percent = if total == 0 {
            0.0
        } else {
            available.len() as f64 / total as f64 * 100.0
        };

        let viability = self.viability_of(&missing);
        CompletenessReport {
            available_fields: available,
            missing_fields: missing,
            completeness_percent,
            viability,
        }
    }

    fn viability_of(&self, missing: &[&'static str]) -> ViabilityTier {
        let missing_with = |requirement: FieldRequirement| {
            self.profile
                .fields
                .iter()
                .filter(|f| f.requirement == requirement && missing.contains(&f.key))
                .count()
        };

        if missing_with(FieldRequirement::Critical) > 0 {
            return ViabilityTier::Impossible;
        }
        match missing_with(FieldRequirement::Basic) {
            0 => ViabilityTier::Full,
            1 | 2 => ViabilityTier::Partial,
            _ => ViabilityTier::Minimal,
        }
    }

    /// Assembles a record from whatever the payload offers, substituting the
    /// declared default for each missing field. Returns None exactly when
    /// the report says the payload is impossible. Every substitution is
    /// remembered on the record by field key, but only a gap in a critical
    /// or basic field marks the record degraded; optional fields default
    /// silently.
    pub fn build(
        &self,
        id: &EntityId,
        payload: Option<&RawPayload>,
        report: &CompletenessReport,
        languages: &[String],
    ) -> Option<Record> {
        if !report.is_buildable() {
            debug!(entity = %id, "payload not viable, refusing partial build");
            return None;
        }

        let usable = payload.filter(|p| p.is_object());
        let mut record = Record::new(id.clone(), self.profile.kind, "");

        for field in &self.profile.fields {
            match usable.and_then(|p| (field.extract)(p)) {
                Some(value) => (field.assign)(&mut record, value),
                None => {
                    (field.assign)(&mut record, (field.default)());
                    record.substituted_fields.push(field.key.to_string());
                    if field.requirement != FieldRequirement::Optional {
                        record.degraded = true;
                    }
                }
            }
        }

        if let Some(texts) = usable.and_then(|p| p.text_map_at(&["description"])) {
            record.attributes = AttributeExtractor.extract_from_multi_lang(&texts, languages);
        }

        record.viability = Some(report.viability);

        debug!(
            entity = %id,
            viability = %report.viability,
            substituted = record.substituted_fields.len(),
            "assembled record from available fields"
        );
        Some(record)
    }
}
