//! Record validation.
//!
//! Shared checks run for every kind, then the kind's profile appends its
//! own. Validation never rejects by raising; it writes a status onto the
//! record and the pipeline decides what an invalid record is worth.

use crate::profile::profile_for;
use crate::record::{Record, ValidationStatus};

/// Sets `record.validation` and returns whether the record is valid.
pub fn validate_record(record: &mut Record) -> bool {
    let mut issues = Vec::new();

    if record.name.trim().is_empty() {
        issues.push("name is empty".to_string());
    }

    for track in &record.progressions {
        if !track.is_well_formed() {
            issues.push(format!(
                "progression track '{}' has length {}",
                track.name,
                track.values.len()
            ));
        }
    }

    let confidence = record.attributes.confidence;
    if !(0.0..=1.0).contains(&confidence) {
        issues.push(format!("attribute confidence {} out of range", confidence));
    }

    let profile = profile_for(record.kind);
    issues.extend((profile.extra_checks)(record));

    let valid = issues.is_empty();
    record.validation = if valid {
        ValidationStatus::valid()
    } else {
        ValidationStatus::invalid(issues)
    };
    valid
}
