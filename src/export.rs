use crate::record::{FailedEntity, Record};
use crate::stats::ProcessingStatistics;
use anyhow::Result;
use csv::Writer;
use serde_json;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

pub fn export_csv(records: &[Record], output_path: &str) -> Result<()> {
    debug!("Exporting {} records to CSV: {}", records.len(), output_path);

    let file = File::create(output_path)?;
    let mut wtr = Writer::from_writer(file);

    // Write CSV headers
    wtr.write_record(&[
        "ID",
        "Kind",
        "Name",
        "Rarity",
        "Element",
        "Specialty",
        "Main Stat",
        "Sub Stat",
        "Viability",
        "Degraded",
        "Recovery Tier",
        "Substituted Fields",
        "Tags",
        "Valid",
    ])?;

    // Write data rows
    for record in records {
        wtr.write_record(&[
            &record.id.to_string(),
            &record.kind.to_string(),
            &record.name,
            &record.rarity.map(|r| r.to_string()).unwrap_or_default(),
            &record.element.map(|e| e.to_string()).unwrap_or_default(),
            &record.specialty.map(|s| s.to_string()).unwrap_or_default(),
            &record.main_stat.map(|s| s.to_string()).unwrap_or_default(),
            &record.sub_stat.map(|s| s.to_string()).unwrap_or_default(),
            &record
                .viability
                .map(|v| v.to_string())
                .unwrap_or_default(),
            &record.degraded.to_string(),
            &record
                .recovery_tier
                .map(|t| t.to_string())
                .unwrap_or_default(),
            &record.substituted_fields.join(";"),
            &record.attributes.tags.join(";"),
            &record.validation.is_valid.to_string(),
        ])?;
    }

    wtr.flush()?;
    info!(
        "Successfully exported {} records to CSV: {}",
        records.len(),
        output_path
    );

    Ok(())
}

pub fn export_json(
    records: &[Record],
    failures: &[FailedEntity],
    statistics: &ProcessingStatistics,
    output_path: &str,
) -> Result<()> {
    debug!(
        "Exporting {} records and {} failures to JSON: {}",
        records.len(),
        failures.len(),
        output_path
    );

    let json_output = JsonExport {
        summary: ExportSummary {
            total_records: records.len(),
            degraded_records: records.iter().filter(|r| r.degraded).count(),
            failed_entities: failures.len(),
            characters: records
                .iter()
                .filter(|r| r.kind == crate::record::EntityKind::Character)
                .count(),
            weapons: records
                .iter()
                .filter(|r| r.kind == crate::record::EntityKind::Weapon)
                .count(),
            discs: records
                .iter()
                .filter(|r| r.kind == crate::record::EntityKind::Disc)
                .count(),
        },
        records: records.to_vec(),
        failures: failures.to_vec(),
        statistics: statistics.clone(),
    };

    let json_string = serde_json::to_string_pretty(&json_output)?;

    let mut file = File::create(output_path)?;
    file.write_all(json_string.as_bytes())?;

    info!(
        "Successfully exported {} records to JSON: {}",
        records.len(),
        output_path
    );

    Ok(())
}

#[derive(serde::Serialize)]
struct JsonExport {
    summary: ExportSummary,
    records: Vec<Record>,
    failures: Vec<FailedEntity>,
    statistics: ProcessingStatistics,
}

#[derive(serde::Serialize)]
struct ExportSummary {
    total_records: usize,
    degraded_records: usize,
    failed_entities: usize,
    characters: usize,
    weapons: usize,
    discs: usize,
}

/// Writes the failed-entity list to its own JSON file so failures survive
/// even when the main export format (CSV) has no place for them.
pub fn export_failures_json(failures: &[FailedEntity], output_path: &str) -> Result<()> {
    debug!(
        "Exporting {} failed entities to JSON: {}",
        failures.len(),
        output_path
    );

    let json_string = serde_json::to_string_pretty(failures)?;
    let mut file = File::create(output_path)?;
    file.write_all(json_string.as_bytes())?;

    info!(
        "Successfully exported {} failed entities to: {}",
        failures.len(),
        output_path
    );

    Ok(())
}

/// Append the format's extension unless the caller already supplied one.
pub fn output_file_for(output: &str, format: &str) -> String {
    let suffix = format!(".{}", format);
    if output.ends_with(&suffix) {
        output.to_string()
    } else {
        format!("{}{}", output, suffix)
    }
}

/// Path of the failures side file, next to the main output file.
pub fn failures_file_for(output_file: &str) -> String {
    let stem = Path::new(output_file).with_extension("");
    format!("{}_failures.json", stem.display())
}
