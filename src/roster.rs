//! Roster input.
//!
//! A roster names the entities one run should ingest. CSV and JSON are
//! accepted, chosen by file extension. Individual bad rows are skipped
//! with a warning; an unreadable or empty roster fails the run
//! immediately, before any fetching starts.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::record::{EntityId, EntityKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: EntityId,
    pub kind: EntityKind,
}

impl RosterEntry {
    pub fn new(id: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: EntityId::new(id),
            kind,
        }
    }
}

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("roster file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read roster file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse JSON roster: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("failed to parse CSV roster: {0}")]
    CsvError(#[from] csv::Error),

    #[error("unsupported roster extension '{0}', expected .csv or .json")]
    UnsupportedFormat(String),

    #[error("roster contains no usable entries")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self, RosterError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(InputFormat::Csv),
            "json" => Ok(InputFormat::Json),
            other => Err(RosterError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Reads, validates, and deduplicates a roster file. Duplicate ids keep
/// their first occurrence.
pub fn load_roster(path: &Path) -> Result<Vec<RosterEntry>, RosterError> {
    if !path.exists() {
        return Err(RosterError::FileNotFound(path.to_path_buf()));
    }
    let format = InputFormat::from_path(path)?;
    let text = fs::read_to_string(path)?;

    let raw_rows = match format {
        InputFormat::Csv => parse_csv_roster(&text)?,
        InputFormat::Json => parse_json_roster(&text)?,
    };

    let mut seen: HashSet<EntityId> = HashSet::new();
    let mut entries = Vec::new();
    for entry in raw_rows {
        if !seen.insert(entry.id.clone()) {
            warn!(entity = %entry.id, "duplicate roster id, keeping first occurrence");
            continue;
        }
        entries.push(entry);
    }

    if entries.is_empty() {
        return Err(RosterError::Empty);
    }
    debug!(entries = entries.len(), path = %path.display(), "roster loaded");
    Ok(entries)
}

/// Expects an `id,kind` header. Rows with a blank id or an unrecognized
/// kind are skipped, not fatal.
fn parse_csv_roster(text: &str) -> Result<Vec<RosterEntry>, RosterError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let id_col = headers.iter().position(|h| h.eq_ignore_ascii_case("id"));
    let kind_col = headers.iter().position(|h| h.eq_ignore_ascii_case("kind"));
    let (id_col, kind_col) = match (id_col, kind_col) {
        (Some(i), Some(k)) => (i, k),
        _ => {
            return Err(RosterError::UnsupportedFormat(
                "csv roster must have 'id' and 'kind' columns".to_string(),
            ))
        }
    };

    let mut entries = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row?;
        let id = row.get(id_col).unwrap_or("").trim();
        let kind_label = row.get(kind_col).unwrap_or("").trim();
        match (id.is_empty(), EntityKind::from_label(kind_label)) {
            (false, Some(kind)) => entries.push(RosterEntry::new(id, kind)),
            _ => warn!(
                row = index + 2,
                id, kind = kind_label, "skipping unusable roster row"
            ),
        }
    }
    Ok(entries)
}

/// Expects a top-level array of `{"id": ..., "kind": ...}` objects.
/// Malformed elements are skipped, not fatal; a non-array document is.
fn parse_json_roster(text: &str) -> Result<Vec<RosterEntry>, RosterError> {
    let document: serde_json::Value = serde_json::from_str(text)?;
    let rows = match document.as_array() {
        Some(rows) => rows,
        None => {
            return Err(RosterError::UnsupportedFormat(
                "json roster must be a top-level array".to_string(),
            ))
        }
    };

    let mut entries = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let id = row.get("id").and_then(|v| v.as_str()).unwrap_or("").trim();
        let kind = row
            .get("kind")
            .and_then(|v| v.as_str())
            .and_then(EntityKind::from_label);
        match (id.is_empty(), kind) {
            (false, Some(kind)) => entries.push(RosterEntry::new(id, kind)),
            _ => warn!(index, "skipping unusable roster element"),
        }
    }
    Ok(entries)
}
