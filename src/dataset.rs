use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::model::{CanonicalJobRecord, COLUMNS};
use crate::normalize::iso_date;
use crate::pipeline::PreviousSnapshot;

/// Write the dataset with a header row, even when there are no records.
pub fn write_csv<W: Write>(out: W, records: &[CanonicalJobRecord]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    wtr.write_record(COLUMNS)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_file(path: &Path, records: &[CanonicalJobRecord]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    write_csv(file, records)?;
    info!(path = ?path, records = records.len(), "dataset written");
    Ok(())
}

/// Load the previous run's `id -> date_added`.
///
/// Never fails: a missing or unreadable file is an empty snapshot, and rows
/// that cannot be read (or carry no usable date) count as not seen.
pub fn load_snapshot(path: &Path) -> PreviousSnapshot {
    if !path.exists() {
        info!(path = ?path, "no previous dataset");
        return PreviousSnapshot::default();
    }
    match File::open(path) {
        Ok(file) => snapshot_from_reader(file),
        Err(e) => {
            warn!(path = ?path, error = %e, "could not open previous dataset");
            PreviousSnapshot::default()
        }
    }
}

pub fn snapshot_from_reader<R: Read>(input: R) -> PreviousSnapshot {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = match rdr.headers() {
        Ok(h) => h.clone(),
        Err(e) => {
            warn!(error = %e, "previous dataset has no readable header");
            return PreviousSnapshot::default();
        }
    };
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let Some(id_col) = column("id") else {
        warn!("previous dataset has no id column");
        return PreviousSnapshot::default();
    };
    let date_col = column("date_added");

    let mut seen = HashMap::new();
    let mut skipped = 0usize;
    for (line, row) in rdr.records().enumerate() {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                debug!(line = line + 2, error = %e, "unreadable snapshot row");
                skipped += 1;
                continue;
            }
        };
        let id = row.get(id_col).map(str::trim).unwrap_or_default();
        let date = date_col
            .and_then(|c| row.get(c))
            .map(str::trim)
            .filter(|d| iso_date(d).is_some());
        match (id.is_empty(), date) {
            (false, Some(date)) => {
                seen.entry(id.to_string()).or_insert_with(|| date.to_string());
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, "ignored unusable rows in previous dataset");
    }
    info!(jobs = seen.len(), "previous dataset loaded");
    PreviousSnapshot::new(seen)
}

/// The columns `stats` looks at.
#[derive(Debug, Deserialize)]
pub struct DatasetRow {
    pub id: String,
    #[serde(default)]
    pub deadline: String,
    #[serde(default)]
    pub is_new: String,
}

pub fn load_rows(path: &Path) -> Result<Vec<DatasetRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;
    let rows = rdr
        .deserialize()
        .collect::<Result<Vec<DatasetRow>, _>>()
        .with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(rows)
}
