use std::{
    borrow::Cow,
    fs::{self, File},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use itertools::Itertools;
use log::{debug, warn};

use crate::{geojson::FeatureCollection, visit::Parsed, Visit};

/// Reads every row of a headerless record file. Rows that don't parse are
/// logged and skipped, only failing to read the file itself is an error.
pub fn read(path: &Path) -> Result<Vec<Visit>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);

    let mut visits = Vec::new();
    // byte records so one badly encoded row can't abort the whole read
    for (line, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Failed to read {}", path.display()))?;
        let fields: Vec<_> = record.iter().map(String::from_utf8_lossy).collect();
        if fields.iter().any(|x| matches!(x, Cow::Owned(_))) {
            warn!("Row {}: replaced invalid UTF-8", line + 1);
        }
        let parsed = Visit::parse(&fields);
        match &parsed {
            Parsed::Clean(_) => {}
            Parsed::Defaulted { fields, .. } => {
                warn!(
                    "Row {}: defaulted unparseable {}",
                    line + 1,
                    fields.iter().join(", ")
                );
            }
            Parsed::Dropped { len } => {
                debug!("Row {}: skipping, expected 5 fields but found {len}", line + 1);
            }
        }
        visits.extend(parsed.visit());
    }

    Ok(visits)
}

/// Overwrites `path` with the visits in canonical form.
pub fn write(path: &Path, visits: &[Visit]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for visit in visits {
        writer.write_record(visit.to_record())?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn write_collection(path: &Path, collection: &FeatureCollection) -> Result<()> {
    let mut output = serde_json::to_string_pretty(collection)?;
    output.push('\n');
    fs::write(path, output).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// `travel.csv` -> `travel.geojson`
pub fn geojson_path(input: &Path) -> PathBuf {
    input.with_extension("geojson")
}

/// `trips/travel.geojson` + `museum` -> `trips/museum-travel.geojson`
///
/// Separators and leading dots in the purpose become `_` so the file always
/// lands next to the primary output.
pub fn partition_path(primary: &Path, purpose: &str) -> PathBuf {
    let name = primary
        .file_name()
        .map(|x| x.to_string_lossy())
        .unwrap_or_default();
    let dots = purpose.len() - purpose.trim_start_matches('.').len();
    let purpose: String = "_".repeat(dots)
        + &purpose[dots..].replace(['/', '\\'], "_");
    primary.with_file_name(format!("{purpose}-{name}"))
}
