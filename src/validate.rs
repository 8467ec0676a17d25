use std::{collections::HashSet, sync::LazyLock};

use itertools::Itertools;
use regex::Regex;

use crate::{
    error::{DuplicateIdError, MissingValues, SchemaError},
    manifest::{IDENTITY_COLUMNS, ManifestRow, RawManifest, column::*},
};

pub use numeric::{ColumnSummary, Distribution, check_numeric};

mod numeric;

/// At most this many offending rows are listed in an error.
pub const MAX_REPORTED_ROWS: usize = 20;

// Study names end up in export file names, so no path separators or dot runs
static STUDY_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+(?:[._-][A-Za-z0-9]+)*$").unwrap());

/// Checks that no header is repeated, that every column in `all_columns` is present and that no
/// row has an empty cell in `required_columns`, then builds the typed rows. The identity columns
/// are required whatever `required_columns` says.
///
/// # Errors
/// The first error of [`check_columns`] or [`check_required_values`].
pub fn validate(
    manifest: &RawManifest,
    required_columns: &[&str],
    all_columns: &[&str],
) -> Result<Vec<ManifestRow>, SchemaError> {
    check_columns(manifest, required_columns, all_columns)?;
    check_required_values(manifest, required_columns)?;

    Ok(build_rows(manifest))
}

/// # Errors
/// [`SchemaError::DuplicateColumns`] if a header appears twice, otherwise
/// [`SchemaError::MissingColumns`] listing every absent column.
pub fn check_columns(
    manifest: &RawManifest,
    required_columns: &[&str],
    all_columns: &[&str],
) -> Result<(), SchemaError> {
    let duplicate_columns: Vec<String> = manifest
        .headers()
        .iter()
        .duplicates()
        .cloned()
        .collect();

    if !duplicate_columns.is_empty() {
        return Err(SchemaError::DuplicateColumns {
            columns: duplicate_columns,
        });
    }

    let missing_columns: Vec<String> = all_columns
        .iter()
        .chain(required_columns)
        .chain(&IDENTITY_COLUMNS)
        .unique()
        .filter(|c| manifest.column_index(c).is_none())
        .map(|c| (*c).to_string())
        .collect();

    if !missing_columns.is_empty() {
        return Err(SchemaError::MissingColumns {
            columns: missing_columns,
        });
    }

    Ok(())
}

/// # Errors
/// [`SchemaError::MissingRequiredValues`] with the first [`MAX_REPORTED_ROWS`] offending rows.
pub fn check_required_values(
    manifest: &RawManifest,
    required_columns: &[&str],
) -> Result<(), SchemaError> {
    let required: Vec<(&str, usize)> = required_columns
        .iter()
        .chain(&IDENTITY_COLUMNS)
        .unique()
        .filter_map(|c| manifest.column_index(c).map(|i| (*c, i)))
        .collect();
    let sample_id_index = manifest.column_index(SAMPLE_ID);

    let mut offending = Vec::new();
    let mut total = 0;
    for (i, record) in manifest.records().enumerate() {
        let columns: Vec<String> = required
            .iter()
            .filter(|(_, idx)| record[*idx].is_none())
            .map(|(c, _)| (*c).to_string())
            .collect();

        if columns.is_empty() {
            continue;
        }

        total += 1;
        if offending.len() < MAX_REPORTED_ROWS {
            offending.push(MissingValues {
                row: i + 1,
                sample_id: sample_id_index.and_then(|idx| record[idx].clone()),
                columns,
            });
        }
    }

    if total > 0 {
        return Err(SchemaError::MissingRequiredValues {
            rows: offending,
            total,
        });
    }

    Ok(())
}

/// Builds one typed row per record. An empty identity cell becomes an empty string, so callers
/// run [`check_required_values`] before trusting the rows.
#[must_use]
pub fn build_rows(manifest: &RawManifest) -> Vec<ManifestRow> {
    manifest
        .records()
        .enumerate()
        .map(|(i, record)| build_row(manifest.headers(), record, i + 1))
        .collect()
}

fn build_row(headers: &[String], record: &[Option<String>], row: usize) -> ManifestRow {
    let mut manifest_row = ManifestRow {
        row,
        study: String::new(),
        sample_id: String::new(),
        clinical_id: String::new(),
        sample_type: String::new(),
        study_arm: None,
        sex: None,
        race: None,
        family_history: None,
        region: None,
        plate_name: None,
        plate_position: None,
        other: Vec::new(),
    };

    for (header, value) in headers.iter().zip(record) {
        let value = value.clone();

        match header.as_str() {
            STUDY => manifest_row.study = value.unwrap_or_default(),
            SAMPLE_ID => manifest_row.sample_id = value.unwrap_or_default(),
            CLINICAL_ID => manifest_row.clinical_id = value.unwrap_or_default(),
            SAMPLE_TYPE => manifest_row.sample_type = value.unwrap_or_default(),
            STUDY_ARM => manifest_row.study_arm = value,
            SEX => manifest_row.sex = value,
            RACE => manifest_row.race = value,
            FAMILY_HISTORY => manifest_row.family_history = value,
            REGION => manifest_row.region = value,
            PLATE_NAME => manifest_row.plate_name = value,
            PLATE_POSITION => manifest_row.plate_position = value,
            _ => manifest_row.other.push((header.clone(), value)),
        }
    }

    manifest_row
}

/// # Errors
/// [`SchemaError::InvalidStudyNames`] listing each offending study once.
pub fn check_study_names(rows: &[ManifestRow]) -> Result<(), SchemaError> {
    let studies: Vec<String> = rows
        .iter()
        .map(|r| r.study.as_str())
        .filter(|s| !STUDY_NAME_REGEX.is_match(s))
        .unique()
        .map(str::to_string)
        .collect();

    if studies.is_empty() {
        return Ok(());
    }

    Err(SchemaError::InvalidStudyNames { studies })
}

/// # Errors
/// Lists every duplicated `sample_id` once, in the order the duplicates appear.
pub fn check_duplicate_sample_ids(rows: &[ManifestRow]) -> Result<(), DuplicateIdError> {
    let mut seen = HashSet::with_capacity(rows.len());

    let sample_ids: Vec<String> = rows
        .iter()
        .filter(|r| !seen.insert(r.sample_id.as_str()))
        .map(|r| r.sample_id.clone())
        .unique()
        .collect();

    if sample_ids.is_empty() {
        return Ok(());
    }

    Err(DuplicateIdError { sample_ids })
}
