use crate::manifest::{ManifestRow, RawManifest, TEMPLATE_COLUMNS, column::*};

pub fn manifest_row(study: &str, sample_id: &str) -> ManifestRow {
    ManifestRow {
        row: 1,
        study: study.to_string(),
        sample_id: sample_id.to_string(),
        clinical_id: format!("clin-{sample_id}"),
        sample_type: "Blood".to_string(),
        study_arm: Some("PD".to_string()),
        sex: Some("M".to_string()),
        race: None,
        family_history: None,
        region: None,
        plate_name: None,
        plate_position: None,
        other: Vec::new(),
    }
}

fn default_cell(column: &str, i: usize) -> String {
    match column {
        STUDY => "STUDY".to_string(),
        SAMPLE_ID => format!("SAMPLE{i}"),
        CLINICAL_ID => format!("clin-{i}"),
        SAMPLE_TYPE => "Blood".to_string(),
        STUDY_ARM => "PD".to_string(),
        SEX => "M".to_string(),
        DNA_VOLUME => "50".to_string(),
        DNA_CONC => "20".to_string(),
        PLATE_NAME => "plate1".to_string(),
        PLATE_POSITION => format!("P{}", i + 1),
        _ => String::new(),
    }
}

/// A manifest with every template column. Each row takes sensible defaults except for the
/// `(column, value)` overrides given, where `""` means an empty cell.
pub fn raw_manifest(rows: &[&[(&str, &str)]]) -> RawManifest {
    let headers: Vec<String> = TEMPLATE_COLUMNS.iter().map(|c| (*c).to_string()).collect();

    let records = rows
        .iter()
        .enumerate()
        .map(|(i, overrides)| {
            TEMPLATE_COLUMNS
                .iter()
                .map(|column| {
                    let value = overrides
                        .iter()
                        .find(|(c, _)| c == column)
                        .map_or_else(|| default_cell(column, i), |(_, v)| (*v).to_string());

                    Some(value).filter(|v| !v.is_empty())
                })
                .collect()
        })
        .collect();

    RawManifest::new(headers, records)
}
