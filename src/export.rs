use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{error::Result, manifest::GENERATED_COLUMNS};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Tsv,
}

impl OutputFormat {
    fn delimiter(self) -> u8 {
        match self {
            Self::Csv => b',',
            Self::Tsv => b'\t',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFile {
    pub study: String,
    pub file_name: String,
    pub contents: String,
}

#[must_use]
pub fn file_name(study: &str, date: NaiveDate, format: OutputFormat) -> String {
    format!(
        "{study}_sample_manifest_selfQC_{}.{format}",
        date.format("%Y%m%d")
    )
}

/// The upload's own columns, then every generated column. Generated columns the upload already
/// carried are moved to the end rather than repeated.
#[must_use]
pub fn export_columns(headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .filter(|h| !GENERATED_COLUMNS.contains(&h.as_str()))
        .cloned()
        .chain(GENERATED_COLUMNS.iter().map(|c| (*c).to_string()))
        .collect()
}

/// # Errors
pub fn write_table(
    columns: &[String],
    records: impl IntoIterator<Item = Vec<String>>,
    format: OutputFormat,
) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(format.delimiter())
        .from_writer(Vec::new());

    writer.write_record(columns)?;
    for record in records {
        writer.write_record(&record)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;

    String::from_utf8(bytes).map_err(|e| crate::error::Error::Input {
        message: format!("export is not valid UTF-8: {e}"),
    })
}
