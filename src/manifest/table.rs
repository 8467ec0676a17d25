use std::{fs::File, io};

use camino::Utf8Path;

use crate::error::{Error, Result};

/// Spreadsheet spellings of an empty cell, as a dataframe reader would treat them.
const NULL_MARKERS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn parse_cell(cell: &str) -> Option<String> {
    if cell.is_empty() || NULL_MARKERS.contains(&cell) {
        return None;
    }

    Some(cell.to_string())
}

/// An uploaded manifest as read from disk: a header row and one cell vector per data row, every
/// row padded or truncated to the header width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawManifest {
    headers: Vec<String>,
    records: Vec<Vec<Option<String>>>,
}

impl RawManifest {
    #[must_use]
    pub fn new(headers: Vec<String>, records: Vec<Vec<Option<String>>>) -> Self {
        let width = headers.len();
        let records = records
            .into_iter()
            .map(|mut r| {
                r.resize(width, None);
                r
            })
            .collect();

        Self { headers, records }
    }

    /// # Errors
    pub fn from_reader<R: io::Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.iter().map(str::to_string).collect();

        let mut records = Vec::new();
        for record in reader.records() {
            records.push(record?.iter().map(parse_cell).collect());
        }

        Ok(Self::new(headers, records))
    }

    /// Reads a delimited manifest, choosing the delimiter from the file extension.
    ///
    /// # Errors
    pub fn from_path(path: &Utf8Path) -> Result<Self> {
        let delimiter = match path.extension().map(str::to_ascii_lowercase).as_deref() {
            Some("csv") => b',',
            Some("tsv" | "txt") => b'\t',
            Some("xlsx" | "xls") => {
                return Err(Error::Input {
                    message: format!("{path}: export the first sheet as CSV or TSV"),
                });
            }
            _ => {
                return Err(Error::Input {
                    message: format!("{path}: expected a .csv, .tsv or .txt file"),
                });
            }
        };

        let file = File::open(path).map_err(|e| Error::Input {
            message: format!("failed to open {path}: {e}"),
        })?;

        Self::from_reader(file, delimiter)
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> impl Iterator<Item = &[Option<String>]> {
        self.records.iter().map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }
}
