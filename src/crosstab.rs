use std::collections::BTreeMap;

use serde::Serialize;

/// Column label for rows whose source cell was empty.
pub const MISSING_LABEL: &str = "_Missing";

/// Counts of samples by (row label, column label), e.g. derived QC term by raw category.
/// Margins are computed on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrossTab {
    pub rows_field: String,
    pub columns_field: String,
    pub counts: BTreeMap<String, BTreeMap<String, usize>>,
}

impl CrossTab {
    #[must_use]
    pub fn new(rows_field: &str, columns_field: &str) -> Self {
        Self {
            rows_field: rows_field.to_string(),
            columns_field: columns_field.to_string(),
            counts: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, row: &str, column: Option<&str>) {
        let column = column.unwrap_or(MISSING_LABEL);

        *self
            .counts
            .entry(row.to_string())
            .or_default()
            .entry(column.to_string())
            .or_default() += 1;
    }

    #[must_use]
    pub fn count(&self, row: &str, column: &str) -> usize {
        self.counts
            .get(row)
            .and_then(|r| r.get(column))
            .copied()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn row_total(&self, row: &str) -> usize {
        self.counts.get(row).map_or(0, |r| r.values().sum())
    }

    #[must_use]
    pub fn column_total(&self, column: &str) -> usize {
        self.counts.values().filter_map(|r| r.get(column)).sum()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().flat_map(BTreeMap::values).sum()
    }
}
