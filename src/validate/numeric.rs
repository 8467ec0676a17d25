use itertools::Itertools;
use serde::Serialize;

use super::MAX_REPORTED_ROWS;
use crate::{
    error::SchemaError,
    manifest::{ManifestRow, NUMERIC_COLUMNS},
};

/// Below this many distinct values a column is summarized by its value counts.
const VALUE_COUNT_LIMIT: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Distribution {
    AllMissing,
    OneValue {
        value: f64,
    },
    ValueCounts {
        counts: Vec<(f64, usize)>,
    },
    Range {
        n: usize,
        min: f64,
        max: f64,
        mean: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub missing: usize,
    pub distribution: Distribution,
}

/// Checks that every non-empty cell of the numeric columns is a number and summarizes each
/// column's distribution.
///
/// # Errors
/// [`SchemaError::NotNumeric`] for the first column holding a non-numeric value.
pub fn check_numeric<'a>(
    rows: impl IntoIterator<Item = &'a ManifestRow>,
) -> Result<Vec<ColumnSummary>, SchemaError> {
    let rows: Vec<&ManifestRow> = rows.into_iter().collect();

    let mut summaries = Vec::with_capacity(NUMERIC_COLUMNS.len());
    for column in NUMERIC_COLUMNS {
        let cells: Vec<Option<&str>> = rows.iter().map(|r| r.get(column)).collect();

        let not_numeric: Vec<String> = cells
            .iter()
            .flatten()
            .filter(|v| v.trim().parse::<f64>().is_err())
            .unique()
            .take(MAX_REPORTED_ROWS)
            .map(|v| (*v).to_string())
            .collect();

        if !not_numeric.is_empty() {
            return Err(SchemaError::NotNumeric {
                column: column.to_string(),
                values: not_numeric,
            });
        }

        let values: Vec<f64> = cells
            .iter()
            .flatten()
            .filter_map(|v| v.trim().parse().ok())
            .collect();

        summaries.push(ColumnSummary {
            column: column.to_string(),
            missing: cells.len() - values.len(),
            distribution: distribution(&values),
        });
    }

    Ok(summaries)
}

fn distribution(values: &[f64]) -> Distribution {
    let counts: Vec<(f64, usize)> = values
        .iter()
        .map(|v| v.to_bits())
        .counts()
        .into_iter()
        .map(|(bits, n)| (f64::from_bits(bits), n))
        .sorted_by(|(a, n_a), (b, n_b)| n_b.cmp(n_a).then(a.total_cmp(b)))
        .collect();

    match counts.len() {
        0 => Distribution::AllMissing,
        1 => Distribution::OneValue { value: counts[0].0 },
        n if n < VALUE_COUNT_LIMIT => Distribution::ValueCounts { counts },
        _ => {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            #[allow(clippy::cast_precision_loss)]
            let mean = values.iter().sum::<f64>() / values.len() as f64;

            Distribution::Range {
                n: values.len(),
                min,
                max,
                mean,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        manifest::column::{AGE, DNA_CONC, DNA_VOLUME},
        test_util::manifest_row,
    };

    fn rows_with(column: &str, values: &[Option<&str>]) -> Vec<ManifestRow> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut row = manifest_row("STUDY", &format!("S{i}"));
                row.other
                    .push((column.to_string(), v.map(str::to_string)));
                row
            })
            .collect()
    }

    fn summary_of<'a>(summaries: &'a [ColumnSummary], column: &str) -> &'a ColumnSummary {
        summaries.iter().find(|s| s.column == column).unwrap()
    }

    #[test]
    fn rejects_text_in_numeric_columns() {
        let rows = rows_with(DNA_CONC, &[Some("12"), Some("high"), Some("1,5"), Some("high")]);

        assert_eq!(
            check_numeric(&rows),
            Err(SchemaError::NotNumeric {
                column: DNA_CONC.to_string(),
                values: vec!["high".to_string(), "1,5".to_string()],
            })
        );
    }

    #[test]
    fn summarizes_each_column() {
        let rows = rows_with(AGE, &[Some("61"), Some("70"), None, Some("61")]);

        let summaries = check_numeric(&rows).unwrap();
        assert_eq!(summaries.len(), NUMERIC_COLUMNS.len());

        let age = summary_of(&summaries, AGE);
        assert_eq!(age.missing, 1);
        assert_eq!(
            age.distribution,
            Distribution::ValueCounts {
                counts: vec![(61.0, 2), (70.0, 1)]
            }
        );

        let volume = summary_of(&summaries, DNA_VOLUME);
        assert_eq!(volume.missing, 4);
        assert_eq!(volume.distribution, Distribution::AllMissing);
    }

    #[test]
    fn one_value_and_range() {
        assert_eq!(distribution(&[2.5, 2.5]), Distribution::OneValue { value: 2.5 });

        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(
            distribution(&values),
            Distribution::Range {
                n: 6,
                min: 1.0,
                max: 6.0,
                mean: 3.5
            }
        );
    }
}
