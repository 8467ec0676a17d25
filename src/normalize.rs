use std::{collections::BTreeMap, fmt::Display};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    crosstab::CrossTab,
    error::CategoryError,
    manifest::{ManifestRow, column},
};

pub use sample_type::{SampleType, SampleTypeReport, reconcile_sample_types};
pub use vocabulary::{
    FamilyHistory, NOT_ASSIGNED, NOT_REPORTED, Phenotype, QcTerm, Race, Region, Sex, Vocabulary,
};

mod sample_type;
mod vocabulary;

/// Raw category as it appears in the upload -> controlled term.
pub type CategoryMapping<T> = BTreeMap<String, T>;

/// The category mappings a submitter confirmed for one upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Mappings {
    pub phenotype: CategoryMapping<Phenotype>,
    pub sex: CategoryMapping<Sex>,
    pub race: CategoryMapping<Race>,
    pub family_history: CategoryMapping<FamilyHistory>,
    pub region: CategoryMapping<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Warning {
    NotAssigned { column: String, values: Vec<String> },
    MissingValues { column: String, count: usize },
    HighOtherUnknownSex { fraction: f64, threshold: f64 },
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAssigned { column, values } => write!(
                f,
                "{column}: no mapping for {}, marked '{NOT_ASSIGNED}'",
                values.join(", ")
            ),
            Self::MissingValues { column, count } => write!(f, "{count} entries missing {column}"),
            Self::HighOtherUnknownSex {
                fraction,
                threshold,
            } => write!(
                f,
                "{:.1}% of samples have sex 'Other' or 'Unknown' (threshold {:.1}%)",
                fraction * 100.0,
                threshold * 100.0
            ),
        }
    }
}

/// One derived QC column, in row order.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumn<T> {
    pub values: Vec<QcTerm<T>>,
    pub crosstab: CrossTab,
    /// Distinct raw values without a mapping entry
    pub unmapped: Vec<String>,
    /// Rows whose source cell was empty
    pub missing: usize,
}

/// Maps each raw value through `mapping`. Empty cells become the vocabulary's `Not Reported`,
/// raw values without an entry become [`QcTerm::NotAssigned`].
pub fn derive_column<'a, T: Vocabulary>(
    source_column: &str,
    raw: impl IntoIterator<Item = Option<&'a str>>,
    mapping: &CategoryMapping<T>,
) -> DerivedColumn<T> {
    let mut crosstab = CrossTab::new(T::COLUMN, source_column);
    let mut unmapped = Vec::new();
    let mut missing = 0;

    let values = raw
        .into_iter()
        .map(|value| {
            let term = match value {
                None => {
                    missing += 1;
                    QcTerm::Assigned(T::not_reported())
                }
                Some(raw) => match mapping.get(raw) {
                    Some(term) => QcTerm::Assigned(term.clone()),
                    None => {
                        if !unmapped.iter().any(|u| u == raw) {
                            unmapped.push(raw.to_string());
                        }
                        QcTerm::NotAssigned
                    }
                },
            };

            crosstab.add(&term.to_string(), value);
            term
        })
        .collect();

    DerivedColumn {
        values,
        crosstab,
        unmapped,
        missing,
    }
}

/// # Errors
/// [`CategoryError::IncompleteRegionMapping`] unless every distinct raw region maps to a
/// non-empty term.
pub fn region_mapping<'a>(
    raw: impl IntoIterator<Item = Option<&'a str>>,
    mapping: &CategoryMapping<String>,
) -> Result<CategoryMapping<Region>, CategoryError> {
    let unmapped: Vec<String> = raw
        .into_iter()
        .flatten()
        .unique()
        .filter(|r| mapping.get(*r).is_none_or(|term| term.trim().is_empty()))
        .map(str::to_string)
        .collect();

    if !unmapped.is_empty() {
        return Err(CategoryError::IncompleteRegionMapping { unmapped });
    }

    Ok(mapping
        .iter()
        .filter(|(_, term)| !term.trim().is_empty())
        .map(|(raw, term)| (raw.clone(), Region::new(term)))
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct QcFields {
    pub phenotype: QcTerm<Phenotype>,
    pub sex: QcTerm<Sex>,
    pub race: QcTerm<Race>,
    pub family_history: QcTerm<FamilyHistory>,
    pub region: QcTerm<Region>,
}

impl QcFields {
    #[must_use]
    pub fn get(&self, column: &str) -> Option<String> {
        let value = match column {
            column::PHENOTYPE => self.phenotype.to_string(),
            column::SEX_FOR_QC => self.sex.to_string(),
            column::RACE_FOR_QC => self.race.to_string(),
            column::FAMILY_HISTORY_FOR_QC => self.family_history.to_string(),
            column::REGION_FOR_QC => self.region.to_string(),
            _ => return None,
        };

        Some(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// One entry per input row, in input order
    pub fields: Vec<QcFields>,
    pub crosstabs: Vec<CrossTab>,
    pub warnings: Vec<Warning>,
}

impl Normalized {
    /// Derived columns still holding a `Not Assigned` value.
    #[must_use]
    pub fn not_assigned_columns(&self) -> Vec<String> {
        self.warnings
            .iter()
            .filter_map(|w| match w {
                Warning::NotAssigned { column, .. } => Some(column.clone()),
                _ => None,
            })
            .collect()
    }
}

fn collect_warnings<T: Vocabulary>(
    derived: &DerivedColumn<T>,
    source_column: &str,
    warn_on_missing: bool,
    warnings: &mut Vec<Warning>,
) {
    if !derived.unmapped.is_empty() {
        warnings.push(Warning::NotAssigned {
            column: T::COLUMN.to_string(),
            values: derived.unmapped.clone(),
        });
    }

    if warn_on_missing && derived.missing > 0 {
        warnings.push(Warning::MissingValues {
            column: source_column.to_string(),
            count: derived.missing,
        });
    }
}

/// Derives every QC column from its raw column.
///
/// # Errors
/// [`CategoryError::IncompleteRegionMapping`] when a raw region has no term.
pub fn normalize_categories<'a>(
    rows: impl IntoIterator<Item = &'a ManifestRow>,
    mappings: &Mappings,
    other_sex_warning_fraction: f64,
) -> Result<Normalized, CategoryError> {
    let rows: Vec<&ManifestRow> = rows.into_iter().collect();

    let region_terms = region_mapping(rows.iter().map(|r| r.region.as_deref()), &mappings.region)?;

    let phenotype = derive_column(
        column::STUDY_ARM,
        rows.iter().map(|r| r.study_arm.as_deref()),
        &mappings.phenotype,
    );
    let sex = derive_column(column::SEX, rows.iter().map(|r| r.sex.as_deref()), &mappings.sex);
    let race = derive_column(column::RACE, rows.iter().map(|r| r.race.as_deref()), &mappings.race);
    let family_history = derive_column(
        column::FAMILY_HISTORY,
        rows.iter().map(|r| r.family_history.as_deref()),
        &mappings.family_history,
    );
    let region = derive_column(
        column::REGION,
        rows.iter().map(|r| r.region.as_deref()),
        &region_terms,
    );

    let mut warnings = Vec::new();
    collect_warnings(&phenotype, column::STUDY_ARM, false, &mut warnings);
    collect_warnings(&sex, column::SEX, false, &mut warnings);
    collect_warnings(&race, column::RACE, true, &mut warnings);
    collect_warnings(&family_history, column::FAMILY_HISTORY, true, &mut warnings);
    collect_warnings(&region, column::REGION, true, &mut warnings);

    let n_other_unknown = sex
        .values
        .iter()
        .filter(|s| matches!(s.term(), Some(Sex::Other | Sex::Unknown)))
        .count();
    if !rows.is_empty() {
        #[allow(clippy::cast_precision_loss)]
        let fraction = n_other_unknown as f64 / rows.len() as f64;
        if fraction > other_sex_warning_fraction {
            warnings.push(Warning::HighOtherUnknownSex {
                fraction,
                threshold: other_sex_warning_fraction,
            });
        }
    }

    for warning in &warnings {
        tracing::warn!(%warning);
    }

    let fields = phenotype
        .values
        .into_iter()
        .zip(sex.values)
        .zip(race.values)
        .zip(family_history.values)
        .zip(region.values)
        .map(
            |((((phenotype, sex), race), family_history), region)| QcFields {
                phenotype,
                sex,
                race,
                family_history,
                region,
            },
        )
        .collect();

    Ok(Normalized {
        fields,
        crosstabs: vec![
            phenotype.crosstab,
            sex.crosstab,
            race.crosstab,
            family_history.crosstab,
            region.crosstab,
        ],
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{crosstab::MISSING_LABEL, test_util::manifest_row};

    #[fixture]
    fn mappings() -> Mappings {
        Mappings {
            phenotype: [
                ("PD".to_string(), Phenotype::Pd),
                ("HC".to_string(), Phenotype::Control),
            ]
            .into(),
            sex: [
                ("M".to_string(), Sex::Male),
                ("F".to_string(), Sex::Female),
                ("?".to_string(), Sex::Unknown),
            ]
            .into(),
            race: [("Caucasian".to_string(), Race::White)].into(),
            family_history: [("yes".to_string(), FamilyHistory::Yes)].into(),
            region: [("Spain".to_string(), "ESP".to_string())].into(),
        }
    }

    fn row(
        sample_id: &str,
        arm: &str,
        sex: &str,
        race: Option<&str>,
        region: Option<&str>,
    ) -> ManifestRow {
        let mut row = manifest_row("STUDY", sample_id);
        row.study_arm = Some(arm.to_string());
        row.sex = Some(sex.to_string());
        row.race = race.map(str::to_string);
        row.region = region.map(str::to_string);
        row
    }

    #[test]
    fn unmapped_values_are_not_assigned() {
        let mapping: CategoryMapping<Sex> = [("M".to_string(), Sex::Male)].into();

        let derived = derive_column(
            column::SEX,
            [Some("M"), Some("male"), None, Some("male")],
            &mapping,
        );

        assert_eq!(
            derived.values,
            [
                QcTerm::Assigned(Sex::Male),
                QcTerm::NotAssigned,
                QcTerm::Assigned(Sex::NotReported),
                QcTerm::NotAssigned
            ]
        );
        assert_eq!(derived.unmapped, ["male"]);
        assert_eq!(derived.missing, 1);
        assert_eq!(derived.crosstab.count(NOT_ASSIGNED, "male"), 2);
        assert_eq!(derived.crosstab.count(NOT_REPORTED, MISSING_LABEL), 1);
    }

    #[rstest]
    #[case(&[Some("Spain"), None], Ok(1))]
    #[case(&[Some("Spain"), Some("Peru")], Err(vec!["Peru"]))]
    #[case(&[Some("Blank")], Err(vec!["Blank"]))]
    fn region_mapping_is_strict(
        #[case] regions: &[Option<&str>],
        #[case] expected: Result<usize, Vec<&str>>,
    ) {
        let mapping: CategoryMapping<String> = [
            ("Spain".to_string(), "ESP".to_string()),
            ("Blank".to_string(), "  ".to_string()),
        ]
        .into();

        let result = region_mapping(regions.iter().copied(), &mapping);

        match expected {
            Ok(n) => assert_eq!(result.unwrap().len(), n),
            Err(unmapped) => assert_eq!(
                result.unwrap_err(),
                CategoryError::IncompleteRegionMapping {
                    unmapped: unmapped.into_iter().map(str::to_string).collect()
                }
            ),
        }
    }

    #[rstest]
    fn derives_all_columns(mappings: Mappings) {
        let rows = [
            row("S1", "PD", "M", Some("Caucasian"), Some("Spain")),
            row("S2", "HC", "F", None, None),
            row("S3", "Prodromal", "M", Some("Martian"), Some("Spain")),
        ];

        let normalized = normalize_categories(&rows, &mappings, 0.5).unwrap();

        let fields = &normalized.fields;
        assert_eq!(fields[0].phenotype, QcTerm::Assigned(Phenotype::Pd));
        assert_eq!(fields[0].region, QcTerm::Assigned(Region::new("ESP")));
        assert_eq!(fields[1].race, QcTerm::Assigned(Race::NotReported));
        assert_eq!(fields[1].region.to_string(), NOT_REPORTED);
        assert_eq!(fields[2].phenotype, QcTerm::NotAssigned);
        assert_eq!(fields[2].get(column::RACE_FOR_QC).as_deref(), Some(NOT_ASSIGNED));

        assert_eq!(
            normalized.not_assigned_columns(),
            [column::PHENOTYPE, column::RACE_FOR_QC]
        );
        assert!(normalized.warnings.contains(&Warning::MissingValues {
            column: column::RACE.to_string(),
            count: 1
        }));
        assert_eq!(normalized.crosstabs.len(), 5);
    }

    #[rstest]
    fn incomplete_region_mapping_is_fatal(mappings: Mappings) {
        let rows = [row("S1", "PD", "M", None, Some("Narnia"))];

        let err = normalize_categories(&rows, &mappings, 0.5).unwrap_err();

        assert_eq!(
            err,
            CategoryError::IncompleteRegionMapping {
                unmapped: vec!["Narnia".to_string()]
            }
        );
    }

    #[rstest]
    fn warns_on_many_unknown_sexes(mappings: Mappings) {
        let rows = [row("S1", "PD", "?", None, None), row("S2", "PD", "M", None, None)];

        let normalized = normalize_categories(&rows, &mappings, 0.1).unwrap();

        assert!(normalized.warnings.contains(&Warning::HighOtherUnknownSex {
            fraction: 0.5,
            threshold: 0.1
        }));
    }

    #[test]
    fn mappings_deserialize_from_toml() {
        let mappings: Mappings = toml::from_str(
            r#"
            [phenotype]
            "Parkinson's" = "PD"

            [sex]
            1 = "Male"
            2 = "Female"

            [region]
            Spain = "ESP"
            "#,
        )
        .unwrap();

        assert_eq!(mappings.phenotype["Parkinson's"], Phenotype::Pd);
        assert_eq!(mappings.sex["2"], Sex::Female);
        assert!(mappings.race.is_empty());
    }
}
