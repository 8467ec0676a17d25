use std::collections::HashMap;

use itertools::Itertools;
use serde::Serialize;
use strum::VariantArray;

use crate::{error::CategoryError, manifest::ManifestRow, manifest::column::SAMPLE_TYPE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, VariantArray)]
pub enum SampleType {
    #[strum(serialize = "Blood (EDTA)")]
    BloodEdta,
    #[strum(serialize = "Blood (ACD)")]
    BloodAcd,
    #[strum(serialize = "Blood")]
    Blood,
    #[strum(serialize = "DNA")]
    Dna,
    #[strum(serialize = "DNA from blood")]
    DnaFromBlood,
    #[strum(serialize = "DNA from FFPE")]
    DnaFromFfpe,
    #[strum(serialize = "RNA")]
    Rna,
    #[strum(serialize = "Saliva")]
    Saliva,
    #[strum(serialize = "Buccal Swab")]
    BuccalSwab,
    #[strum(serialize = "T-25 Flasks (Amniotic)")]
    T25FlasksAmniotic,
    #[strum(serialize = "FFPE Slide")]
    FfpeSlide,
    #[strum(serialize = "FFPE Block")]
    FfpeBlock,
    #[strum(serialize = "Fresh tissue")]
    FreshTissue,
    #[strum(serialize = "Frozen tissue")]
    FrozenTissue,
    #[strum(serialize = "Bone Marrow Aspirate")]
    BoneMarrowAspirate,
    #[strum(serialize = "Whole BMA")]
    WholeBma,
    #[strum(serialize = "CD3+ BMA")]
    Cd3Bma,
    #[strum(serialize = "Other")]
    Other,
}

impl SampleType {
    #[must_use]
    pub fn allowed() -> Vec<String> {
        Self::VARIANTS.iter().map(ToString::to_string).collect()
    }
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SampleTypeReport {
    /// Raw value -> canonical term, for every value that needed its whitespace fixed
    pub rewritten: Vec<(String, String)>,
    pub counts: Vec<(String, usize)>,
}

/// Rewrites `sample_type` values that only differ from an allowed term by whitespace.
/// Nothing is rewritten unless every value resolves. Empty cells are left to the required-value
/// check.
///
/// # Errors
/// [`CategoryError::UnknownCategory`] listing the raw values that match no term even after
/// whitespace is removed.
pub fn reconcile_sample_types(
    rows: &mut [ManifestRow],
) -> Result<SampleTypeReport, CategoryError> {
    let not_allowed: Vec<String> = rows
        .iter()
        .map(|r| r.sample_type.as_str())
        .unique()
        .filter(|v| !v.is_empty() && v.parse::<SampleType>().is_err())
        .map(str::to_string)
        .collect();

    let mut report = SampleTypeReport::default();

    if !not_allowed.is_empty() {
        let stripped_terms: HashMap<String, SampleType> = SampleType::VARIANTS
            .iter()
            .map(|t| (strip_whitespace(&t.to_string()), *t))
            .collect();

        let (resolved, unknown): (Vec<_>, Vec<_>) = not_allowed
            .into_iter()
            .map(|raw| {
                let term = stripped_terms.get(&strip_whitespace(&raw)).copied();
                (raw, term)
            })
            .partition(|(_, term)| term.is_some());

        if !unknown.is_empty() {
            return Err(CategoryError::UnknownCategory {
                column: SAMPLE_TYPE.to_string(),
                values: unknown.into_iter().map(|(raw, _)| raw).collect(),
                allowed: SampleType::allowed(),
            });
        }

        let mapping: HashMap<String, String> = resolved
            .into_iter()
            .filter_map(|(raw, term)| term.map(|t| (raw, t.to_string())))
            .collect();

        for row in rows.iter_mut() {
            if let Some(term) = mapping.get(&row.sample_type) {
                row.sample_type.clone_from(term);
            }
        }

        tracing::info!(
            n_values = mapping.len(),
            "removed undesired whitespace from sample_type values"
        );
        report.rewritten = mapping.into_iter().sorted().collect();
    }

    report.counts = rows
        .iter()
        .map(|r| r.sample_type.clone())
        .counts()
        .into_iter()
        .sorted_by(|(a, n_a), (b, n_b)| n_b.cmp(n_a).then(a.cmp(b)))
        .collect();

    Ok(report)
}
