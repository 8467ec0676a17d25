//! Runs an uploaded manifest through every check in order, allocating GP2 IDs along the way.
//! Any failing stage ends the run and leaves the registry untouched.
use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::VariantArray;

use crate::{
    allocate::{AllocatedRow, allocate},
    config::Settings,
    crosstab::CrossTab,
    error::{Error, Result},
    export::{ExportFile, OutputFormat, export_columns, file_name, write_table},
    gp2_id::Gp2SampleId,
    manifest::{
        GenotypingSite, ManifestRow, RawManifest, TEMPLATE_COLUMNS,
        column::{GENOTYPING_SITE, GP2_ID, GP2_SAMPLE_ID, SAMPLE_REP_NO},
    },
    normalize::{
        Mappings, QcFields, SampleTypeReport, Warning, normalize_categories,
        reconcile_sample_types,
    },
    plate::check_plates,
    registry::RegistryStore,
    validate::{
        ColumnSummary, build_rows, check_columns, check_duplicate_sample_ids, check_numeric,
        check_required_values, check_study_names,
    },
};

/// A category mapping the submitter has to sign off on before export.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    VariantArray,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConfirmationStep {
    Phenotype,
    Sex,
    Race,
    FamilyHistory,
    Region,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Confirmations(BTreeSet<ConfirmationStep>);

impl Confirmations {
    #[must_use]
    pub fn all() -> Self {
        ConfirmationStep::VARIANTS.iter().copied().collect()
    }

    pub fn confirm(&mut self, step: ConfirmationStep) {
        self.0.insert(step);
    }

    #[must_use]
    pub fn missing(&self) -> Vec<ConfirmationStep> {
        ConfirmationStep::VARIANTS
            .iter()
            .filter(|s| !self.0.contains(s))
            .copied()
            .collect()
    }
}

impl FromIterator<ConfirmationStep> for Confirmations {
    fn from_iter<T: IntoIterator<Item = ConfirmationStep>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyReport {
    pub study: String,
    pub n_samples: usize,
    pub newly_minted: usize,
    pub highest_sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub n_rows: usize,
    pub n_clinical_ids: usize,
    pub sample_types: SampleTypeReport,
    pub studies: Vec<StudyReport>,
    pub crosstabs: Vec<CrossTab>,
    pub plates: CrossTab,
    pub numeric: Vec<ColumnSummary>,
    pub warnings: Vec<Warning>,
    pub registry_updated: bool,
}

/// A manifest row with everything this crate adds to it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRow {
    pub row: ManifestRow,
    pub qc: QcFields,
    pub id: Gp2SampleId,
    pub newly_minted: bool,
}

impl EnrichedRow {
    /// The exported value of `column`, empty for a null cell.
    #[must_use]
    pub fn cell(&self, column: &str, site: GenotypingSite) -> String {
        match column {
            GENOTYPING_SITE => site.to_string(),
            GP2_ID => self.id.gp2_id().to_string(),
            SAMPLE_REP_NO => self.id.sample_rep_no(),
            GP2_SAMPLE_ID => self.id.to_string(),
            _ => self
                .qc
                .get(column)
                .or_else(|| self.row.get(column).map(str::to_string))
                .unwrap_or_default(),
        }
    }
}

/// A manifest that passed every check. Export still needs [`CheckedManifest::finish`].
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedManifest {
    report: Report,
    headers: Vec<String>,
    rows: Vec<EnrichedRow>,
    site: GenotypingSite,
    not_assigned: Vec<String>,
}

impl CheckedManifest {
    #[must_use]
    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Grouped by study, studies in order of first appearance
    #[must_use]
    pub fn rows(&self) -> &[EnrichedRow] {
        &self.rows
    }

    /// Renders one export file per study, once every mapping is confirmed and no derived value
    /// is `Not Assigned`.
    ///
    /// # Errors
    /// [`Error::Unconfirmed`] or [`Error::NotAssigned`] when the finish gate is closed.
    pub fn finish(
        &self,
        confirmations: &Confirmations,
        format: OutputFormat,
        date: NaiveDate,
    ) -> Result<Vec<ExportFile>> {
        let missing = confirmations.missing();
        if !missing.is_empty() {
            return Err(Error::Unconfirmed {
                steps: missing.iter().map(ToString::to_string).collect(),
            });
        }

        if !self.not_assigned.is_empty() {
            return Err(Error::NotAssigned {
                columns: self.not_assigned.clone(),
            });
        }

        let columns = export_columns(&self.headers);

        let mut files = Vec::new();
        for (study, rows) in &self.rows.iter().chunk_by(|r| r.row.study.as_str()) {
            let records =
                rows.map(|r| columns.iter().map(|c| r.cell(c, self.site)).collect::<Vec<_>>());

            files.push(ExportFile {
                study: study.to_string(),
                file_name: file_name(study, date, format),
                contents: write_table(&columns, records, format)?,
            });
        }

        tracing::info!(n_files = files.len(), %format, "rendered export");

        Ok(files)
    }
}

pub struct Pipeline<S> {
    store: S,
    settings: Settings,
}

impl<S: RegistryStore> Pipeline<S> {
    pub fn new(store: S, settings: Settings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// # Errors
    /// The error of the first failing stage. The registry is only written when every stage
    /// passed and at least one ID was minted.
    pub fn run(&mut self, manifest: &RawManifest, mappings: &Mappings) -> Result<CheckedManifest> {
        let result = self.run_stages(manifest, mappings);

        if let Err(error) = &result {
            tracing::error!(severity = %error.severity(), %error, "manifest check failed");
        }

        result
    }

    fn run_stages(
        &mut self,
        manifest: &RawManifest,
        mappings: &Mappings,
    ) -> Result<CheckedManifest> {
        let Settings {
            genotyping_site: site,
            plate_capacity,
            other_sex_warning_fraction,
            ..
        } = self.settings;

        let required_columns = site.required_columns();
        check_columns(manifest, &required_columns, &TEMPLATE_COLUMNS)?;

        let mut rows = build_rows(manifest);
        let sample_types = reconcile_sample_types(&mut rows)?;

        check_required_values(manifest, &required_columns)?;
        let n_clinical_ids = rows.iter().map(|r| &r.clinical_id).unique().count();
        tracing::info!(n_rows = rows.len(), n_clinical_ids, %site, "validated manifest schema");

        check_duplicate_sample_ids(&rows)?;
        check_study_names(&rows)?;

        let mut registry = self.store.load()?;

        let study_order: Vec<String> = rows.iter().map(|r| r.study.clone()).unique().collect();
        let mut by_study: HashMap<String, Vec<ManifestRow>> =
            rows.into_iter().map(|r| (r.study.clone(), r)).into_group_map();

        let mut allocated: Vec<AllocatedRow> = Vec::new();
        let mut studies = Vec::with_capacity(study_order.len());
        let mut n_minted = 0;
        for study in study_order {
            let study_rows = by_study.remove(&study).unwrap_or_default();
            let n_samples = study_rows.len();

            let allocation = allocate(&study, study_rows, registry.lookup(&study))?;
            let newly_minted = registry.reconcile(&study, &allocation.new_assignments)?;
            n_minted += newly_minted;

            tracing::info!(%study, n_samples, newly_minted, "allocated GP2 IDs");

            studies.push(StudyReport {
                highest_sequence: registry.highest_sequence(&study),
                study,
                n_samples,
                newly_minted,
            });
            allocated.extend(allocation.rows);
        }

        let normalized = normalize_categories(
            allocated.iter().map(|a| &a.row),
            mappings,
            other_sex_warning_fraction,
        )?;
        let not_assigned = normalized.not_assigned_columns();

        let plates = check_plates(allocated.iter().map(|a| &a.row), plate_capacity)?;
        let numeric = check_numeric(allocated.iter().map(|a| &a.row))?;

        let registry_updated = n_minted > 0;
        if registry_updated {
            self.store.persist(&registry)?;
        }

        let rows = allocated
            .into_iter()
            .zip(normalized.fields)
            .map(|(a, qc)| EnrichedRow {
                row: a.row,
                qc,
                id: a.id,
                newly_minted: a.newly_minted,
            })
            .collect();

        Ok(CheckedManifest {
            report: Report {
                n_rows: manifest.len(),
                n_clinical_ids,
                sample_types,
                studies,
                crosstabs: normalized.crosstabs,
                plates,
                numeric,
                warnings: normalized.warnings,
                registry_updated,
            },
            headers: manifest.headers().to_vec(),
            rows,
            site,
            not_assigned,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        normalize::{FamilyHistory, QcTerm, Race, Sex},
        test_util::manifest_row,
    };

    #[test]
    fn confirmations_report_missing_steps() {
        let mut confirmations: Confirmations =
            [ConfirmationStep::Sex, ConfirmationStep::Race].into_iter().collect();
        confirmations.confirm(ConfirmationStep::Region);

        assert_eq!(
            confirmations.missing(),
            [ConfirmationStep::Phenotype, ConfirmationStep::FamilyHistory]
        );
        assert!(Confirmations::all().missing().is_empty());
        assert_eq!(ConfirmationStep::FamilyHistory.to_string(), "family_history");
    }

    #[test]
    fn enriched_cells() {
        let mut row = manifest_row("STUDY", "A");
        row.other.push((GP2_SAMPLE_ID.to_string(), Some("stale".to_string())));
        let enriched = EnrichedRow {
            row,
            qc: QcFields {
                phenotype: QcTerm::NotAssigned,
                sex: QcTerm::Assigned(Sex::Male),
                race: QcTerm::Assigned(Race::NotReported),
                family_history: QcTerm::Assigned(FamilyHistory::No),
                region: QcTerm::NotAssigned,
            },
            id: Gp2SampleId::new("STUDY", 12, 2),
            newly_minted: false,
        };

        let cell = |column| enriched.cell(column, GenotypingSite::Nih);

        assert_eq!(cell(GENOTYPING_SITE), "NIH");
        assert_eq!(cell(GP2_ID), "STUDY_0012");
        assert_eq!(cell(SAMPLE_REP_NO), "s2");
        assert_eq!(cell(GP2_SAMPLE_ID), "STUDY_0012_s2");
        assert_eq!(cell("biological_sex_for_qc"), "Male");
        assert_eq!(cell("Phenotype"), "Not Assigned");
        assert_eq!(cell("sample_id"), "A");
        assert_eq!(cell("comment"), "");
    }
}
