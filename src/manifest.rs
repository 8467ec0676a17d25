use serde::{Deserialize, Serialize};

pub use table::RawManifest;

mod table;

pub mod column {
    pub const STUDY: &str = "study";
    pub const SAMPLE_ID: &str = "sample_id";
    pub const SAMPLE_TYPE: &str = "sample_type";
    pub const DNA_VOLUME: &str = "DNA_volume";
    pub const DNA_CONC: &str = "DNA_conc";
    pub const R260_280: &str = "r260_280";
    pub const PLATE_NAME: &str = "Plate_name";
    pub const PLATE_POSITION: &str = "Plate_position";
    pub const CLINICAL_ID: &str = "clinical_id";
    pub const STUDY_ARM: &str = "study_arm";
    pub const SEX: &str = "sex";
    pub const RACE: &str = "race";
    pub const AGE: &str = "age";
    pub const AGE_OF_ONSET: &str = "age_of_onset";
    pub const AGE_AT_DIAGNOSIS: &str = "age_at_diagnosis";
    pub const AGE_AT_DEATH: &str = "age_at_death";
    pub const FAMILY_HISTORY: &str = "family_history";
    pub const REGION: &str = "region";
    pub const COMMENT: &str = "comment";
    pub const ALTERNATIVE_ID1: &str = "alternative_id1";
    pub const ALTERNATIVE_ID2: &str = "alternative_id2";

    pub const GENOTYPING_SITE: &str = "Genotyping_site";
    pub const PHENOTYPE: &str = "Phenotype";
    pub const SEX_FOR_QC: &str = "biological_sex_for_qc";
    pub const RACE_FOR_QC: &str = "race_for_qc";
    pub const FAMILY_HISTORY_FOR_QC: &str = "family_history_for_qc";
    pub const REGION_FOR_QC: &str = "region_for_qc";
    pub const GP2_ID: &str = "GP2ID";
    pub const SAMPLE_REP_NO: &str = "SampleRepNo";
    pub const GP2_SAMPLE_ID: &str = "GP2sampleID";
}

use column::*;

/// Every column of the consortium template, in template order.
pub const TEMPLATE_COLUMNS: [&str; 21] = [
    STUDY,
    SAMPLE_ID,
    SAMPLE_TYPE,
    DNA_VOLUME,
    DNA_CONC,
    R260_280,
    PLATE_NAME,
    PLATE_POSITION,
    CLINICAL_ID,
    STUDY_ARM,
    SEX,
    RACE,
    AGE,
    AGE_OF_ONSET,
    AGE_AT_DIAGNOSIS,
    AGE_AT_DEATH,
    FAMILY_HISTORY,
    REGION,
    COMMENT,
    ALTERNATIVE_ID1,
    ALTERNATIVE_ID2,
];

/// Columns a [`ManifestRow`] cannot be built without. Always treated as required.
pub const IDENTITY_COLUMNS: [&str; 4] = [STUDY, SAMPLE_ID, CLINICAL_ID, SAMPLE_TYPE];

pub const BASE_REQUIRED_COLUMNS: [&str; 6] =
    [STUDY, SAMPLE_ID, SAMPLE_TYPE, CLINICAL_ID, STUDY_ARM, SEX];

pub const NUMERIC_COLUMNS: [&str; 7] = [
    DNA_VOLUME,
    DNA_CONC,
    R260_280,
    AGE,
    AGE_OF_ONSET,
    AGE_AT_DIAGNOSIS,
    AGE_AT_DEATH,
];

/// Columns this crate writes. An upload that already carries them (a re-imported export) has
/// them replaced.
pub const GENERATED_COLUMNS: [&str; 9] = [
    GENOTYPING_SITE,
    PHENOTYPE,
    SEX_FOR_QC,
    RACE_FOR_QC,
    FAMILY_HISTORY_FOR_QC,
    REGION_FOR_QC,
    GP2_ID,
    SAMPLE_REP_NO,
    GP2_SAMPLE_ID,
];

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
pub enum GenotypingSite {
    #[default]
    #[serde(alias = "fulgent")]
    Fulgent,
    #[serde(rename = "NIH", alias = "nih")]
    #[strum(serialize = "NIH")]
    Nih,
}

impl GenotypingSite {
    /// Fulgent plates the DNA itself, so it needs volume, concentration and plate layout up front.
    #[must_use]
    pub fn required_columns(self) -> Vec<&'static str> {
        let mut required = BASE_REQUIRED_COLUMNS.to_vec();

        if let Self::Fulgent = self {
            required.extend([DNA_VOLUME, DNA_CONC, PLATE_NAME, PLATE_POSITION]);
        }

        required
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestRow {
    /// 1-based position among the data rows of the upload
    pub row: usize,
    pub study: String,
    pub sample_id: String,
    pub clinical_id: String,
    pub sample_type: String,
    pub study_arm: Option<String>,
    pub sex: Option<String>,
    pub race: Option<String>,
    pub family_history: Option<String>,
    pub region: Option<String>,
    pub plate_name: Option<String>,
    pub plate_position: Option<String>,
    /// Every other column in upload order, numeric ones included.
    pub other: Vec<(String, Option<String>)>,
}

impl ManifestRow {
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        match column {
            STUDY => Some(&self.study),
            SAMPLE_ID => Some(&self.sample_id),
            CLINICAL_ID => Some(&self.clinical_id),
            SAMPLE_TYPE => Some(&self.sample_type),
            STUDY_ARM => self.study_arm.as_deref(),
            SEX => self.sex.as_deref(),
            RACE => self.race.as_deref(),
            FAMILY_HISTORY => self.family_history.as_deref(),
            REGION => self.region.as_deref(),
            PLATE_NAME => self.plate_name.as_deref(),
            PLATE_POSITION => self.plate_position.as_deref(),
            _ => self
                .other
                .iter()
                .find(|(name, _)| name == column)
                .and_then(|(_, value)| value.as_deref()),
        }
    }
}
