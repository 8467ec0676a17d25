use serde::Serialize;

use crate::gp2_id::{Gp2SampleId, MalformedIdError};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SchemaError {
    #[error("columns appear more than once in the header: {}", .columns.join(", "))]
    DuplicateColumns { columns: Vec<String> },
    #[error(
        "columns missing from the manifest: {}. Please use the template sheet",
        .columns.join(", ")
    )]
    MissingColumns { columns: Vec<String> },
    #[error("{total} rows have missing entries in required columns. Please fill the missing cells")]
    MissingRequiredValues {
        rows: Vec<MissingValues>,
        total: usize,
    },
    #[error("{column} is not numeric (found {})", .values.join(", "))]
    NotNumeric { column: String, values: Vec<String> },
    #[error(
        "study names may only hold letters, digits and single '.', '_' or '-' separators \
         (found {})",
        .studies.join(", ")
    )]
    InvalidStudyNames { studies: Vec<String> },
}

/// One manifest row with empty required cells. `row` is 1-based over data rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingValues {
    pub row: usize,
    pub sample_id: Option<String>,
    pub columns: Vec<String>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CategoryError {
    #[error("{column}: {} not allowed", .values.join(", "))]
    UnknownCategory {
        column: String,
        values: Vec<String>,
        allowed: Vec<String>,
    },
    #[error("region not assigned for {}", .unmapped.join(", "))]
    IncompleteRegionMapping { unmapped: Vec<String> },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[error(
    "duplicated sample_id: {}. Unique sample IDs are required \
     (clinical IDs can be duplicated if replicated)",
    .sample_ids.join(", ")
)]
pub struct DuplicateIdError {
    pub sample_ids: Vec<String>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PlateError {
    #[error("{count} samples on plate [{plate}], at most {capacity} are allowed")]
    Overcapacity {
        plate: String,
        count: usize,
        capacity: usize,
    },
    #[error("plate position duplicated {} on plate [{plate}]", .positions.join(", "))]
    DuplicatePosition { plate: String, positions: Vec<String> },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RegistryConflictError {
    #[error(
        "{study}/{sample_id} is registered as {existing}, refusing to overwrite with {proposed}"
    )]
    Overwrite {
        study: String,
        sample_id: String,
        existing: Gp2SampleId,
        proposed: Gp2SampleId,
    },
    #[error(
        "sequence {sequence} of {study} is held by {held_by}, refusing to assign it to {sample_id}"
    )]
    SequenceReused {
        study: String,
        sequence: u32,
        held_by: String,
        sample_id: String,
    },
    #[error("{gp2_sample_id} does not belong to study {study} (sample {sample_id})")]
    ForeignStudy {
        study: String,
        sample_id: String,
        gp2_sample_id: Gp2SampleId,
    },
    #[error("study {study} has no sequence numbers left after {highest}")]
    SequenceExhausted { study: String, highest: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[strum(serialize = "ERROR")]
    Error,
    #[strum(serialize = "SERIOUS ERROR")]
    Serious,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    DuplicateId(#[from] DuplicateIdError),
    #[error(transparent)]
    Plate(#[from] PlateError),
    #[error(transparent)]
    RegistryConflict(#[from] RegistryConflictError),
    #[error(transparent)]
    MalformedId(#[from] MalformedIdError),
    #[error(
        "registry lock {lock_path} is held by pid {pid} since {acquired_at}, \
         remove it if that process is gone"
    )]
    RegistryLocked {
        lock_path: String,
        pid: u32,
        acquired_at: String,
    },
    #[error("confirmation missing for {}", .steps.join(", "))]
    Unconfirmed { steps: Vec<String> },
    #[error("'Not Assigned' values remain in {}", .columns.join(", "))]
    NotAssigned { columns: Vec<String> },
    #[error("invalid input: {message}")]
    Input { message: String },
    #[error("invalid settings: {message}")]
    Config { message: String },
    #[error("{message}")]
    Store { message: String },
}

impl Error {
    fn from_other_error(err: impl std::error::Error) -> Self {
        Self::Store {
            message: format!("{err:#}"),
        }
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Plate(_) => Severity::Serious,
            _ => Severity::Error,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::from_other_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::from_other_error(err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Self::Input {
            message: format!("{err:#}"),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config {
            message: format!("{err:#}"),
        }
    }
}

impl From<garde::Report> for Error {
    fn from(err: garde::Report) -> Self {
        Self::Config {
            message: format!("{err:#}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
