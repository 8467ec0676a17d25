//! The canonical GP2 sample identifier: `{study}_{sequence:04}_s{replicate}`.
//!
//! `{study}_{sequence:04}` alone is the GP2ID of a biological sample and `s{replicate}` is its
//! SampleRepNo.
use std::{fmt::Display, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

static GP2_SAMPLE_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?<study>.+)_(?<sequence>\d{4,})_s(?<replicate>[1-9]\d*)$").unwrap()
});

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("malformed GP2 sample ID '{id}', expected {{study}}_{{sequence}}_s{{replicate}}")]
pub struct MalformedIdError {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gp2Id {
    study: String,
    sequence: u32,
}

impl Gp2Id {
    #[must_use]
    pub fn new(study: &str, sequence: u32) -> Self {
        Self {
            study: study.to_string(),
            sequence,
        }
    }

    #[must_use]
    pub fn study(&self) -> &str {
        &self.study
    }

    #[must_use]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl Display for Gp2Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self { study, sequence } = self;

        write!(f, "{study}_{sequence:04}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Gp2SampleId {
    gp2_id: Gp2Id,
    replicate: u32,
}

impl Gp2SampleId {
    #[must_use]
    pub fn new(study: &str, sequence: u32, replicate: u32) -> Self {
        Self {
            gp2_id: Gp2Id::new(study, sequence),
            replicate,
        }
    }

    #[must_use]
    pub fn gp2_id(&self) -> &Gp2Id {
        &self.gp2_id
    }

    #[must_use]
    pub fn study(&self) -> &str {
        self.gp2_id.study()
    }

    #[must_use]
    pub fn sequence(&self) -> u32 {
        self.gp2_id.sequence()
    }

    #[must_use]
    pub fn replicate(&self) -> u32 {
        self.replicate
    }

    #[must_use]
    pub fn sample_rep_no(&self) -> String {
        format!("s{}", self.replicate)
    }

    /// The same biological sample, one physical draw later.
    #[must_use]
    pub fn next_replicate(&self) -> Self {
        Self {
            gp2_id: self.gp2_id.clone(),
            replicate: self.replicate + 1,
        }
    }
}

impl Display for Gp2SampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self { gp2_id, replicate } = self;

        write!(f, "{gp2_id}_s{replicate}")
    }
}

impl FromStr for Gp2SampleId {
    type Err = MalformedIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MalformedIdError { id: s.to_string() };

        let captures = GP2_SAMPLE_ID_REGEX.captures(s).ok_or_else(malformed)?;
        let sequence: u32 = captures["sequence"].parse().map_err(|_| malformed())?;
        let replicate: u32 = captures["replicate"].parse().map_err(|_| malformed())?;

        if sequence == 0 {
            return Err(malformed());
        }

        Ok(Self::new(&captures["study"], sequence, replicate))
    }
}

impl TryFrom<String> for Gp2SampleId {
    type Error = MalformedIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Gp2SampleId> for String {
    fn from(value: Gp2SampleId) -> Self {
        value.to_string()
    }
}
