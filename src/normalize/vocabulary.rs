use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::manifest::column;

pub const NOT_REPORTED: &str = "Not Reported";
pub const NOT_ASSIGNED: &str = "Not Assigned";

/// A controlled vocabulary a raw category is mapped into for QC.
pub trait Vocabulary: Clone + Debug + PartialEq + Display + Serialize + DeserializeOwned {
    /// The derived column this vocabulary fills
    const COLUMN: &'static str;

    /// The term an empty source cell resolves to.
    fn not_reported() -> Self;
}

macro_rules! controlled_vocabulary {
    ($name:ident, $column:expr, [$($variant:ident => $term:literal),+ $(,)?]) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
            strum::Display,
            strum::EnumString,
            strum::VariantArray,
        )]
        pub enum $name {
            $(
                #[serde(rename = $term)]
                #[strum(serialize = $term)]
                $variant,
            )+
        }

        impl Vocabulary for $name {
            const COLUMN: &'static str = $column;

            fn not_reported() -> Self {
                Self::NotReported
            }
        }
    };
}

controlled_vocabulary!(Phenotype, column::PHENOTYPE, [
    Pd => "PD",
    Control => "Control",
    Prodromal => "Prodromal",
    Other => "Other",
    NotReported => "Not Reported",
]);

controlled_vocabulary!(Sex, column::SEX_FOR_QC, [
    Male => "Male",
    Female => "Female",
    Intersex => "Intersex",
    Unknown => "Unknown",
    Other => "Other",
    NotReported => "Not Reported",
]);

controlled_vocabulary!(Race, column::RACE_FOR_QC, [
    AmericanIndianOrAlaskaNative => "American Indian or Alaska Native",
    Asian => "Asian",
    White => "White",
    BlackOrAfricanAmerican => "Black or African American",
    MultiRacial => "Multi-racial",
    NativeHawaiianOrOtherPacificIslander => "Native Hawaiian or Other Pacific Islander",
    Other => "Other",
    Unknown => "Unknown",
    NotReported => "Not Reported",
]);

controlled_vocabulary!(FamilyHistory, column::FAMILY_HISTORY_FOR_QC, [
    Yes => "Yes",
    No => "No",
    NotReported => "Not Reported",
]);

/// Region terms are free text, ideally an ISO 3166-1 alpha-3 code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    #[must_use]
    pub fn new(term: &str) -> Self {
        Self(term.trim().to_string())
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Vocabulary for Region {
    const COLUMN: &'static str = column::REGION_FOR_QC;

    fn not_reported() -> Self {
        Self(NOT_REPORTED.to_string())
    }
}

/// A derived QC value: a term of the vocabulary, or the flag for a raw category nobody mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QcTerm<T> {
    Assigned(T),
    NotAssigned,
}

impl<T> QcTerm<T> {
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        matches!(self, Self::Assigned(_))
    }

    #[must_use]
    pub fn term(&self) -> Option<&T> {
        match self {
            Self::Assigned(term) => Some(term),
            Self::NotAssigned => None,
        }
    }
}

impl<T: Display> Display for QcTerm<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assigned(term) => Display::fmt(term, f),
            Self::NotAssigned => f.write_str(NOT_ASSIGNED),
        }
    }
}
