//! The master ID tracker: every GP2 sample ID ever minted, keyed by study and then by the
//! submitter's `sample_id`.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{error::RegistryConflictError, gp2_id::Gp2SampleId};

pub use store::{FileStore, MemoryStore, RegistryStore};

mod store;

/// `sample_id` -> GP2 sample ID, for one study.
pub type StudyEntry = BTreeMap<String, Gp2SampleId>;

/// Highest sequence number used in a study, 0 for an empty entry.
#[must_use]
pub fn highest_sequence(entry: &StudyEntry) -> u32 {
    entry.values().map(Gp2SampleId::sequence).max().unwrap_or(0)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdRegistry(BTreeMap<String, StudyEntry>);

impl IdRegistry {
    #[must_use]
    pub fn lookup(&self, study: &str) -> Option<&StudyEntry> {
        self.0.get(study)
    }

    #[must_use]
    pub fn highest_sequence(&self, study: &str) -> u32 {
        self.lookup(study).map_or(0, highest_sequence)
    }

    pub fn studies(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Merges `new_assignments` into the study's entry and returns how many were added.
    /// Re-adding an identical assignment is a no-op. Nothing is merged unless every assignment
    /// is consistent with the registry.
    ///
    /// # Errors
    /// - [`RegistryConflictError::Overwrite`] when a `sample_id` is registered under another ID
    /// - [`RegistryConflictError::SequenceReused`] when the sequence number belongs to another
    ///   sample of the study
    /// - [`RegistryConflictError::ForeignStudy`] when the ID was minted for another study
    pub fn reconcile(
        &mut self,
        study: &str,
        new_assignments: &StudyEntry,
    ) -> Result<usize, RegistryConflictError> {
        let existing = self.lookup(study);

        let mut held_by: BTreeMap<u32, &str> = existing
            .into_iter()
            .flatten()
            .map(|(sample_id, id)| (id.sequence(), sample_id.as_str()))
            .collect();

        let mut added = Vec::new();
        for (sample_id, proposed) in new_assignments {
            check_study(study, sample_id, proposed)?;

            if let Some(current) = existing.and_then(|e| e.get(sample_id)) {
                if current != proposed {
                    return Err(RegistryConflictError::Overwrite {
                        study: study.to_string(),
                        sample_id: sample_id.clone(),
                        existing: current.clone(),
                        proposed: proposed.clone(),
                    });
                }
                continue;
            }

            if let Some(holder) = held_by.insert(proposed.sequence(), sample_id) {
                return Err(RegistryConflictError::SequenceReused {
                    study: study.to_string(),
                    sequence: proposed.sequence(),
                    held_by: holder.to_string(),
                    sample_id: sample_id.clone(),
                });
            }

            added.push((sample_id.clone(), proposed.clone()));
        }

        let n_added = added.len();
        if n_added > 0 {
            self.0.entry(study.to_string()).or_default().extend(added);
        }

        Ok(n_added)
    }

    /// Checks a registry read from storage: every ID belongs to its study and no two samples of
    /// a study share a sequence number.
    ///
    /// # Errors
    pub fn verify(&self) -> Result<(), RegistryConflictError> {
        for (study, entry) in &self.0 {
            let mut held_by = BTreeMap::new();

            for (sample_id, id) in entry {
                check_study(study, sample_id, id)?;

                if let Some(holder) = held_by.insert(id.sequence(), sample_id) {
                    return Err(RegistryConflictError::SequenceReused {
                        study: study.clone(),
                        sequence: id.sequence(),
                        held_by: holder.clone(),
                        sample_id: sample_id.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn check_study(
    study: &str,
    sample_id: &str,
    id: &Gp2SampleId,
) -> Result<(), RegistryConflictError> {
    if id.study() == study {
        return Ok(());
    }

    Err(RegistryConflictError::ForeignStudy {
        study: study.to_string(),
        sample_id: sample_id.to_string(),
        gp2_sample_id: id.clone(),
    })
}
