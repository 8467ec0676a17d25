use std::collections::HashMap;

use crate::{
    error::RegistryConflictError,
    gp2_id::Gp2SampleId,
    manifest::ManifestRow,
    registry::{StudyEntry, highest_sequence},
};

#[derive(Debug, Clone, PartialEq)]
pub struct AllocatedRow {
    pub row: ManifestRow,
    pub id: Gp2SampleId,
    /// Whether the GP2 ID was minted by this allocation
    pub newly_minted: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allocation {
    /// Same order as the input rows
    pub rows: Vec<AllocatedRow>,
    /// First-occurrence ID of every newly minted sample, to be reconciled into the registry
    pub new_assignments: StudyEntry,
}

/// Gives every row of one study a GP2 sample ID.
///
/// Registered `sample_id`s reproduce their registered ID. Unregistered ones get consecutive
/// sequence numbers after the study's highest, in order of first appearance. A `sample_id`
/// seen again in the same batch is a further replicate of the same sample.
///
/// # Errors
/// [`RegistryConflictError::SequenceExhausted`] when a sample needs a sequence number past
/// `u32::MAX`.
pub fn allocate(
    study: &str,
    rows: Vec<ManifestRow>,
    known: Option<&StudyEntry>,
) -> Result<Allocation, RegistryConflictError> {
    let highest = known.map_or(0, highest_sequence);
    let mut next_sequence = highest.checked_add(1);

    let mut last_replicate: HashMap<String, Gp2SampleId> = HashMap::new();
    let mut new_assignments = StudyEntry::new();

    let mut allocated = Vec::with_capacity(rows.len());
    for row in rows {
        let (id, newly_minted) = match last_replicate.get(&row.sample_id) {
            Some(previous) => (previous.next_replicate(), false),
            None => match known.and_then(|k| k.get(&row.sample_id)) {
                Some(registered) => (registered.clone(), false),
                None => {
                    let sequence =
                        next_sequence.ok_or_else(|| RegistryConflictError::SequenceExhausted {
                            study: study.to_string(),
                            highest: u32::MAX,
                        })?;
                    next_sequence = sequence.checked_add(1);

                    let id = Gp2SampleId::new(study, sequence, 1);
                    new_assignments.insert(row.sample_id.clone(), id.clone());
                    (id, true)
                }
            },
        };

        last_replicate.insert(row.sample_id.clone(), id.clone());

        allocated.push(AllocatedRow {
            row,
            id,
            newly_minted,
        });
    }

    Ok(Allocation {
        rows: allocated,
        new_assignments,
    })
}
