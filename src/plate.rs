use std::collections::HashSet;

use itertools::Itertools;

use crate::{
    crosstab::CrossTab,
    error::PlateError,
    manifest::{
        ManifestRow,
        column::{PLATE_NAME, STUDY_ARM},
    },
};

/// Wells on a standard plate.
pub const PLATE_CAPACITY: usize = 96;

/// Checks every named plate for capacity and for repeated positions. Rows without a plate name
/// are unassigned and exempt; rows without a position never count as duplicates.
///
/// Returns the plate by `study_arm` counts for the report.
///
/// # Errors
/// The first [`PlateError`] found, plates taken in order of first appearance.
pub fn check_plates<'a>(
    rows: impl IntoIterator<Item = &'a ManifestRow>,
    capacity: usize,
) -> Result<CrossTab, PlateError> {
    let rows: Vec<&ManifestRow> = rows.into_iter().collect();

    let plates = rows
        .iter()
        .filter_map(|r| r.plate_name.as_deref().map(|plate| (plate, *r)))
        .into_group_map();
    let plate_order = rows.iter().filter_map(|r| r.plate_name.as_deref()).unique();

    for plate in plate_order {
        let on_plate = &plates[plate];

        if on_plate.len() > capacity {
            return Err(PlateError::Overcapacity {
                plate: plate.to_string(),
                count: on_plate.len(),
                capacity,
            });
        }

        let mut seen = HashSet::with_capacity(on_plate.len());
        let positions: Vec<String> = on_plate
            .iter()
            .filter_map(|r| r.plate_position.as_deref())
            .filter(|p| !seen.insert(*p))
            .unique()
            .map(str::to_string)
            .collect();

        if !positions.is_empty() {
            return Err(PlateError::DuplicatePosition {
                plate: plate.to_string(),
                positions,
            });
        }
    }

    let mut crosstab = CrossTab::new(PLATE_NAME, STUDY_ARM);
    for (plate, on_plate) in &plates {
        for row in on_plate {
            crosstab.add(plate, row.study_arm.as_deref());
        }
    }

    Ok(crosstab)
}
