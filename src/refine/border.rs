//! Boundary suppression: folding watershed lines into adjacent regions.

use crate::constants::{BACKGROUND_ID, BOUNDARY_ID};
use crate::mask::{IdPlane, LabelMask};
use crate::model::{LabelId, LabelPalette};

/// Neighbor scan order: left, up, right, down, then the diagonals.
const SCAN_ORDER: [(isize, isize); 8] = [
    (-1, 0),
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

/// Pick the replacement id for a boundary pixel from its neighbors.
///
/// The first neighbor in scan order whose id the palette knows wins; failing
/// that, the first non-boundary neighbor.
fn replacement(ids: &IdPlane, y: usize, x: usize, palette: &LabelPalette) -> Option<LabelId> {
    let (height, width) = ids.dim();
    let mut fallback = None;
    for &(dx, dy) in &SCAN_ORDER {
        let (Some(nx), Some(ny)) = (x.checked_add_signed(dx), y.checked_add_signed(dy)) else {
            continue;
        };
        if nx >= width || ny >= height {
            continue;
        }
        let id = ids[[ny, nx]];
        if id == BOUNDARY_ID {
            continue;
        }
        if id != BACKGROUND_ID && palette.resolve(id).is_some() {
            return Some(id);
        }
        fallback.get_or_insert(id);
    }
    fallback
}

/// Reassign every boundary pixel to the id of an adjacent region.
///
/// Works in passes so thick lines are eaten from the outside in; each pass
/// only reads ids settled by the previous one. An image without boundary
/// pixels is returned unchanged. An image made only of boundary pixels has
/// nothing to borrow from and is left as is.
pub fn remove_border_ids(labels: &IdPlane, palette: &LabelPalette) -> IdPlane {
    let mut ids = labels.clone();
    let mut passes = 0;
    loop {
        let updates: Vec<(usize, usize, LabelId)> = ids
            .indexed_iter()
            .filter(|&(_, &id)| id == BOUNDARY_ID)
            .filter_map(|((y, x), _)| replacement(&ids, y, x, palette).map(|id| (y, x, id)))
            .collect();
        if updates.is_empty() {
            break;
        }
        for &(y, x, id) in &updates {
            ids[[y, x]] = id;
        }
        passes += 1;
    }

    if passes > 0 {
        log::debug!("Removed boundary lines in {} pass(es)", passes);
    }
    ids
}

/// [`remove_border_ids`] followed by color derivation.
pub fn remove_border(labels: &IdPlane, palette: &LabelPalette) -> LabelMask {
    LabelMask::from_ids(remove_border_ids(labels, palette), palette)
}
