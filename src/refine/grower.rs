//! The boundary-growing primitive and its reference implementation.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbImage;
use ndarray::Array2;

use crate::constants::{BACKGROUND_ID, BOUNDARY_ID};
use crate::mask::IdPlane;
use crate::refine::RefineError;

/// Shared flag used to abandon an in-flight refinement.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Grows sparse seed markers into a dense label image.
///
/// Contract: `image` and `markers` have the same size; markers of 0 are
/// unassigned. The result has the same size and every pixel carries a seed
/// id or [`BOUNDARY_ID`] on the lines where regions meet.
pub trait BoundaryGrower: Send + Sync {
    /// Identifier for logging
    fn id(&self) -> &'static str;

    /// Run to completion, or stop early with [`RefineError::Cancelled`].
    fn grow(
        &self,
        image: &RgbImage,
        markers: &IdPlane,
        cancel: &CancelToken,
    ) -> Result<IdPlane, RefineError>;
}

/// Priority-flood marker watershed.
///
/// Unassigned pixels are flooded from the seeds in order of color distance
/// to the pixel that reached them (max channel difference); equal priorities
/// are served first-in first-out. A pixel reached by two different regions
/// becomes a boundary pixel and stops the flood there.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerFlood;

/// Pops between two cancellation checks
const CANCEL_POLL_INTERVAL: u64 = 4096;

const NEIGHBORS: [(isize, isize); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];

fn color_distance(image: &RgbImage, a: (usize, usize), b: (usize, usize)) -> u8 {
    let pa = image.get_pixel(a.1 as u32, a.0 as u32).0;
    let pb = image.get_pixel(b.1 as u32, b.0 as u32).0;
    (0..3).map(|c| pa[c].abs_diff(pb[c])).max().unwrap_or(0)
}

fn neighbors(
    (y, x): (usize, usize),
    (height, width): (usize, usize),
) -> impl Iterator<Item = (usize, usize)> {
    NEIGHBORS.iter().filter_map(move |&(dx, dy)| {
        let nx = x.checked_add_signed(dx)?;
        let ny = y.checked_add_signed(dy)?;
        (nx < width && ny < height).then_some((ny, nx))
    })
}

impl BoundaryGrower for MarkerFlood {
    fn id(&self) -> &'static str {
        "marker-flood"
    }

    fn grow(
        &self,
        image: &RgbImage,
        markers: &IdPlane,
        cancel: &CancelToken,
    ) -> Result<IdPlane, RefineError> {
        let dim = markers.dim();
        let mut labels = markers.mapv(|id| if id == BOUNDARY_ID { BACKGROUND_ID } else { id });
        if labels.iter().all(|&id| id == BACKGROUND_ID) {
            log::warn!("No seeds in marker image, nothing to grow");
            return Ok(labels);
        }

        let mut queued = Array2::from_elem(dim, false);
        let mut heap = BinaryHeap::new();
        let mut seq: u64 = 0;

        // Seed the queue with unassigned pixels touching a seed.
        for ((y, x), &id) in markers.indexed_iter() {
            if id != BACKGROUND_ID && id != BOUNDARY_ID {
                continue;
            }
            let best = neighbors((y, x), dim)
                .filter(|&n| labels[n] != BACKGROUND_ID)
                .map(|n| color_distance(image, (y, x), n))
                .min();
            if let Some(priority) = best {
                heap.push(Reverse((priority, seq, y, x)));
                seq += 1;
                queued[[y, x]] = true;
            }
        }

        let mut pops: u64 = 0;
        while let Some(Reverse((_, _, y, x))) = heap.pop() {
            pops += 1;
            if pops % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
                log::debug!("Flood cancelled after {} pixels", pops);
                return Err(RefineError::Cancelled);
            }

            let mut label = BACKGROUND_ID;
            for n in neighbors((y, x), dim) {
                let id = labels[n];
                if id == BACKGROUND_ID || id == BOUNDARY_ID {
                    continue;
                }
                if label == BACKGROUND_ID {
                    label = id;
                } else if label != id {
                    label = BOUNDARY_ID;
                    break;
                }
            }
            if label == BACKGROUND_ID {
                label = BOUNDARY_ID;
            }
            labels[[y, x]] = label;
            if label == BOUNDARY_ID {
                continue;
            }

            for n in neighbors((y, x), dim) {
                if labels[n] == BACKGROUND_ID && !queued[n] {
                    let priority = color_distance(image, (y, x), n);
                    heap.push(Reverse((priority, seq, n.0, n.1)));
                    seq += 1;
                    queued[n] = true;
                }
            }
        }

        // Pixels walled off by boundary lines are boundary as well.
        let mut walled = 0usize;
        labels.mapv_inplace(|id| {
            if id == BACKGROUND_ID {
                walled += 1;
                BOUNDARY_ID
            } else {
                id
            }
        });
        if walled > 0 {
            log::debug!("{} unreachable pixel(s) marked as boundary", walled);
        }

        log::trace!("Flooded {} pixels", pops);
        Ok(labels)
    }
}
