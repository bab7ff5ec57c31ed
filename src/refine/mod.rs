//! Segmentation refinement: grow the user's seed strokes into a dense
//! label image along color edges, then clean up the seams.
//!
//! The pipeline is
//!
//! 1. [`SegmentationRefiner::prepare_markers`] turns the id-plane into seeds,
//! 2. a [`BoundaryGrower`] floods the unassigned pixels,
//! 3. [`remove_border`] optionally folds the boundary lines into neighbors,
//! 4. colors are derived from the palette.
//!
//! Long runs can be moved off the interaction thread with [`RefineWorker`].

mod border;
mod grower;
mod overlay;
mod refiner;
mod worker;

#[cfg(test)]
mod tests;

pub use border::{remove_border, remove_border_ids};
pub use grower::{BoundaryGrower, CancelToken, MarkerFlood};
pub use overlay::composite;
pub use refiner::{RefineOptions, SegmentationRefiner};
pub use worker::{RefineDone, RefineJob, RefineWorker};

use thiserror::Error;

/// Errors from a refinement run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefineError {
    /// Image and markers differ in size
    #[error("Image size {image:?} does not match marker size {markers:?}")]
    GeometryMismatch {
        image: (u32, u32),
        markers: (u32, u32),
    },

    /// The run was abandoned through its cancel token
    #[error("Refinement cancelled")]
    Cancelled,

    /// The background worker is no longer running
    #[error("Refinement worker is not running")]
    WorkerGone,
}
