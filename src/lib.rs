//! labelmask - per-pixel label masks for semantic segmentation annotation.
//!
//! A label mask stores one label id per image pixel alongside a color cache
//! for display. Masks are painted with a round pen, kept under undo/redo
//! history, refined into dense segmentations by growing the painted seeds
//! along color edges, and persisted as single-channel image files next to
//! the source image.

pub mod codec;
pub mod color_utils;
pub mod config;
pub mod constants;
pub mod edit;
pub mod history;
pub mod mask;
pub mod model;
pub mod refine;
pub mod session;

pub use edit::{EditEngine, ViewPoint};
pub use history::HistoryStack;
pub use mask::LabelMask;
pub use model::{LabelColor, LabelInfo, LabelPalette};
pub use refine::SegmentationRefiner;
pub use session::{Session, SessionId, SessionRegistry};
