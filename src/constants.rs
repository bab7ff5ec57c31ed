//! Global constants for the label mask engine

use crate::model::{LabelId, Rgb};

/// Id stored in the id-plane for unlabeled pixels.
pub const BACKGROUND_ID: LabelId = 0;

/// Id the boundary grower writes on watershed lines.
/// Reserved: no palette label may use it.
pub const BOUNDARY_ID: LabelId = 255;

/// Color used for ids the palette cannot resolve.
pub const NO_LABEL_COLOR: Rgb = [0, 0, 0];

/// Color used for boundary pixels, so seams stay visible when borders are kept.
pub const BOUNDARY_COLOR: Rgb = [255, 255, 255];

/// Suffix of the persisted id-plane next to the source image.
pub const MASK_SUFFIX: &str = "_mask";

/// Suffix of the persisted refinement result.
pub const WATERSHED_SUFFIX: &str = "_watershed_mask";

/// Suffix of the human-readable color overlay.
pub const COLOR_SUFFIX: &str = "_color_mask";

/// Default extension for every file the engine writes.
pub const DEFAULT_MASK_EXTENSION: &str = "png";

/// Image extensions that can be opened for annotation (lowercase).
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "bmp", "pgm", "jpeg", "jpe", "jp2", "pbm", "ppm", "tiff", "tif",
];

/// Default pen diameter in mask pixels
pub const DEFAULT_PEN_SIZE: u32 = 30;

/// Default overlay opacity
pub const DEFAULT_ALPHA: f32 = 0.4;

/// Default view scale factor
pub const DEFAULT_SCALE: f64 = 1.0;

/// Default number of snapshots kept per session
pub const DEFAULT_MAX_HISTORY: usize = 50;
