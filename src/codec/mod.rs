//! Persistence of label masks.
//!
//! - `mask_file`: id-planes as single-channel images, color overlays as RGB
//! - `paths`: the `<stem>_mask.<ext>` family of sibling files
//! - `error`: decode/encode failures

mod error;
mod mask_file;
mod paths;

pub use error::{MaskDecodeError, MaskEncodeError};
pub use mask_file::{
    SaveOutcome, load_image, load_mask, save_color_plane, save_mask, write_ids,
};
pub use paths::{MaskPaths, is_annotatable_image, list_images};
