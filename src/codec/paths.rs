//! File naming for masks and overlays, and discovery of annotatable images.

use std::path::{Path, PathBuf};

use crate::constants::{COLOR_SUFFIX, IMAGE_EXTENSIONS, MASK_SUFFIX, WATERSHED_SUFFIX};

/// Files derived from one source image.
///
/// For `dir/street.jpg` with extension `png`:
/// `dir/street_mask.png`, `dir/street_watershed_mask.png`, `dir/street_color_mask.png`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskPaths {
    /// The source image
    pub image: PathBuf,
    /// Persisted id-plane
    pub mask: PathBuf,
    /// Persisted refinement result
    pub watershed: PathBuf,
    /// Color overlay of the refinement result
    pub color: PathBuf,
}

impl MaskPaths {
    /// Derive the sibling paths of an image.
    pub fn for_image(image: &Path, extension: &str) -> Self {
        let stem = image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sibling = |suffix: &str| image.with_file_name(format!("{stem}{suffix}.{extension}"));

        Self {
            image: image.to_path_buf(),
            mask: sibling(MASK_SUFFIX),
            watershed: sibling(WATERSHED_SUFFIX),
            color: sibling(COLOR_SUFFIX),
        }
    }
}

/// Whether a file name looks like an image that can be annotated.
///
/// Files the engine itself writes (`*_mask.png`) are excluded.
pub fn is_annotatable_image(name: &str) -> bool {
    let lower = name.to_lowercase();
    if lower.contains(&format!("{MASK_SUFFIX}.png")) {
        return false;
    }
    match lower.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => IMAGE_EXTENSIONS.contains(&ext),
        _ => false,
    }
}

/// List annotatable images in a directory, sorted by file name.
pub fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| is_annotatable_image(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.path())
        .collect();
    images.sort();
    log::debug!("Found {} annotatable image(s) in {:?}", images.len(), dir);
    Ok(images)
}
