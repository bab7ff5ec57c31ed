//! Reading and writing id-planes and color overlays as image files.
//!
//! A mask file is a single-channel image whose intensity is the label id.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage};

use crate::codec::error::{MaskDecodeError, MaskEncodeError};
use crate::mask::{ColorPlane, IdPlane, LabelMask};
use crate::model::LabelPalette;

/// What a save request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The file was written
    Written,
    /// The mask was blank; nothing was touched
    SkippedBlank,
}

/// Write the id-plane of a mask.
///
/// A blank mask is never written, so an untouched canvas cannot clobber a
/// mask saved earlier.
pub fn save_mask(mask: &LabelMask, path: &Path) -> Result<SaveOutcome, MaskEncodeError> {
    if mask.is_blank() {
        log::debug!("Skipping save of blank mask to {:?}", path);
        return Ok(SaveOutcome::SkippedBlank);
    }
    write_ids(mask.ids(), path)?;
    Ok(SaveOutcome::Written)
}

/// Write an id-plane without the blank guard.
pub fn write_ids(ids: &IdPlane, path: &Path) -> Result<(), MaskEncodeError> {
    check_lossless(path)?;
    ensure_parent(path)?;

    let (height, width) = ids.dim();
    let gray = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        Luma([ids[[y as usize, x as usize]]])
    });
    gray.save(path).map_err(|source| MaskEncodeError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!("Saved {}x{} id-plane to {:?}", width, height, path);
    Ok(())
}

/// Write a color overlay for human inspection.
pub fn save_color_plane(color: &ColorPlane, path: &Path) -> Result<(), MaskEncodeError> {
    ensure_parent(path)?;
    color.save(path).map_err(|source| MaskEncodeError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Saved color overlay to {:?}", path);
    Ok(())
}

/// Read a mask file and derive its color-plane from the palette.
pub fn load_mask(path: &Path, palette: &LabelPalette) -> Result<LabelMask, MaskDecodeError> {
    let decoded = open(path)?;
    let ids = match decoded {
        DynamicImage::ImageLuma8(gray) => IdPlane::from_shape_fn(
            (gray.height() as usize, gray.width() as usize),
            |(y, x)| gray.get_pixel(x as u32, y as u32).0[0],
        ),
        // Gray triples stored as color: the red channel carries the id.
        other => {
            let rgb = other.to_rgb8();
            IdPlane::from_shape_fn((rgb.height() as usize, rgb.width() as usize), |(y, x)| {
                rgb.get_pixel(x as u32, y as u32).0[0]
            })
        }
    };

    let mask = LabelMask::from_ids(ids, palette);
    log::info!(
        "Loaded {}x{} mask from {:?}",
        mask.width(),
        mask.height(),
        path
    );
    Ok(mask)
}

/// Read a source image as RGB.
pub fn load_image(path: &Path) -> Result<RgbImage, MaskDecodeError> {
    let image = open(path)?.to_rgb8();
    log::debug!(
        "Loaded {}x{} image from {:?}",
        image.width(),
        image.height(),
        path
    );
    Ok(image)
}

fn open(path: &Path) -> Result<DynamicImage, MaskDecodeError> {
    if !path.exists() {
        return Err(MaskDecodeError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let decoded = image::open(path).map_err(|source| MaskDecodeError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(MaskDecodeError::Degenerate {
            path: path.to_path_buf(),
            width: decoded.width(),
            height: decoded.height(),
        });
    }
    Ok(decoded)
}

fn check_lossless(path: &Path) -> Result<(), MaskEncodeError> {
    match ImageFormat::from_path(path) {
        Ok(ImageFormat::Jpeg | ImageFormat::Avif) => Err(MaskEncodeError::LossyFormat {
            path: path.to_path_buf(),
        }),
        _ => Ok(()),
    }
}

fn ensure_parent(path: &Path) -> Result<(), MaskEncodeError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
