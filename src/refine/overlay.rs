//! Preview compositing of a color overlay over the source image.

use image::RgbImage;

use crate::color_utils::blend;
use crate::constants::NO_LABEL_COLOR;
use crate::mask::ColorPlane;
use crate::refine::RefineError;

/// Blend `overlay` over `image` with opacity `alpha`.
///
/// Pixels showing the "no label" color are left transparent.
pub fn composite(
    image: &RgbImage,
    overlay: &ColorPlane,
    alpha: f32,
) -> Result<RgbImage, RefineError> {
    if image.dimensions() != overlay.dimensions() {
        return Err(RefineError::GeometryMismatch {
            image: image.dimensions(),
            markers: overlay.dimensions(),
        });
    }

    let mut out = image.clone();
    for (pixel, over) in out.pixels_mut().zip(overlay.pixels()) {
        if over.0 != NO_LABEL_COLOR {
            pixel.0 = blend(pixel.0, over.0, alpha);
        }
    }
    Ok(out)
}
