//! Marker preparation, the call into the boundary grower, and post-processing.

use image::RgbImage;

use crate::constants::{BACKGROUND_ID, BOUNDARY_ID};
use crate::mask::{ColorPlane, IdPlane, LabelMask, colorize};
use crate::model::LabelPalette;
use crate::refine::RefineError;
use crate::refine::border::remove_border;
use crate::refine::grower::{BoundaryGrower, CancelToken, MarkerFlood};

/// Options for a refinement run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefineOptions {
    /// Fold boundary lines into neighboring regions
    pub remove_border: bool,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            remove_border: true,
        }
    }
}

/// Turns a sparse user-drawn mask into a dense segmentation.
pub struct SegmentationRefiner {
    grower: Box<dyn BoundaryGrower>,
}

impl Default for SegmentationRefiner {
    fn default() -> Self {
        Self::new(Box::new(MarkerFlood))
    }
}

impl std::fmt::Debug for SegmentationRefiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentationRefiner")
            .field("grower", &self.grower.id())
            .finish()
    }
}

impl SegmentationRefiner {
    /// Use a specific boundary grower.
    pub fn new(grower: Box<dyn BoundaryGrower>) -> Self {
        Self { grower }
    }

    /// Seed markers straight from the id-plane: nonzero ids are seeds,
    /// background and stale boundary ids are left for the grower.
    pub fn prepare_markers(mask: &LabelMask) -> IdPlane {
        mask.ids()
            .mapv(|id| if id == BOUNDARY_ID { BACKGROUND_ID } else { id })
    }

    /// Run the grower on matching image and markers.
    pub fn refine(
        &self,
        image: &RgbImage,
        markers: &IdPlane,
        cancel: &CancelToken,
    ) -> Result<IdPlane, RefineError> {
        let (height, width) = markers.dim();
        let markers_size = (width as u32, height as u32);
        if image.dimensions() != markers_size {
            return Err(RefineError::GeometryMismatch {
                image: image.dimensions(),
                markers: markers_size,
            });
        }

        log::debug!(
            "Refining {}x{} markers with {}",
            width,
            height,
            self.grower.id()
        );
        self.grower.grow(image, markers, cancel)
    }

    /// Per-pixel id → color lookup.
    pub fn to_color_overlay(labels: &IdPlane, palette: &LabelPalette) -> ColorPlane {
        colorize(labels, palette)
    }

    /// Full pipeline: markers from `mask`, grow over `image`, optional border
    /// removal, colors from `palette`. `mask` itself is never modified.
    pub fn run(
        &self,
        image: &RgbImage,
        mask: &LabelMask,
        palette: &LabelPalette,
        options: RefineOptions,
        cancel: &CancelToken,
    ) -> Result<LabelMask, RefineError> {
        let markers = Self::prepare_markers(mask);
        self.run_markers(image, &markers, palette, options, cancel)
    }

    /// Pipeline on already prepared markers.
    pub fn run_markers(
        &self,
        image: &RgbImage,
        markers: &IdPlane,
        palette: &LabelPalette,
        options: RefineOptions,
        cancel: &CancelToken,
    ) -> Result<LabelMask, RefineError> {
        let labels = self.refine(image, markers, cancel)?;
        let result = if options.remove_border {
            remove_border(&labels, palette)
        } else {
            LabelMask::from_ids(labels, palette)
        };
        log::info!(
            "Refinement finished ({}x{}, borders {})",
            result.width(),
            result.height(),
            if options.remove_border { "removed" } else { "kept" }
        );
        Ok(result)
    }
}
