//! Pen-based editing bound to an active label.
//!
//! Translates view coordinates (what the pointer reports on a scaled view)
//! into mask coordinates and delegates to [`LabelMask`].

use crate::constants::{DEFAULT_PEN_SIZE, DEFAULT_SCALE};
use crate::mask::LabelMask;
use crate::model::{LabelColor, LabelInfo, LabelPalette};

/// A pointer position in view space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewPoint {
    pub x: f64,
    pub y: f64,
}

impl ViewPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pen state: active label, diameter and view scale.
#[derive(Debug, Clone)]
pub struct EditEngine {
    pen: LabelColor,
    pen_size: u32,
    scale: f64,
}

impl Default for EditEngine {
    fn default() -> Self {
        Self {
            pen: LabelColor::BACKGROUND,
            pen_size: DEFAULT_PEN_SIZE,
            scale: DEFAULT_SCALE,
        }
    }
}

impl EditEngine {
    pub fn new(pen_size: u32, scale: f64) -> Self {
        let mut engine = Self::default();
        engine.set_pen_size(pen_size);
        engine.set_scale(scale);
        engine
    }

    /// Select the label the pen paints with.
    pub fn set_active_label(&mut self, label: &LabelInfo) {
        log::debug!("Active label: {}", label.summary());
        self.pen = label.pen();
    }

    /// Re-read the active label's color after a palette change.
    pub fn refresh_pen(&mut self, palette: &LabelPalette) {
        if let Some(label) = palette.resolve(self.pen.id) {
            self.pen = label.pen();
        }
    }

    pub fn pen(&self) -> LabelColor {
        self.pen
    }

    pub fn pen_size(&self) -> u32 {
        self.pen_size
    }

    pub fn set_pen_size(&mut self, pen_size: u32) {
        self.pen_size = pen_size;
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Set the view scale; non-positive or non-finite values are ignored.
    pub fn set_scale(&mut self, scale: f64) {
        if scale.is_finite() && scale > 0.0 {
            self.scale = scale;
        } else {
            log::warn!("Ignoring invalid view scale {}", scale);
        }
    }

    /// Mask pixel under the pointer, `None` for a non-finite position.
    ///
    /// With a round pen the position is truncated; a zero-size pen rounds to
    /// the nearest pixel instead. Positions beyond the `i64` range saturate.
    pub fn to_mask(&self, point: ViewPoint) -> Option<(i64, i64)> {
        let (x, y) = (point.x / self.scale, point.y / self.scale);
        if !(x.is_finite() && y.is_finite()) {
            log::debug!("Ignoring pointer at ({}, {})", point.x, point.y);
            return None;
        }
        if self.pen_size > 0 {
            Some((x.floor() as i64, y.floor() as i64))
        } else {
            Some(((x + 0.5).floor() as i64, (y + 0.5).floor() as i64))
        }
    }

    /// Paint at one pointer position.
    pub fn paint_point(&self, mask: &mut LabelMask, point: ViewPoint) {
        let Some((x, y)) = self.to_mask(point) else {
            return;
        };
        if self.pen_size > 0 {
            // Bounding box starts at cursor - diameter/2, i.e. centered on the cursor.
            mask.draw_filled_circle(x, y, self.pen_size, self.pen);
        } else {
            mask.set_pixel(x, y, self.pen);
        }
    }

    /// Paint every sampled position of a stroke.
    pub fn paint_stroke(&self, mask: &mut LabelMask, points: &[ViewPoint]) {
        for &point in points {
            self.paint_point(mask, point);
        }
    }

    /// Swap the label under the pointer for the active label across the mask.
    pub fn swap_label_at(
        &self,
        mask: &mut LabelMask,
        point: ViewPoint,
        palette: &LabelPalette,
    ) -> usize {
        match self.to_mask(point) {
            Some((x, y)) => mask.exchange_label(x, y, palette, self.pen),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::circle_contains;

    fn palette() -> LabelPalette {
        LabelPalette::from_labels([
            LabelInfo::new(3, "grass", "nature", 4, [0, 255, 0]),
            LabelInfo::new(4, "sand", "nature", 4, [200, 200, 0]),
        ])
        .unwrap()
    }

    fn engine(label: &str, pen_size: u32, scale: f64) -> EditEngine {
        let mut engine = EditEngine::new(pen_size, scale);
        engine.set_active_label(palette().get(label).unwrap());
        engine
    }

    #[test]
    fn test_to_mask_round_pen_truncates() {
        let engine = engine("grass", 5, 2.0);
        assert_eq!(engine.to_mask(ViewPoint::new(9.9, 3.0)), Some((4, 1)));
        assert_eq!(engine.to_mask(ViewPoint::new(-0.5, 0.0)), Some((-1, 0)));
    }

    #[test]
    fn test_to_mask_single_pixel_rounds() {
        let engine = engine("grass", 0, 2.0);
        // 9.2 / 2 = 4.6 -> 5
        assert_eq!(engine.to_mask(ViewPoint::new(9.2, 8.8)), Some((5, 4)));
        // 8.8 / 2 = 4.4 -> 4
        assert_eq!(engine.to_mask(ViewPoint::new(8.8, 0.0)), Some((4, 0)));
    }

    #[test]
    fn test_paint_point_single_pixel() {
        let engine = engine("grass", 0, 1.0);
        let mut mask = LabelMask::new(10, 10);
        engine.paint_point(&mut mask, ViewPoint::new(3.6, 2.2));

        assert_eq!(mask.count(3), 1);
        assert_eq!(mask.id_at(4, 2), Some(3));
        assert_eq!(mask.color_at(4, 2), Some([0, 255, 0]));
    }

    #[test]
    fn test_paint_point_circle_centered_on_cursor() {
        let engine = engine("sand", 7, 2.0);
        let mut mask = LabelMask::new(50, 50);
        engine.paint_point(&mut mask, ViewPoint::new(41.0, 40.0));

        for y in 0..50i64 {
            for x in 0..50i64 {
                let inside = circle_contains(20, 20, 7, x, y);
                assert_eq!(mask.id_at(x, y) == Some(4), inside, "({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_far_and_non_finite_pointer_is_ignored() {
        let engine = engine("grass", 30, 1.0);
        let mut mask = LabelMask::new(10, 10);
        engine.paint_point(&mut mask, ViewPoint::new(1e30, 0.0));
        engine.paint_point(&mut mask, ViewPoint::new(-1e30, -1e30));
        engine.paint_point(&mut mask, ViewPoint::new(f64::NAN, 2.0));
        engine.paint_point(&mut mask, ViewPoint::new(2.0, f64::INFINITY));
        assert!(mask.is_blank());

        assert_eq!(engine.to_mask(ViewPoint::new(f64::NAN, 0.0)), None);
        assert_eq!(engine.to_mask(ViewPoint::new(1e30, 0.0)), Some((i64::MAX, 0)));
    }

    #[test]
    fn test_paint_stroke() {
        let engine = engine("grass", 1, 1.0);
        let mut mask = LabelMask::new(10, 10);
        let points: Vec<_> = (0..10).map(|i| ViewPoint::new(f64::from(i), 5.0)).collect();
        engine.paint_stroke(&mut mask, &points);
        assert_eq!(mask.count(3), 10);
    }

    #[test]
    fn test_swap_label_at() {
        let palette = palette();
        let mut mask = LabelMask::new(10, 10);
        engine("grass", 3, 1.0).paint_point(&mut mask, ViewPoint::new(2.0, 2.0));
        engine("grass", 3, 1.0).paint_point(&mut mask, ViewPoint::new(7.0, 7.0));
        let painted = mask.count(3);

        let swapped = engine("sand", 3, 1.0).swap_label_at(&mut mask, ViewPoint::new(2.5, 2.5), &palette);
        assert_eq!(swapped, painted);
        assert_eq!(mask.count(3), 0);
        assert_eq!(mask.count(4), painted);
    }

    #[test]
    fn test_invalid_scale_ignored() {
        let mut engine = EditEngine::default();
        engine.set_scale(0.0);
        engine.set_scale(f64::NAN);
        assert_eq!(engine.scale(), DEFAULT_SCALE);
    }

    #[test]
    fn test_refresh_pen_picks_up_new_color() {
        let mut palette = palette();
        let mut engine = engine("grass", 1, 1.0);
        palette.set_color("grass", [9, 9, 9]).unwrap();
        engine.refresh_pen(&palette);
        assert_eq!(engine.pen().color, [9, 9, 9]);
    }
}
