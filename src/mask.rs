//! The label mask: an id-plane holding one label id per pixel, plus a
//! color-plane cache derived from it for display.
//!
//! The two planes are only synchronised explicitly: painting writes both,
//! but a palette color change reaches the color-plane only through
//! [`LabelMask::update_color`].

use std::ops::RangeInclusive;

use image::{Rgb as RgbPixel, RgbImage};
use ndarray::Array2;

use crate::constants::{BACKGROUND_ID, BOUNDARY_COLOR, BOUNDARY_ID, NO_LABEL_COLOR};
use crate::model::{LabelColor, LabelId, LabelPalette, Rgb};

/// One label id per pixel, indexed `[[y, x]]`.
pub type IdPlane = Array2<LabelId>;

/// Display colors, one per pixel.
pub type ColorPlane = RgbImage;

/// Color shown for an id: palette color, boundary color for the sentinel,
/// "no label" color for anything unresolved.
pub fn display_color(id: LabelId, palette: &LabelPalette) -> Rgb {
    match palette.resolve(id) {
        Some(label) => label.color,
        None if id == BOUNDARY_ID => BOUNDARY_COLOR,
        None => NO_LABEL_COLOR,
    }
}

/// Per-pixel id → color lookup over a whole id-plane.
pub fn colorize(ids: &IdPlane, palette: &LabelPalette) -> ColorPlane {
    let (height, width) = ids.dim();
    let mut color = RgbImage::new(width as u32, height as u32);
    for ((y, x), &id) in ids.indexed_iter() {
        color.put_pixel(x as u32, y as u32, RgbPixel(display_color(id, palette)));
    }
    color
}

/// A label raster: id-plane plus its color cache.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMask {
    ids: IdPlane,
    color: ColorPlane,
}

impl LabelMask {
    /// A blank mask: every id is background, every color "no label".
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            ids: Array2::from_elem((height as usize, width as usize), BACKGROUND_ID),
            color: RgbImage::from_pixel(width, height, RgbPixel(NO_LABEL_COLOR)),
        }
    }

    /// Wrap an existing id-plane, deriving its colors from the palette.
    pub fn from_ids(ids: IdPlane, palette: &LabelPalette) -> Self {
        let color = colorize(&ids, palette);
        Self { ids, color }
    }

    pub fn width(&self) -> u32 {
        self.ids.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.ids.nrows() as u32
    }

    /// `(width, height)`
    pub fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn ids(&self) -> &IdPlane {
        &self.ids
    }

    pub fn color(&self) -> &ColorPlane {
        &self.color
    }

    /// Id at a pixel, `None` outside the mask.
    pub fn id_at(&self, x: i64, y: i64) -> Option<LabelId> {
        let (col, row) = self.index(x, y)?;
        Some(self.ids[[row, col]])
    }

    /// Color at a pixel, `None` outside the mask.
    pub fn color_at(&self, x: i64, y: i64) -> Option<Rgb> {
        let (col, row) = self.index(x, y)?;
        Some(self.color.get_pixel(col as u32, row as u32).0)
    }

    fn index(&self, x: i64, y: i64) -> Option<(usize, usize)> {
        let col = usize::try_from(x).ok()?;
        let row = usize::try_from(y).ok()?;
        (col < self.ids.ncols() && row < self.ids.nrows()).then_some((col, row))
    }

    fn write(&mut self, col: usize, row: usize, pen: LabelColor) {
        self.ids[[row, col]] = pen.id;
        self.color
            .put_pixel(col as u32, row as u32, RgbPixel(pen.color));
    }

    /// Paint one pixel. Out-of-bounds coordinates are ignored.
    pub fn set_pixel(&mut self, x: i64, y: i64, pen: LabelColor) {
        if let Some((col, row)) = self.index(x, y) {
            self.write(col, row, pen);
        }
    }

    /// Paint a filled circle of the given diameter centered on `(cx, cy)`.
    ///
    /// A pixel is inside when its squared distance to the center is at most
    /// the squared radius, evaluated in integers as `4·d² ≤ diameter²`.
    /// Only the part of the bounding box that overlaps the mask is visited.
    pub fn draw_filled_circle(&mut self, cx: i64, cy: i64, diameter: u32, pen: LabelColor) {
        if diameter == 0 {
            return;
        }
        let reach = i128::from(diameter / 2);
        let cols = clip_span(i128::from(cx), reach, self.ids.ncols());
        let rows = clip_span(i128::from(cy), reach, self.ids.nrows());
        let (Some(cols), Some(rows)) = (cols, rows) else {
            return;
        };

        for row in rows {
            for col in cols.clone() {
                if circle_contains(cx, cy, diameter, col as i64, row as i64) {
                    self.write(col, row, pen);
                }
            }
        }
    }

    /// Replace every pixel carrying the id found at `(x, y)` with the pen's id.
    ///
    /// The swap is global, not bounded by connectivity. Returns the number of
    /// pixels rewritten; nothing happens when the source pixel is background,
    /// out of bounds, or already carries the pen's id.
    pub fn exchange_label(
        &mut self,
        x: i64,
        y: i64,
        palette: &LabelPalette,
        pen: LabelColor,
    ) -> usize {
        let Some(source) = self.id_at(x, y) else {
            return 0;
        };
        if source == BACKGROUND_ID || source == pen.id {
            return 0;
        }

        let mut changed = 0;
        for row in 0..self.ids.nrows() {
            for col in 0..self.ids.ncols() {
                if self.ids[[row, col]] == source {
                    self.write(col, row, pen);
                    changed += 1;
                }
            }
        }

        log::debug!(
            "Exchanged label {} ({}) -> {}: {} pixels",
            source,
            palette.resolve(source).map_or("unknown", |l| l.name.as_str()),
            pen.id,
            changed
        );
        changed
    }

    /// Recompute the whole color-plane from the id-plane.
    pub fn update_color(&mut self, palette: &LabelPalette) {
        self.color = colorize(&self.ids, palette);
    }

    /// True when every pixel is background.
    pub fn is_blank(&self) -> bool {
        self.ids.iter().all(|&id| id == BACKGROUND_ID)
    }

    /// Number of pixels carrying `id`.
    pub fn count(&self, id: LabelId) -> usize {
        self.ids.iter().filter(|&&v| v == id).count()
    }
}

/// Inside test shared by circle rasterization and its callers.
pub fn circle_contains(cx: i64, cy: i64, diameter: u32, x: i64, y: i64) -> bool {
    let dx = (i128::from(x) - i128::from(cx)).unsigned_abs();
    let dy = (i128::from(y) - i128::from(cy)).unsigned_abs();
    let d = u128::from(diameter);
    dx.checked_mul(dx)
        .zip(dy.checked_mul(dy))
        .and_then(|(dx2, dy2)| dx2.checked_add(dy2))
        .and_then(|r2| r2.checked_mul(4))
        .is_some_and(|r2| r2 <= d * d)
}

/// Indices of `center ± reach` that fall inside `0..len`, or `None` when the
/// span misses it.
fn clip_span(center: i128, reach: i128, len: usize) -> Option<RangeInclusive<usize>> {
    let lo = (center - reach).max(0);
    let hi = (center + reach).min(len as i128 - 1);
    (lo <= hi).then(|| lo as usize..=hi as usize)
}
