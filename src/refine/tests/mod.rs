//! Unit tests for the refinement pipeline.
//!
//! Fixtures are small synthetic images with flat color regions so the
//! flood outcome is predictable.


use image::{Rgb, RgbImage};

use crate::mask::IdPlane;
use crate::model::{LabelInfo, LabelPalette};

const RED: Rgb<u8> = Rgb([200, 30, 30]);
const GREEN: Rgb<u8> = Rgb([30, 200, 30]);

fn palette() -> LabelPalette {
    LabelPalette::from_labels([
        LabelInfo::new(1, "tree", "nature", 4, [0, 128, 0]),
        LabelInfo::new(2, "car", "vehicle", 7, [0, 0, 142]),
    ])
    .unwrap()
}

/// Red left of column `split`, green from it on.
fn split_image(width: u32, height: u32, split: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| if x < split { RED } else { GREEN })
}

/// Id-plane from rows of ids.
fn plane(rows: &[&[u8]]) -> IdPlane {
    let height = rows.len();
    let width = rows.first().map_or(0, |r| r.len());
    IdPlane::from_shape_fn((height, width), |(y, x)| rows[y][x])
}
