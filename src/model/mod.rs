//! Label data model: labels, pen colors and the palette registry.

mod label;
mod palette;

pub use label::{LabelColor, LabelId, LabelInfo, Rgb};
pub use palette::{LabelPalette, PaletteError};
