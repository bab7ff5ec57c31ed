//! Label data model: display metadata for one id of the id-plane.

use crate::color_utils::format_hex;

/// Identifier stored in the id-plane (one byte per pixel).
pub type LabelId = u8;

/// An RGB triple.
pub type Rgb = [u8; 3];

/// Display metadata for a label id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelInfo {
    /// Value written into the id-plane
    pub id: LabelId,
    /// Unique display name
    pub name: String,
    /// Category name (e.g. "vehicle")
    pub category: String,
    /// Category identifier
    pub category_id: i32,
    /// Display color; the only field users may edit after creation
    pub color: Rgb,
}

impl LabelInfo {
    /// Create a new label.
    pub fn new(id: LabelId, name: &str, category: &str, category_id: i32, color: Rgb) -> Self {
        Self {
            id,
            name: name.to_string(),
            category: category.to_string(),
            category_id,
            color,
        }
    }

    /// The pen color used to paint this label.
    pub fn pen(&self) -> LabelColor {
        LabelColor::new(self.id, self.color)
    }

    /// One-line summary for status messages.
    pub fn summary(&self) -> String {
        format!(
            "label=[{}] id=[{}] category=[{}] color=[{}]",
            self.name,
            self.id,
            self.category,
            format_hex(self.color)
        )
    }
}

/// What the pen writes: the id for the id-plane and the color for the color-plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelColor {
    /// Id written into the id-plane
    pub id: LabelId,
    /// Color written into the color-plane
    pub color: Rgb,
}

impl LabelColor {
    /// The eraser: background id with the "no label" color.
    pub const BACKGROUND: LabelColor = LabelColor {
        id: crate::constants::BACKGROUND_ID,
        color: crate::constants::NO_LABEL_COLOR,
    };

    pub fn new(id: LabelId, color: Rgb) -> Self {
        Self { id, color }
    }

    /// The id as a gray triple, the way it appears in a persisted mask.
    pub fn gray(&self) -> Rgb {
        [self.id, self.id, self.id]
    }
}

impl Default for LabelColor {
    fn default() -> Self {
        Self::BACKGROUND
    }
}
