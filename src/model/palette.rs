//! Label palette: the registry of labels keyed by name, with a derived
//! id index used to resolve id-plane values.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::constants::{BOUNDARY_ID, NO_LABEL_COLOR};
use crate::model::label::{LabelId, LabelInfo, Rgb};

/// Errors raised when registering or editing labels.
/// A failed operation leaves the palette unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaletteError {
    /// Another label already uses this id
    #[error("Label id {id} is already registered (by '{existing}')")]
    DuplicateId { id: LabelId, existing: String },

    /// Another label already uses this name
    #[error("Label name '{name}' is already registered")]
    DuplicateName { name: String },

    /// The id does not fit the id-plane or collides with the boundary id
    #[error("Label id {id} is outside the usable range 0-254")]
    IdOutOfRange { id: i64 },

    /// No label with this name
    #[error("Unknown label '{name}'")]
    UnknownLabel { name: String },
}

/// Ordered registry of labels.
///
/// Labels are kept ordered by name. The id index is rebuilt on every change,
/// so every registered id resolves through [`LabelPalette::resolve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelPalette {
    by_name: BTreeMap<String, LabelInfo>,
    id_index: HashMap<LabelId, String>,
}

impl LabelPalette {
    /// Create an empty palette.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a palette from a list of labels, rejecting the first conflict.
    pub fn from_labels(labels: impl IntoIterator<Item = LabelInfo>) -> Result<Self, PaletteError> {
        let mut palette = Self::new();
        for label in labels {
            palette.register(label)?;
        }
        Ok(palette)
    }

    /// Register a label.
    pub fn register(&mut self, label: LabelInfo) -> Result<(), PaletteError> {
        if label.id == BOUNDARY_ID {
            return Err(PaletteError::IdOutOfRange {
                id: i64::from(label.id),
            });
        }
        if let Some(existing) = self.id_index.get(&label.id) {
            return Err(PaletteError::DuplicateId {
                id: label.id,
                existing: existing.clone(),
            });
        }
        if self.by_name.contains_key(&label.name) {
            return Err(PaletteError::DuplicateName { name: label.name });
        }

        log::trace!("Palette: registered '{}' as id {}", label.name, label.id);
        self.by_name.insert(label.name.clone(), label);
        self.rebuild_index();
        Ok(())
    }

    /// Look up a label by id. Unknown ids resolve to nothing and are
    /// treated as background by callers.
    pub fn resolve(&self, id: LabelId) -> Option<&LabelInfo> {
        self.id_index
            .get(&id)
            .and_then(|name| self.by_name.get(name))
    }

    /// Look up a label by name.
    pub fn get(&self, name: &str) -> Option<&LabelInfo> {
        self.by_name.get(name)
    }

    /// Display color for an id, falling back to the "no label" color.
    pub fn color_of(&self, id: LabelId) -> Rgb {
        self.resolve(id).map_or(NO_LABEL_COLOR, |label| label.color)
    }

    /// Change the color of a label.
    ///
    /// Masks are not touched: callers refresh their color-planes explicitly.
    pub fn set_color(&mut self, name: &str, color: Rgb) -> Result<(), PaletteError> {
        let label = self
            .by_name
            .get_mut(name)
            .ok_or_else(|| PaletteError::UnknownLabel {
                name: name.to_string(),
            })?;
        log::debug!("Palette: color of '{}' changed to {:?}", name, color);
        label.color = color;
        Ok(())
    }

    /// Labels in name order.
    pub fn labels(&self) -> impl Iterator<Item = &LabelInfo> + '_ {
        self.by_name.values()
    }

    /// Number of registered labels.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether no label is registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn rebuild_index(&mut self) {
        self.id_index = self
            .by_name
            .values()
            .map(|label| (label.id, label.name.clone()))
            .collect();
    }

    /// The built-in Cityscapes-style label set.
    pub fn default_labels() -> Self {
        let mut palette = Self::new();
        for label in default_label_list() {
            // The built-in list has unique ids and names.
            if let Err(e) = palette.register(label) {
                log::error!("Built-in label rejected: {}", e);
            }
        }
        palette
    }
}

fn default_label_list() -> Vec<LabelInfo> {
    const LABELS: &[(&str, &str, LabelId, i32, Rgb)] = &[
        ("unlabeled", "void", 0, 0, [0, 0, 0]),
        ("ego vehicle", "void", 1, 0, [0, 0, 0]),
        ("rectification border", "void", 2, 0, [0, 0, 0]),
        ("out of roi", "void", 3, 0, [0, 0, 0]),
        ("static", "void", 4, 0, [0, 0, 0]),
        ("dynamic", "void", 5, 0, [111, 74, 0]),
        ("ground", "void", 6, 0, [81, 0, 81]),
        ("road", "flat", 7, 1, [128, 64, 128]),
        ("sidewalk", "flat", 8, 1, [244, 35, 232]),
        ("parking", "flat", 9, 1, [250, 170, 160]),
        ("rail track", "flat", 10, 1, [230, 150, 140]),
        ("building", "construction", 11, 2, [70, 70, 70]),
        ("wall", "construction", 12, 2, [102, 102, 156]),
        ("fence", "construction", 13, 2, [190, 153, 153]),
        ("guard rail", "construction", 14, 2, [180, 165, 180]),
        ("bridge", "construction", 15, 2, [150, 100, 100]),
        ("tunnel", "construction", 16, 2, [150, 120, 90]),
        ("pole", "object", 17, 3, [153, 153, 153]),
        ("polegroup", "object", 18, 3, [153, 153, 153]),
        ("traffic light", "object", 19, 3, [250, 170, 30]),
        ("traffic sign", "object", 20, 3, [220, 220, 0]),
        ("vegetation", "nature", 21, 4, [107, 142, 35]),
        ("terrain", "nature", 22, 4, [152, 251, 152]),
        ("sky", "sky", 23, 5, [70, 130, 180]),
        ("person", "human", 24, 6, [220, 20, 60]),
        ("rider", "human", 25, 6, [255, 0, 0]),
        ("car", "vehicle", 26, 7, [0, 0, 142]),
        ("truck", "vehicle", 27, 7, [0, 0, 70]),
        ("bus", "vehicle", 28, 7, [0, 60, 100]),
        ("caravan", "vehicle", 29, 7, [0, 0, 90]),
        ("trailer", "vehicle", 30, 7, [0, 0, 110]),
        ("train", "vehicle", 31, 7, [0, 80, 100]),
        ("motorcycle", "vehicle", 32, 7, [0, 0, 230]),
        ("bicycle", "vehicle", 33, 7, [119, 11, 32]),
    ];

    LABELS
        .iter()
        .map(|&(name, category, id, category_id, color)| {
            LabelInfo::new(id, name, category, category_id, color)
        })
        .collect()
}
