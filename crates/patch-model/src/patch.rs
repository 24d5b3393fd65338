use serde::{Deserialize, Serialize};
use std::fmt;

use crate::convert;
use crate::remote::{RecordId, RemotePatchRecord};

pub type PatchId = String;

/// Normalized canvas position. Both axes span `[-1, 1]` with the origin at the
/// canvas center.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both axes into `[-1, 1]`. Non-finite coordinates collapse to 0.
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_unit(self.x),
            y: clamp_unit(self.y),
        }
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 }
}

/// Transform and color attributes in the local rendering convention:
/// rotation in degrees, decoupled scale/skew factors and 0-255 color channels.
///
/// Every field is independent; an absent field means "not set", not zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squeeze: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shear: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub green: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

impl LocalAttributes {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite fields that are set in `update`, keeping the rest.
    pub fn merge(&mut self, update: &LocalAttributes) {
        let fields = [
            (&mut self.rotation, update.rotation),
            (&mut self.scale, update.scale),
            (&mut self.squeeze, update.squeeze),
            (&mut self.shear, update.shear),
            (&mut self.red, update.red),
            (&mut self.green, update.green),
            (&mut self.blue, update.blue),
            (&mut self.alpha, update.alpha),
        ];
        for (slot, value) in fields {
            if value.is_some() {
                *slot = value;
            }
        }
        if let Some(alpha) = self.alpha {
            self.alpha = Some(alpha.clamp(0.0, 1.0));
        }
    }
}

/// Reference to a source image inside a patch library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub library: String,
    pub index: usize,
}

impl ImageRef {
    pub fn new(library: impl Into<String>, index: usize) -> Self {
        Self {
            library: library.into(),
            index,
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.library, self.index)
    }
}

/// A patch placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub id: PatchId,
    pub image: ImageRef,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<LocalAttributes>,
}

impl Patch {
    pub fn new(id: impl Into<PatchId>, image: ImageRef, position: Position) -> Self {
        Self {
            id: id.into(),
            image,
            position: position.clamped(),
            attributes: None,
        }
    }

    pub fn with_attributes(mut self, attributes: LocalAttributes) -> Self {
        self.attributes = (!attributes.is_empty()).then_some(attributes);
        self
    }

    /// Express this patch in the model's convention with `order` as its
    /// z-layer.
    pub fn to_remote_record(&self, order: i64) -> RemotePatchRecord {
        let attributes = self
            .attributes
            .as_ref()
            .map(convert::to_remote)
            .unwrap_or_default();
        RemotePatchRecord {
            id: RecordId::Text(self.id.clone()),
            patch_index: self.image.index,
            x: self.position.x,
            y: self.position.y,
            attributes,
            order,
        }
    }
}
