use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::convert;
use crate::patch::{ImageRef, Patch, Position};

/// Patch identifier as emitted by the model. Observed both as integers and
/// as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

/// Transform and color attributes in the model's convention: rotation in
/// radians, coupled scale/squeeze/shear and 0-1 color channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteAttributes {
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
}

/// One patch as described by a result metadata artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePatchRecord {
    pub id: RecordId,
    #[serde(default)]
    pub patch_index: usize,
    pub x: f64,
    pub y: f64,
    #[serde(flatten)]
    pub attributes: RemoteAttributes,
    /// Z-layer; lower values are drawn first.
    #[serde(default)]
    pub order: i64,
}

impl RemotePatchRecord {
    /// Convert into a canvas patch whose image is taken from `library`.
    pub fn to_patch(&self, library: &str) -> Patch {
        let attributes = convert::to_local(&self.attributes);
        let image = ImageRef::new(library, self.patch_index);
        Patch::new(self.id.to_string(), image, Position::new(self.x, self.y))
            .with_attributes(attributes)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("metadata has unexpected shape: expected an array or an object with `patches`")]
    UnexpectedShape,
}

/// Parse a metadata artifact into records, sorted by `order` so that applying
/// them in sequence yields the intended stacking.
///
/// The artifact is either a bare array of records or an object holding them
/// under `patches`.
pub fn parse_metadata(text: &str) -> Result<Vec<RemotePatchRecord>, MetadataError> {
    let mut records: Vec<RemotePatchRecord> = match serde_json::from_str::<Value>(text)? {
        value @ Value::Array(_) => serde_json::from_value(value)?,
        Value::Object(mut document) => match document.remove("patches") {
            Some(patches) => serde_json::from_value(patches)?,
            None => return Err(MetadataError::UnexpectedShape),
        },
        _ => return Err(MetadataError::UnexpectedShape),
    };
    records.sort_by_key(|r| r.order);
    Ok(records)
}
