//! Canvas state: the selected patch library and the placed patches.
//!
//! Hosts own one `Canvas` and pass it to whatever needs it; nothing here is
//! global.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::debug;

use crate::patch::{ImageRef, LocalAttributes, Patch, PatchId, Position};
use crate::remote::RemotePatchRecord;

const PATCH_ID_LEN: usize = 10;

pub const DEFAULT_LIBRARY: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    library: String,
    /// Stacking order: later entries are drawn on top.
    #[serde(default)]
    patches: Vec<Patch>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(DEFAULT_LIBRARY)
    }
}

impl Canvas {
    pub fn new(library: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            patches: Vec::new(),
        }
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    /// Switch library. Placed patches keep their own image references.
    pub fn select_library(&mut self, library: impl Into<String>) {
        self.library = library.into();
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Patch> {
        self.patches.iter().find(|p| p.id == id)
    }

    /// Place library image `index` on top of the stack and return its id.
    pub fn place(&mut self, index: usize, position: Position) -> PatchId {
        let id = nanoid::nanoid!(PATCH_ID_LEN);
        let patch = Patch::new(id.clone(), ImageRef::new(&self.library, index), position);
        debug!(patch = %id, image = %patch.image, "placed patch");
        self.patches.push(patch);
        id
    }

    /// Move a patch; the position is clamped to the canvas. Returns false if
    /// no patch has this id.
    pub fn move_to(&mut self, id: &str, position: Position) -> bool {
        match self.patches.iter_mut().find(|p| p.id == id) {
            Some(patch) => {
                patch.position = position.clamped();
                true
            }
            None => false,
        }
    }

    /// Apply the fields set in `update` to a patch's attributes.
    pub fn edit(&mut self, id: &str, update: &LocalAttributes) -> bool {
        let Some(patch) = self.patches.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        let mut attributes = patch.attributes.unwrap_or_default();
        attributes.merge(update);
        patch.attributes = (!attributes.is_empty()).then_some(attributes);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Patch> {
        let idx = self.patches.iter().position(|p| p.id == id)?;
        Some(self.patches.remove(idx))
    }

    pub fn clear(&mut self) {
        self.patches.clear();
    }

    /// Replace the canvas contents with a generation result. Records are
    /// stacked by their `order`; ties keep their input order.
    pub fn apply_results(&mut self, records: &[RemotePatchRecord]) {
        let mut sorted: Vec<&RemotePatchRecord> = records.iter().collect();
        sorted.sort_by_key(|r| r.order);
        self.patches = sorted
            .into_iter()
            .map(|record| record.to_patch(&self.library))
            .collect();
        debug!(count = self.patches.len(), "applied generation result");
    }

    /// Current patches in the model's convention, bottom first. Used as the
    /// initial layout when creating a job.
    pub fn to_remote_records(&self) -> Vec<RemotePatchRecord> {
        self.patches
            .iter()
            .enumerate()
            .map(|(order, patch)| patch.to_remote_record(order as i64))
            .collect()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let canvas: Canvas = serde_json::from_slice(&data)
            .with_context(|| format!("failed to parse canvas {}", path.display()))?;
        Ok(canvas)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{RecordId, RemoteAttributes};

    fn record(id: i64, order: i64) -> RemotePatchRecord {
        RemotePatchRecord {
            id: RecordId::Number(id),
            patch_index: id as usize,
            x: 0.0,
            y: 0.0,
            attributes: RemoteAttributes::default(),
            order,
        }
    }

    #[test]
    fn place_move_edit_remove() {
        let mut canvas = Canvas::new("faces");
        let id = canvas.place(4, Position::new(0.2, 0.3));
        assert_eq!(canvas.len(), 1);
        assert_eq!(canvas.get(&id).map(|p| p.image.to_string()), Some("faces/4".to_string()));

        assert!(canvas.move_to(&id, Position::new(2.0, 0.0)));
        assert_eq!(canvas.get(&id).map(|p| p.position), Some(Position::new(1.0, 0.0)));
        assert!(!canvas.move_to("missing", Position::default()));

        assert!(canvas.edit(
            &id,
            &LocalAttributes {
                rotation: Some(90.0),
                ..Default::default()
            }
        ));
        assert_eq!(
            canvas.get(&id).and_then(|p| p.attributes).and_then(|a| a.rotation),
            Some(90.0)
        );

        assert!(canvas.remove(&id).is_some());
        assert!(canvas.is_empty());
    }

    #[test]
    fn results_are_stacked_by_order() {
        let mut canvas = Canvas::new("lib");
        canvas.place(0, Position::default());
        canvas.apply_results(&[record(1, 2), record(2, 0), record(3, 1)]);
        let ids: Vec<&str> = canvas.patches().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["2", "3", "1"]);
    }

    #[test]
    fn remote_records_carry_stacking_order() {
        let mut canvas = Canvas::new("lib");
        canvas.place(5, Position::new(-0.5, 0.5));
        canvas.place(6, Position::default());
        let records = canvas.to_remote_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].order, 0);
        assert_eq!(records[0].patch_index, 5);
        assert_eq!(records[1].order, 1);
        assert_eq!(records[0].x, -0.5);
    }

    #[test]
    fn clear_keeps_library() {
        let mut canvas = Canvas::new("lib");
        canvas.place(1, Position::default());
        canvas.clear();
        assert!(canvas.is_empty());
        assert_eq!(canvas.library(), "lib");
    }
}
