use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::canvas::{Layer, LayerContent, LayerKind};

// ============================================================================
// SNAPSHOTS
// ============================================================================

/// One layer as it was at a commit point.
///
/// `content` is shared with the live layer by reference; that is only sound
/// because layer content is never mutated in place.
#[derive(Clone, Debug)]
pub struct LayerSnapshot {
    pub id: String,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub kind: LayerKind,
    pub content: LayerContent,
}

impl LayerSnapshot {
    pub fn capture(layer: &Layer) -> Self {
        Self {
            id: layer.id.clone(),
            name: layer.name.clone(),
            visible: layer.visible,
            opacity: layer.opacity,
            kind: layer.kind,
            content: layer.content.clone(),
        }
    }

    fn memory_bytes(&self) -> usize {
        let pixels = match &self.content {
            LayerContent::Empty => 0,
            LayerContent::Raster(img) => img.memory_bytes(),
            LayerContent::Encoded(bytes) => bytes.len(),
        };
        pixels + self.name.len() + self.id.len()
    }
}

/// A full copy of the layer stack captured at one commit.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub layers: Vec<LayerSnapshot>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl HistoryEntry {
    pub fn capture(layers: &[Layer]) -> Self {
        Self {
            layers: layers.iter().map(LayerSnapshot::capture).collect(),
            timestamp: now_millis(),
        }
    }

    /// Snapshot of the layer with `id`, if it existed at this commit.
    pub fn layer(&self, id: &str) -> Option<&LayerSnapshot> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn memory_bytes(&self) -> usize {
        self.layers.iter().map(LayerSnapshot::memory_bytes).sum()
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ============================================================================
// HISTORY MANAGER - linear snapshot history with a movable cursor
// ============================================================================

/// Append-only-with-truncation list of snapshots and a cursor into it.
///
/// `index` is `-1` only before the first commit.  After any commit it points
/// at the newest entry; undo/redo move it without touching the entries.
pub struct HistoryManager {
    entries: VecDeque<HistoryEntry>,
    index: isize,
    /// 0 = unbounded.
    max_entries: usize,
    /// Content a layer was created with, for layers that start non-empty
    /// (imported images).  Restored when an entry predates the layer.
    origins: HashMap<String, LayerContent>,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(0)
    }
}

impl HistoryManager {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            index: -1,
            max_entries,
            origins: HashMap::new(),
        }
    }

    /// Record a completed paint action.  Any redo tail is discarded first.
    /// Returns the new history length.
    pub fn commit(&mut self, layers: &[Layer]) -> usize {
        self.push(HistoryEntry::capture(layers))
    }

    pub fn push(&mut self, entry: HistoryEntry) -> usize {
        // Discard the redo tail
        let keep = (self.index + 1) as usize;
        self.entries.truncate(keep);

        self.entries.push_back(entry);
        self.index = self.entries.len() as isize - 1;

        self.prune();
        self.entries.len()
    }

    /// Step back one entry.  Returns the entry to restore, or `None` when
    /// already at the oldest entry.
    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index as usize)
    }

    /// Step forward one entry.  Returns the entry to restore, or `None` when
    /// there is nothing to redo.
    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index as usize)
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index < self.entries.len() as isize - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> isize {
        self.index
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        if self.index < 0 {
            None
        } else {
            self.entries.get(self.index as usize)
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn redo_count(&self) -> usize {
        (self.entries.len() as isize - 1 - self.index).max(0) as usize
    }

    /// Approximate bytes held only by history (tiles shared with the live
    /// layers count at pointer cost).
    pub fn memory_usage(&self) -> usize {
        self.entries.iter().map(HistoryEntry::memory_bytes).sum()
    }

    /// Remember what `layer` holds at creation.  Blank layers need no entry.
    pub fn record_origin(&mut self, layer: &Layer) {
        if !layer.content.is_empty() {
            self.origins.insert(layer.id.clone(), layer.content.clone());
        }
    }

    pub fn forget_origin(&mut self, layer_id: &str) {
        self.origins.remove(layer_id);
    }

    /// Content `layer_id` takes when `entry` is restored: its snapshot, or
    /// the content it was created with if it did not exist yet.
    pub fn content_at(&self, entry: &HistoryEntry, layer_id: &str) -> LayerContent {
        match entry.layer(layer_id) {
            Some(snap) => snap.content.clone(),
            None => self.origins.get(layer_id).cloned().unwrap_or_default(),
        }
    }

    /// Drop the oldest entries beyond the cap, keeping the cursor on the
    /// same entry.
    fn prune(&mut self) {
        if self.max_entries == 0 {
            return;
        }
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
            self.index -= 1;
        }
        if self.index < 0 && !self.entries.is_empty() {
            self.index = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::TiledImage;
    use image::Rgba;

    fn layer_with_pixel(id: &str, value: u8) -> Layer {
        let mut img = TiledImage::new(16, 16);
        img.put_pixel(0, 0, Rgba([value, 0, 0, 255]));
        let mut layer = Layer::new("L", LayerKind::Drawing, LayerContent::Raster(img));
        layer.id = id.to_string();
        layer
    }

    fn red_at_origin(entry: &HistoryEntry) -> u8 {
        let content = &entry.layer("a").unwrap().content;
        content.decode(16, 16).unwrap().get_pixel(0, 0)[0]
    }

    #[test]
    fn commits_advance_the_cursor() {
        let mut history = HistoryManager::new(0);
        assert_eq!(history.index(), -1);
        assert!(!history.can_undo());
        for n in 1..=4u8 {
            let len = history.commit(&[layer_with_pixel("a", n)]);
            assert_eq!(len, n as usize);
            assert_eq!(history.index(), n as isize - 1);
            assert!(!history.can_redo());
        }
    }

    #[test]
    fn undo_and_redo_stop_at_the_ends() {
        let mut history = HistoryManager::new(0);
        history.commit(&[layer_with_pixel("a", 1)]);
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        assert_eq!(history.index(), 0);

        history.commit(&[layer_with_pixel("a", 2)]);
        assert_eq!(red_at_origin(history.undo().unwrap()), 1);
        assert!(history.undo().is_none());
        assert_eq!(red_at_origin(history.redo().unwrap()), 2);
        assert!(history.redo().is_none());
    }

    #[test]
    fn commit_after_undo_truncates_redo_tail() {
        let mut history = HistoryManager::new(0);
        for v in [1, 2, 3] {
            history.commit(&[layer_with_pixel("a", v)]);
        }
        history.undo();
        history.undo();
        history.commit(&[layer_with_pixel("a", 4)]);

        let values: Vec<u8> = history.entries().map(red_at_origin).collect();
        assert_eq!(values, vec![1, 4]);
        assert_eq!(history.index(), 1);
        assert_eq!(history.redo_count(), 0);
    }

    #[test]
    fn cap_drops_oldest_and_keeps_cursor_on_newest() {
        let mut history = HistoryManager::new(3);
        for v in 1..=5 {
            history.commit(&[layer_with_pixel("a", v)]);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.index(), 2);
        let values: Vec<u8> = history.entries().map(red_at_origin).collect();
        assert_eq!(values, vec![3, 4, 5]);
    }

    #[test]
    fn missing_layer_restores_as_empty() {
        let mut history = HistoryManager::new(0);
        history.commit(&[layer_with_pixel("a", 1)]);
        let entry = history.current().unwrap();
        assert!(history.content_at(entry, "later").is_empty());
    }

    #[test]
    fn missing_layer_falls_back_to_its_origin() {
        let mut history = HistoryManager::new(0);
        history.commit(&[layer_with_pixel("a", 1)]);
        let image = layer_with_pixel("img", 7);
        history.record_origin(&image);
        let entry = history.current().unwrap().clone();
        let restored = history.content_at(&entry, "img").decode(16, 16).unwrap();
        assert_eq!(restored.get_pixel(0, 0)[0], 7);

        history.forget_origin("img");
        assert!(history.content_at(&entry, "img").is_empty());
    }

    #[test]
    fn memory_usage_grows_with_entries() {
        let mut history = HistoryManager::new(0);
        history.commit(&[layer_with_pixel("a", 1)]);
        let one = history.memory_usage();
        history.commit(&[layer_with_pixel("a", 2)]);
        assert!(one > 0);
        assert!(history.memory_usage() > one);
    }

    #[test]
    fn snapshots_share_tiles_with_live_layers() {
        let layer = layer_with_pixel("a", 9);
        let mut history = HistoryManager::new(0);
        history.commit(std::slice::from_ref(&layer));
        match (&layer.content, &history.current().unwrap().layers[0].content) {
            (LayerContent::Raster(live), LayerContent::Raster(snap)) => {
                assert_eq!(live.shared_chunk_count(), 1);
                assert!(live.pixels_eq(snap));
            }
            _ => panic!("expected raster content"),
        }
    }
}
