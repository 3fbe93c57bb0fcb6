use crate::canvas::{check_index, Layer, LayerContent, LayerKind};
use crate::error::Result;

// ============================================================================
// LAYER STACK – ordered layers (index 0 = bottom) plus the active index
// ============================================================================

/// Ordered, named layers and the index of the one receiving paint.
///
/// Never empty: the stack is built around an initial layer and refuses to
/// remove its last one, so `active_index < len()` always holds.
#[derive(Clone, Debug)]
pub struct LayerStack {
    layers: Vec<Layer>,
    active_index: usize,
}

impl LayerStack {
    pub fn new(initial: Layer) -> Self {
        Self {
            layers: vec![initial],
            active_index: 0,
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn active(&self) -> &Layer {
        &self.layers[self.active_index]
    }

    pub fn set_active(&mut self, index: usize) -> Result<()> {
        check_index(index, self.layers.len())?;
        self.active_index = index;
        Ok(())
    }

    /// Flip visibility; returns the new flag.
    pub fn toggle_visibility(&mut self, index: usize) -> Result<bool> {
        check_index(index, self.layers.len())?;
        let layer = &mut self.layers[index];
        layer.visible = !layer.visible;
        Ok(layer.visible)
    }

    /// Set opacity (clamped to 0..1).
    pub fn set_opacity(&mut self, index: usize, opacity: f32) -> Result<()> {
        check_index(index, self.layers.len())?;
        let opacity = if opacity.is_finite() { opacity.clamp(0.0, 1.0) } else { 1.0 };
        self.layers[index].opacity = opacity;
        Ok(())
    }

    /// Append a blank drawing layer named "Layer N" and make it active.
    /// Returns its index.
    pub fn add_layer(&mut self) -> usize {
        let name = format!("Layer {}", self.layers.len() + 1);
        self.push(Layer::blank(name))
    }

    /// Append `layer` on top and make it active.
    pub fn push(&mut self, layer: Layer) -> usize {
        self.layers.push(layer);
        self.active_index = self.layers.len() - 1;
        self.active_index
    }

    /// Remove a layer unless it is the only one.  The active index follows
    /// the layer it pointed at, or the layer below when that one is removed.
    pub fn remove(&mut self, index: usize) -> Result<Option<Layer>> {
        check_index(index, self.layers.len())?;
        if self.layers.len() <= 1 {
            return Ok(None);
        }
        let removed = self.layers.remove(index);
        if self.active_index >= self.layers.len() {
            self.active_index = self.layers.len() - 1;
        } else if self.active_index > index {
            self.active_index -= 1;
        }
        Ok(Some(removed))
    }

    pub fn rename(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        check_index(index, self.layers.len())?;
        self.layers[index].name = name.into();
        Ok(())
    }

    /// Move a layer to a new z position.  The active index keeps pointing at
    /// the same layer.
    pub fn move_layer(&mut self, from: usize, to: usize) -> Result<()> {
        check_index(from, self.layers.len())?;
        check_index(to, self.layers.len())?;
        if from == to {
            return Ok(());
        }
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);

        if self.active_index == from {
            self.active_index = to;
        } else if from < self.active_index && to >= self.active_index {
            self.active_index -= 1;
        } else if from > self.active_index && to <= self.active_index {
            self.active_index += 1;
        }
        Ok(())
    }

    /// Replace a layer's content with a new immutable value.
    pub fn set_content(&mut self, index: usize, content: LayerContent) -> Result<()> {
        check_index(index, self.layers.len())?;
        self.layers[index].content = content;
        Ok(())
    }

    /// A blank drawing layer that receives text becomes a text layer.
    pub fn mark_text(&mut self, index: usize) -> Result<()> {
        check_index(index, self.layers.len())?;
        let layer = &mut self.layers[index];
        if layer.kind == LayerKind::Drawing && layer.content.is_empty() {
            layer.kind = LayerKind::Text;
        }
        Ok(())
    }
}
