//! Layer registry.
//!
//! Layers own no drawing content. Primitives reference a layer by id and the
//! reference is resolved at composite time; a missing or dangling reference
//! falls back to the default layer for the primitive's kind.

use crate::shapes::PrimitiveKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for layers.
pub type LayerId = Uuid;

/// Maximum number of layers in a plan.
pub const MAX_LAYERS: usize = 20;
/// Highest allowed z-index.
pub const MAX_Z_INDEX: u32 = 100;
/// Maximum layer name length, in characters.
pub const MAX_LAYER_NAME_LEN: usize = 50;

pub const BACKGROUND_LAYER: &str = "Background";
pub const ROUTES_LAYER: &str = "Routes";
pub const DESTINATIONS_LAYER: &str = "Destinations";

/// Layers created for every new plan, bottom to top. None of them can be deleted.
pub const PROTECTED_LAYERS: [&str; 3] = [BACKGROUND_LAYER, ROUTES_LAYER, DESTINATIONS_LAYER];

/// Layer registry errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerError {
    #[error("layer {0:?} is protected")]
    Protected(String),
    #[error("layer not found: {0}")]
    NotFound(LayerId),
    #[error("invalid layer name {0:?}")]
    InvalidName(String),
    #[error("z-index {0} is already used by another layer")]
    DuplicateZIndex(u32),
    #[error("z-index {0} is outside 0..=100")]
    ZIndexOutOfRange(u32),
    #[error("a plan holds at most 20 layers")]
    LimitReached,
}

/// A named, ordered grouping of primitives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub z_index: u32,
    pub opacity: f64,
    pub visible: bool,
    pub locked: bool,
}

impl Layer {
    /// Create a visible, unlocked, fully opaque layer.
    pub fn new(name: impl Into<String>, z_index: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            z_index,
            opacity: 1.0,
            visible: true,
            locked: false,
        }
    }

    pub fn is_protected(&self) -> bool {
        PROTECTED_LAYERS.contains(&self.name.as_str())
    }
}

/// Partial update applied by [`LayerRegistry::update_layer`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerPatch {
    pub name: Option<String>,
    pub z_index: Option<u32>,
    pub opacity: Option<f64>,
    pub visible: Option<bool>,
    pub locked: Option<bool>,
}

impl LayerPatch {
    pub fn visible(visible: bool) -> Self {
        Self { visible: Some(visible), ..Self::default() }
    }

    pub fn locked(locked: bool) -> Self {
        Self { locked: Some(locked), ..Self::default() }
    }

    pub fn opacity(opacity: f64) -> Self {
        Self { opacity: Some(opacity), ..Self::default() }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn z_index(z_index: u32) -> Self {
        Self { z_index: Some(z_index), ..Self::default() }
    }
}

/// Check a layer name: 1 to 50 letters, digits, spaces, hyphens or underscores.
pub fn validate_layer_name(name: &str) -> Result<(), LayerError> {
    let len = name.chars().count();
    let valid_chars = name
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_');
    if name.trim().is_empty() || len > MAX_LAYER_NAME_LEN || !valid_chars {
        return Err(LayerError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Default layer per primitive kind, bound by id.
///
/// Bound by name once when the registry is populated, so later renames do not
/// orphan unreferenced primitives.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DefaultLayers {
    pub path: Option<LayerId>,
    pub shape: Option<LayerId>,
}

impl DefaultLayers {
    pub fn get(&self, kind: PrimitiveKind) -> Option<LayerId> {
        match kind {
            PrimitiveKind::Path => self.path,
            PrimitiveKind::Shape => self.shape,
        }
    }
}

/// Ordered collection of a plan's layers.
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    layers: Vec<Layer>,
    defaults: DefaultLayers,
}

impl LayerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the protected layers.
    pub fn with_defaults() -> Self {
        let layers = PROTECTED_LAYERS
            .iter()
            .zip(0u32..)
            .map(|(name, z)| Layer::new(*name, z))
            .collect();
        Self::from_layers(layers)
    }

    /// Hydrate from stored layers and bind the default-layer table.
    pub fn from_layers(layers: Vec<Layer>) -> Self {
        let mut registry = Self { layers, defaults: DefaultLayers::default() };
        registry.bind_defaults();
        registry
    }

    fn bind_defaults(&mut self) {
        let by_name = |name: &str| self.layers.iter().find(|l| l.name == name).map(|l| l.id);
        self.defaults = DefaultLayers {
            path: by_name(ROUTES_LAYER),
            shape: by_name(BACKGROUND_LAYER),
        };
    }

    pub fn defaults(&self) -> DefaultLayers {
        self.defaults
    }

    pub fn default_layer_for(&self, kind: PrimitiveKind) -> Option<LayerId> {
        self.defaults.get(kind)
    }

    /// Resolve a primitive's layer reference, falling back to the default
    /// layer for its kind when the reference is unset or dangling.
    pub fn resolve(&self, layer_ref: Option<LayerId>, kind: PrimitiveKind) -> Option<LayerId> {
        match layer_ref {
            Some(id) if self.get(id).is_some() => Some(id),
            _ => self.default_layer_for(kind),
        }
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// All layers in ascending z-order.
    pub fn ordered(&self) -> Vec<&Layer> {
        let mut layers: Vec<&Layer> = self.layers.iter().collect();
        layers.sort_by_key(|l| l.z_index);
        layers
    }

    /// Visible layers in ascending z-order.
    pub fn visible_in_order(&self) -> Vec<&Layer> {
        let mut layers = self.ordered();
        layers.retain(|l| l.visible);
        layers
    }

    /// Lowest and highest z-index in use.
    pub fn z_bounds(&self) -> Option<(u32, u32)> {
        let min = self.layers.iter().map(|l| l.z_index).min()?;
        let max = self.layers.iter().map(|l| l.z_index).max()?;
        Some((min, max))
    }

    pub fn can_move_up(&self, id: LayerId) -> bool {
        match (self.get(id), self.z_bounds()) {
            (Some(layer), Some((_, max))) => layer.z_index < max,
            _ => false,
        }
    }

    pub fn can_move_down(&self, id: LayerId) -> bool {
        match (self.get(id), self.z_bounds()) {
            (Some(layer), Some((min, _))) => layer.z_index > min,
            _ => false,
        }
    }

    /// Whether new content can be drawn onto the layer.
    pub fn is_editable(&self, id: LayerId) -> bool {
        self.get(id).is_some_and(|l| l.visible && !l.locked)
    }

    /// Add a layer above all existing ones.
    pub fn add_layer(&mut self, name: &str) -> Result<&Layer, LayerError> {
        validate_layer_name(name)?;
        if PROTECTED_LAYERS.contains(&name) {
            return Err(LayerError::Protected(name.to_string()));
        }
        if self.layers.len() >= MAX_LAYERS {
            return Err(LayerError::LimitReached);
        }
        let z_index = self.z_bounds().map_or(0, |(_, max)| max + 1);
        if z_index > MAX_Z_INDEX {
            return Err(LayerError::ZIndexOutOfRange(z_index));
        }
        self.layers.push(Layer::new(name, z_index));
        let index = self.layers.len() - 1;
        if self.defaults.path.is_none() || self.defaults.shape.is_none() {
            self.bind_defaults();
        }
        Ok(&self.layers[index])
    }

    /// Remove a layer. Protected layers are rejected.
    pub fn delete_layer(&mut self, id: LayerId) -> Result<Layer, LayerError> {
        let index = self
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or(LayerError::NotFound(id))?;
        if self.layers[index].is_protected() {
            return Err(LayerError::Protected(self.layers[index].name.clone()));
        }
        Ok(self.layers.remove(index))
    }

    /// Apply a partial update. A rejected patch leaves the layer unchanged.
    pub fn update_layer(&mut self, id: LayerId, patch: &LayerPatch) -> Result<&Layer, LayerError> {
        let index = self
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or(LayerError::NotFound(id))?;

        if let Some(name) = &patch.name {
            validate_layer_name(name)?;
            let current = &self.layers[index];
            if *name != current.name {
                if current.is_protected() {
                    return Err(LayerError::Protected(current.name.clone()));
                }
                if PROTECTED_LAYERS.contains(&name.as_str()) {
                    return Err(LayerError::Protected(name.clone()));
                }
            }
        }
        if let Some(z) = patch.z_index {
            if z > MAX_Z_INDEX {
                return Err(LayerError::ZIndexOutOfRange(z));
            }
            if self.layers.iter().any(|l| l.id != id && l.z_index == z) {
                return Err(LayerError::DuplicateZIndex(z));
            }
        }

        let layer = &mut self.layers[index];
        if let Some(name) = &patch.name {
            layer.name = name.clone();
        }
        if let Some(z) = patch.z_index {
            layer.z_index = z;
        }
        if let Some(opacity) = patch.opacity {
            layer.opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
        }
        if let Some(visible) = patch.visible {
            layer.visible = visible;
        }
        if let Some(locked) = patch.locked {
            layer.locked = locked;
        }
        Ok(&self.layers[index])
    }

    /// Move a layer one step towards the front.
    /// Returns true if the layer moved, false if already at the top.
    pub fn move_layer_up(&mut self, id: LayerId) -> Result<bool, LayerError> {
        self.shift_layer(id, 1)
    }

    /// Move a layer one step towards the back.
    /// Returns true if the layer moved, false if already at the bottom.
    pub fn move_layer_down(&mut self, id: LayerId) -> Result<bool, LayerError> {
        self.shift_layer(id, -1)
    }

    fn shift_layer(&mut self, id: LayerId, step: i64) -> Result<bool, LayerError> {
        let current = self.get(id).ok_or(LayerError::NotFound(id))?.z_index;
        let Some((min, max)) = self.z_bounds() else {
            return Ok(false);
        };
        let candidate = (i64::from(current) + step).clamp(i64::from(min), i64::from(max)) as u32;
        if candidate == current {
            return Ok(false);
        }

        // An occupied candidate slot is swapped with its holder.
        if let Some(other) = self.layers.iter_mut().find(|l| l.z_index == candidate) {
            other.z_index = current;
        }
        self.update_layer(id, &LayerPatch::z_index(candidate))?;
        Ok(true)
    }

    /// Snapshot of all layers (unordered).
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
}
