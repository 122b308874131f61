//! Plan document and editing session state.

use crate::layers::{LayerError, LayerId, LayerRegistry};
use crate::shapes::{Path, PrimitiveId, PrimitiveKind, Shape};
use crate::storage::Destination;
use crate::tools::{Preview, ToolKind, ToolManager, ToolOutput};
use kurbo::Point;
use thiserror::Error;

/// Maximum number of shapes the plan store accepts per layer.
pub const MAX_SHAPES_PER_LAYER: usize = 500;

/// Default title for a fresh plan.
pub const DEFAULT_TITLE: &str = "Untitled Plan";

/// Reasons an edit was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CanvasError {
    #[error("layer {0} is locked")]
    LayerLocked(LayerId),
    #[error("layer {0} is hidden")]
    LayerHidden(LayerId),
    #[error("layer {0} already holds 500 shapes")]
    ShapeLimit(LayerId),
}

/// All primitives, layers and destinations of one plan.
#[derive(Debug, Clone)]
pub struct PlanDocument {
    pub title: String,
    /// Freehand paths in commit order.
    pub paths: Vec<Path>,
    /// Parametric shapes in commit order.
    pub shapes: Vec<Shape>,
    pub layers: LayerRegistry,
    pub destinations: Vec<Destination>,
}

impl Default for PlanDocument {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE)
    }
}

impl PlanDocument {
    /// Create an empty plan with the protected layers.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            paths: Vec::new(),
            shapes: Vec::new(),
            layers: LayerRegistry::with_defaults(),
            destinations: Vec::new(),
        }
    }

    /// Append a sealed path.
    pub fn add_path(&mut self, path: Path) -> PrimitiveId {
        let id = path.id();
        self.paths.push(path);
        id
    }

    /// Append a shape on top of its layer.
    pub fn add_shape(&mut self, mut shape: Shape) -> Result<PrimitiveId, CanvasError> {
        let layer = self.layers.resolve(shape.layer_ref, PrimitiveKind::Shape);
        let on_layer: Vec<&Shape> = self
            .shapes
            .iter()
            .filter(|s| self.layers.resolve(s.layer_ref, PrimitiveKind::Shape) == layer)
            .collect();
        if let Some(layer) = layer {
            if on_layer.len() >= MAX_SHAPES_PER_LAYER {
                return Err(CanvasError::ShapeLimit(layer));
            }
        }
        shape.z_index = on_layer.iter().map(|s| s.z_index + 1).max().unwrap_or(0);
        let id = shape.id();
        self.shapes.push(shape);
        Ok(id)
    }

    /// Replace the whole shape set.
    pub fn replace_shapes(&mut self, shapes: Vec<Shape>) {
        self.shapes = shapes;
    }

    /// Remove every primitive. Layers and destinations are kept.
    pub fn clear(&mut self) {
        self.paths.clear();
        self.shapes.clear();
    }

    /// Delete a layer, nulling primitive references to it.
    ///
    /// Returns the number of primitives whose reference was cleared.
    pub fn delete_layer(&mut self, id: LayerId) -> Result<usize, LayerError> {
        self.layers.delete_layer(id)?;
        let mut cleared = 0;
        for path in self.paths.iter_mut().filter(|p| p.layer_ref == Some(id)) {
            path.layer_ref = None;
            cleared += 1;
        }
        for shape in self.shapes.iter_mut().filter(|s| s.layer_ref == Some(id)) {
            shape.layer_ref = None;
            cleared += 1;
        }
        Ok(cleared)
    }

    /// Paths resolved to a layer, in commit order.
    pub fn paths_on(&self, layer: LayerId) -> impl Iterator<Item = &Path> {
        self.paths
            .iter()
            .filter(move |p| self.layers.resolve(p.layer_ref, PrimitiveKind::Path) == Some(layer))
    }

    /// Shapes resolved to a layer, ascending by z-index (stable).
    pub fn shapes_on(&self, layer: LayerId) -> Vec<&Shape> {
        let mut shapes: Vec<&Shape> = self
            .shapes
            .iter()
            .filter(|s| self.layers.resolve(s.layer_ref, PrimitiveKind::Shape) == Some(layer))
            .collect();
        shapes.sort_by_key(|s| s.z_index);
        shapes
    }

    /// Total number of primitives.
    pub fn len(&self) -> usize {
        self.paths.len() + self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.shapes.is_empty()
    }
}

/// What happened in response to a pointer event.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    None,
    /// Stroke just this segment of the in-progress path.
    PreviewSegment { from: Point, to: Point },
    /// Recomposite the whole surface.
    Recomposite,
    /// A path was committed to the document.
    PathCommitted(PrimitiveId),
    /// A shape was committed to the document.
    ShapeCommitted(PrimitiveId),
    /// The destination-marker collaborator should open here.
    MarkerRequested(Point),
    /// The event was refused.
    Rejected(CanvasError),
}

impl CanvasEvent {
    /// Whether the document gained a primitive that should be persisted.
    pub fn is_commit(&self) -> bool {
        matches!(self, CanvasEvent::PathCommitted(_) | CanvasEvent::ShapeCommitted(_))
    }
}

/// Runtime editing session (not persisted).
#[derive(Debug, Clone, Default)]
pub struct Canvas {
    /// The plan being edited.
    pub document: PlanDocument,
    /// Tool manager.
    pub tools: ToolManager,
    /// Layer new primitives are drawn onto; `None` uses the default layers.
    pub active_layer: Option<LayerId>,
    /// Simplify sealed freehand paths by their smoothing factor.
    pub simplify_paths: bool,
}

impl Canvas {
    /// Create a canvas with an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a canvas with an existing document.
    pub fn with_document(document: PlanDocument) -> Self {
        Self { document, ..Self::default() }
    }

    /// Set the current tool.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tools.set_tool(tool);
    }

    pub fn set_active_layer(&mut self, layer: Option<LayerId>) {
        self.active_layer = layer;
    }

    /// Preview of the interaction in progress.
    pub fn preview(&self) -> Option<Preview<'_>> {
        self.tools.preview()
    }

    pub fn pointer_down(&mut self, point: Point) -> CanvasEvent {
        let kind = match self.tools.tool() {
            ToolKind::Pen | ToolKind::Line => Some(PrimitiveKind::Path),
            ToolKind::Shape(_) => Some(PrimitiveKind::Shape),
            ToolKind::Select | ToolKind::DestinationMarker => None,
        };
        let refused = kind
            .and_then(|kind| self.document.layers.resolve(self.active_layer, kind))
            .and_then(|layer| self.check_editable(layer).err());
        if let Some(err) = refused {
            log::debug!("pointer down refused: {}", err);
            return CanvasEvent::Rejected(err);
        }
        let layer = self
            .active_layer
            .filter(|id| self.document.layers.get(*id).is_some());
        let output = self.tools.pointer_down(point, layer);
        self.apply(output)
    }

    pub fn pointer_move(&mut self, point: Point) -> CanvasEvent {
        let output = self.tools.pointer_move(point);
        self.apply(output)
    }

    pub fn pointer_up(&mut self, point: Point) -> CanvasEvent {
        let output = self.tools.pointer_up(point);
        self.apply(output)
    }

    /// Pointer left the surface; treated as pointer up.
    pub fn pointer_leave(&mut self) -> CanvasEvent {
        let output = self.tools.pointer_leave();
        self.apply(output)
    }

    /// Close the destination-marker interaction, returning its position.
    pub fn finish_marker(&mut self) -> Option<Point> {
        self.tools.finish_marker()
    }

    fn check_editable(&self, layer: LayerId) -> Result<(), CanvasError> {
        match self.document.layers.get(layer) {
            Some(l) if l.locked => Err(CanvasError::LayerLocked(layer)),
            Some(l) if !l.visible => Err(CanvasError::LayerHidden(layer)),
            _ => Ok(()),
        }
    }

    fn apply(&mut self, output: ToolOutput) -> CanvasEvent {
        match output {
            ToolOutput::None => CanvasEvent::None,
            ToolOutput::Segment { from, to } => CanvasEvent::PreviewSegment { from, to },
            ToolOutput::Recomposite => CanvasEvent::Recomposite,
            ToolOutput::SealedPath(mut path) => {
                if self.simplify_paths && path.smoothing > 0.0 {
                    let tolerance = path.smoothing;
                    path.simplify(tolerance);
                }
                CanvasEvent::PathCommitted(self.document.add_path(path))
            }
            ToolOutput::PlacedShape(shape) => match self.document.add_shape(shape) {
                Ok(id) => CanvasEvent::ShapeCommitted(id),
                Err(err) => {
                    log::warn!("shape not placed: {}", err);
                    CanvasEvent::Rejected(err)
                }
            },
            ToolOutput::MarkerRequested(point) => CanvasEvent::MarkerRequested(point),
        }
    }
}
