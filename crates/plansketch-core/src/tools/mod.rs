//! Tool state machine.
//!
//! Turns pointer down/move/up sequences into path and shape primitives.

use crate::layers::LayerId;
use crate::shapes::{
    BrushKind, OPACITY_RANGE, Path, Rgb, STROKE_WIDTH_RANGE, Shape, ShapeKind, StrokeStyle,
};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    Select,
    /// Freehand drawing with the configured brush.
    #[default]
    Pen,
    /// Straight two-point path.
    Line,
    /// Parametric shape placement.
    Shape(ShapeKind),
    DestinationMarker,
}

/// Session-scoped tool settings. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub tool: ToolKind,
    pub stroke_color: Rgb,
    pub fill_color: Option<Rgb>,
    pub brush_size: f64,
    pub opacity: f64,
    pub brush: BrushKind,
    pub stroke_style: StrokeStyle,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            tool: ToolKind::Pen,
            stroke_color: Rgb::new(0x3b, 0x82, 0xf6),
            fill_color: None,
            brush_size: 4.0,
            opacity: 1.0,
            brush: BrushKind::Pen,
            stroke_style: StrokeStyle::Solid,
        }
    }
}

impl ToolConfig {
    /// Clamp brush size and opacity into their allowed ranges.
    pub fn normalized(mut self) -> Self {
        self.brush_size = self.brush_size.clamp(*STROKE_WIDTH_RANGE.start(), *STROKE_WIDTH_RANGE.end());
        self.opacity = self.opacity.clamp(*OPACITY_RANGE.start(), *OPACITY_RANGE.end());
        self
    }
}

/// State of a tool interaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ToolState {
    #[default]
    Idle,
    /// A pen or line path is being captured.
    CapturingPath { path: Path, tool: ToolKind },
    /// A shape is being dragged out from its anchor.
    PlacingShape { kind: ShapeKind, anchor: Point, current: Point, layer: Option<LayerId> },
    /// Waiting for the destination-marker collaborator to finish.
    PlacingMarker { at: Point },
}

/// What the caller must do after a pointer event.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Nothing changed.
    None,
    /// Stroke only the newest segment of the captured path.
    Segment { from: Point, to: Point },
    /// Recomposite the whole surface (preview changed).
    Recomposite,
    /// A path was sealed and must be committed.
    SealedPath(Path),
    /// A shape was placed and must be committed.
    PlacedShape(Shape),
    /// The marker collaborator should be opened at this point.
    MarkerRequested(Point),
}

/// In-progress primitive to draw on top of committed content.
#[derive(Debug, Clone, PartialEq)]
pub enum Preview<'a> {
    Path(&'a Path),
    Shape(Shape),
}

/// Manages the current tool and its state.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    pub config: ToolConfig,
    state: ToolState,
}

impl ToolManager {
    /// Create a new tool manager.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ToolConfig) -> Self {
        Self { config: config.normalized(), state: ToolState::Idle }
    }

    pub fn tool(&self) -> ToolKind {
        self.config.tool
    }

    pub fn state(&self) -> &ToolState {
        &self.state
    }

    /// Set the current tool, abandoning any interaction in progress.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.config.tool = tool;
        self.state = ToolState::Idle;
    }

    /// Check if a tool interaction is active.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, ToolState::Idle)
    }

    /// Begin an interaction. Ignored unless idle.
    pub fn pointer_down(&mut self, point: Point, layer: Option<LayerId>) -> ToolOutput {
        if self.is_active() {
            return ToolOutput::None;
        }
        match self.config.tool {
            ToolKind::Pen => {
                let path = self.new_path(vec![point], layer);
                self.state = ToolState::CapturingPath { path, tool: ToolKind::Pen };
                ToolOutput::Segment { from: point, to: point }
            }
            ToolKind::Line => {
                let path = self.new_path(vec![point, point], layer);
                self.state = ToolState::CapturingPath { path, tool: ToolKind::Line };
                ToolOutput::Recomposite
            }
            ToolKind::Shape(kind) => {
                self.state = ToolState::PlacingShape { kind, anchor: point, current: point, layer };
                ToolOutput::Recomposite
            }
            ToolKind::DestinationMarker => {
                self.state = ToolState::PlacingMarker { at: point };
                ToolOutput::MarkerRequested(point)
            }
            ToolKind::Select => ToolOutput::None,
        }
    }

    /// Update the current interaction.
    pub fn pointer_move(&mut self, point: Point) -> ToolOutput {
        match &mut self.state {
            ToolState::CapturingPath { path, tool: ToolKind::Line } => {
                path.set_last_point(point);
                ToolOutput::Recomposite
            }
            ToolState::CapturingPath { path, .. } => {
                let from = path.points.last().copied().unwrap_or(point);
                path.add_point(point);
                log::trace!("pen segment {:?} -> {:?}", from, point);
                ToolOutput::Segment { from, to: point }
            }
            ToolState::PlacingShape { current, .. } => {
                *current = point;
                ToolOutput::Recomposite
            }
            ToolState::Idle | ToolState::PlacingMarker { .. } => ToolOutput::None,
        }
    }

    /// End the current interaction and return any created primitive.
    pub fn pointer_up(&mut self, point: Point) -> ToolOutput {
        match std::mem::take(&mut self.state) {
            ToolState::CapturingPath { path, .. } => ToolOutput::SealedPath(path),
            ToolState::PlacingShape { kind, anchor, layer, .. } => {
                ToolOutput::PlacedShape(self.build_shape(kind, anchor, point, layer))
            }
            marker @ ToolState::PlacingMarker { .. } => {
                // The marker stays pending until the collaborator finishes.
                self.state = marker;
                ToolOutput::None
            }
            ToolState::Idle => ToolOutput::None,
        }
    }

    /// Pointer left the surface: seal whatever was captured.
    pub fn pointer_leave(&mut self) -> ToolOutput {
        let last = match &self.state {
            ToolState::PlacingShape { current, .. } => *current,
            ToolState::CapturingPath { path, .. } => path.points.last().copied().unwrap_or_default(),
            _ => return ToolOutput::None,
        };
        self.pointer_up(last)
    }

    /// The marker collaborator finished (or was dismissed).
    pub fn finish_marker(&mut self) -> Option<Point> {
        match std::mem::take(&mut self.state) {
            ToolState::PlacingMarker { at } => Some(at),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Cancel the current interaction.
    pub fn cancel(&mut self) {
        self.state = ToolState::Idle;
    }

    /// Get the preview primitive for the current interaction.
    pub fn preview(&self) -> Option<Preview<'_>> {
        match &self.state {
            ToolState::CapturingPath { path, .. } => Some(Preview::Path(path)),
            ToolState::PlacingShape { kind, anchor, current, layer } => {
                Some(Preview::Shape(self.build_shape(*kind, *anchor, *current, *layer)))
            }
            _ => None,
        }
    }

    fn new_path(&self, points: Vec<Point>, layer: Option<LayerId>) -> Path {
        let config = &self.config;
        let brush = config.brush;
        Path::from_points(points, config.stroke_color, brush.stroke_width(config.brush_size))
            .with_brush(brush)
            .with_opacity(brush.opacity(config.opacity))
            .with_layer(layer)
    }

    fn build_shape(&self, kind: ShapeKind, anchor: Point, release: Point, layer: Option<LayerId>) -> Shape {
        let config = &self.config;
        let mut shape = Shape::from_drag(kind, anchor, release).with_layer(layer);
        shape.stroke_color = config.stroke_color;
        shape.stroke_width = config.brush_size;
        shape.stroke_style = config.stroke_style;
        shape.opacity = config.opacity;
        if config.fill_color.is_some() {
            shape.fill_color = config.fill_color;
        }
        shape.clamped()
    }
}
