//! Parametric shape primitive.

use super::{
    COORDINATE_RANGE, FONT_SIZE_RANGE, OPACITY_RANGE, PrimitiveId, ROTATION_RANGE,
    STROKE_WIDTH_RANGE, Rgb, ShapeKind, StrokeStyle, ValidationError, check_range, clamp_range,
};
use crate::layers::LayerId;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Size used when a shape is placed with a click rather than a drag.
pub const DEFAULT_SHAPE_SIZE: f64 = 100.0;
/// Default font size for text and sticky notes.
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// A parametric shape.
///
/// `(x, y)` is the top-left corner for box kinds, the start point for lines
/// and arrows (whose `width`/`height` are the extent to the end point), and
/// the text origin for text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub(crate) id: PrimitiveId,
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// Rotation in degrees around the bounding-box center.
    #[serde(default)]
    pub rotation: f64,
    pub stroke_color: Rgb,
    pub fill_color: Option<Rgb>,
    pub stroke_width: f64,
    #[serde(default)]
    pub stroke_style: StrokeStyle,
    pub opacity: f64,
    pub text: Option<String>,
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    #[serde(default)]
    pub z_index: u32,
    #[serde(default)]
    pub layer_ref: Option<LayerId>,
}

impl Shape {
    /// Create a shape of the given kind at a point with default styling.
    pub fn new(kind: ShapeKind, x: f64, y: f64) -> Self {
        let (width, height) = if kind.requires_bounds() {
            (Some(DEFAULT_SHAPE_SIZE), Some(DEFAULT_SHAPE_SIZE))
        } else if kind == ShapeKind::Line {
            (Some(DEFAULT_SHAPE_SIZE), Some(0.0))
        } else {
            (None, None)
        };
        let text_like = matches!(kind, ShapeKind::Text | ShapeKind::StickyNote);
        Self {
            id: Uuid::new_v4(),
            kind,
            x,
            y,
            width,
            height,
            rotation: 0.0,
            stroke_color: Rgb::black(),
            fill_color: (kind == ShapeKind::StickyNote).then(|| Rgb::new(0xfe, 0xf0, 0x8a)),
            stroke_width: 2.0,
            stroke_style: StrokeStyle::Solid,
            opacity: 1.0,
            text: text_like.then(String::new),
            font_size: text_like.then_some(DEFAULT_FONT_SIZE),
            font_family: None,
            z_index: 0,
            layer_ref: None,
        }
    }

    /// Create a shape spanning a drag from `anchor` to `release`.
    ///
    /// Box kinds are normalized to a positive extent; lines and arrows keep
    /// their direction. Point-placed kinds ignore the release point.
    pub fn from_drag(kind: ShapeKind, anchor: Point, release: Point) -> Self {
        if kind.is_point_placed() {
            return Self::new(kind, anchor.x, anchor.y);
        }
        let mut shape = Self::new(kind, anchor.x, anchor.y);
        let dx = release.x - anchor.x;
        let dy = release.y - anchor.y;
        let dragged = dx.abs() > f64::EPSILON || dy.abs() > f64::EPSILON;
        match kind {
            ShapeKind::Line | ShapeKind::Arrow => {
                if dragged {
                    shape.width = Some(dx);
                    shape.height = Some(dy);
                } else {
                    shape.width = Some(DEFAULT_SHAPE_SIZE);
                    shape.height = Some(0.0);
                }
            }
            _ if dragged => {
                let rect = Rect::from_points(anchor, release);
                shape.x = rect.x0;
                shape.y = rect.y0;
                shape.width = Some(rect.width());
                shape.height = Some(rect.height());
            }
            _ => {}
        }
        shape
    }

    /// Reconstruct a shape with a known ID (for storage).
    pub(crate) fn with_id(mut self, id: PrimitiveId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> PrimitiveId {
        self.id
    }

    pub fn with_layer(mut self, layer: Option<LayerId>) -> Self {
        self.layer_ref = layer;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        if self.font_size.is_none() {
            self.font_size = Some(DEFAULT_FONT_SIZE);
        }
        self
    }

    /// Clamp numeric fields into their allowed ranges.
    pub fn clamped(mut self) -> Self {
        self.rotation = clamp_range(self.rotation, &ROTATION_RANGE);
        self.stroke_width = clamp_range(self.stroke_width, &STROKE_WIDTH_RANGE);
        self.opacity = clamp_range(self.opacity, &OPACITY_RANGE);
        self.font_size = self.font_size.map(|s| clamp_range(s, &FONT_SIZE_RANGE));
        self
    }

    /// Start and end points for line-like kinds.
    pub fn endpoints(&self) -> (Point, Point) {
        let start = Point::new(self.x, self.y);
        let end = Point::new(
            self.x + self.width.unwrap_or(0.0),
            self.y + self.height.unwrap_or(0.0),
        );
        (start, end)
    }

    /// Axis-aligned bounding box before rotation.
    pub fn bounds(&self) -> Rect {
        match self.kind {
            ShapeKind::Line | ShapeKind::Arrow => {
                let (a, b) = self.endpoints();
                Rect::from_points(a, b)
            }
            ShapeKind::Text => {
                let size = self.font_size.unwrap_or(DEFAULT_FONT_SIZE);
                let chars = self.text.as_deref().map_or(0, |t| t.chars().count()) as f64;
                let width = self.width.unwrap_or(chars * size * 0.6);
                let height = self.height.unwrap_or(size * 1.2);
                Rect::new(self.x, self.y, self.x + width, self.y + height)
            }
            _ => Rect::new(
                self.x,
                self.y,
                self.x + self.width.unwrap_or(0.0),
                self.y + self.height.unwrap_or(0.0),
            ),
        }
    }

    /// Rotation pivot (center of the bounding box).
    pub fn pivot(&self) -> Point {
        self.bounds().center()
    }

    /// Check the shape against the plan store's constraints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("x", self.x, &COORDINATE_RANGE)?;
        check_range("y", self.y, &COORDINATE_RANGE)?;
        if self.kind.requires_bounds() && (self.width.is_none() || self.height.is_none()) {
            return Err(ValidationError::MissingBounds(self.kind));
        }
        for (field, value) in [("width", self.width), ("height", self.height)] {
            match value {
                Some(v) if !v.is_finite() => {
                    return Err(ValidationError::OutOfRange { field, value: v });
                }
                _ => {}
            }
        }
        check_range("rotation", self.rotation, &ROTATION_RANGE)?;
        check_range("stroke_width", self.stroke_width, &STROKE_WIDTH_RANGE)?;
        check_range("opacity", self.opacity, &OPACITY_RANGE)?;
        if let Some(size) = self.font_size {
            check_range("font_size", size, &FONT_SIZE_RANGE)?;
        }
        Ok(())
    }
}
