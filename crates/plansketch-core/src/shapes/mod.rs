//! Primitive definitions for the canvas.
//!
//! Two kinds of drawable content exist: freehand [`Path`]s and parametric
//! [`Shape`]s. Both optionally reference a layer; unreferenced primitives are
//! resolved through the layer registry's default-layer table.

mod path;
mod shape;

pub use path::Path;
pub use shape::{DEFAULT_FONT_SIZE, DEFAULT_SHAPE_SIZE, Shape};

use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for primitives.
pub type PrimitiveId = Uuid;

/// Allowed stroke widths for persisted primitives.
pub const STROKE_WIDTH_RANGE: RangeInclusive<f64> = 1.0..=50.0;
/// Allowed primitive opacity.
pub const OPACITY_RANGE: RangeInclusive<f64> = 0.1..=1.0;
/// Allowed shape rotation, in degrees.
pub const ROTATION_RANGE: RangeInclusive<f64> = -360.0..=360.0;
/// Allowed text font sizes.
pub const FONT_SIZE_RANGE: RangeInclusive<f64> = 8.0..=72.0;
/// Coordinate bounds accepted by the plan store for shapes.
pub const COORDINATE_RANGE: RangeInclusive<f64> = -1000.0..=20000.0;

/// Field-level validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid color {0:?}: expected 6 hex digits")]
    InvalidColor(String),
    #[error("path has no points")]
    EmptyPath,
    #[error("path has a single point")]
    ZeroLengthPath,
    #[error("non-finite coordinate")]
    NonFiniteCoordinate,
    #[error("{field} = {value} is outside the allowed range")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("{0:?} shapes require width and height")]
    MissingBounds(ShapeKind),
}

/// RGB color, exchanged as a `#rrggbb` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Result<Self, ValidationError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidColor(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| ValidationError::InvalidColor(hex.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Convert to a peniko color with the given alpha in `[0, 1]`.
    pub fn with_alpha(&self, alpha: f64) -> Color {
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        Color::from_rgba8(self.r, self.g, self.b, a)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Rgb {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::from_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_hex()
    }
}

impl From<Rgb> for Color {
    fn from(color: Rgb) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, 255)
    }
}

/// Brush applied to freehand paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrushKind {
    #[default]
    Pen,
    Marker,
    Highlighter,
    Eraser,
}

impl BrushKind {
    /// Effective stroke width for a configured brush size.
    pub fn stroke_width(self, brush_size: f64) -> f64 {
        match self {
            BrushKind::Pen | BrushKind::Eraser => brush_size,
            BrushKind::Marker => (brush_size * 2.0).min(*STROKE_WIDTH_RANGE.end()),
            BrushKind::Highlighter => brush_size.max(12.0),
        }
    }

    /// Effective opacity for a configured opacity.
    pub fn opacity(self, opacity: f64) -> f64 {
        match self {
            BrushKind::Highlighter => opacity.min(0.5),
            _ => opacity,
        }
    }
}

/// Stroke dash style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeStyle {
    #[default]
    Solid,
    Dashed,
}

/// Kinds of parametric shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Ellipse,
    Triangle,
    Arrow,
    Line,
    Text,
    StickyNote,
}

impl ShapeKind {
    /// Whether the kind needs an explicit width and height.
    pub fn requires_bounds(self) -> bool {
        !matches!(self, ShapeKind::Line | ShapeKind::Text)
    }

    /// Whether the kind is placed at a point rather than dragged out.
    pub fn is_point_placed(self) -> bool {
        matches!(self, ShapeKind::Text | ShapeKind::StickyNote)
    }

    pub fn all() -> &'static [ShapeKind] {
        &[
            ShapeKind::Rectangle,
            ShapeKind::Circle,
            ShapeKind::Ellipse,
            ShapeKind::Triangle,
            ShapeKind::Arrow,
            ShapeKind::Line,
            ShapeKind::Text,
            ShapeKind::StickyNote,
        ]
    }
}

/// Primitive family, used as the key of the default-layer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Path,
    Shape,
}

pub(crate) fn check_range(
    field: &'static str,
    value: f64,
    range: &RangeInclusive<f64>,
) -> Result<(), ValidationError> {
    if value.is_finite() && range.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { field, value })
    }
}

/// Clamp into a range, mapping NaN to the lower bound.
pub(crate) fn clamp_range(value: f64, range: &RangeInclusive<f64>) -> f64 {
    if value.is_nan() {
        *range.start()
    } else {
        value.clamp(*range.start(), *range.end())
    }
}
