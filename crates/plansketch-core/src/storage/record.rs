//! Wire records exchanged with the plan store.
//!
//! Field names follow the store's persisted schema (`path_data`,
//! `brush_type`, `layer_id`, `shape_type`, ...). Conversions run in both
//! directions and preserve ids.

use crate::layers::{Layer, LayerId};
use crate::shapes::{
    BrushKind, COORDINATE_RANGE, FONT_SIZE_RANGE, OPACITY_RANGE, Path, PrimitiveId, Rgb,
    STROKE_WIDTH_RANGE, Shape, ShapeKind, StrokeStyle, ValidationError, check_range, clamp_range,
};
use kurbo::Point;
use serde::{Deserialize, Serialize};

fn default_opacity() -> f64 {
    1.0
}

fn default_smoothing() -> f64 {
    0.5
}

/// A persisted freehand drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingRecord {
    pub id: PrimitiveId,
    pub path_data: Vec<Point>,
    pub stroke_color: String,
    pub stroke_width: f64,
    #[serde(default)]
    pub brush_type: BrushKind,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
    #[serde(default)]
    pub layer_id: Option<LayerId>,
}

impl DrawingRecord {
    /// Check the record against the store's column constraints.
    pub fn check(&self) -> Result<(), ValidationError> {
        Rgb::from_hex(&self.stroke_color)?;
        check_range("stroke_width", self.stroke_width, &STROKE_WIDTH_RANGE)?;
        check_range("opacity", self.opacity, &OPACITY_RANGE)?;
        if self.path_data.len() < 2 {
            return Err(ValidationError::ZeroLengthPath);
        }
        if self.path_data.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(ValidationError::NonFiniteCoordinate);
        }
        Ok(())
    }
}

impl From<&Path> for DrawingRecord {
    fn from(path: &Path) -> Self {
        Self {
            id: path.id(),
            path_data: path.points.clone(),
            stroke_color: path.stroke_color.to_hex(),
            stroke_width: clamp_range(path.stroke_width, &STROKE_WIDTH_RANGE),
            brush_type: path.brush,
            opacity: path.opacity,
            smoothing: path.smoothing,
            layer_id: path.layer_ref,
        }
    }
}

impl TryFrom<DrawingRecord> for Path {
    type Error = ValidationError;

    fn try_from(record: DrawingRecord) -> Result<Self, Self::Error> {
        let color = Rgb::from_hex(&record.stroke_color)?;
        Ok(Path::from_points(record.path_data, color, record.stroke_width)
            .with_id(record.id)
            .with_layer(record.layer_id)
            .with_brush(record.brush_type)
            .with_opacity(record.opacity)
            .with_smoothing(record.smoothing))
    }
}

/// A persisted parametric shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    pub id: PrimitiveId,
    pub shape_type: ShapeKind,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub rotation: f64,
    pub stroke_color: String,
    #[serde(default)]
    pub fill_color: Option<String>,
    pub stroke_width: f64,
    #[serde(default)]
    pub stroke_style: StrokeStyle,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub z_index: u32,
    #[serde(default)]
    pub layer_id: Option<LayerId>,
}

impl ShapeRecord {
    pub fn check(&self) -> Result<(), ValidationError> {
        Rgb::from_hex(&self.stroke_color)?;
        if let Some(fill) = &self.fill_color {
            Rgb::from_hex(fill)?;
        }
        check_range("x", self.x, &COORDINATE_RANGE)?;
        check_range("y", self.y, &COORDINATE_RANGE)?;
        check_range("stroke_width", self.stroke_width, &STROKE_WIDTH_RANGE)?;
        check_range("opacity", self.opacity, &OPACITY_RANGE)?;
        if let Some(size) = self.font_size {
            check_range("font_size", size, &FONT_SIZE_RANGE)?;
        }
        if self.shape_type.requires_bounds() && (self.width.is_none() || self.height.is_none()) {
            return Err(ValidationError::MissingBounds(self.shape_type));
        }
        Ok(())
    }
}

impl From<&Shape> for ShapeRecord {
    fn from(shape: &Shape) -> Self {
        Self {
            id: shape.id(),
            shape_type: shape.kind,
            x: shape.x,
            y: shape.y,
            width: shape.width,
            height: shape.height,
            rotation: shape.rotation,
            stroke_color: shape.stroke_color.to_hex(),
            fill_color: shape.fill_color.map(|c| c.to_hex()),
            stroke_width: shape.stroke_width,
            stroke_style: shape.stroke_style,
            opacity: shape.opacity,
            text: shape.text.clone(),
            font_size: shape.font_size,
            font_family: shape.font_family.clone(),
            z_index: shape.z_index,
            layer_id: shape.layer_ref,
        }
    }
}

impl TryFrom<ShapeRecord> for Shape {
    type Error = ValidationError;

    fn try_from(record: ShapeRecord) -> Result<Self, Self::Error> {
        let mut shape = Shape::new(record.shape_type, record.x, record.y).with_id(record.id);
        shape.width = record.width;
        shape.height = record.height;
        shape.rotation = record.rotation;
        shape.stroke_color = Rgb::from_hex(&record.stroke_color)?;
        shape.fill_color = record.fill_color.as_deref().map(Rgb::from_hex).transpose()?;
        shape.stroke_width = record.stroke_width;
        shape.stroke_style = record.stroke_style;
        shape.opacity = record.opacity;
        shape.text = record.text;
        shape.font_size = record.font_size;
        shape.font_family = record.font_family;
        shape.z_index = record.z_index;
        shape.layer_ref = record.layer_id;
        Ok(shape.clamped())
    }
}

/// A persisted layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub id: LayerId,
    pub name: String,
    pub z_index: u32,
    pub opacity: f64,
    pub visible: bool,
    pub locked: bool,
}

impl From<&Layer> for LayerRecord {
    fn from(layer: &Layer) -> Self {
        Self {
            id: layer.id,
            name: layer.name.clone(),
            z_index: layer.z_index,
            opacity: layer.opacity,
            visible: layer.visible,
            locked: layer.locked,
        }
    }
}

impl From<LayerRecord> for Layer {
    fn from(record: LayerRecord) -> Self {
        Layer {
            id: record.id,
            name: record.name,
            z_index: record.z_index,
            opacity: clamp_range(record.opacity, &(0.0..=1.0)),
            visible: record.visible,
            locked: record.locked,
        }
    }
}

/// Records for every path the store would accept.
///
/// Empty, single-point, zero-width and non-finite paths stay local.
pub fn persistable_drawings(paths: &[Path]) -> Vec<DrawingRecord> {
    paths
        .iter()
        .filter(|path| match path.validate_for_persistence() {
            Ok(()) => true,
            Err(err) => {
                log::debug!("Skipping path {} on save: {}", path.id(), err);
                false
            }
        })
        .map(DrawingRecord::from)
        .collect()
}

/// Records for every shape that passes the store constraints.
pub fn persistable_shapes(shapes: &[Shape]) -> Vec<ShapeRecord> {
    shapes
        .iter()
        .filter(|shape| match shape.validate() {
            Ok(()) => true,
            Err(err) => {
                log::warn!("Dropping invalid {:?} shape {} on save: {}", shape.kind, shape.id(), err);
                false
            }
        })
        .map(ShapeRecord::from)
        .collect()
}

/// Convert loaded drawings, skipping any that fail to decode.
pub fn paths_from_records(records: Vec<DrawingRecord>) -> Vec<Path> {
    records
        .into_iter()
        .filter_map(|record| {
            let id = record.id;
            Path::try_from(record)
                .map_err(|err| log::warn!("Ignoring stored drawing {id}: {err}"))
                .ok()
        })
        .collect()
}

/// Convert loaded shapes, skipping any that fail to decode.
pub fn shapes_from_records(records: Vec<ShapeRecord>) -> Vec<Shape> {
    records
        .into_iter()
        .filter_map(|record| {
            let id = record.id;
            Shape::try_from(record)
                .map_err(|err| log::warn!("Ignoring stored shape {id}: {err}"))
                .ok()
        })
        .collect()
}
