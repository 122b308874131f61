//! Freehand path primitive.

use super::{BrushKind, OPACITY_RANGE, PrimitiveId, Rgb, ValidationError, clamp_range};
use crate::layers::LayerId;
use kurbo::{BezPath, Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_opacity() -> f64 {
    1.0
}

fn default_smoothing() -> f64 {
    0.5
}

/// A freehand stroke (ordered series of points).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub(crate) id: PrimitiveId,
    /// Points in capture order.
    pub points: Vec<Point>,
    pub stroke_color: Rgb,
    pub stroke_width: f64,
    /// Owning layer, `None` for the default path layer.
    #[serde(default)]
    pub layer_ref: Option<LayerId>,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub brush: BrushKind,
    /// Smoothing factor in `[0, 1]`.
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
}

impl Path {
    /// Start a new path at a point.
    pub fn new(start: Point, stroke_color: Rgb, stroke_width: f64) -> Self {
        Self::from_points(vec![start], stroke_color, stroke_width)
    }

    /// Create from existing points.
    pub fn from_points(points: Vec<Point>, stroke_color: Rgb, stroke_width: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            points,
            stroke_color,
            stroke_width,
            layer_ref: None,
            opacity: 1.0,
            brush: BrushKind::Pen,
            smoothing: 0.5,
        }
    }

    /// Reconstruct a path with a known ID (for storage).
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

    pub fn with_brush(mut self, brush: BrushKind) -> Self {
        self.brush = brush;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = clamp_range(opacity, &OPACITY_RANGE);
        self
    }

    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = clamp_range(smoothing, &(0.0..=1.0));
        self
    }

    /// Add a point to the path.
    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Replace the last point, or push one if the path is empty.
    pub fn set_last_point(&mut self, point: Point) {
        match self.points.last_mut() {
            Some(last) => *last = point,
            None => self.points.push(point),
        }
    }

    /// Get the number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the path is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether this path may be sent to the plan store.
    ///
    /// Single-point paths are kept locally but never persisted.
    pub fn validate_for_persistence(&self) -> Result<(), ValidationError> {
        if self.points.is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        if !(self.stroke_width.is_finite() && self.stroke_width > 0.0) {
            return Err(ValidationError::OutOfRange {
                field: "stroke_width",
                value: self.stroke_width,
            });
        }
        if self.points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(ValidationError::NonFiniteCoordinate);
        }
        if self.points.len() < 2 {
            return Err(ValidationError::ZeroLengthPath);
        }
        Ok(())
    }

    /// Simplify the path by removing redundant points.
    pub fn simplify(&mut self, tolerance: f64) {
        if self.points.len() < 3 {
            return;
        }

        // Ramer-Douglas-Peucker algorithm
        self.points = rdp_simplify(&self.points, tolerance);
    }

    pub fn bounds(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::ZERO;
        };
        self.points
            .iter()
            .skip(1)
            .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
    }

    /// Polyline through the points.
    pub fn to_bez_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let mut points = self.points.iter();
        if let Some(first) = points.next() {
            path.move_to(*first);
            for point in points {
                path.line_to(*point);
            }
        }
        path
    }
}

/// Ramer-Douglas-Peucker line simplification.
fn rdp_simplify(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];

    let mut max_dist = 0.0;
    let mut max_index = 0;

    for (i, point) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = perpendicular_distance(*point, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_index = i;
        }
    }

    if max_dist > tolerance {
        let mut left = rdp_simplify(&points[..=max_index], tolerance);
        let right = rdp_simplify(&points[max_index..], tolerance);

        // Junction point appears in both halves
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

fn perpendicular_distance(point: Point, line_start: Point, line_end: Point) -> f64 {
    let dx = line_end.x - line_start.x;
    let dy = line_end.y - line_start.y;

    let line_len_sq = dx * dx + dy * dy;
    if line_len_sq < f64::EPSILON {
        return point.distance(line_start);
    }

    let area2 = ((point.x - line_start.x) * dy - (point.y - line_start.y) * dx).abs();
    area2 / line_len_sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blue() -> Rgb {
        Rgb::from_hex("#3b82f6").unwrap()
    }

    #[test]
    fn test_path_creation() {
        let path = Path::new(Point::new(1.0, 2.0), blue(), 4.0);
        assert_eq!(path.len(), 1);
        assert_eq!(path.opacity, 1.0);
        assert_eq!(path.brush, BrushKind::Pen);
        assert_eq!(path.smoothing, 0.5);
        assert!(path.layer_ref.is_none());
    }

    #[test]
    fn test_set_last_point() {
        let mut path = Path::from_points(vec![Point::ZERO, Point::ZERO], blue(), 2.0);
        path.set_last_point(Point::new(5.0, 5.0));
        assert_eq!(path.points, vec![Point::ZERO, Point::new(5.0, 5.0)]);
    }

    #[test]
    fn test_persistence_validation() {
        let single = Path::new(Point::ZERO, blue(), 2.0);
        assert_eq!(single.validate_for_persistence(), Err(ValidationError::ZeroLengthPath));

        let empty = Path::from_points(Vec::new(), blue(), 2.0);
        assert_eq!(empty.validate_for_persistence(), Err(ValidationError::EmptyPath));

        let zero_width = Path::from_points(vec![Point::ZERO, Point::new(1.0, 1.0)], blue(), 0.0);
        assert!(zero_width.validate_for_persistence().is_err());

        let nan = Path::from_points(vec![Point::ZERO, Point::new(f64::NAN, 1.0)], blue(), 2.0);
        assert_eq!(nan.validate_for_persistence(), Err(ValidationError::NonFiniteCoordinate));

        let ok = Path::from_points(vec![Point::ZERO, Point::new(1.0, 1.0)], blue(), 2.0);
        assert!(ok.validate_for_persistence().is_ok());
    }

    #[test]
    fn test_bounds() {
        let path = Path::from_points(
            vec![Point::new(0.0, 0.0), Point::new(100.0, 50.0), Point::new(50.0, 100.0)],
            blue(),
            2.0,
        );
        let bounds = path.bounds();
        assert!((bounds.x1 - 100.0).abs() < f64::EPSILON);
        assert!((bounds.y1 - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_simplify_keeps_endpoints() {
        let mut path = Path::from_points(
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.1),
                Point::new(2.0, 0.0),
                Point::new(3.0, 0.1),
                Point::new(4.0, 0.0),
            ],
            blue(),
            2.0,
        );
        path.simplify(0.5);
        assert_eq!(path.points, vec![Point::new(0.0, 0.0), Point::new(4.0, 0.0)]);
    }

    #[test]
    fn test_clamped_builders() {
        let path = Path::new(Point::ZERO, blue(), 2.0)
            .with_opacity(0.0)
            .with_smoothing(3.0);
        assert_eq!(path.opacity, 0.1);
        assert_eq!(path.smoothing, 1.0);
    }
}
