//! Layer compositor.
//!
//! [`composite`] is a pure function of the plan's primitives and layers:
//! every trigger (commit, layer change, reload, resize) redraws through it.

use crate::surface::{Blend, StrokeParams, Surface};
use kurbo::{Affine, BezPath, Circle, Ellipse, Point, Rect, Shape as _, Vec2};
use plansketch_core::canvas::PlanDocument;
use plansketch_core::layers::LayerId;
use plansketch_core::shapes::{
    BrushKind, DEFAULT_FONT_SIZE, Path, PrimitiveKind, Shape, ShapeKind, StrokeStyle,
};
use plansketch_core::tools::Preview;

/// Tolerance used when converting analytic shapes to paths.
const PATH_TOLERANCE: f64 = 0.1;
/// Arrowhead length relative to the stroke width.
const ARROW_HEAD_SCALE: f64 = 4.0;
const MIN_ARROW_HEAD: f64 = 10.0;
/// Inset of sticky-note text from the note's corner.
const NOTE_PADDING: f64 = 8.0;

/// What to draw: the document plus an optional in-progress preview.
#[derive(Debug, Clone)]
pub struct Scene<'a> {
    pub document: &'a PlanDocument,
    pub preview: Option<Preview<'a>>,
}

impl<'a> Scene<'a> {
    pub fn new(document: &'a PlanDocument) -> Self {
        Self { document, preview: None }
    }

    pub fn with_preview(mut self, preview: Option<Preview<'a>>) -> Self {
        self.preview = preview;
        self
    }
}

/// Redraw everything: visible layers ascending by z, paths then shapes.
pub fn composite<S: Surface + ?Sized>(scene: &Scene<'_>, surface: &mut S) {
    surface.clear();
    let document = scene.document;

    for layer in document.layers.visible_in_order() {
        surface.set_global_alpha(layer.opacity);
        for path in document.paths_on(layer.id) {
            draw_path(path, layer.opacity, surface);
        }
        for shape in document.shapes_on(layer.id) {
            draw_shape(shape, layer.opacity, surface);
        }
    }

    if let Some(preview) = &scene.preview {
        draw_preview(document, preview, surface);
    }
    surface.set_global_alpha(1.0);
}

/// Stroke one segment of an in-progress path.
pub fn stroke_segment<S: Surface + ?Sized>(
    path: &Path,
    from: Point,
    to: Point,
    layer_alpha: f64,
    surface: &mut S,
) {
    let mut segment = BezPath::new();
    segment.move_to(from);
    segment.line_to(to);
    begin_path(path, layer_alpha, surface);
    surface.stroke_path(&segment, path.stroke_color, &StrokeParams::round(path.stroke_width));
    surface.restore();
}

/// Opacity of the layer a primitive resolves to, `None` when it is hidden.
fn layer_alpha(document: &PlanDocument, layer_ref: Option<LayerId>, kind: PrimitiveKind) -> Option<f64> {
    let id = document.layers.resolve(layer_ref, kind)?;
    document
        .layers
        .get(id)
        .filter(|layer| layer.visible)
        .map(|layer| layer.opacity)
}

fn draw_preview<S: Surface + ?Sized>(document: &PlanDocument, preview: &Preview<'_>, surface: &mut S) {
    match preview {
        Preview::Path(path) => {
            if let Some(alpha) = layer_alpha(document, path.layer_ref, PrimitiveKind::Path) {
                draw_path(path, alpha, surface);
            }
        }
        Preview::Shape(shape) => {
            if let Some(alpha) = layer_alpha(document, shape.layer_ref, PrimitiveKind::Shape) {
                draw_shape(shape, alpha, surface);
            }
        }
    }
}

fn begin_path<S: Surface + ?Sized>(path: &Path, layer_alpha: f64, surface: &mut S) {
    surface.save();
    surface.set_global_alpha(path.opacity * layer_alpha);
    if path.brush == BrushKind::Eraser {
        surface.set_blend(Blend::DestinationOut);
    }
}

fn draw_path<S: Surface + ?Sized>(path: &Path, layer_alpha: f64, surface: &mut S) {
    let Some(&first) = path.points.first() else {
        return;
    };
    let mut bez = path.to_bez_path();
    if path.len() == 1 {
        // A single click still leaves a round dot.
        bez.line_to(first);
    }
    begin_path(path, layer_alpha, surface);
    surface.stroke_path(&bez, path.stroke_color, &StrokeParams::round(path.stroke_width));
    surface.restore();
}

fn draw_shape<S: Surface + ?Sized>(shape: &Shape, layer_alpha: f64, surface: &mut S) {
    surface.save();
    surface.set_global_alpha(shape.opacity * layer_alpha);
    if shape.rotation != 0.0 {
        let pivot = shape.pivot().to_vec2();
        surface.transform(Affine::translate(pivot));
        surface.transform(Affine::rotate(shape.rotation.to_radians()));
        surface.transform(Affine::translate(-pivot));
    }

    let stroke = StrokeParams::outline(shape.stroke_width, shape.stroke_style == StrokeStyle::Dashed);
    let bounds = shape.bounds().abs();
    match shape.kind {
        ShapeKind::Rectangle => {
            fill_and_stroke(shape, &bounds.to_path(PATH_TOLERANCE), &stroke, surface);
        }
        ShapeKind::Circle => {
            let radius = bounds.width().min(bounds.height()) / 2.0;
            let circle = Circle::new(bounds.center(), radius).to_path(PATH_TOLERANCE);
            fill_and_stroke(shape, &circle, &stroke, surface);
        }
        ShapeKind::Ellipse => {
            let ellipse = Ellipse::from_rect(bounds).to_path(PATH_TOLERANCE);
            fill_and_stroke(shape, &ellipse, &stroke, surface);
        }
        ShapeKind::Triangle => {
            fill_and_stroke(shape, &triangle(bounds), &stroke, surface);
        }
        ShapeKind::Line => {
            let (start, end) = shape.endpoints();
            let mut line = BezPath::new();
            line.move_to(start);
            line.line_to(end);
            surface.stroke_path(&line, shape.stroke_color, &stroke);
        }
        ShapeKind::Arrow => {
            let (start, end) = shape.endpoints();
            surface.stroke_path(&arrow(start, end, shape.stroke_width), shape.stroke_color, &stroke);
        }
        ShapeKind::Text => {
            if let Some(text) = shape.text.as_deref().filter(|t| !t.is_empty()) {
                let size = shape.font_size.unwrap_or(DEFAULT_FONT_SIZE);
                surface.fill_text(text, Point::new(shape.x, shape.y + size), size, shape.stroke_color);
            }
        }
        ShapeKind::StickyNote => {
            fill_and_stroke(shape, &bounds.to_path(PATH_TOLERANCE), &stroke, surface);
            if let Some(text) = shape.text.as_deref().filter(|t| !t.is_empty()) {
                let size = shape.font_size.unwrap_or(DEFAULT_FONT_SIZE);
                let origin = Point::new(bounds.x0 + NOTE_PADDING, bounds.y0 + NOTE_PADDING + size);
                surface.fill_text(text, origin, size, shape.stroke_color);
            }
        }
    }
    surface.restore();
}

fn fill_and_stroke<S: Surface + ?Sized>(shape: &Shape, path: &BezPath, stroke: &StrokeParams, surface: &mut S) {
    if let Some(fill) = shape.fill_color {
        surface.fill_path(path, fill);
    }
    surface.stroke_path(path, shape.stroke_color, stroke);
}

/// Isosceles triangle with its apex at the top center of `bounds`.
fn triangle(bounds: Rect) -> BezPath {
    let mut path = BezPath::new();
    path.move_to((bounds.center().x, bounds.y0));
    path.line_to((bounds.x1, bounds.y1));
    path.line_to((bounds.x0, bounds.y1));
    path.close_path();
    path
}

/// Shaft plus an open arrowhead at `end`.
fn arrow(start: Point, end: Point, stroke_width: f64) -> BezPath {
    let mut path = BezPath::new();
    path.move_to(start);
    path.line_to(end);

    let shaft = end - start;
    let length = shaft.hypot();
    if length < f64::EPSILON {
        return path;
    }
    let dir = shaft / length;
    let perp = Vec2::new(-dir.y, dir.x);
    let head = (stroke_width * ARROW_HEAD_SCALE).max(MIN_ARROW_HEAD).min(length);
    let back = end - dir * head;
    path.move_to(back + perp * head * 0.5);
    path.line_to(end);
    path.line_to(back - perp * head * 0.5);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixmap::Pixmap;
    use crate::surface::{DrawCommand, RecordingSurface};
    use kurbo::PathEl;
    use plansketch_core::canvas::Canvas;
    use plansketch_core::layers::{BACKGROUND_LAYER, LayerPatch};
    use plansketch_core::shapes::Rgb;
    use plansketch_core::tools::ToolKind;

    fn scenario_canvas() -> Canvas {
        let mut canvas = Canvas::new();
        canvas.pointer_down(Point::new(0.0, 0.0));
        canvas.pointer_move(Point::new(10.0, 0.0));
        canvas.pointer_move(Point::new(10.0, 10.0));
        canvas.pointer_up(Point::new(10.0, 10.0));
        canvas
    }

    fn rect_shape(x: f64, color: Rgb, layer: Option<LayerId>) -> Shape {
        let mut shape = Shape::from_drag(ShapeKind::Rectangle, Point::new(x, 10.0), Point::new(x + 40.0, 50.0))
            .with_layer(layer);
        shape.fill_color = Some(color);
        shape.stroke_color = color;
        shape
    }

    #[test]
    fn test_scenario_stroke_display_list() {
        let canvas = scenario_canvas();
        let mut surface = RecordingSurface::new(100, 100);
        composite(&Scene::new(&canvas.document), &mut surface);

        let strokes: Vec<_> = surface.strokes().collect();
        assert_eq!(strokes.len(), 1);
        let (path, color, stroke) = strokes[0];
        assert_eq!(color, Rgb::from_hex("#3b82f6").unwrap());
        assert_eq!(*stroke, StrokeParams::round(4.0));
        let points: Vec<Point> = path
            .elements()
            .iter()
            .filter_map(|el| match el {
                PathEl::MoveTo(p) | PathEl::LineTo(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(points, vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)]);
        assert_eq!(surface.commands().first(), Some(&DrawCommand::Clear));
        assert_eq!(surface.commands().last(), Some(&DrawCommand::GlobalAlpha(1.0)));
    }

    #[test]
    fn test_incremental_segments() {
        let mut canvas = Canvas::new();
        let mut surface = RecordingSurface::new(100, 100);
        canvas.pointer_down(Point::new(0.0, 0.0));
        for next in [Point::new(10.0, 0.0), Point::new(10.0, 10.0)] {
            if let plansketch_core::CanvasEvent::PreviewSegment { from, to } = canvas.pointer_move(next) {
                let Some(Preview::Path(path)) = canvas.preview() else {
                    panic!("expected a path preview");
                };
                stroke_segment(path, from, to, 1.0, &mut surface);
            }
        }
        let segments: Vec<&BezPath> = surface.strokes().map(|(p, _, _)| p).collect();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].elements()[1], PathEl::LineTo(Point::new(10.0, 0.0)));
        assert_eq!(segments[1].elements()[0], PathEl::MoveTo(Point::new(10.0, 0.0)));
        assert!(surface.strokes().all(|(_, _, s)| s.round));
    }

    #[test]
    fn test_composite_is_idempotent() {
        let mut canvas = scenario_canvas();
        canvas.set_tool(ToolKind::Shape(ShapeKind::Ellipse));
        canvas.pointer_down(Point::new(20.0, 20.0));
        canvas.pointer_up(Point::new(60.0, 50.0));
        let scene = Scene::new(&canvas.document);

        let mut pixmap = Pixmap::new(80, 80).unwrap().with_background(Rgb::white());
        composite(&scene, &mut pixmap);
        let first = pixmap.data().to_vec();
        composite(&scene, &mut pixmap);
        assert_eq!(pixmap.data(), first.as_slice());

        let mut a = RecordingSurface::new(80, 80);
        let mut b = RecordingSurface::new(80, 80);
        composite(&scene, &mut a);
        composite(&scene, &mut b);
        composite(&scene, &mut b);
        assert_eq!(a.commands(), b.commands());
    }

    #[test]
    fn test_opacity_multiplies_with_layer() {
        let mut document = PlanDocument::default();
        let layer = document.layers.add_layer("Faded").unwrap().id;
        document.layers.update_layer(layer, &LayerPatch::opacity(0.5)).unwrap();
        let mut shape = rect_shape(10.0, Rgb::new(255, 0, 0), Some(layer));
        shape.opacity = 0.5;
        document.add_shape(shape).unwrap();

        let mut pixmap = Pixmap::new(60, 60).unwrap();
        composite(&Scene::new(&document), &mut pixmap);
        let alpha = pixmap.pixel(30, 30).unwrap()[3] as f64 / 255.0;
        assert!((alpha - 0.25).abs() < 0.01, "alpha was {alpha}");
    }

    #[test]
    fn test_hide_show_restores_output() {
        let mut canvas = scenario_canvas();
        let mut pixmap = Pixmap::new(40, 40).unwrap().with_background(Rgb::white());
        composite(&Scene::new(&canvas.document), &mut pixmap);
        let before = pixmap.data().to_vec();

        let routes = canvas.document.layers.default_layer_for(PrimitiveKind::Path).unwrap();
        canvas.document.layers.update_layer(routes, &LayerPatch::visible(false)).unwrap();
        composite(&Scene::new(&canvas.document), &mut pixmap);
        assert_ne!(pixmap.data(), before.as_slice());

        canvas.document.layers.update_layer(routes, &LayerPatch::visible(true)).unwrap();
        composite(&Scene::new(&canvas.document), &mut pixmap);
        assert_eq!(pixmap.data(), before.as_slice());
    }

    #[test]
    fn test_layer_order_decides_overlap() {
        let mut document = PlanDocument::default();
        let top = document.layers.add_layer("Top").unwrap().id;
        let background = document.layers.find_by_name(BACKGROUND_LAYER).unwrap().id;
        document.add_shape(rect_shape(10.0, Rgb::new(255, 0, 0), Some(background))).unwrap();
        document.add_shape(rect_shape(10.0, Rgb::new(0, 0, 255), Some(top))).unwrap();

        let mut pixmap = Pixmap::new(60, 60).unwrap();
        composite(&Scene::new(&document), &mut pixmap);
        assert_eq!(pixmap.pixel(30, 30), Some([0, 0, 255, 255]));

        // Swap "Top" down to the bottom of the stack.
        while document.layers.move_layer_down(top).unwrap() {}
        composite(&Scene::new(&document), &mut pixmap);
        assert_eq!(pixmap.pixel(30, 30), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_preview_drawn_after_committed_content() {
        let mut canvas = scenario_canvas();
        canvas.set_tool(ToolKind::Shape(ShapeKind::Rectangle));
        canvas.pointer_down(Point::new(20.0, 20.0));
        canvas.pointer_move(Point::new(50.0, 40.0));

        let mut surface = RecordingSurface::new(100, 100);
        composite(&Scene::new(&canvas.document).with_preview(canvas.preview()), &mut surface);
        assert_eq!(surface.strokes().count(), 2);
        let last_stroke = surface.strokes().last().map(|(_, _, s)| *s);
        assert_eq!(last_stroke, Some(StrokeParams::outline(4.0, false)));
    }

    #[test]
    fn test_rotation_wraps_shape_in_transform() {
        let mut document = PlanDocument::default();
        let mut shape = rect_shape(0.0, Rgb::black(), None);
        shape.rotation = 90.0;
        document.add_shape(shape).unwrap();

        let mut surface = RecordingSurface::new(100, 100);
        composite(&Scene::new(&document), &mut surface);
        let transforms = surface
            .commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Transform(_)))
            .count();
        assert_eq!(transforms, 3);
    }

    #[test]
    fn test_text_drawn_at_baseline() {
        let mut document = PlanDocument::default();
        let text = Shape::new(ShapeKind::Text, 5.0, 5.0).with_text("Museum");
        document.add_shape(text).unwrap();

        let mut surface = RecordingSurface::new(100, 100);
        composite(&Scene::new(&document), &mut surface);
        assert!(surface.commands().iter().any(|c| matches!(
            c,
            DrawCommand::FillText { text, origin, .. } if text == "Museum" && *origin == Point::new(5.0, 21.0)
        )));
    }

    #[test]
    fn test_eraser_uses_destination_out() {
        let mut canvas = Canvas::new();
        canvas.tools.config.brush = BrushKind::Eraser;
        canvas.pointer_down(Point::new(0.0, 0.0));
        canvas.pointer_move(Point::new(5.0, 5.0));
        canvas.pointer_up(Point::new(5.0, 5.0));

        let mut surface = RecordingSurface::new(10, 10);
        composite(&Scene::new(&canvas.document), &mut surface);
        assert!(surface.commands().contains(&DrawCommand::Blend(Blend::DestinationOut)));
    }
}
