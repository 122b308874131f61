//! Immediate-mode drawing surface abstraction.

use kurbo::{Affine, BezPath, Cap, Join, Point, Stroke};
use plansketch_core::shapes::Rgb;
use thiserror::Error;

/// Render errors.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// How new paint combines with what is already on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blend {
    #[default]
    SourceOver,
    /// Removes coverage instead of adding paint (eraser brush).
    DestinationOut,
}

/// Stroke parameters for [`Surface::stroke_path`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeParams {
    pub width: f64,
    /// Round caps and joins; miter joins and butt caps otherwise.
    pub round: bool,
    pub dashed: bool,
}

impl StrokeParams {
    /// Round-capped, round-joined stroke used for freehand paths.
    pub fn round(width: f64) -> Self {
        Self { width, round: true, dashed: false }
    }

    /// Stroke for shape outlines.
    pub fn outline(width: f64, dashed: bool) -> Self {
        Self { width, round: false, dashed }
    }

    pub fn to_kurbo(&self) -> Stroke {
        let mut stroke = if self.round {
            Stroke::new(self.width).with_caps(Cap::Round).with_join(Join::Round)
        } else {
            Stroke::new(self.width).with_caps(Cap::Butt).with_join(Join::Miter)
        };
        if self.dashed {
            let dash = self.width.max(1.0) * 4.0;
            stroke = stroke.with_dashes(0.0, [dash, dash * 0.75]);
        }
        stroke
    }
}

/// A 2D immediate-mode surface.
///
/// State (transform, global alpha and blend) is pushed by `save` and popped
/// by `restore`; `transform` concatenates onto the current transform.
pub trait Surface {
    /// Surface size in pixels.
    fn size(&self) -> (u32, u32);

    /// Erase all pixels.
    fn clear(&mut self);

    fn save(&mut self);

    fn restore(&mut self);

    fn transform(&mut self, affine: Affine);

    /// Set the alpha applied to subsequent paints.
    fn set_global_alpha(&mut self, alpha: f64);

    fn set_blend(&mut self, blend: Blend);

    fn fill_path(&mut self, path: &BezPath, color: Rgb);

    fn stroke_path(&mut self, path: &BezPath, color: Rgb, stroke: &StrokeParams);

    /// Draw text with its baseline starting at `origin`.
    fn fill_text(&mut self, text: &str, origin: Point, font_size: f64, color: Rgb);
}

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    Save,
    Restore,
    Transform(Affine),
    GlobalAlpha(f64),
    Blend(Blend),
    FillPath { path: BezPath, color: Rgb },
    StrokePath { path: BezPath, color: Rgb, stroke: StrokeParams },
    FillText { text: String, origin: Point, font_size: f64, color: Rgb },
}

/// Surface that records a display list instead of drawing.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, commands: Vec::new() }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Recorded strokes, in draw order.
    pub fn strokes(&self) -> impl Iterator<Item = (&BezPath, Rgb, &StrokeParams)> {
        self.commands.iter().filter_map(|cmd| match cmd {
            DrawCommand::StrokePath { path, color, stroke } => Some((path, *color, stroke)),
            _ => None,
        })
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn save(&mut self) {
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        self.commands.push(DrawCommand::Restore);
    }

    fn transform(&mut self, affine: Affine) {
        self.commands.push(DrawCommand::Transform(affine));
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.commands.push(DrawCommand::GlobalAlpha(alpha));
    }

    fn set_blend(&mut self, blend: Blend) {
        self.commands.push(DrawCommand::Blend(blend));
    }

    fn fill_path(&mut self, path: &BezPath, color: Rgb) {
        self.commands.push(DrawCommand::FillPath { path: path.clone(), color });
    }

    fn stroke_path(&mut self, path: &BezPath, color: Rgb, stroke: &StrokeParams) {
        self.commands.push(DrawCommand::StrokePath { path: path.clone(), color, stroke: *stroke });
    }

    fn fill_text(&mut self, text: &str, origin: Point, font_size: f64, color: Rgb) {
        self.commands.push(DrawCommand::FillText {
            text: text.to_string(),
            origin,
            font_size,
            color,
        });
    }
}
