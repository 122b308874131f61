//! PlanSketch Render Library
//!
//! Surface abstraction, a CPU pixmap backend and the layer compositor.

pub mod compositor;
pub mod pixmap;
pub mod surface;

pub use compositor::{Scene, composite, stroke_segment};
pub use pixmap::Pixmap;
pub use surface::{Blend, DrawCommand, RecordingSurface, RenderError, RenderResult, StrokeParams, Surface};
