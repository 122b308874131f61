//! PlanSketch Core Library
//!
//! Platform-agnostic data model, tools, layers and plan sync for the
//! PlanSketch trip-planning canvas.

pub mod canvas;
pub mod config;
pub mod layers;
pub mod shapes;
pub mod storage;
pub mod sync;
pub mod tools;

pub use canvas::{Canvas, CanvasError, CanvasEvent, PlanDocument};
pub use config::{ConfigError, EngineConfig};
pub use layers::{Layer, LayerError, LayerId, LayerPatch, LayerRegistry};
pub use shapes::{BrushKind, Path, PrimitiveKind, Rgb, Shape, ShapeKind, StrokeStyle, ValidationError};
pub use storage::{FilePlanStore, MemoryPlanStore, PlanStore, StoreError};
pub use sync::{SaveReport, SyncController, SyncState};
pub use tools::{Preview, ToolConfig, ToolKind, ToolManager};
