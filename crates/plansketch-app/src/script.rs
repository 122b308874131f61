//! Pointer scripts.
//!
//! A script is a JSON array of steps replayed in order against a session:
//!
//! ```json
//! [
//!   {"op": "tool", "tool": "pen"},
//!   {"op": "down", "x": 0, "y": 0},
//!   {"op": "move", "x": 10, "y": 0},
//!   {"op": "up", "x": 10, "y": 0},
//!   {"op": "hide-layer", "layer": "Routes"}
//! ]
//! ```

use crate::AppError;
use kurbo::Point;
use plansketch_core::shapes::{BrushKind, Rgb, StrokeStyle};
use plansketch_core::tools::ToolKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One replayed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Step {
    Tool { tool: ToolKind },
    Color { color: Rgb },
    Fill { color: Option<Rgb> },
    BrushSize { size: f64 },
    Brush { brush: BrushKind },
    Opacity { opacity: f64 },
    StrokeStyle { style: StrokeStyle },

    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up { x: f64, y: f64 },
    Leave,
    /// Down, moves and up through the given points.
    Stroke { points: Vec<[f64; 2]> },
    /// Complete a pending destination marker.
    Marker {
        name: String,
        #[serde(default)]
        notes: Option<String>,
    },

    /// Draw onto the named layer; `null` returns to the default layers.
    ActiveLayer { layer: Option<String> },
    AddLayer { name: String },
    RenameLayer { layer: String, name: String },
    HideLayer { layer: String },
    ShowLayer { layer: String },
    LockLayer { layer: String },
    UnlockLayer { layer: String },
    LayerOpacity { layer: String, opacity: f64 },
    MoveLayerUp { layer: String },
    MoveLayerDown { layer: String },
    DeleteLayer { layer: String },

    Title { title: String },
    Clear,
    Save,
}

impl Step {
    /// Pointer position carried by the step, if any.
    pub fn point(&self) -> Option<Point> {
        match self {
            Step::Down { x, y } | Step::Move { x, y } | Step::Up { x, y } => Some(Point::new(*x, *y)),
            _ => None,
        }
    }
}

/// A parsed pointer script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|source| AppError::Script {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plansketch_core::shapes::ShapeKind;

    #[test]
    fn test_parse_steps() {
        let script = Script::from_json(
            r##"[
                {"op": "tool", "tool": {"shape": "sticky-note"}},
                {"op": "color", "color": "#ef4444"},
                {"op": "brush", "brush": "highlighter"},
                {"op": "down", "x": 1, "y": 2.5},
                {"op": "leave"},
                {"op": "active-layer", "layer": null},
                {"op": "layer-opacity", "layer": "Routes", "opacity": 0.5}
            ]"##,
        )
        .unwrap();

        assert_eq!(script.len(), 7);
        assert_eq!(script.steps[0], Step::Tool { tool: ToolKind::Shape(ShapeKind::StickyNote) });
        assert_eq!(script.steps[1], Step::Color { color: Rgb::new(0xef, 0x44, 0x44) });
        assert_eq!(script.steps[3].point(), Some(Point::new(1.0, 2.5)));
        assert_eq!(script.steps[4], Step::Leave);
        assert_eq!(script.steps[5], Step::ActiveLayer { layer: None });
    }

    #[test]
    fn test_marker_notes_default() {
        let script = Script::from_json(r#"[{"op": "marker", "name": "Louvre"}]"#).unwrap();
        assert_eq!(script.steps[0], Step::Marker { name: "Louvre".into(), notes: None });
    }

    #[test]
    fn test_unknown_op_rejected() {
        assert!(Script::from_json(r#"[{"op": "teleport"}]"#).is_err());
        assert!(Script::from_json(r#"[{"op": "color", "color": "blue"}]"#).is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "[{").unwrap();
        match Script::load(&path) {
            Err(AppError::Script { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected a script error, got {:?}", other),
        }
    }
}
