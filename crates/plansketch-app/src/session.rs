//! Script replay and rendering for one sync session.

use crate::AppError;
use crate::cli::Cli;
use crate::script::{Script, Step};
use kurbo::Point;
use plansketch_core::canvas::CanvasEvent;
use plansketch_core::config::{ConfigError, EngineConfig};
use plansketch_core::layers::{LayerId, LayerPatch};
use plansketch_core::storage::{FilePlanStore, MemoryPlanStore, NewDestination, PlanStore};
use plansketch_core::sync::{SaveReport, SyncController, SyncState};
use plansketch_render::{Pixmap, Scene, composite};
use std::path::PathBuf;
use std::sync::Arc;

/// Tally of a replayed script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub steps: usize,
    /// Primitives committed to the plan.
    pub commits: usize,
    /// Pointer events refused by a locked or hidden layer.
    pub rejected: usize,
    pub destinations: usize,
}

impl ReplaySummary {
    fn record(&mut self, event: &CanvasEvent) {
        if event.is_commit() {
            self.commits += 1;
        } else if let CanvasEvent::Rejected(err) = event {
            log::warn!("Step {} rejected: {}", self.steps, err);
            self.rejected += 1;
        }
    }
}

/// Outcome of a full run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub state: SyncState,
    /// Display title, suffixed when offline.
    pub title: String,
    pub replay: ReplaySummary,
    pub report: SaveReport,
    pub primitives: usize,
    pub output: Option<PathBuf>,
}

/// Open the configured store and run a session for the command line.
pub async fn run(cli: &Cli) -> Result<RunSummary, AppError> {
    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    let script = match &cli.script {
        Some(path) => Script::load(path)?,
        None => Script::default(),
    };

    if cli.offline {
        log::info!("Offline: plan store disabled");
        let store = MemoryPlanStore::new();
        store.set_available(false);
        return run_session(Arc::new(store), config, cli, &script).await;
    }

    let store = match &config.data_dir {
        Some(dir) => FilePlanStore::open(dir.clone())?,
        None => FilePlanStore::default_location()?,
    };
    log::info!("Using plan store at {}", store.base_path().display());
    run_session(Arc::new(store), config, cli, &script).await
}

async fn run_session<S: PlanStore + 'static>(
    store: Arc<S>,
    config: EngineConfig,
    cli: &Cli,
    script: &Script,
) -> Result<RunSummary, AppError> {
    let mut session = SyncController::new(store, config);
    session.start(&cli.token).await;

    let replay = replay(&mut session, script).await?;
    let report = session.save().await;
    let drained = session.flush().await;
    log::debug!("Drained {} pending saves", drained);

    let output = match &cli.out {
        Some(path) => {
            render_plan(&session)?.save_png(path)?;
            Some(path.clone())
        }
        None => None,
    };

    Ok(RunSummary {
        state: session.state(),
        title: session.title(),
        replay,
        report,
        primitives: session.document().len(),
        output,
    })
}

/// Replay every step against the session, pumping saves in between.
pub async fn replay<S: PlanStore + 'static>(
    session: &mut SyncController<S>,
    script: &Script,
) -> Result<ReplaySummary, AppError> {
    let mut summary = ReplaySummary::default();
    for step in &script.steps {
        summary.steps += 1;
        apply_step(session, step, &mut summary).await?;
        session.pump();
    }
    log::info!(
        "Replayed {} steps: {} commits, {} rejected",
        summary.steps,
        summary.commits,
        summary.rejected
    );
    Ok(summary)
}

async fn apply_step<S: PlanStore + 'static>(
    session: &mut SyncController<S>,
    step: &Step,
    summary: &mut ReplaySummary,
) -> Result<(), AppError> {
    match step {
        Step::Tool { tool } => session.set_tool(*tool),
        Step::Color { color } => session.canvas_mut().tools.config.stroke_color = *color,
        Step::Fill { color } => session.canvas_mut().tools.config.fill_color = *color,
        Step::BrushSize { size } => {
            let config = &mut session.canvas_mut().tools.config;
            config.brush_size = *size;
            *config = config.clone().normalized();
        }
        Step::Brush { brush } => session.canvas_mut().tools.config.brush = *brush,
        Step::Opacity { opacity } => {
            let config = &mut session.canvas_mut().tools.config;
            config.opacity = *opacity;
            *config = config.clone().normalized();
        }
        Step::StrokeStyle { style } => session.canvas_mut().tools.config.stroke_style = *style,

        Step::Down { x, y } => summary.record(&session.pointer_down(Point::new(*x, *y))),
        Step::Move { x, y } => summary.record(&session.pointer_move(Point::new(*x, *y))),
        Step::Up { x, y } => summary.record(&session.pointer_up(Point::new(*x, *y))),
        Step::Leave => summary.record(&session.pointer_leave()),
        Step::Stroke { points } => {
            let mut points = points.iter().map(|[x, y]| Point::new(*x, *y));
            let Some(first) = points.next() else {
                return Ok(());
            };
            summary.record(&session.pointer_down(first));
            let mut last = first;
            for point in points {
                summary.record(&session.pointer_move(point));
                last = point;
            }
            summary.record(&session.pointer_up(last));
        }
        Step::Marker { name, notes } => match session.finish_marker() {
            Some(at) => {
                let destination = NewDestination {
                    name: name.clone(),
                    x: at.x,
                    y: at.y,
                    notes: notes.clone(),
                };
                session.add_destination(destination).await;
                summary.destinations += 1;
            }
            None => log::warn!("No marker pending for {:?}", name),
        },

        Step::ActiveLayer { layer } => {
            let id = match layer {
                Some(name) => Some(layer_id(session, name)?),
                None => None,
            };
            session.canvas_mut().set_active_layer(id);
        }
        Step::AddLayer { name } => {
            session.add_layer(name)?;
        }
        Step::RenameLayer { layer, name } => {
            let id = layer_id(session, layer)?;
            session.update_layer(id, &LayerPatch::name(name.clone()))?;
        }
        Step::HideLayer { layer } => patch_layer(session, layer, LayerPatch::visible(false))?,
        Step::ShowLayer { layer } => patch_layer(session, layer, LayerPatch::visible(true))?,
        Step::LockLayer { layer } => patch_layer(session, layer, LayerPatch::locked(true))?,
        Step::UnlockLayer { layer } => patch_layer(session, layer, LayerPatch::locked(false))?,
        Step::LayerOpacity { layer, opacity } => {
            patch_layer(session, layer, LayerPatch::opacity(*opacity))?
        }
        Step::MoveLayerUp { layer } => {
            let id = layer_id(session, layer)?;
            session.move_layer_up(id)?;
        }
        Step::MoveLayerDown { layer } => {
            let id = layer_id(session, layer)?;
            session.move_layer_down(id)?;
        }
        Step::DeleteLayer { layer } => {
            let id = layer_id(session, layer)?;
            session.delete_layer(id)?;
        }

        Step::Title { title } => session.set_title(title),
        Step::Clear => session.clear(),
        Step::Save => {
            let report = session.save().await;
            if let Some(err) = report.error {
                log::warn!("Scripted save failed: {}", err);
            }
        }
    }
    Ok(())
}

fn layer_id<S: PlanStore + 'static>(session: &SyncController<S>, name: &str) -> Result<LayerId, AppError> {
    session
        .document()
        .layers
        .find_by_name(name)
        .map(|layer| layer.id)
        .ok_or_else(|| AppError::UnknownLayer(name.to_string()))
}

fn patch_layer<S: PlanStore + 'static>(
    session: &mut SyncController<S>,
    name: &str,
    patch: LayerPatch,
) -> Result<(), AppError> {
    let id = layer_id(session, name)?;
    session.update_layer(id, &patch)?;
    Ok(())
}

/// Composite the session's plan onto a viewport-sized pixmap.
pub fn render_plan<S: PlanStore + 'static>(session: &SyncController<S>) -> Result<Pixmap, AppError> {
    let config = session.config();
    let background = config.background_color().map_err(ConfigError::from)?;
    let mut pixmap =
        Pixmap::new(config.viewport_width, config.viewport_height)?.with_background(background);
    let canvas = session.canvas();
    let scene = Scene::new(&canvas.document).with_preview(canvas.preview());
    composite(&scene, &mut pixmap);
    Ok(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plansketch_core::layers::ROUTES_LAYER;
    use plansketch_core::sync::OFFLINE_SUFFIX;
    use std::fs;

    const SCENARIO: &str = r#"[
        {"op": "stroke", "points": [[0, 0], [10, 0], [10, 10]]},
        {"op": "tool", "tool": {"shape": "rectangle"}},
        {"op": "down", "x": 20, "y": 20},
        {"op": "move", "x": 40, "y": 30},
        {"op": "up", "x": 60, "y": 50},
        {"op": "tool", "tool": "destination-marker"},
        {"op": "down", "x": 100, "y": 120},
        {"op": "up", "x": 100, "y": 120},
        {"op": "marker", "name": "Louvre", "notes": "Closed Tuesdays"}
    ]"#;

    fn memory_session() -> SyncController<MemoryPlanStore> {
        SyncController::new(Arc::new(MemoryPlanStore::new()), EngineConfig::default())
    }

    fn small_config(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("config.json");
        fs::write(&path, r#"{"viewport_width": 64, "viewport_height": 48}"#).unwrap();
        path
    }

    #[test]
    fn test_replay_scenario() {
        pollster::block_on(async {
            let mut session = memory_session();
            session.start("paris-2026").await;
            let script = Script::from_json(SCENARIO).unwrap();
            let summary = replay(&mut session, &script).await.unwrap();

            assert_eq!(summary.steps, 9);
            assert_eq!(summary.commits, 2);
            assert_eq!(summary.destinations, 1);
            let document = session.document();
            assert_eq!(
                document.paths[0].points,
                vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)]
            );
            assert_eq!(document.shapes[0].width, Some(40.0));
            assert_eq!(document.destinations[0].name, "Louvre");
            assert_eq!(document.destinations[0].x, 100.0);
        });
    }

    #[test]
    fn test_locked_layer_rejects_strokes() {
        pollster::block_on(async {
            let mut session = memory_session();
            session.start("locked").await;
            let script = Script::from_json(
                r#"[
                    {"op": "lock-layer", "layer": "Routes"},
                    {"op": "stroke", "points": [[0, 0], [5, 5]]}
                ]"#,
            )
            .unwrap();
            let summary = replay(&mut session, &script).await.unwrap();
            assert_eq!(summary.rejected, 1);
            assert_eq!(summary.commits, 0);
            assert!(session.document().is_empty());
        });
    }

    #[test]
    fn test_layer_steps() {
        pollster::block_on(async {
            let mut session = memory_session();
            session.start("layers").await;
            let script = Script::from_json(
                r#"[
                    {"op": "add-layer", "name": "Day 1"},
                    {"op": "active-layer", "layer": "Day 1"},
                    {"op": "stroke", "points": [[0, 0], [5, 5]]},
                    {"op": "rename-layer", "layer": "Day 1", "name": "Monday"},
                    {"op": "move-layer-down", "layer": "Monday"},
                    {"op": "layer-opacity", "layer": "Monday", "opacity": 0.5},
                    {"op": "active-layer", "layer": null},
                    {"op": "delete-layer", "layer": "Monday"}
                ]"#,
            )
            .unwrap();
            replay(&mut session, &script).await.unwrap();

            let document = session.document();
            assert!(document.layers.find_by_name("Monday").is_none());
            // The stroke falls back to the default path layer.
            assert_eq!(document.paths[0].layer_ref, None);
            assert!(document.layers.find_by_name(ROUTES_LAYER).is_some());
        });
    }

    #[test]
    fn test_unknown_and_protected_layers_fail() {
        pollster::block_on(async {
            let mut session = memory_session();
            session.start("errors").await;
            let unknown = Script::from_json(r#"[{"op": "hide-layer", "layer": "Nope"}]"#).unwrap();
            assert!(matches!(
                replay(&mut session, &unknown).await,
                Err(AppError::UnknownLayer(name)) if name == "Nope"
            ));
            let protected =
                Script::from_json(r#"[{"op": "delete-layer", "layer": "Background"}]"#).unwrap();
            assert!(matches!(replay(&mut session, &protected).await, Err(AppError::Layer(_))));
        });
    }

    #[test]
    fn test_render_plan_uses_viewport_and_background() {
        pollster::block_on(async {
            let mut config = EngineConfig::default();
            config.viewport_width = 32;
            config.viewport_height = 16;
            config.background = "#000000".to_string();
            let mut session = SyncController::new(Arc::new(MemoryPlanStore::new()), config);
            session.start("render").await;

            let pixmap = render_plan(&session).unwrap();
            assert_eq!((pixmap.width(), pixmap.height()), (32, 16));
            assert_eq!(pixmap.pixel(5, 5), Some([0, 0, 0, 255]));
        });
    }

    #[test]
    fn test_run_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("strokes.json");
        fs::write(&script_path, SCENARIO).unwrap();
        let out = dir.path().join("plan.png");
        let cli = Cli {
            token: "rome-trip".into(),
            script: Some(script_path),
            out: Some(out.clone()),
            config: Some(small_config(dir.path())),
            data_dir: Some(dir.path().join("plans")),
            offline: false,
        };

        let first = pollster::block_on(run(&cli)).unwrap();
        assert!(matches!(first.state, SyncState::OnlineBound { .. }));
        assert!(first.report.persisted);
        assert_eq!(first.primitives, 2);
        assert_eq!(first.output.as_deref(), Some(out.as_path()));
        assert_eq!(&fs::read(&out).unwrap()[1..4], b"PNG");

        let reopen = Cli { script: None, out: None, ..cli };
        let second = pollster::block_on(run(&reopen)).unwrap();
        assert_eq!(second.primitives, 2);
        assert_eq!(second.title, "Untitled Plan");
    }

    #[test]
    fn test_run_offline() {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("strokes.json");
        fs::write(&script_path, SCENARIO).unwrap();
        let cli = Cli {
            token: "offline-trip".into(),
            script: Some(script_path),
            config: Some(small_config(dir.path())),
            offline: true,
            ..Cli::default()
        };

        let summary = pollster::block_on(run(&cli)).unwrap();
        assert_eq!(summary.state, SyncState::Offline);
        assert!(summary.title.ends_with(OFFLINE_SUFFIX));
        assert!(!summary.report.persisted);
        assert_eq!(summary.primitives, 2);
    }
}
