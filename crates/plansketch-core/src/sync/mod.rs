//! Binds an editing session to a stored plan.
//!
//! The controller resolves a share token, hydrates the canvas, and pushes
//! persistence-worthy mutations while bound. Store failures never reach the
//! caller as errors: they become the `Offline` state during start-up and
//! logged, counted no-ops afterwards.

mod autosave;

pub use autosave::{AutoSave, SaveLedger, SaveOp};

use crate::canvas::{Canvas, CanvasEvent, PlanDocument};
use crate::config::EngineConfig;
use crate::layers::{Layer, LayerError, LayerId, LayerPatch, LayerRegistry};
use crate::storage::record::{self, LayerRecord};
use crate::storage::{Destination, NewDestination, Plan, PlanId, PlanStore, StoreError, StoreResult};
use crate::tools::ToolKind;
use futures_util::future::LocalBoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use kurbo::Point;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Appended to the plan title while the session is offline.
pub const OFFLINE_SUFFIX: &str = " (Offline Mode)";

/// Where the session stands with the plan store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Loading,
    OnlineBound { plan_id: PlanId },
    /// Edits stay in memory; nothing is retried.
    Offline,
}

/// Outcome of an explicit save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReport {
    pub drawings_saved: usize,
    /// Paths kept locally because the store would reject them.
    pub drawings_skipped: usize,
    pub shapes_saved: usize,
    pub shapes_dropped: usize,
    /// Whether the store accepted the save.
    pub persisted: bool,
    pub error: Option<StoreError>,
}

/// Sync controller for one editing session.
pub struct SyncController<S> {
    store: Arc<S>,
    config: EngineConfig,
    canvas: Canvas,
    state: SyncState,
    autosave: AutoSave,
    ledger: Rc<RefCell<SaveLedger>>,
    pending: FuturesUnordered<LocalBoxFuture<'static, ()>>,
}

impl<S: PlanStore + 'static> SyncController<S> {
    /// Create a controller in the `Loading` state with an empty plan.
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        let mut canvas = Canvas::with_document(PlanDocument::new(config.default_title.clone()));
        canvas.simplify_paths = config.simplify_paths;
        let autosave = AutoSave::new(
            config.auto_save,
            Duration::from_millis(config.autosave_debounce_ms),
        );
        Self {
            store,
            config,
            canvas,
            state: SyncState::Loading,
            autosave,
            ledger: Rc::new(RefCell::new(SaveLedger::default())),
            pending: FuturesUnordered::new(),
        }
    }

    /// Resolve the token and bind to its plan, creating one if the token is
    /// unknown. Any other failure leaves the session offline.
    pub async fn start(&mut self, token: &str) -> SyncState {
        self.state = SyncState::Loading;
        let had_local = !self.canvas.document.is_empty();
        log::info!("Resolving plan for token {}", token);

        let resolved = self.store.resolve_plan(token).await;
        let bound = match resolved {
            Ok(plan) => match self.hydrate(&plan).await {
                Ok(seed_layers) => Some((plan.id, seed_layers)),
                Err(err) => {
                    log::error!("Failed to load plan {}: {}", plan.id, err);
                    None
                }
            },
            Err(StoreError::NotFound(_)) => self.create(token).await,
            Err(err) => {
                log::error!("Failed to resolve token {}: {}", token, err);
                None
            }
        };

        match bound {
            Some((plan_id, seed_layers)) => {
                self.state = SyncState::OnlineBound { plan_id };
                log::info!("Bound to plan {} ({})", plan_id, self.canvas.document.title);
                if seed_layers {
                    self.push_layers();
                }
                if had_local {
                    self.push_content();
                }
            }
            None => {
                self.state = SyncState::Offline;
                log::warn!("Continuing offline; edits are kept in memory only");
            }
        }
        self.state
    }

    /// Create a fresh plan for an unknown token.
    async fn create(&mut self, token: &str) -> Option<(PlanId, bool)> {
        let created = self
            .store
            .create_plan(&self.config.default_title, &self.config.default_description, token)
            .await;
        match created {
            Ok(plan) => {
                log::info!("Created plan {} for token {}", plan.id, token);
                self.canvas.document.title = plan.title;
                Some((plan.id, true))
            }
            Err(err) => {
                log::error!("Failed to create plan for token {}: {}", token, err);
                None
            }
        }
    }

    /// Load layers and content, merging them ahead of local primitives.
    ///
    /// Returns true when the store had no layers and the local defaults
    /// should be seeded.
    async fn hydrate(&mut self, plan: &Plan) -> StoreResult<bool> {
        let store = Arc::clone(&self.store);
        let (layers, content) = futures_util::future::join(
            store.list_layers(plan.id),
            store.load_content(plan.id, &plan.token),
        )
        .await;
        let layers = layers?;
        let (drawings, shapes) = content?;
        let destinations = store.list_destinations(plan.id).await.unwrap_or_else(|err| {
            log::warn!("Destinations of plan {} unavailable: {}", plan.id, err);
            Vec::new()
        });

        let document = &mut self.canvas.document;
        let seed_layers = layers.is_empty();
        if !seed_layers {
            document.layers = LayerRegistry::from_layers(layers.into_iter().map(Layer::from).collect());
        }

        let mut paths = record::paths_from_records(drawings);
        paths.append(&mut document.paths);
        document.paths = paths;

        let mut loaded_shapes = record::shapes_from_records(shapes);
        loaded_shapes.append(&mut document.shapes);
        document.shapes = loaded_shapes;

        let mut loaded_destinations = destinations;
        loaded_destinations.append(&mut document.destinations);
        document.destinations = loaded_destinations;

        document.title = plan.title.clone();
        log::info!(
            "Hydrated plan {}: {} paths, {} shapes, {} layers",
            plan.id,
            document.paths.len(),
            document.shapes.len(),
            document.layers.len()
        );
        Ok(seed_layers)
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn plan_id(&self) -> Option<PlanId> {
        match self.state {
            SyncState::OnlineBound { plan_id } => Some(plan_id),
            _ => None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.plan_id().is_some()
    }

    /// Title as shown to the user.
    pub fn title(&self) -> String {
        match self.state {
            SyncState::Offline => format!("{}{}", self.canvas.document.title, OFFLINE_SUFFIX),
            _ => self.canvas.document.title.clone(),
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn document(&self) -> &PlanDocument {
        &self.canvas.document
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot of the save ledger.
    pub fn ledger(&self) -> SaveLedger {
        self.ledger.borrow().clone()
    }

    /// Number of queued pushes that have not completed.
    pub fn pending_saves(&self) -> usize {
        self.pending.len()
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.canvas.set_tool(tool);
    }

    pub fn pointer_down(&mut self, point: Point) -> CanvasEvent {
        let event = self.canvas.pointer_down(point);
        self.after_event(&event);
        event
    }

    pub fn pointer_move(&mut self, point: Point) -> CanvasEvent {
        let event = self.canvas.pointer_move(point);
        self.after_event(&event);
        event
    }

    pub fn pointer_up(&mut self, point: Point) -> CanvasEvent {
        let event = self.canvas.pointer_up(point);
        self.after_event(&event);
        event
    }

    pub fn pointer_leave(&mut self) -> CanvasEvent {
        let event = self.canvas.pointer_leave();
        self.after_event(&event);
        event
    }

    pub fn finish_marker(&mut self) -> Option<Point> {
        self.canvas.finish_marker()
    }

    fn after_event(&mut self, event: &CanvasEvent) {
        if event.is_commit() && self.is_online() && self.autosave.note_commit(Instant::now()) {
            self.push_content();
        }
    }

    /// Filter the plan to what the store accepts and replace its content.
    pub async fn save(&mut self) -> SaveReport {
        let document = &self.canvas.document;
        let drawings = record::persistable_drawings(&document.paths);
        let shapes = record::persistable_shapes(&document.shapes);
        let mut report = SaveReport {
            drawings_saved: drawings.len(),
            drawings_skipped: document.paths.len() - drawings.len(),
            shapes_saved: shapes.len(),
            shapes_dropped: document.shapes.len() - shapes.len(),
            ..SaveReport::default()
        };

        let Some(plan_id) = self.plan_id() else {
            log::info!("Not bound to a plan; save kept in memory");
            return report;
        };
        self.autosave.take_pending();
        // Older queued snapshots must land before this one.
        while self.pending.next().await.is_some() {}

        let store = Arc::clone(&self.store);
        let mut result = self.tracked(SaveOp::Drawings, store.replace_drawings(plan_id, drawings)).await;
        if result.is_ok() {
            result = self.tracked(SaveOp::Shapes, store.replace_shapes(plan_id, shapes)).await;
        }
        match result {
            Ok(()) => {
                report.persisted = true;
                log::info!(
                    "Saved plan {}: {} drawings, {} shapes",
                    plan_id,
                    report.drawings_saved,
                    report.shapes_saved
                );
            }
            Err(err) => {
                log::error!("Save of plan {} failed: {}", plan_id, err);
                report.error = Some(err);
            }
        }
        report
    }

    /// Remove every primitive.
    pub fn clear(&mut self) {
        self.canvas.document.clear();
        self.push_content();
    }

    pub fn set_title(&mut self, title: &str) {
        self.canvas.document.title = title.to_string();
        if let Some(plan_id) = self.plan_id() {
            let title = title.to_string();
            self.queue(SaveOp::Title, move |store| async move {
                store.update_plan_title(plan_id, &title).await
            });
        }
    }

    pub fn add_layer(&mut self, name: &str) -> Result<LayerId, LayerError> {
        let id = self
            .canvas
            .document
            .layers
            .add_layer(name)
            .inspect_err(|err| log::warn!("Layer {:?} not added: {}", name, err))?
            .id;
        self.push_layers();
        Ok(id)
    }

    pub fn update_layer(&mut self, id: LayerId, patch: &LayerPatch) -> Result<(), LayerError> {
        self.canvas
            .document
            .layers
            .update_layer(id, patch)
            .inspect_err(|err| log::warn!("Layer {} not updated: {}", id, err))?;
        self.push_layers();
        Ok(())
    }

    /// Delete a layer; its primitives fall back to the default layers.
    pub fn delete_layer(&mut self, id: LayerId) -> Result<usize, LayerError> {
        let cleared = self
            .canvas
            .document
            .delete_layer(id)
            .inspect_err(|err| log::warn!("Layer {} not deleted: {}", id, err))?;
        if self.canvas.active_layer == Some(id) {
            self.canvas.active_layer = None;
        }
        self.push_layers();
        if cleared > 0 {
            self.push_content();
        }
        Ok(cleared)
    }

    pub fn move_layer_up(&mut self, id: LayerId) -> Result<bool, LayerError> {
        let moved = self.canvas.document.layers.move_layer_up(id)?;
        if moved {
            self.push_layers();
        }
        Ok(moved)
    }

    pub fn move_layer_down(&mut self, id: LayerId) -> Result<bool, LayerError> {
        let moved = self.canvas.document.layers.move_layer_down(id)?;
        if moved {
            self.push_layers();
        }
        Ok(moved)
    }

    /// Add a destination, letting the store assign its id when bound.
    pub async fn add_destination(&mut self, destination: NewDestination) -> Destination {
        let created = match self.plan_id() {
            Some(plan_id) => {
                let store = Arc::clone(&self.store);
                let result = self
                    .tracked(SaveOp::Destination, store.create_destination(plan_id, destination.clone()))
                    .await;
                result.unwrap_or_else(|_| destination.into_destination(Uuid::new_v4()))
            }
            None => destination.into_destination(Uuid::new_v4()),
        };
        self.canvas.document.destinations.push(created.clone());
        created
    }

    /// Remove a destination. Returns false when it is unknown locally.
    pub fn delete_destination(&mut self, id: Uuid) -> bool {
        let destinations = &mut self.canvas.document.destinations;
        let before = destinations.len();
        destinations.retain(|d| d.id != id);
        if destinations.len() == before {
            return false;
        }
        if self.is_online() {
            self.queue(SaveOp::Destination, move |store| async move {
                store.delete_destination(id).await
            });
        }
        true
    }

    /// Drive queued pushes without blocking. Returns how many completed.
    pub fn pump(&mut self) -> usize {
        if self.autosave.take_due(Instant::now()) {
            self.push_content();
        }
        let mut completed = 0;
        while let Some(Some(())) = self.pending.next().now_or_never() {
            completed += 1;
        }
        completed
    }

    /// Queue any debounced save and drive every push to completion.
    pub async fn flush(&mut self) -> usize {
        if self.autosave.take_pending() {
            self.push_content();
        }
        let mut completed = 0;
        while self.pending.next().await.is_some() {
            completed += 1;
        }
        completed
    }

    fn push_content(&mut self) {
        let Some(plan_id) = self.plan_id() else {
            return;
        };
        let drawings = record::persistable_drawings(&self.canvas.document.paths);
        let shapes = record::persistable_shapes(&self.canvas.document.shapes);
        self.queue(SaveOp::Drawings, move |store| async move {
            store.replace_drawings(plan_id, drawings).await
        });
        self.queue(SaveOp::Shapes, move |store| async move {
            store.replace_shapes(plan_id, shapes).await
        });
    }

    fn push_layers(&mut self) {
        let Some(plan_id) = self.plan_id() else {
            return;
        };
        let layers: Vec<LayerRecord> = self
            .canvas
            .document
            .layers
            .layers()
            .iter()
            .map(LayerRecord::from)
            .collect();
        self.queue(SaveOp::Layers, move |store| async move {
            store.replace_layers(plan_id, layers).await
        });
    }

    /// Queue a fire-and-forget push owning its snapshot.
    fn queue<F, Fut>(&mut self, op: SaveOp, make: F)
    where
        F: FnOnce(Arc<S>) -> Fut,
        Fut: Future<Output = StoreResult<()>> + 'static,
    {
        let generation = self.ledger.borrow_mut().issue(op);
        let ledger = Rc::clone(&self.ledger);
        let task = make(Arc::clone(&self.store));
        self.pending.push(
            async move {
                let result = task.await;
                ledger.borrow_mut().complete(op, generation, &result);
            }
            .boxed_local(),
        );
    }

    /// Await a push inline, recording it in the ledger.
    async fn tracked<T>(&self, op: SaveOp, push: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        let generation = self.ledger.borrow_mut().issue(op);
        let result = push.await;
        self.ledger.borrow_mut().complete(op, generation, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::DEFAULT_TITLE;
    use crate::layers::{BACKGROUND_LAYER, ROUTES_LAYER};
    use crate::shapes::{Rgb, ShapeKind};
    use crate::storage::MemoryPlanStore;
    use pollster::block_on;

    fn controller(store: &Arc<MemoryPlanStore>) -> SyncController<MemoryPlanStore> {
        SyncController::new(Arc::clone(store), EngineConfig::default())
    }

    fn scenario_stroke(sync: &mut SyncController<MemoryPlanStore>) -> CanvasEvent {
        sync.pointer_down(Point::new(0.0, 0.0));
        sync.pointer_move(Point::new(10.0, 0.0));
        sync.pointer_move(Point::new(10.0, 10.0));
        sync.pointer_up(Point::new(10.0, 10.0))
    }

    #[test]
    fn test_unknown_token_creates_plan() {
        let store = Arc::new(MemoryPlanStore::new());
        let mut sync = controller(&store);
        let state = block_on(sync.start("fresh-token"));

        let plan = block_on(store.resolve_plan("fresh-token")).unwrap();
        assert_eq!(state, SyncState::OnlineBound { plan_id: plan.id });
        assert_eq!(sync.title(), DEFAULT_TITLE);
        assert!(sync.document().is_empty());
        assert_eq!(sync.document().layers.len(), 3);

        block_on(sync.flush());
        assert_eq!(block_on(store.list_layers(plan.id)).unwrap().len(), 3);
    }

    #[test]
    fn test_store_outage_goes_offline() {
        let store = Arc::new(MemoryPlanStore::new());
        store.set_available(false);
        let mut sync = controller(&store);
        assert_eq!(block_on(sync.start("trip")), SyncState::Offline);
        assert_eq!(sync.title(), format!("{DEFAULT_TITLE}{OFFLINE_SUFFIX}"));

        assert!(scenario_stroke(&mut sync).is_commit());
        assert_eq!(sync.pending_saves(), 0);
        let report = block_on(sync.save());
        assert!(!report.persisted);
        assert_eq!(sync.document().paths.len(), 1);
    }

    #[test]
    fn test_failed_create_goes_offline() {
        let store = Arc::new(MemoryPlanStore::new());
        let mut sync = controller(&store);
        // Not a URL-safe token, so the store refuses to create the plan.
        assert_eq!(block_on(sync.start("bad token")), SyncState::Offline);
        assert!(sync.title().ends_with(OFFLINE_SUFFIX));
    }

    #[test]
    fn test_scenario_stroke_round_trip() {
        let store = Arc::new(MemoryPlanStore::new());
        let mut first = controller(&store);
        block_on(first.start("lisbon"));
        assert!(scenario_stroke(&mut first).is_commit());
        block_on(first.flush());

        let mut second = controller(&store);
        block_on(second.start("lisbon"));
        let paths = &second.document().paths;
        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths[0].points,
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)]
        );
        assert_eq!(paths[0].stroke_color, Rgb::from_hex("#3b82f6").unwrap());
        assert_eq!(paths[0].stroke_width, 4.0);
        assert_ne!(paths[0].id(), first.document().paths[0].id());

        let routes = second.document().layers.find_by_name(ROUTES_LAYER).unwrap().id;
        assert_eq!(second.document().paths_on(routes).count(), 1);
    }

    #[test]
    fn test_push_failure_keeps_state_and_edits() {
        let store = Arc::new(MemoryPlanStore::new());
        let mut sync = controller(&store);
        let state = block_on(sync.start("trip"));
        block_on(sync.flush());

        store.set_available(false);
        scenario_stroke(&mut sync);
        block_on(sync.flush());

        assert_eq!(sync.state(), state);
        assert_eq!(sync.document().paths.len(), 1);
        assert_eq!(sync.ledger().failures(), 2);
    }

    #[test]
    fn test_explicit_save_skips_single_point_paths() {
        let store = Arc::new(MemoryPlanStore::new());
        let mut sync = controller(&store);
        block_on(sync.start("trip"));
        sync.pointer_down(Point::new(5.0, 5.0));
        sync.pointer_up(Point::new(5.0, 5.0));
        scenario_stroke(&mut sync);

        let report = block_on(sync.save());
        assert!(report.persisted);
        assert_eq!(report.drawings_saved, 1);
        assert_eq!(report.drawings_skipped, 1);
        assert_eq!(sync.document().paths.len(), 2);

        let plan_id = sync.plan_id().unwrap();
        assert_eq!(block_on(store.load_drawings(plan_id)).unwrap().len(), 1);
    }

    #[test]
    fn test_queued_clear_does_not_overwrite_later_save() {
        let store = Arc::new(MemoryPlanStore::new());
        let config = EngineConfig { auto_save: false, ..EngineConfig::default() };
        let mut sync = SyncController::new(Arc::clone(&store), config);
        block_on(sync.start("trip"));
        block_on(sync.flush());

        sync.clear();
        assert!(scenario_stroke(&mut sync).is_commit());
        let report = block_on(sync.save());
        assert!(report.persisted);
        assert_eq!(sync.pending_saves(), 0);

        block_on(sync.flush());
        let plan_id = sync.plan_id().unwrap();
        assert_eq!(block_on(store.load_drawings(plan_id)).unwrap().len(), 1);
        assert_eq!(sync.document().paths.len(), 1);
    }

    #[test]
    fn test_explicit_save_round_trips_fields() {
        let store = Arc::new(MemoryPlanStore::new());
        let config = EngineConfig { auto_save: false, ..EngineConfig::default() };
        let mut first = SyncController::new(Arc::clone(&store), config.clone());
        block_on(first.start("kyoto"));
        let temples = first.add_layer("Temples").unwrap();

        scenario_stroke(&mut first);
        first.canvas_mut().set_active_layer(Some(temples));
        first.canvas_mut().tools.config.stroke_color = Rgb::new(0xef, 0x44, 0x44);
        first.canvas_mut().tools.config.brush_size = 7.0;
        for offset in [20.0, 40.0] {
            first.pointer_down(Point::new(offset, 5.0));
            first.pointer_move(Point::new(offset + 5.0, 15.0));
            first.pointer_up(Point::new(offset + 5.0, 15.0));
        }
        let report = block_on(first.save());
        assert!(report.persisted);
        assert_eq!(report.drawings_saved, 3);
        block_on(first.flush());

        let mut second = SyncController::new(Arc::clone(&store), config);
        block_on(second.start("kyoto"));
        let saved = &first.document().paths;
        let loaded = &second.document().paths;
        assert_eq!(loaded.len(), saved.len());
        for (before, after) in saved.iter().zip(loaded) {
            assert_eq!(after.points, before.points);
            assert_eq!(after.stroke_color, before.stroke_color);
            assert_eq!(after.stroke_width, before.stroke_width);
            assert_eq!(after.layer_ref, before.layer_ref);
        }
        assert_eq!(loaded[0].layer_ref, None);
        assert_eq!(loaded[1].layer_ref, Some(temples));
        assert_eq!(second.document().paths_on(temples).count(), 2);
    }

    #[test]
    fn test_pump_completes_ready_pushes() {
        let store = Arc::new(MemoryPlanStore::new());
        let mut sync = controller(&store);
        block_on(sync.start("trip"));
        sync.pump();
        scenario_stroke(&mut sync);
        assert_eq!(sync.pending_saves(), 2);
        assert_eq!(sync.pump(), 2);
        assert_eq!(sync.pending_saves(), 0);
    }

    #[test]
    fn test_debounced_autosave_coalesces() {
        let store = Arc::new(MemoryPlanStore::new());
        let config = EngineConfig { autosave_debounce_ms: 60_000, ..EngineConfig::default() };
        let mut sync = SyncController::new(Arc::clone(&store), config);
        block_on(sync.start("trip"));
        block_on(sync.flush());
        let issued = sync.ledger().issued();

        scenario_stroke(&mut sync);
        scenario_stroke(&mut sync);
        assert_eq!(sync.pending_saves(), 0);
        sync.pump();
        assert_eq!(sync.pending_saves(), 0);

        assert_eq!(block_on(sync.flush()), 2);
        assert_eq!(sync.ledger().issued(), issued + 2);
        let plan_id = sync.plan_id().unwrap();
        assert_eq!(block_on(store.load_drawings(plan_id)).unwrap().len(), 2);
    }

    #[test]
    fn test_layer_ops_are_pushed_and_rehydrated() {
        let store = Arc::new(MemoryPlanStore::new());
        let mut sync = controller(&store);
        block_on(sync.start("trip"));
        block_on(sync.flush());
        let food = sync.add_layer("Food").unwrap();
        sync.canvas_mut().set_active_layer(Some(food));
        sync.set_tool(ToolKind::Shape(ShapeKind::Rectangle));
        sync.pointer_down(Point::new(10.0, 10.0));
        sync.pointer_up(Point::new(50.0, 40.0));
        block_on(sync.flush());

        let mut reloaded = controller(&store);
        block_on(reloaded.start("trip"));
        let layer = reloaded.document().layers.get(food).unwrap();
        assert_eq!(layer.name, "Food");
        assert_eq!(reloaded.document().shapes_on(food).len(), 1);
    }

    #[test]
    fn test_protected_layer_delete_is_rejected() {
        let store = Arc::new(MemoryPlanStore::new());
        let mut sync = controller(&store);
        block_on(sync.start("trip"));
        let background = sync.document().layers.find_by_name(BACKGROUND_LAYER).unwrap().id;
        assert!(matches!(sync.delete_layer(background), Err(LayerError::Protected(_))));
        assert_eq!(sync.document().layers.len(), 3);
    }

    #[test]
    fn test_title_and_destinations() {
        let store = Arc::new(MemoryPlanStore::new());
        let mut sync = controller(&store);
        block_on(sync.start("trip"));
        sync.set_title("Porto weekend");
        let cafe = block_on(sync.add_destination(NewDestination {
            name: "Cafe".to_string(),
            x: 40.0,
            y: 60.0,
            notes: Some("breakfast".to_string()),
        }));
        block_on(sync.flush());

        let plan = block_on(store.resolve_plan("trip")).unwrap();
        assert_eq!(plan.title, "Porto weekend");
        assert_eq!(block_on(store.list_destinations(plan.id)).unwrap(), vec![cafe.clone()]);

        assert!(sync.delete_destination(cafe.id));
        block_on(sync.flush());
        assert!(block_on(store.list_destinations(plan.id)).unwrap().is_empty());
        assert!(!sync.delete_destination(cafe.id));
    }

    #[test]
    fn test_local_edits_survive_hydration() {
        let store = Arc::new(MemoryPlanStore::new());
        let mut seed = controller(&store);
        block_on(seed.start("trip"));
        scenario_stroke(&mut seed);
        block_on(seed.flush());

        let mut sync = controller(&store);
        scenario_stroke(&mut sync);
        block_on(sync.start("trip"));
        assert_eq!(sync.document().paths.len(), 2);
        block_on(sync.flush());
        let plan_id = sync.plan_id().unwrap();
        assert_eq!(block_on(store.load_drawings(plan_id)).unwrap().len(), 2);
    }
}
