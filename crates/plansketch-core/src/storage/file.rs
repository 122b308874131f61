//! File-based plan store for native platforms.

use super::plan::{PlanTable, StoredPlan};
use super::{
    BoxFuture, Destination, DrawingRecord, LayerRecord, NewDestination, Plan, PlanId, PlanStore,
    ShapeRecord, StoreError, StoreResult,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use uuid::Uuid;

const INDEX_FILE: &str = "tokens.json";

/// File-based plan store.
///
/// Each plan is one JSON file named after its id; `tokens.json` maps share
/// tokens to plan ids. The whole table is read once on open and every write
/// rewrites the touched plan file.
pub struct FilePlanStore {
    base_path: PathBuf,
    table: RwLock<PlanTable>,
}

impl FilePlanStore {
    /// Open a store in the given directory, creating it if needed.
    pub fn open(base_path: PathBuf) -> StoreResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StoreError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        let table = load_table(&base_path)?;
        Ok(Self { base_path, table: RwLock::new(table) })
    }

    /// Open the store in the default location.
    ///
    /// On Linux: `~/.local/share/plansketch/plans/`
    pub fn default_location() -> StoreResult<Self> {
        Self::open(Self::default_dir()?)
    }

    pub fn default_dir() -> StoreResult<PathBuf> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StoreError::Io("Could not determine home directory".to_string()))?;
        Ok(base.join("plansketch").join("plans"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn plan_path(&self, plan_id: PlanId) -> PathBuf {
        self.base_path.join(format!("{}.json", plan_id))
    }

    fn write_plan(&self, stored: &StoredPlan) -> StoreResult<()> {
        let path = self.plan_path(stored.plan.id);
        let json = serde_json::to_string_pretty(stored)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        fs::write(&path, json)
            .map_err(|e| StoreError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }

    fn write_index(&self, table: &PlanTable) -> StoreResult<()> {
        let index: BTreeMap<&str, PlanId> = table
            .plans()
            .map(|stored| (stored.plan.token.as_str(), stored.plan.id))
            .collect();
        let path = self.base_path.join(INDEX_FILE);
        let json = serde_json::to_string_pretty(&index)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        fs::write(&path, json)
            .map_err(|e| StoreError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }

    fn read<T>(&self, f: impl FnOnce(&PlanTable) -> StoreResult<T>) -> StoreResult<T> {
        let table = self
            .table
            .read()
            .map_err(|e| StoreError::Io(format!("Lock error: {}", e)))?;
        f(&table)
    }

    /// Apply a change to one plan and persist it. The file is only written
    /// when the change succeeds.
    fn update_plan<T>(
        &self,
        plan_id: PlanId,
        f: impl FnOnce(&mut StoredPlan) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut table = self
            .table
            .write()
            .map_err(|e| StoreError::Io(format!("Lock error: {}", e)))?;
        let stored = table.get_mut(plan_id)?;
        let mut draft = stored.clone();
        let out = f(&mut draft)?;
        self.write_plan(&draft)?;
        *stored = draft;
        Ok(out)
    }
}

fn load_table(base_path: &Path) -> StoreResult<PlanTable> {
    let mut table = PlanTable::default();
    let index_path = base_path.join(INDEX_FILE);
    if !index_path.exists() {
        return Ok(table);
    }
    let json = fs::read_to_string(&index_path)
        .map_err(|e| StoreError::Io(format!("Failed to read {}: {}", index_path.display(), e)))?;
    let index: BTreeMap<String, PlanId> = serde_json::from_str(&json).map_err(|e| {
        StoreError::Serialization(format!("Failed to parse {}: {}", index_path.display(), e))
    })?;

    for (token, plan_id) in index {
        let path = base_path.join(format!("{}.json", plan_id));
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Plan file for token {} unreadable ({}): {}", token, path.display(), e);
                continue;
            }
        };
        let stored: StoredPlan = serde_json::from_str(&json).map_err(|e| {
            StoreError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        table.insert(stored);
    }
    log::debug!("Loaded {} plans from {}", table.len(), base_path.display());
    Ok(table)
}

impl PlanStore for FilePlanStore {
    fn resolve_plan(&self, token: &str) -> BoxFuture<'_, StoreResult<Plan>> {
        let token = token.to_string();
        Box::pin(async move { self.read(|table| Ok(table.by_token(&token)?.plan.clone())) })
    }

    fn create_plan(&self, title: &str, description: &str, token: &str) -> BoxFuture<'_, StoreResult<Plan>> {
        let (title, description, token) = (title.to_string(), description.to_string(), token.to_string());
        Box::pin(async move {
            let mut table = self
                .table
                .write()
                .map_err(|e| StoreError::Io(format!("Lock error: {}", e)))?;
            let stored = table.create(&title, &description, &token)?.clone();
            self.write_plan(&stored)?;
            self.write_index(&table)?;
            log::info!("Created plan {} for token {}", stored.plan.id, token);
            Ok(stored.plan)
        })
    }

    fn update_plan_title(&self, plan_id: PlanId, title: &str) -> BoxFuture<'_, StoreResult<()>> {
        let title = title.to_string();
        Box::pin(async move {
            if title.trim().is_empty() {
                return Err(StoreError::Validation("plan title is empty".to_string()));
            }
            self.update_plan(plan_id, |stored| {
                stored.plan.title = title;
                Ok(())
            })
        })
    }

    fn list_destinations(&self, plan_id: PlanId) -> BoxFuture<'_, StoreResult<Vec<Destination>>> {
        Box::pin(async move { self.read(|table| Ok(table.get(plan_id)?.destinations.clone())) })
    }

    fn create_destination(&self, plan_id: PlanId, destination: NewDestination) -> BoxFuture<'_, StoreResult<Destination>> {
        Box::pin(async move { self.update_plan(plan_id, |stored| stored.add_destination(destination)) })
    }

    fn delete_destination(&self, id: Uuid) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let owner = self
                .read(|table| Ok(table.owner_of_destination(id)))?
                .ok_or_else(|| StoreError::NotFound(format!("destination {id}")))?;
            self.update_plan(owner, |stored| {
                stored.remove_destination(id);
                Ok(())
            })
        })
    }

    fn replace_drawings(&self, plan_id: PlanId, drawings: Vec<DrawingRecord>) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move { self.update_plan(plan_id, |stored| stored.replace_drawings(drawings)) })
    }

    fn replace_shapes(&self, plan_id: PlanId, shapes: Vec<ShapeRecord>) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move { self.update_plan(plan_id, |stored| stored.replace_shapes(shapes)) })
    }

    fn load_drawings(&self, plan_id: PlanId) -> BoxFuture<'_, StoreResult<Vec<DrawingRecord>>> {
        Box::pin(async move { self.read(|table| Ok(table.get(plan_id)?.drawings.clone())) })
    }

    fn load_shapes(&self, token: &str) -> BoxFuture<'_, StoreResult<Vec<ShapeRecord>>> {
        let token = token.to_string();
        Box::pin(async move { self.read(|table| Ok(table.by_token(&token)?.shapes.clone())) })
    }

    fn list_layers(&self, plan_id: PlanId) -> BoxFuture<'_, StoreResult<Vec<LayerRecord>>> {
        Box::pin(async move { self.read(|table| Ok(table.get(plan_id)?.layers.clone())) })
    }

    fn replace_layers(&self, plan_id: PlanId, layers: Vec<LayerRecord>) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move { self.update_plan(plan_id, |stored| stored.replace_layers(layers)) })
    }
}
