//! In-memory plan store.

use super::plan::{PlanTable, StoredPlan};
use super::{
    BoxFuture, Destination, DrawingRecord, LayerRecord, NewDestination, Plan, PlanId, PlanStore,
    ShapeRecord, StoreError, StoreResult,
};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// In-memory plan store for tests and offline sessions.
///
/// Applies the same constraints as the remote store and can simulate an
/// outage with [`MemoryPlanStore::set_available`].
pub struct MemoryPlanStore {
    table: RwLock<PlanTable>,
    available: AtomicBool,
}

impl Default for MemoryPlanStore {
    fn default() -> Self {
        Self { table: RwLock::new(PlanTable::default()), available: AtomicBool::new(true) }
    }
}

impl MemoryPlanStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle availability. While unavailable every call fails with
    /// [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }

    fn read<T>(&self, f: impl FnOnce(&PlanTable) -> StoreResult<T>) -> StoreResult<T> {
        self.check_available()?;
        let table = self
            .table
            .read()
            .map_err(|e| StoreError::Unavailable(format!("Lock error: {}", e)))?;
        f(&table)
    }

    fn write<T>(&self, f: impl FnOnce(&mut PlanTable) -> StoreResult<T>) -> StoreResult<T> {
        self.check_available()?;
        let mut table = self
            .table
            .write()
            .map_err(|e| StoreError::Unavailable(format!("Lock error: {}", e)))?;
        f(&mut table)
    }

    fn update_plan<T>(
        &self,
        plan_id: PlanId,
        f: impl FnOnce(&mut StoredPlan) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.write(|table| f(table.get_mut(plan_id)?))
    }
}

impl PlanStore for MemoryPlanStore {
    fn resolve_plan(&self, token: &str) -> BoxFuture<'_, StoreResult<Plan>> {
        let token = token.to_string();
        Box::pin(async move { self.read(|table| Ok(table.by_token(&token)?.plan.clone())) })
    }

    fn create_plan(&self, title: &str, description: &str, token: &str) -> BoxFuture<'_, StoreResult<Plan>> {
        let (title, description, token) = (title.to_string(), description.to_string(), token.to_string());
        Box::pin(async move {
            self.write(|table| Ok(table.create(&title, &description, &token)?.plan.clone()))
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
            self.write(|table| {
                let owner = table
                    .owner_of_destination(id)
                    .ok_or_else(|| StoreError::NotFound(format!("destination {id}")))?;
                table.get_mut(owner)?.remove_destination(id);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Path, Rgb};
    use kurbo::Point;
    use pollster::block_on;

    fn drawing() -> DrawingRecord {
        let path = Path::from_points(
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)],
            Rgb::from_hex("#3b82f6").unwrap(),
            4.0,
        );
        DrawingRecord::from(&path)
    }

    #[test]
    fn test_resolve_unknown_token() {
        let store = MemoryPlanStore::new();
        let result = block_on(store.resolve_plan("missing"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_create_then_resolve() {
        let store = MemoryPlanStore::new();
        let plan = block_on(store.create_plan("Lisbon", "", "lisbon")).unwrap();
        let resolved = block_on(store.resolve_plan("lisbon")).unwrap();
        assert_eq!(plan, resolved);
    }

    #[test]
    fn test_replace_drawings_reassigns_ids() {
        let store = MemoryPlanStore::new();
        let plan = block_on(store.create_plan("Trip", "", "trip")).unwrap();
        let record = drawing();
        block_on(store.replace_drawings(plan.id, vec![record.clone()])).unwrap();

        let loaded = block_on(store.load_drawings(plan.id)).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_ne!(loaded[0].id, record.id);
        assert_eq!(loaded[0].path_data, record.path_data);

        block_on(store.replace_drawings(plan.id, Vec::new())).unwrap();
        assert!(block_on(store.load_drawings(plan.id)).unwrap().is_empty());
    }

    #[test]
    fn test_constraint_violation_leaves_data() {
        let store = MemoryPlanStore::new();
        let plan = block_on(store.create_plan("Trip", "", "trip")).unwrap();
        block_on(store.replace_drawings(plan.id, vec![drawing()])).unwrap();

        let mut bad = drawing();
        bad.stroke_width = 80.0;
        let result = block_on(store.replace_drawings(plan.id, vec![bad]));
        assert!(matches!(result, Err(StoreError::Constraint(_))));
        assert_eq!(block_on(store.load_drawings(plan.id)).unwrap().len(), 1);
    }

    #[test]
    fn test_unavailable() {
        let store = MemoryPlanStore::new();
        store.set_available(false);
        let result = block_on(store.create_plan("Trip", "", "trip"));
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        store.set_available(true);
        assert!(block_on(store.create_plan("Trip", "", "trip")).is_ok());
    }

    #[test]
    fn test_load_content_joins_both() {
        let store = MemoryPlanStore::new();
        let plan = block_on(store.create_plan("Trip", "", "trip")).unwrap();
        block_on(store.replace_drawings(plan.id, vec![drawing()])).unwrap();
        let (drawings, shapes) = block_on(store.load_content(plan.id, "trip")).unwrap();
        assert_eq!(drawings.len(), 1);
        assert!(shapes.is_empty());
    }

    #[test]
    fn test_destinations() {
        let store = MemoryPlanStore::new();
        let plan = block_on(store.create_plan("Trip", "", "trip")).unwrap();
        let new = NewDestination { name: "Cafe".to_string(), x: 1.0, y: 2.0, notes: None };
        let created = block_on(store.create_destination(plan.id, new)).unwrap();
        assert_eq!(block_on(store.list_destinations(plan.id)).unwrap(), vec![created.clone()]);

        block_on(store.delete_destination(created.id)).unwrap();
        assert!(block_on(store.list_destinations(plan.id)).unwrap().is_empty());
        assert!(block_on(store.delete_destination(created.id)).is_err());
    }
}
