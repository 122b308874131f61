//! Plan table shared by the local store backends.

use super::{
    Destination, DrawingRecord, LayerRecord, NewDestination, Plan, PlanId, ShapeRecord,
    StoreError, StoreResult, validate_token,
};
use crate::canvas::MAX_SHAPES_PER_LAYER;
use crate::layers::{MAX_LAYERS, MAX_Z_INDEX, validate_layer_name};
use crate::shapes::COORDINATE_RANGE;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Everything stored for one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredPlan {
    pub plan: Plan,
    #[serde(default)]
    pub drawings: Vec<DrawingRecord>,
    #[serde(default)]
    pub shapes: Vec<ShapeRecord>,
    #[serde(default)]
    pub layers: Vec<LayerRecord>,
    #[serde(default)]
    pub destinations: Vec<Destination>,
}

impl StoredPlan {
    pub fn new(title: &str, description: &str, token: &str) -> Self {
        Self {
            plan: Plan {
                id: Uuid::new_v4(),
                token: token.to_string(),
                title: title.to_string(),
                description: description.to_string(),
            },
            drawings: Vec::new(),
            shapes: Vec::new(),
            layers: Vec::new(),
            destinations: Vec::new(),
        }
    }

    /// Replace drawings, assigning fresh ids as the store does on insert.
    pub fn replace_drawings(&mut self, drawings: Vec<DrawingRecord>) -> StoreResult<()> {
        for drawing in &drawings {
            drawing
                .check()
                .map_err(|e| StoreError::Constraint(format!("drawing {}: {e}", drawing.id)))?;
        }
        self.drawings = drawings
            .into_iter()
            .map(|mut drawing| {
                drawing.id = Uuid::new_v4();
                drawing
            })
            .collect();
        Ok(())
    }

    pub fn replace_shapes(&mut self, shapes: Vec<ShapeRecord>) -> StoreResult<()> {
        let mut per_layer: HashMap<Option<Uuid>, usize> = HashMap::new();
        for shape in &shapes {
            shape
                .check()
                .map_err(|e| StoreError::Constraint(format!("shape {}: {e}", shape.id)))?;
            let count = per_layer.entry(shape.layer_id).or_default();
            *count += 1;
            if *count > MAX_SHAPES_PER_LAYER {
                return Err(StoreError::Constraint(
                    "more than 500 shapes on one layer".to_string(),
                ));
            }
        }
        self.shapes = shapes
            .into_iter()
            .map(|mut shape| {
                shape.id = Uuid::new_v4();
                shape
            })
            .collect();
        Ok(())
    }

    /// Replace layers. Layer ids are kept so primitive references survive.
    pub fn replace_layers(&mut self, layers: Vec<LayerRecord>) -> StoreResult<()> {
        if layers.len() > MAX_LAYERS {
            return Err(StoreError::Constraint("more than 20 layers".to_string()));
        }
        let mut seen = HashSet::new();
        for layer in &layers {
            validate_layer_name(&layer.name).map_err(|e| StoreError::Constraint(e.to_string()))?;
            if layer.z_index > MAX_Z_INDEX {
                return Err(StoreError::Constraint(format!(
                    "layer {} z-index {} out of range",
                    layer.name, layer.z_index
                )));
            }
            if !seen.insert(layer.z_index) {
                return Err(StoreError::Constraint(format!(
                    "duplicate layer z-index {}",
                    layer.z_index
                )));
            }
        }
        self.layers = layers;
        Ok(())
    }

    pub fn add_destination(&mut self, destination: NewDestination) -> StoreResult<Destination> {
        if destination.name.trim().is_empty() {
            return Err(StoreError::Validation("destination name is empty".to_string()));
        }
        for (axis, value) in [("x", destination.x), ("y", destination.y)] {
            if !(value.is_finite() && COORDINATE_RANGE.contains(&value)) {
                return Err(StoreError::Constraint(format!(
                    "destination {axis} {value} out of range"
                )));
            }
        }
        let destination = destination.into_destination(Uuid::new_v4());
        self.destinations.push(destination.clone());
        Ok(destination)
    }

    /// Remove a destination, returning whether it was present.
    pub fn remove_destination(&mut self, id: Uuid) -> bool {
        let before = self.destinations.len();
        self.destinations.retain(|d| d.id != id);
        self.destinations.len() != before
    }
}

/// All plans of a local store, keyed by id, with a token index.
#[derive(Debug, Default)]
pub(crate) struct PlanTable {
    plans: HashMap<PlanId, StoredPlan>,
    tokens: HashMap<String, PlanId>,
}

impl PlanTable {
    pub fn insert(&mut self, stored: StoredPlan) {
        self.tokens.insert(stored.plan.token.clone(), stored.plan.id);
        self.plans.insert(stored.plan.id, stored);
    }

    pub fn plans(&self) -> impl Iterator<Item = &StoredPlan> {
        self.plans.values()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn by_token(&self, token: &str) -> StoreResult<&StoredPlan> {
        self.tokens
            .get(token)
            .and_then(|id| self.plans.get(id))
            .ok_or_else(|| StoreError::NotFound(format!("plan for token {token}")))
    }

    pub fn get(&self, plan_id: PlanId) -> StoreResult<&StoredPlan> {
        self.plans
            .get(&plan_id)
            .ok_or_else(|| StoreError::NotFound(format!("plan {plan_id}")))
    }

    pub fn get_mut(&mut self, plan_id: PlanId) -> StoreResult<&mut StoredPlan> {
        self.plans
            .get_mut(&plan_id)
            .ok_or_else(|| StoreError::NotFound(format!("plan {plan_id}")))
    }

    /// Create a plan; the token must be valid and unused.
    pub fn create(&mut self, title: &str, description: &str, token: &str) -> StoreResult<&StoredPlan> {
        validate_token(token)?;
        if self.tokens.contains_key(token) {
            return Err(StoreError::Constraint(format!("token {token} already bound")));
        }
        if title.trim().is_empty() {
            return Err(StoreError::Validation("plan title is empty".to_string()));
        }
        let stored = StoredPlan::new(title, description, token);
        let id = stored.plan.id;
        self.insert(stored);
        self.get(id)
    }

    /// Find the plan owning a destination.
    pub fn owner_of_destination(&self, id: Uuid) -> Option<PlanId> {
        self.plans
            .values()
            .find(|stored| stored.destinations.iter().any(|d| d.id == id))
            .map(|stored| stored.plan.id)
    }
}
