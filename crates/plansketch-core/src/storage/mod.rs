//! Plan store contract and local backends.
//!
//! The remote plan store is an external collaborator; the core only talks to
//! it through [`PlanStore`]. [`MemoryPlanStore`] and [`FilePlanStore`] enforce
//! the same constraints a real store does.

mod file;
mod memory;
mod plan;
pub mod record;

pub use file::FilePlanStore;
pub use memory::MemoryPlanStore;
pub use record::{DrawingRecord, LayerRecord, ShapeRecord};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a stored plan.
pub type PlanId = Uuid;

/// Maximum share token length.
pub const MAX_TOKEN_LEN: usize = 64;

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Boxed future for async store operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// A persisted plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub token: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// A point annotation owned by a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub id: Uuid,
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Fields for a destination that has no id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDestination {
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewDestination {
    pub fn into_destination(self, id: Uuid) -> Destination {
        Destination { id, name: self.name, x: self.x, y: self.y, notes: self.notes }
    }
}

/// Check that a share token is non-empty, at most 64 characters and URL-safe.
pub fn validate_token(token: &str) -> StoreResult<()> {
    let url_safe = token
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if token.is_empty() || token.len() > MAX_TOKEN_LEN || !url_safe {
        return Err(StoreError::Validation(format!("invalid share token {token:?}")));
    }
    Ok(())
}

/// Generate a fresh URL-safe share token.
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Trait for plan store backends.
///
/// Implementations must be Send + Sync; the returned futures are not
/// required to be, since the engine runs them on a single thread.
pub trait PlanStore: Send + Sync {
    /// Resolve a share token to its plan.
    fn resolve_plan(&self, token: &str) -> BoxFuture<'_, StoreResult<Plan>>;

    /// Create a plan bound to a share token.
    fn create_plan(&self, title: &str, description: &str, token: &str) -> BoxFuture<'_, StoreResult<Plan>>;

    fn update_plan_title(&self, plan_id: PlanId, title: &str) -> BoxFuture<'_, StoreResult<()>>;

    fn list_destinations(&self, plan_id: PlanId) -> BoxFuture<'_, StoreResult<Vec<Destination>>>;

    fn create_destination(&self, plan_id: PlanId, destination: NewDestination) -> BoxFuture<'_, StoreResult<Destination>>;

    fn delete_destination(&self, id: Uuid) -> BoxFuture<'_, StoreResult<()>>;

    /// Replace all drawings of a plan (clear, then insert).
    fn replace_drawings(&self, plan_id: PlanId, drawings: Vec<DrawingRecord>) -> BoxFuture<'_, StoreResult<()>>;

    /// Replace all shapes of a plan (clear, then insert).
    fn replace_shapes(&self, plan_id: PlanId, shapes: Vec<ShapeRecord>) -> BoxFuture<'_, StoreResult<()>>;

    fn load_drawings(&self, plan_id: PlanId) -> BoxFuture<'_, StoreResult<Vec<DrawingRecord>>>;

    /// Load shapes by share token.
    fn load_shapes(&self, token: &str) -> BoxFuture<'_, StoreResult<Vec<ShapeRecord>>>;

    fn list_layers(&self, plan_id: PlanId) -> BoxFuture<'_, StoreResult<Vec<LayerRecord>>>;

    /// Replace all layers of a plan.
    fn replace_layers(&self, plan_id: PlanId, layers: Vec<LayerRecord>) -> BoxFuture<'_, StoreResult<()>>;

    /// Load drawings and shapes concurrently.
    fn load_content<'a>(
        &'a self,
        plan_id: PlanId,
        token: &'a str,
    ) -> BoxFuture<'a, StoreResult<(Vec<DrawingRecord>, Vec<ShapeRecord>)>> {
        Box::pin(async move {
            let (drawings, shapes) =
                futures_util::future::join(self.load_drawings(plan_id), self.load_shapes(token)).await;
            Ok((drawings?, shapes?))
        })
    }
}
