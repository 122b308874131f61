//! PlanSketch application shell.
//!
//! Binds a sync session to a share token, replays a pointer script and
//! renders the result.

pub mod cli;
pub mod script;
pub mod session;

pub use cli::Cli;
pub use script::{Script, Step};
pub use session::{ReplaySummary, RunSummary, render_plan, replay, run};

use plansketch_core::config::ConfigError;
use plansketch_core::layers::LayerError;
use plansketch_core::storage::StoreError;
use plansketch_render::RenderError;
use std::path::PathBuf;
use thiserror::Error;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("plan store error: {0}")]
    Store(#[from] StoreError),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    #[error("layer error: {0}")]
    Layer(#[from] LayerError),
    #[error("invalid script {path}: {source}")]
    Script {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unknown layer {0:?}")]
    UnknownLayer(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
