//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

/// Sketch on a trip plan from a pointer script and render it to PNG
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "plansketch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Share token of the plan to open (created if unknown)
    #[arg(long, value_name = "TOKEN")]
    pub token: String,

    /// JSON pointer script to replay
    #[arg(long, value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Where to write the rendered plan
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Engine configuration (JSON)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Plan store directory, overriding the configuration
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Work without a plan store; nothing is persisted
    #[arg(long)]
    pub offline: bool,
}
