//! Main application entry point.

use clap::Parser;
use plansketch_app::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    log::info!("Starting PlanSketch for token {}", cli.token);

    match pollster::block_on(plansketch_app::run(&cli)) {
        Ok(summary) => {
            println!("{} [{:?}]", summary.title, summary.state);
            println!(
                "{} primitives, {} commits, {} rejected",
                summary.primitives, summary.replay.commits, summary.replay.rejected
            );
            if let Some(err) = &summary.report.error {
                println!("save failed: {}", err);
            }
            if let Some(path) = &summary.output {
                println!("wrote {}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{}", err);
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
