use anyhow::{Context, Result};
use clap::Parser;
use facescan_core::OnnxFaceEncoder;
use facescan_worker::engine::spawn_engine;
use facescan_worker::reporter::HttpReporter;
use facescan_worker::{BatchRunner, Config, RunError, ScanSummary, Task};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "facescan",
    about = "Search a directory of photos for the face in a reference image"
)]
struct Cli {
    /// Task identifier, echoed on every event sent to the task server
    task_id: String,
    /// Photo holding the face to look for
    source_image: PathBuf,
    /// Directory whose .jpg files are compared against the source face
    target_dir: PathBuf,
    /// Port of the task server receiving progress events
    server_port: u16,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(summary) => {
            match serde_json::to_string(&summary) {
                Ok(json) => println!("{json}"),
                Err(err) => tracing::warn!(error = %err, "cannot serialize summary"),
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            let code = err.downcast_ref::<RunError>().map_or(1, RunError::exit_code);
            tracing::error!(error = ?err, "task failed");
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<ScanSummary> {
    let config = Config::from_env()?;
    let task = Task::new(
        cli.task_id,
        cli.source_image,
        cli.target_dir,
        config.report_url(cli.server_port),
    )?;
    tracing::info!(
        task_id = %task.id,
        report_url = %task.report_url,
        comparator = ?config.comparator,
        "facescan starting"
    );

    let encoder = OnnxFaceEncoder::load(&config.model_dir)
        .with_context(|| format!("loading models from {}", config.model_dir.display()))?;
    let engine = spawn_engine(encoder)?;

    let comparator = config.build_comparator();
    let reporter = HttpReporter::new(task.report_url.clone(), config.status_style)?;

    let runner = BatchRunner::new(
        &engine,
        comparator.as_ref(),
        &reporter,
        &config.reports_dir,
        config.report_failure,
    );
    Ok(runner.run(&task).await?)
}
