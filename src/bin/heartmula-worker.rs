//! heartmula-worker: HeartMuLa job handler for GPU nodes.
//!
//! Runs in two modes:
//! - Serve mode: job events as JSON lines on stdin, responses on stdout
//! - Test mode: one sample job, audio saved locally

use heartmula_jobs::cli::WorkerCli;
use heartmula_jobs::config::WorkerConfig;
use heartmula_jobs::error::Result;
use heartmula_jobs::logging::init_logging;
use heartmula_jobs::worker::{run_server, run_test_job, CommandLoader, Worker};

fn main() {
    dotenvy::dotenv().ok();
    init_logging();

    if let Err(e) = run(WorkerCli::parse_args()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: WorkerCli) -> Result<()> {
    let config = WorkerConfig::from_env();
    tracing::info!(
        model_path = %config.model_path.display(),
        version = %config.model_version,
        "Starting worker"
    );

    let worker = Worker::new(CommandLoader::new(config));

    if cli.is_test_mode() {
        let saved = run_test_job(&worker, &cli.output)?;
        eprintln!("Success! Generated {} bytes of audio", saved.size_bytes);
        eprintln!("Saved to {}", saved.path.display());
        return Ok(());
    }

    run_server(&worker)?;
    Ok(())
}
