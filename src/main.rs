//! heartmula: submit a song to a serverless HeartMuLa endpoint and save it.

use heartmula_jobs::cli::ClientCli;
use heartmula_jobs::error::Result;
use heartmula_jobs::logging::init_logging;
use heartmula_jobs::materialize::decode_and_save;
use heartmula_jobs::{JobRunner, PollOptions, RunpodTransport};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_logging();

    if let Err(e) = run(ClientCli::parse_args()).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: ClientCli) -> Result<()> {
    let request = cli.request()?;
    request.validate()?;
    let config = cli.client_config()?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; abandoning job");
            on_ctrl_c.cancel();
        }
    });

    let transport = RunpodTransport::new(&config)?;
    let runner = JobRunner::new(transport, PollOptions::from(&config));

    eprintln!("Generating music...");
    eprintln!("  Tags: {}", request.tags_string());
    eprintln!("  Max length: {}ms", request.max_audio_length_ms);
    eprintln!("  Mode: {}", if cli.sync { "sync" } else { "submit + poll" });
    eprintln!();

    let done = if cli.sync {
        runner.run_sync(&request, &cancel).await?
    } else {
        runner.run(&request, &cancel).await?
    };

    let saved = decode_and_save(&done.output, &cli.output)?;

    eprintln!("Saved audio to: {}", saved.path.display());
    eprintln!("Size: {} bytes", saved.size_bytes);
    eprintln!("Format: {}", saved.format);
    match saved.sample_rate {
        Some(rate) => eprintln!("Sample rate: {} Hz", rate),
        None => eprintln!("Sample rate: unknown"),
    }
    if let Some(ms) = saved.duration_ms {
        let note = if saved.duration_estimated { " (requested length)" } else { "" };
        eprintln!("Duration: {:.1}s{}", ms as f64 / 1000.0, note);
    }
    eprintln!("Done!");

    Ok(())
}
