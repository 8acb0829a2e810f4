//! Command-line interfaces for the client and the worker binaries.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::config::ClientConfig;
use crate::error::{ErrorCode, JobError, Result};
use crate::types::{
    parse_tags, GenerationRequest, DEFAULT_AUDIO_LENGTH_MS, DEFAULT_CFG_SCALE,
    DEFAULT_TEMPERATURE, DEFAULT_TOPK,
};

/// heartmula: generate songs on a serverless HeartMuLa endpoint
#[derive(Parser, Debug)]
#[command(name = "heartmula")]
#[command(about = "Generate songs from lyrics on a serverless HeartMuLa GPU endpoint")]
#[command(version)]
pub struct ClientCli {
    /// Lyrics text, or path to a file containing the lyrics
    #[arg(short, long)]
    pub lyrics: String,

    /// Comma-separated style tags
    #[arg(short, long, default_value = "pop,upbeat")]
    pub tags: String,

    /// Output audio file path
    #[arg(short, long, default_value = "output.mp3")]
    pub output: PathBuf,

    /// Maximum audio length in milliseconds (10000-240000)
    #[arg(long = "max-length", default_value_t = DEFAULT_AUDIO_LENGTH_MS)]
    pub max_length: u32,

    /// Sampling temperature
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    /// Top-k sampling
    #[arg(long, default_value_t = DEFAULT_TOPK)]
    pub topk: u32,

    /// Classifier-free guidance scale
    #[arg(long = "cfg-scale", default_value_t = DEFAULT_CFG_SCALE)]
    pub cfg_scale: f32,

    /// API key (or set RUNPOD_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Endpoint ID (or set RUNPOD_ENDPOINT_ID)
    #[arg(long)]
    pub endpoint_id: Option<String>,

    /// Use the synchronous endpoint instead of submit-and-poll
    #[arg(long)]
    pub sync: bool,

    /// Give up waiting after this many seconds (default 300)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Seconds between status polls (default 5)
    #[arg(long)]
    pub poll_interval: Option<u64>,
}

impl ClientCli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        ClientCli::parse()
    }

    /// Returns the lyrics, reading them from disk if `--lyrics` names a file.
    pub fn lyrics_text(&self) -> Result<String> {
        let candidate = Path::new(&self.lyrics);
        if !self.lyrics.contains('\n') && candidate.is_file() {
            return std::fs::read_to_string(candidate).map_err(|e| {
                JobError::with_source(
                    ErrorCode::Validation,
                    format!("Failed to read lyrics file {}", candidate.display()),
                    e,
                )
            });
        }
        Ok(self.lyrics.clone())
    }

    /// Builds the generation request from the arguments.
    pub fn request(&self) -> Result<GenerationRequest> {
        Ok(GenerationRequest::new(self.lyrics_text()?)
            .with_tags(parse_tags(&self.tags))
            .with_max_audio_length_ms(self.max_length)
            .with_sampling(self.temperature, self.topk, self.cfg_scale))
    }

    /// Resolves the client configuration from flags and the environment.
    pub fn client_config(&self) -> Result<ClientConfig> {
        self.client_config_with(|name| std::env::var(name).ok())
    }

    /// Resolves the client configuration using `lookup` for the environment.
    pub fn client_config_with<F>(&self, lookup: F) -> Result<ClientConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config =
            ClientConfig::resolve_with(self.api_key.clone(), self.endpoint_id.clone(), lookup)?;

        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.poll_interval {
            config = config.with_poll_interval(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }
}

/// heartmula-worker: HeartMuLa job handler for GPU nodes
#[derive(Parser, Debug)]
#[command(name = "heartmula-worker")]
#[command(about = "HeartMuLa generation worker (jobs as JSON lines on stdin)")]
#[command(version)]
pub struct WorkerCli {
    /// Run one sample job locally and save the audio
    #[arg(long)]
    pub test_job: bool,

    /// Where --test-job writes its audio
    #[arg(short, long, default_value = "test_output.mp3")]
    pub output: PathBuf,
}

impl WorkerCli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        WorkerCli::parse()
    }

    /// Returns true if running the local smoke test instead of serving.
    pub fn is_test_mode(&self) -> bool {
        self.test_job
    }
}
