//! Generation capability used by the worker.
//!
//! [`GeneratorLoader`] performs the cold start (weights check, model load)
//! and [`MusicGenerator`] runs one generation. The default pair drives the
//! HeartMuLa generation script as a subprocess.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::NamedTempFile;

use crate::audio::{AudioFormat, HEARTMULA_SAMPLE_RATE};
use crate::config::WorkerConfig;
use crate::error::{ErrorCode, JobError, Result};
use crate::types::GenerationRequest;

/// Checkpoint directory of the language model, relative to the model path.
pub const HEARTMULA_DIR: &str = "HeartMuLa-oss-3B";

/// Checkpoint directory of the audio codec.
pub const HEARTCODEC_DIR: &str = "HeartCodec-oss";

/// Tokenizer definition.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Lines of generator stderr kept in a failure message.
const STDERR_TAIL_LINES: usize = 20;

/// Runs one generation.
pub trait MusicGenerator: Send + Sync {
    /// Writes one song for `request` to `save_path`.
    fn generate(&self, request: &GenerationRequest, save_path: &Path) -> Result<()>;

    /// Codec of the files this generator writes.
    fn format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    /// Sample rate of the files this generator writes.
    fn sample_rate(&self) -> u32 {
        HEARTMULA_SAMPLE_RATE
    }
}

/// Builds a [`MusicGenerator`]. Called once per worker process on success.
pub trait GeneratorLoader: Send + Sync {
    fn load(&self) -> Result<Box<dyn MusicGenerator>>;
}

/// Returns the required files missing under `model_path`.
pub fn missing_weights(model_path: &Path) -> Vec<PathBuf> {
    [HEARTMULA_DIR, HEARTCODEC_DIR, TOKENIZER_FILE]
        .iter()
        .map(|name| model_path.join(name))
        .filter(|path| !path.exists())
        .collect()
}

/// Locates the generator executable: a path as given, or a bare name on `PATH`.
fn resolve_command(command: &Path) -> Option<PathBuf> {
    if command.components().count() > 1 {
        return command.is_file().then(|| command.to_path_buf());
    }
    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
}

/// Loads a [`CommandGenerator`] after checking the weights layout and the
/// generator command.
#[derive(Debug, Clone)]
pub struct CommandLoader {
    config: WorkerConfig,
}

impl CommandLoader {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }
}

impl GeneratorLoader for CommandLoader {
    fn load(&self) -> Result<Box<dyn MusicGenerator>> {
        let missing = missing_weights(&self.config.model_path);
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            return Err(JobError::model_not_found(names.join(", ")));
        }

        let command = resolve_command(&self.config.generator_command).ok_or_else(|| {
            JobError::model_load_failed(format!(
                "generator command {} not found",
                self.config.generator_command.display()
            ))
        })?;

        tracing::info!(
            model_path = %self.config.model_path.display(),
            version = %self.config.model_version,
            command = %command.display(),
            "Model weights present"
        );

        Ok(Box::new(CommandGenerator {
            config: self.config.clone(),
        }))
    }
}

/// Runs the generator executable once per song.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    config: WorkerConfig,
}

impl CommandGenerator {
    /// Builds the generator command line.
    ///
    /// Lyrics and tags are passed as paths to files holding their text.
    fn command(
        &self,
        request: &GenerationRequest,
        lyrics_path: &Path,
        tags_path: &Path,
        save_path: &Path,
    ) -> Command {
        let mut cmd = Command::new(&self.config.generator_command);
        cmd.arg("--model_path")
            .arg(&self.config.model_path)
            .arg("--version")
            .arg(&self.config.model_version)
            .arg("--lyrics")
            .arg(lyrics_path)
            .arg("--tags")
            .arg(tags_path)
            .arg("--save_path")
            .arg(save_path)
            .arg("--max_audio_length_ms")
            .arg(request.max_audio_length_ms.to_string())
            .arg("--topk")
            .arg(request.topk.to_string())
            .arg("--temperature")
            .arg(request.temperature.to_string())
            .arg("--cfg_scale")
            .arg(request.cfg_scale.to_string());
        cmd
    }
}

impl MusicGenerator for CommandGenerator {
    fn generate(&self, request: &GenerationRequest, save_path: &Path) -> Result<()> {
        // Both files are removed when they go out of scope.
        let lyrics = text_file("lyrics-", &request.lyrics)?;
        let tags = text_file("tags-", &request.tags_string())?;

        let output = self
            .command(request, lyrics.path(), tags.path(), save_path)
            .output()
            .map_err(|e| {
                JobError::with_source(
                    ErrorCode::GenerationFailed,
                    format!(
                        "Failed to start generator {}",
                        self.config.generator_command.display()
                    ),
                    e,
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(JobError::generation_failed(format!(
                "generator exited with {}: {}",
                output.status,
                tail(&stderr, STDERR_TAIL_LINES)
            )));
        }

        tracing::debug!(save_path = %save_path.display(), "Generator finished");
        Ok(())
    }
}

/// Writes `text` to a fresh temp file.
fn text_file(prefix: &str, text: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".txt")
        .tempfile()
        .map_err(|e| {
            JobError::with_source(ErrorCode::GenerationFailed, "Failed to create temp file", e)
        })?;
    file.write_all(text.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| {
            JobError::with_source(ErrorCode::GenerationFailed, "Failed to write temp file", e)
        })?;
    Ok(file)
}

/// Returns the last `lines` lines of `text`.
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
