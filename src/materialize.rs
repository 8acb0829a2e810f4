//! Result materialization: base64 payload to audio file on disk.
//!
//! Writes are all-or-nothing. Audio is written to a temporary file in the
//! destination directory and renamed into place, so a failed save never
//! leaves a partial file at the destination.

use std::io::Write;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tempfile::NamedTempFile;

use crate::error::{ErrorCode, JobError, Result};
use crate::types::JobOutput;

/// What was written by [`decode_and_save`].
#[derive(Debug, Clone, PartialEq)]
pub struct SavedAudio {
    /// Final location of the audio file.
    pub path: PathBuf,
    /// Number of bytes written.
    pub size_bytes: u64,
    /// Codec tag reported by the worker, or `unknown`.
    pub format: String,
    /// Sample rate reported by the worker.
    pub sample_rate: Option<u32>,
    /// Duration reported by the worker.
    pub duration_ms: Option<u64>,
    /// True when the worker could not measure the duration.
    pub duration_estimated: bool,
}

/// Encodes raw audio bytes for transport.
pub fn encode_audio(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decodes a transported audio payload.
pub fn decode_audio(text: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(text.trim())
        .map_err(|e| JobError::with_source(ErrorCode::Protocol, "Audio payload is not valid base64", e))
}

/// Decodes the audio in `output` and writes it to `destination`.
///
/// Fails with VALIDATION_ERROR if the output carries no audio, PROTOCOL_ERROR
/// if the payload is malformed or disagrees with the reported size, and
/// OUTPUT_WRITE_FAILED if the file cannot be placed.
pub fn decode_and_save(output: &JobOutput, destination: &Path) -> Result<SavedAudio> {
    let encoded = output
        .audio_base64
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| JobError::validation("No audio data in result"))?;

    let audio = decode_audio(encoded)?;

    if let Some(reported) = output.size_bytes {
        if reported != audio.len() as u64 {
            return Err(JobError::protocol(format!(
                "Audio payload is {} bytes but the worker reported {}",
                audio.len(),
                reported
            )));
        }
    }

    write_atomic(destination, &audio)?;

    let saved = SavedAudio {
        path: destination.to_path_buf(),
        size_bytes: audio.len() as u64,
        format: output
            .format
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        sample_rate: output.sample_rate,
        duration_ms: output.duration_ms,
        duration_estimated: output.duration_estimated,
    };

    tracing::info!(
        path = %saved.path.display(),
        size_bytes = saved.size_bytes,
        format = %saved.format,
        "Saved audio"
    );

    Ok(saved)
}

/// Writes `bytes` to a sibling temp file, then renames it over `destination`.
fn write_atomic(destination: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp =
        NamedTempFile::new_in(dir).map_err(|e| JobError::output_write_failed(destination, e))?;

    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| JobError::output_write_failed(destination, e))?;

    // Dropping an unpersisted NamedTempFile removes it.
    tmp.persist(destination)
        .map_err(|e| JobError::output_write_failed(destination, e.error))?;

    Ok(())
}
