//! Codec tag for generated audio.

use serde::{Deserialize, Serialize};

/// Container/codec of a generated audio file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MPEG-1 Layer III, the generator's default output.
    #[default]
    Mp3,
    /// RIFF/WAVE.
    Wav,
    /// FLAC.
    Flac,
}

impl AudioFormat {
    /// Returns the string representation of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
        }
    }

    /// File suffix including the dot, for temp files.
    pub fn suffix(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => ".mp3",
            AudioFormat::Wav => ".wav",
            AudioFormat::Flac => ".flac",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_matches_tag() {
        for format in [AudioFormat::Mp3, AudioFormat::Wav, AudioFormat::Flac] {
            assert_eq!(format.suffix(), format!(".{}", format));
        }
    }

    #[test]
    fn format_serde_is_lowercase() {
        assert_eq!(serde_json::to_value(AudioFormat::Mp3).unwrap(), "mp3");
        let parsed: AudioFormat = serde_json::from_value(serde_json::json!("wav")).unwrap();
        assert_eq!(parsed, AudioFormat::Wav);
    }
}
