//! GenerationRequest type and its validation rules.
//!
//! The same type is validated twice: by the client before anything is
//! submitted, and by the worker before any compute is spent.

use serde::{Deserialize, Serialize};

use crate::error::{JobError, Result};

/// Shortest audio the model is asked for (10 seconds).
pub const MIN_AUDIO_LENGTH_MS: u32 = 10_000;

/// Longest audio the model is asked for (4 minutes).
pub const MAX_AUDIO_LENGTH_MS: u32 = 240_000;

/// Default requested audio length (2 minutes).
pub const DEFAULT_AUDIO_LENGTH_MS: u32 = 120_000;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Default top-k sampling parameter.
pub const DEFAULT_TOPK: u32 = 50;

/// Default classifier-free guidance scale.
pub const DEFAULT_CFG_SCALE: f32 = 1.5;

/// Style labels used when the caller gives none.
pub const DEFAULT_TAGS: [&str; 2] = ["pop", "upbeat"];

/// Parameters for one lyrics-to-song generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Lyrics text, optionally with `[Verse]`/`[Chorus]` section markers.
    #[serde(default)]
    pub lyrics: String,

    /// Ordered style/genre labels. Sent as a comma-joined string.
    #[serde(default = "default_tags", with = "tags_serde")]
    pub tags: Vec<String>,

    /// Upper bound on generated audio length in milliseconds (10000-240000).
    #[serde(default = "default_max_audio_length_ms")]
    pub max_audio_length_ms: u32,

    /// Sampling temperature (> 0).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Top-k sampling parameter (>= 1).
    #[serde(default = "default_topk")]
    pub topk: u32,

    /// Classifier-free guidance scale (>= 0).
    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f32,
}

impl GenerationRequest {
    /// Creates a request for the given lyrics with default parameters.
    pub fn new(lyrics: impl Into<String>) -> Self {
        Self {
            lyrics: lyrics.into(),
            tags: default_tags(),
            max_audio_length_ms: DEFAULT_AUDIO_LENGTH_MS,
            temperature: DEFAULT_TEMPERATURE,
            topk: DEFAULT_TOPK,
            cfg_scale: DEFAULT_CFG_SCALE,
        }
    }

    /// Replaces the style tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the requested maximum audio length.
    pub fn with_max_audio_length_ms(mut self, max_audio_length_ms: u32) -> Self {
        self.max_audio_length_ms = max_audio_length_ms;
        self
    }

    /// Sets the sampling parameters.
    pub fn with_sampling(mut self, temperature: f32, topk: u32, cfg_scale: f32) -> Self {
        self.temperature = temperature;
        self.topk = topk;
        self.cfg_scale = cfg_scale;
        self
    }

    /// Returns the tags in their comma-joined wire form.
    pub fn tags_string(&self) -> String {
        self.tags.join(",")
    }

    /// Checks every bound.
    ///
    /// Returns a VALIDATION_ERROR describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.lyrics.trim().is_empty() {
            return Err(JobError::validation("Missing required field: 'lyrics'"));
        }

        if self.max_audio_length_ms > MAX_AUDIO_LENGTH_MS {
            return Err(JobError::validation(format!(
                "max_audio_length_ms cannot exceed {} (4 minutes), got {}",
                MAX_AUDIO_LENGTH_MS, self.max_audio_length_ms
            )));
        }
        if self.max_audio_length_ms < MIN_AUDIO_LENGTH_MS {
            return Err(JobError::validation(format!(
                "max_audio_length_ms must be at least {} (10 seconds), got {}",
                MIN_AUDIO_LENGTH_MS, self.max_audio_length_ms
            )));
        }

        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(JobError::validation(format!(
                "temperature must be > 0, got {}",
                self.temperature
            )));
        }

        if self.topk == 0 {
            return Err(JobError::validation("topk must be a positive integer"));
        }

        if !self.cfg_scale.is_finite() || self.cfg_scale < 0.0 {
            return Err(JobError::validation(format!(
                "cfg_scale must be >= 0, got {}",
                self.cfg_scale
            )));
        }

        Ok(())
    }
}

/// Splits a comma-separated tag list, trimming entries and dropping empties.
pub fn parse_tags(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_tags() -> Vec<String> {
    DEFAULT_TAGS.iter().map(|t| t.to_string()).collect()
}

fn default_max_audio_length_ms() -> u32 {
    DEFAULT_AUDIO_LENGTH_MS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_topk() -> u32 {
    DEFAULT_TOPK
}

fn default_cfg_scale() -> f32 {
    DEFAULT_CFG_SCALE
}

/// Tags travel as `"pop,upbeat"`; a JSON array is accepted on input too.
mod tags_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::parse_tags;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TagsRepr {
        Joined(String),
        List(Vec<String>),
    }

    pub fn serialize<S>(tags: &[String], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&tags.join(","))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tags = match TagsRepr::deserialize(deserializer)? {
            TagsRepr::Joined(s) => parse_tags(&s),
            TagsRepr::List(list) => list
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        };
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn defaults_are_valid() {
        let request = GenerationRequest::new("hello");
        assert_eq!(request.tags, vec!["pop", "upbeat"]);
        assert_eq!(request.max_audio_length_ms, 120_000);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn length_bounds_are_inclusive() {
        for ms in [MIN_AUDIO_LENGTH_MS, 60_000, MAX_AUDIO_LENGTH_MS] {
            let request = GenerationRequest::new("hello").with_max_audio_length_ms(ms);
            assert!(request.validate().is_ok(), "{} should be accepted", ms);
        }
    }

    #[test]
    fn length_outside_bounds_is_rejected() {
        for ms in [0, 9_999, 240_001, u32::MAX] {
            let err = GenerationRequest::new("hello")
                .with_max_audio_length_ms(ms)
                .validate()
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::Validation, "{} should be rejected", ms);
        }
    }

    #[test]
    fn empty_lyrics_rejected() {
        let err = GenerationRequest::new("   \n").validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
        assert!(err.message.contains("lyrics"));
    }

    #[test]
    fn sampling_bounds() {
        let base = GenerationRequest::new("hello");
        assert!(base.clone().with_sampling(0.0, 50, 1.5).validate().is_err());
        assert!(base.clone().with_sampling(f32::NAN, 50, 1.5).validate().is_err());
        assert!(base.clone().with_sampling(1.0, 0, 1.5).validate().is_err());
        assert!(base.clone().with_sampling(1.0, 50, -0.1).validate().is_err());
        assert!(base.with_sampling(0.7, 1, 0.0).validate().is_ok());
    }

    #[test]
    fn tags_serialize_as_joined_string() {
        let request = GenerationRequest::new("hello").with_tags(["rock", "live"]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["tags"], "rock,live");
        assert_eq!(value["max_audio_length_ms"], 120_000);
    }

    #[test]
    fn tags_accept_string_or_array() {
        let from_str: GenerationRequest =
            serde_json::from_value(serde_json::json!({"lyrics": "x", "tags": "pop, electronic ,,upbeat"}))
                .unwrap();
        assert_eq!(from_str.tags, vec!["pop", "electronic", "upbeat"]);

        let from_list: GenerationRequest =
            serde_json::from_value(serde_json::json!({"lyrics": "x", "tags": ["jazz", " "]})).unwrap();
        assert_eq!(from_list.tags, vec!["jazz"]);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let request: GenerationRequest =
            serde_json::from_value(serde_json::json!({"lyrics": "hello", "max_audio_length_ms": 60000}))
                .unwrap();
        assert_eq!(request.tags, vec!["pop", "upbeat"]);
        assert_eq!(request.max_audio_length_ms, 60_000);
        assert_eq!(request.topk, DEFAULT_TOPK);
        assert_eq!(request.cfg_scale, DEFAULT_CFG_SCALE);
    }

    #[test]
    fn parse_tags_trims() {
        assert_eq!(parse_tags(" a ,b,, c "), vec!["a", "b", "c"]);
        assert!(parse_tags("").is_empty());
    }
}
