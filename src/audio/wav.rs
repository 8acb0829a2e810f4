//! Duration measurement for generated audio.
//!
//! WAV headers are read with the hound crate and MP3 frame headers are
//! walked in [`super::mp3`]. FLAC is not measured; callers fall back to the
//! requested length for it.

use std::io::Cursor;

use hound::WavReader;

use super::format::AudioFormat;
use super::mp3::mp3_duration_ms;

/// Output sample rate of the HeartMuLa codec (48kHz).
pub const HEARTMULA_SAMPLE_RATE: u32 = 48000;

/// Measured properties of an audio buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Sample rate read from the header.
    pub sample_rate: u32,
}

/// Measures the duration of an encoded audio buffer.
///
/// Returns `None` when the format cannot be measured or the header is
/// unreadable.
pub fn measure_duration_ms(bytes: &[u8], format: AudioFormat) -> Option<Measurement> {
    match format {
        AudioFormat::Wav => {
            let reader = WavReader::new(Cursor::new(bytes)).ok()?;
            let spec = reader.spec();
            if spec.sample_rate == 0 {
                return None;
            }
            // duration() counts frames, i.e. samples per channel
            Some(Measurement {
                duration_ms: samples_to_duration_ms(reader.duration() as u64, spec.sample_rate),
                sample_rate: spec.sample_rate,
            })
        }
        AudioFormat::Mp3 => {
            let (duration_ms, sample_rate) = mp3_duration_ms(bytes)?;
            Some(Measurement {
                duration_ms,
                sample_rate,
            })
        }
        AudioFormat::Flac => None,
    }
}

/// Converts a per-channel sample count to milliseconds.
pub fn samples_to_duration_ms(frames: u64, sample_rate: u32) -> u64 {
    frames * 1000 / sample_rate as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mp3::silent_mp3;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn wav_bytes(frames: usize, sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut buffer, spec).unwrap();
            for _ in 0..frames * channels as usize {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn measures_stereo_wav() {
        let bytes = wav_bytes(48000 * 2, 48000, 2);
        let m = measure_duration_ms(&bytes, AudioFormat::Wav).unwrap();
        assert_eq!(m.duration_ms, 2000);
        assert_eq!(m.sample_rate, 48000);
    }

    #[test]
    fn measures_mp3_frames() {
        let m = measure_duration_ms(&silent_mp3(250), AudioFormat::Mp3).unwrap();
        assert_eq!(m.duration_ms, 6000);
        assert_eq!(m.sample_rate, 48000);
        assert!(measure_duration_ms(b"ID3\x04", AudioFormat::Mp3).is_none());
    }

    #[test]
    fn flac_is_not_measured() {
        assert!(measure_duration_ms(b"fLaC", AudioFormat::Flac).is_none());
    }

    #[test]
    fn garbage_wav_is_not_measured() {
        assert!(measure_duration_ms(b"not a wav file", AudioFormat::Wav).is_none());
    }

    #[test]
    fn samples_to_duration_calculation() {
        assert_eq!(samples_to_duration_ms(48000, 48000), 1000);
        assert_eq!(samples_to_duration_ms(24000, 48000), 500);
        assert_eq!(samples_to_duration_ms(32000 * 3, 32000), 3000);
    }
}
