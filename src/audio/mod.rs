//! Audio payload inspection.
//!
//! Provides the format tag carried in results and duration measurement for
//! formats whose headers we can read.

pub mod format;
pub mod mp3;
pub mod wav;

// Re-export commonly used items
pub use format::AudioFormat;
pub use mp3::mp3_duration_ms;
pub use wav::{measure_duration_ms, samples_to_duration_ms, Measurement, HEARTMULA_SAMPLE_RATE};
