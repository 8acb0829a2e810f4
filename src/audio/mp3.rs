//! MP3 duration from MPEG audio frame headers.
//!
//! Frames are walked header to header without decoding. A leading ID3v2
//! tag is skipped and a trailing ID3v1 tag ends the walk.

/// Frame header fields needed to size and count a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameHeader {
    sample_rate: u32,
    samples: u32,
    length: usize,
}

const BITRATES_V1_L1: [u32; 15] = [
    0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448,
];
const BITRATES_V1_L2: [u32; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384,
];
const BITRATES_V1_L3: [u32; 15] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];
const BITRATES_V2_L1: [u32; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256,
];
const BITRATES_V2_L23: [u32; 15] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160,
];

/// MPEG version as encoded in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Version {
    V1,
    V2,
    V25,
}

impl FrameHeader {
    /// Parses the four header bytes at the start of `bytes`.
    fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] & 0xE0 != 0xE0 {
            return None;
        }

        let version = match (bytes[1] >> 3) & 0x03 {
            0 => Version::V25,
            2 => Version::V2,
            3 => Version::V1,
            _ => return None,
        };
        // Layer bits count down: 1 is Layer III, 3 is Layer I
        let layer = match (bytes[1] >> 1) & 0x03 {
            0 => return None,
            bits => 4 - bits,
        };

        let bitrate_index = (bytes[2] >> 4) as usize;
        // 0 is free format, 15 is invalid
        if bitrate_index == 0 || bitrate_index == 15 {
            return None;
        }
        let table = match (version, layer) {
            (Version::V1, 1) => &BITRATES_V1_L1,
            (Version::V1, 2) => &BITRATES_V1_L2,
            (Version::V1, _) => &BITRATES_V1_L3,
            (_, 1) => &BITRATES_V2_L1,
            _ => &BITRATES_V2_L23,
        };
        let bitrate = table[bitrate_index] * 1000;

        let rates = match version {
            Version::V1 => [44100, 48000, 32000],
            Version::V2 => [22050, 24000, 16000],
            Version::V25 => [11025, 12000, 8000],
        };
        let sample_rate = *rates.get(((bytes[2] >> 2) & 0x03) as usize)?;
        let padding = ((bytes[2] >> 1) & 0x01) as u32;

        let (samples, length) = match layer {
            1 => (384, (12 * bitrate / sample_rate + padding) * 4),
            2 => (1152, 144 * bitrate / sample_rate + padding),
            _ if version == Version::V1 => (1152, 144 * bitrate / sample_rate + padding),
            _ => (576, 72 * bitrate / sample_rate + padding),
        };

        Some(Self {
            sample_rate,
            samples,
            length: length as usize,
        })
    }
}

/// Length of a leading ID3v2 tag, header and footer included.
fn id3v2_len(bytes: &[u8]) -> usize {
    if bytes.len() < 10 || &bytes[..3] != b"ID3" {
        return 0;
    }
    // Sizes are syncsafe: seven bits per byte
    let size = bytes[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | (*b & 0x7F) as usize);
    let footer = if bytes[5] & 0x10 != 0 { 10 } else { 0 };
    10 + size + footer
}

/// Returns `(duration_ms, sample_rate)` for an MP3 buffer, or `None` if no
/// complete frame is found.
pub fn mp3_duration_ms(bytes: &[u8]) -> Option<(u64, u32)> {
    let mut pos = id3v2_len(bytes);
    let mut frames = 0u64;
    let mut samples = 0u64;
    let mut sample_rate = 0;

    while pos + 4 <= bytes.len() {
        if &bytes[pos..pos + 3] == b"TAG" {
            break;
        }
        match FrameHeader::parse(&bytes[pos..]) {
            Some(header) if pos + header.length <= bytes.len() => {
                if frames == 0 {
                    sample_rate = header.sample_rate;
                }
                frames += 1;
                samples += header.samples as u64;
                pos += header.length;
            }
            // Truncated final frame
            Some(_) => break,
            // Resync
            None => pos += 1,
        }
    }

    if frames == 0 {
        return None;
    }
    Some((super::samples_to_duration_ms(samples, sample_rate), sample_rate))
}

/// Silent MPEG-1 Layer III stream at 128 kbps, 48 kHz (24 ms per frame).
#[cfg(test)]
pub(crate) fn silent_mp3(frames: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(frames * 384);
    for _ in 0..frames {
        out.extend_from_slice(&[0xFF, 0xFB, 0x94, 0x00]);
        out.resize(out.len() + 380, 0);
    }
    out
}
