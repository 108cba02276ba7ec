//! WAV decoding and the decoded sample buffer
//!
//! The decoder accepts a byte slice (no filesystem access), validates the
//! format against what the pipeline supports, downmixes stereo by averaging,
//! and normalizes everything to f32 in [-1, 1].

use hound::{SampleFormat, WavReader};
use std::io::Cursor;

use crate::error::ErrorKind;

/// Sample rates the pipeline accepts
pub const SUPPORTED_SAMPLE_RATES: [u32; 3] = [22_050, 44_100, 48_000];

/// Maximum clip length in seconds
pub const MAX_DURATION_SEC: f64 = 30.0;

/// Minimum clip length in milliseconds
pub const MIN_DURATION_MS: f64 = 100.0;

/// Decoded mono audio
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Mono samples in [-1, 1]
    pub samples: Vec<f32>,
    /// Source sample rate; no resampling happens downstream
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn duration_ms(&self) -> f64 {
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }

    pub fn duration_sec(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Build a buffer directly from samples (tests and synthetic input)
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        AudioBuffer {
            samples,
            sample_rate,
        }
    }
}

/// Decode a RIFF/WAVE byte slice into a normalized mono buffer
pub fn decode_wav(data: &[u8]) -> Result<AudioBuffer, ErrorKind> {
    let mut reader = WavReader::new(Cursor::new(data)).map_err(map_hound_error)?;
    let spec = reader.spec();

    if spec.sample_format != SampleFormat::Int {
        return Err(ErrorKind::UnsupportedFormat(
            "only integer PCM is supported".to_string(),
        ));
    }
    if !matches!(spec.bits_per_sample, 8 | 16 | 24) {
        return Err(ErrorKind::UnsupportedFormat(format!(
            "unsupported bit depth: {}",
            spec.bits_per_sample
        )));
    }
    if spec.channels == 0 || spec.channels > 2 {
        return Err(ErrorKind::UnsupportedFormat(format!(
            "unsupported channel count: {}",
            spec.channels
        )));
    }
    if !SUPPORTED_SAMPLE_RATES.contains(&spec.sample_rate) {
        return Err(ErrorKind::UnsupportedFormat(format!(
            "unsupported sample rate: {} Hz",
            spec.sample_rate
        )));
    }

    let full_scale = match spec.bits_per_sample {
        8 => 128.0,
        16 => 32_768.0,
        _ => 8_388_608.0,
    };

    let mut interleaved = Vec::with_capacity(reader.len() as usize);
    for sample in reader.samples::<i32>() {
        let raw = sample.map_err(map_hound_error)?;
        // 8-bit WAV is unsigned; hound re-centers it, so one divide covers all depths
        interleaved.push((raw as f32 / full_scale).clamp(-1.0, 1.0));
    }

    let samples = if spec.channels == 2 {
        if interleaved.len() % 2 != 0 {
            return Err(ErrorKind::Truncated(
                "stereo stream ends mid-frame".to_string(),
            ));
        }
        interleaved
            .chunks_exact(2)
            .map(|frame| (frame[0] + frame[1]) * 0.5)
            .collect()
    } else {
        interleaved
    };

    let buffer = AudioBuffer {
        samples,
        sample_rate: spec.sample_rate,
    };

    if buffer.duration_sec() > MAX_DURATION_SEC {
        return Err(ErrorKind::UnsupportedFormat(format!(
            "clip is {:.1} s, maximum is {:.0} s",
            buffer.duration_sec(),
            MAX_DURATION_SEC
        )));
    }
    if buffer.duration_ms() < MIN_DURATION_MS {
        return Err(ErrorKind::TooShort {
            duration_ms: buffer.duration_ms(),
        });
    }

    Ok(buffer)
}

fn map_hound_error(err: hound::Error) -> ErrorKind {
    match err {
        hound::Error::IoError(e) => ErrorKind::Truncated(e.to_string()),
        hound::Error::FormatError(msg) => ErrorKind::ChunkMismatch(msg.to_string()),
        hound::Error::Unsupported => {
            ErrorKind::UnsupportedFormat("unsupported WAV feature".to_string())
        }
        other => ErrorKind::UnsupportedFormat(other.to_string()),
    }
}

/// Hex-encoded SHA-256 of the raw input bytes, attached to every error
pub fn input_hash(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    use std::fmt::Write;

    let digest = Sha256::digest(data);
    let mut hex = String::with_capacity(64);
    for byte in digest {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}
