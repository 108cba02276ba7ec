//! Shared synthetic-signal generators for integration tests
#![allow(dead_code)]

use hound::{SampleFormat, WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;

pub const SR: u32 = 44_100;

/// Encode mono f32 samples as a 16-bit WAV byte vector
pub fn wav_bytes(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            let q = (s.clamp(-1.0, 1.0) * 32_767.0).round() as i16;
            writer.write_sample(q).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub fn silence(duration_ms: f64) -> Vec<f32> {
    vec![0.0; (duration_ms / 1000.0 * SR as f64) as usize]
}

/// Mix a synthetic kick (150 Hz sine with exponential decay) at `time_ms`
pub fn add_kick(samples: &mut [f32], time_ms: f64) {
    let start = (time_ms / 1000.0 * SR as f64) as usize;
    let length = (0.15 * SR as f32) as usize;
    for i in 0..length.min(samples.len().saturating_sub(start)) {
        let t = i as f32 / SR as f32;
        samples[start + i] += 0.85 * (2.0 * PI * 150.0 * t).sin() * (-t * 30.0).exp();
    }
}

/// Mix a bright noise burst (high-tilted, hat-like) at `time_ms`
pub fn add_hat(samples: &mut [f32], time_ms: f64) {
    let start = (time_ms / 1000.0 * SR as f64) as usize;
    let length = (0.03 * SR as f32) as usize;

    // Deterministic noise, then two difference passes to tilt the
    // spectrum well above 2 kHz
    let mut state: u64 = 0x2545_F491_4F6C_DD1D ^ (start as u64).wrapping_mul(0x9E37);
    let mut noise = Vec::with_capacity(length + 2);
    for _ in 0..length + 2 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        noise.push(((state >> 40) as f32 / 8_388_608.0) - 1.0);
    }
    for i in 0..length.min(samples.len().saturating_sub(start)) {
        let hf = noise[i + 2] - 2.0 * noise[i + 1] + noise[i];
        let t = i as f32 / SR as f32;
        samples[start + i] += 0.35 * hf * (-t * 120.0).exp();
    }
}

/// Kicks at the four classic positions over 2.5 s of silence
pub fn four_kick_clip() -> Vec<u8> {
    let mut samples = silence(2500.0);
    for &t in &[500.0, 1000.0, 1500.0, 2000.0] {
        add_kick(&mut samples, t);
    }
    wav_bytes(&samples, SR)
}

/// Hat bursts every 125 ms over 2 s (8th notes at 120 BPM)
pub fn hat_pattern_clip() -> Vec<u8> {
    let mut samples = silence(2200.0);
    let mut t = 125.0;
    while t < 2000.0 {
        add_hat(&mut samples, t);
        t += 125.0;
    }
    wav_bytes(&samples, SR)
}
