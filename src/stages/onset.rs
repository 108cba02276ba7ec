//! Onset detection: spectral-flux novelty with adaptive peak picking

use log::debug;

use crate::audio::AudioBuffer;
use crate::calibration::{CalibrationProfile, ONSET_THRESHOLD_KEY};
use crate::error::ErrorKind;
use crate::events::Onset;
use crate::spectral::{self, ONSET_HOP, ONSET_WINDOW};

/// Base peak threshold on the normalized novelty curve
pub const PEAK_THRESHOLD: f32 = 0.6;

/// Local normalization window in milliseconds
const NORMALIZE_WINDOW_MS: f64 = 300.0;

/// Local-maximum neighborhood in milliseconds
const LOCAL_MAX_MS: f64 = 30.0;

/// Minimum spacing between accepted onsets in milliseconds
const REFRACTORY_MS: f64 = 50.0;

/// Waveform search radius for the peak amplitude in milliseconds
const PEAK_AMP_MS: f64 = 25.0;

/// Default event duration before downstream refinement
const DEFAULT_DURATION_MS: f64 = 100.0;

/// Detect onsets in a decoded buffer. Returns an ascending, non-empty list
/// or `NoOnsets`.
pub fn run(audio: &AudioBuffer, calibration: &CalibrationProfile) -> Result<Vec<Onset>, ErrorKind> {
    let mag = spectral::stft_magnitudes(&audio.samples, ONSET_WINDOW, ONSET_HOP);
    let novelty = spectral::spectral_flux(&mag);
    if novelty.is_empty() {
        return Err(ErrorKind::NoOnsets);
    }

    let frame_ms = ONSET_HOP as f64 * 1000.0 / audio.sample_rate as f64;
    let normalized = normalize_novelty(&novelty, frame_ms);

    let threshold = PEAK_THRESHOLD * calibration.multiplier(ONSET_THRESHOLD_KEY);
    let peak_frames = pick_peaks(&normalized, frame_ms, threshold);
    debug!(
        "onset: {} frames, {} peaks above {:.2}",
        novelty.len(),
        peak_frames.len(),
        threshold
    );

    if peak_frames.is_empty() {
        return Err(ErrorKind::NoOnsets);
    }

    let mut onsets: Vec<Onset> = peak_frames
        .iter()
        .map(|&frame| {
            let center_sample = frame * ONSET_HOP + ONSET_WINDOW / 2;
            let coarse_ms = center_sample as f64 * 1000.0 / audio.sample_rate as f64;
            let timestamp_ms = refine_attack_time(audio, coarse_ms);
            Onset {
                timestamp_ms,
                duration_ms: DEFAULT_DURATION_MS,
                strength: normalized[frame],
                peak_amplitude: waveform_peak(audio, timestamp_ms),
            }
        })
        .collect();

    // Refinement can reorder neighbors that share one attack; keep the list
    // sorted and drop near-duplicates.
    onsets.sort_by(|a, b| {
        a.timestamp_ms
            .partial_cmp(&b.timestamp_ms)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    onsets.dedup_by(|next, prev| (next.timestamp_ms - prev.timestamp_ms).abs() < 10.0);

    // Duration runs to the next onset, floored so feature windows stay sane
    for i in 0..onsets.len().saturating_sub(1) {
        let gap = onsets[i + 1].timestamp_ms - onsets[i].timestamp_ms;
        onsets[i].duration_ms = gap.clamp(30.0, 1000.0);
    }

    Ok(onsets)
}

/// Subtract a sliding local mean and divide by local stddev (plus epsilon)
fn normalize_novelty(novelty: &[f32], frame_ms: f64) -> Vec<f32> {
    let half_window = ((NORMALIZE_WINDOW_MS / 2.0) / frame_ms).round().max(1.0) as usize;
    let mut normalized = vec![0.0f32; novelty.len()];

    for i in 0..novelty.len() {
        let start = i.saturating_sub(half_window);
        let end = (i + half_window + 1).min(novelty.len());
        let window = &novelty[start..end];

        let mean = window.iter().sum::<f32>() / window.len() as f32;
        let variance =
            window.iter().map(|&x| (x - mean) * (x - mean)).sum::<f32>() / window.len() as f32;
        normalized[i] = (novelty[i] - mean) / (variance.sqrt() + 1e-6);
    }

    normalized
}

/// Local maxima above threshold with a refractory period
fn pick_peaks(normalized: &[f32], frame_ms: f64, threshold: f32) -> Vec<usize> {
    let radius = (LOCAL_MAX_MS / frame_ms).ceil().max(1.0) as usize;
    let refractory_frames = (REFRACTORY_MS / frame_ms).ceil() as usize;

    let mut peaks = Vec::new();
    let mut last_peak: Option<usize> = None;

    for i in 0..normalized.len() {
        if normalized[i] <= threshold {
            continue;
        }
        if let Some(last) = last_peak {
            if i - last < refractory_frames {
                continue;
            }
        }

        let start = i.saturating_sub(radius);
        let end = (i + radius + 1).min(normalized.len());
        let is_max = normalized[start..end]
            .iter()
            .enumerate()
            .all(|(j, &v)| v < normalized[i] || start + j == i);

        if is_max {
            peaks.push(i);
            last_peak = Some(i);
        }
    }

    peaks
}

/// Pull a frame-resolution timestamp onto the actual waveform attack.
///
/// Frame centers land up to half a hop away from the attack; the earliest
/// sample crossing 30% of the local peak inside a +-30 ms search window is
/// a far better anchor for the beat grid.
fn refine_attack_time(audio: &AudioBuffer, coarse_ms: f64) -> f64 {
    let sr = audio.sample_rate as f64;
    let center = (coarse_ms / 1000.0 * sr) as usize;
    let radius = (LOCAL_MAX_MS / 1000.0 * sr) as usize;

    let start = center.saturating_sub(radius);
    let end = (center + radius).min(audio.samples.len());
    if start >= end {
        return coarse_ms;
    }

    let window = &audio.samples[start..end];
    let peak = window.iter().fold(0.0f32, |max, &s| max.max(s.abs()));
    if peak < 1e-4 {
        return coarse_ms;
    }

    let threshold = peak * 0.3;
    window
        .iter()
        .position(|&s| s.abs() >= threshold)
        .map(|offset| (start + offset) as f64 * 1000.0 / sr)
        .unwrap_or(coarse_ms)
}

/// Absolute waveform maximum within the peak-amplitude radius of a timestamp
fn waveform_peak(audio: &AudioBuffer, timestamp_ms: f64) -> f32 {
    let center = (timestamp_ms / 1000.0 * audio.sample_rate as f64) as usize;
    let radius = (PEAK_AMP_MS / 1000.0 * audio.sample_rate as f64) as usize;

    let start = center.saturating_sub(radius);
    let end = (center + radius).min(audio.samples.len());
    audio.samples[start..end]
        .iter()
        .fold(0.0f32, |max, &s| max.max(s.abs()))
}
