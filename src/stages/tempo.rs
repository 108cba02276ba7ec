//! Tempo and beat-phase estimation from the onset train
//!
//! Autocorrelation of a 5 ms impulse train over the 40-240 BPM lag range,
//! weighted by a log-normal prior around 120 BPM. Low-confidence estimates
//! fall back to 120 BPM with a flag instead of failing.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::events::Onset;

/// Impulse-train resolution in milliseconds
const RESOLUTION_MS: f64 = 5.0;

/// Estimation range in BPM
const MIN_BPM: f64 = 40.0;
const MAX_BPM: f64 = 240.0;

/// Log-tempo prior center and spread
const PRIOR_CENTER_BPM: f64 = 120.0;
const PRIOR_SIGMA: f64 = 0.35;

/// Below this confidence the estimate is replaced by 120 BPM
pub const CONFIDENCE_FLOOR: f32 = 0.2;

/// Tempo estimation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoEstimate {
    pub bpm: f64,
    /// Strength of the periodic structure, in [0, 1]
    pub confidence: f32,
    /// Offset of the first beat from t = 0, in [0, beat_ms)
    pub beat_phase_ms: f64,
    /// Predicted beat locations across the clip
    pub beat_positions_ms: Vec<f64>,
    /// True when confidence fell below the floor and 120 BPM was substituted
    pub fallback: bool,
}

/// Estimate tempo and phase from onset timestamps
pub fn run(onsets: &[Onset]) -> TempoEstimate {
    if onsets.len() < 2 {
        return fallback_estimate(onsets);
    }

    let train = impulse_train(onsets);
    let min_lag = (60_000.0 / MAX_BPM / RESOLUTION_MS).round() as usize;
    let max_lag = (60_000.0 / MIN_BPM / RESOLUTION_MS).round() as usize;
    if train.len() <= min_lag {
        return fallback_estimate(onsets);
    }
    let max_lag = max_lag.min(train.len() - 1);

    // Autocorrelation accumulates in f64 to avoid bias over long trains
    let mut weighted = vec![0.0f64; max_lag + 1];
    let mut best_lag = min_lag;
    for lag in min_lag..=max_lag {
        let mut acc = 0.0f64;
        for i in 0..train.len() - lag {
            acc += train[i] as f64 * train[i + lag] as f64;
        }
        let bpm = 60_000.0 / (lag as f64 * RESOLUTION_MS);
        let log_ratio = (bpm / PRIOR_CENTER_BPM).ln();
        let prior = (-(log_ratio * log_ratio) / (2.0 * PRIOR_SIGMA * PRIOR_SIGMA)).exp();
        weighted[lag] = acc * prior;
        if weighted[lag] > weighted[best_lag] {
            best_lag = lag;
        }
    }

    let confidence = peak_confidence(&weighted[min_lag..=max_lag]);
    let mut bpm = 60_000.0 / (best_lag as f64 * RESOLUTION_MS);

    // Octave correction: try the musically adjacent tempo and keep whichever
    // aligns better with the actual onsets.
    let alternate = if bpm < 70.0 && bpm * 2.0 <= MAX_BPM {
        Some(bpm * 2.0)
    } else if bpm > 180.0 && bpm / 2.0 >= MIN_BPM {
        Some(bpm / 2.0)
    } else {
        None
    };
    if let Some(alt) = alternate {
        let (_, score) = best_phase(&train, bpm);
        let (_, alt_score) = best_phase(&train, alt);
        if alt_score > score {
            debug!("tempo: octave-corrected {:.1} -> {:.1} BPM", bpm, alt);
            bpm = alt;
        }
    }

    if confidence < CONFIDENCE_FLOOR {
        debug!(
            "tempo: confidence {:.2} under floor, defaulting to 120 BPM",
            confidence
        );
        let mut estimate = fallback_estimate(onsets);
        estimate.confidence = confidence;
        return estimate;
    }

    let (beat_phase_ms, _) = best_phase(&train, bpm);
    TempoEstimate {
        bpm,
        confidence,
        beat_phase_ms,
        beat_positions_ms: beat_grid(onsets, bpm, beat_phase_ms),
        fallback: false,
    }
}

/// Fit only the beat phase for a caller-supplied BPM override
pub fn fit_phase(onsets: &[Onset], bpm: f64) -> f64 {
    if onsets.is_empty() {
        return 0.0;
    }
    let train = impulse_train(onsets);
    best_phase(&train, bpm).0
}

fn fallback_estimate(onsets: &[Onset]) -> TempoEstimate {
    let bpm = PRIOR_CENTER_BPM;
    let beat_phase_ms = if onsets.is_empty() {
        0.0
    } else {
        fit_phase(onsets, bpm)
    };
    TempoEstimate {
        bpm,
        confidence: 0.0,
        beat_phase_ms,
        beat_positions_ms: beat_grid(onsets, bpm, beat_phase_ms),
        fallback: true,
    }
}

/// Impulse train at 5 ms resolution, slightly spread so near-misses still
/// correlate across bins
fn impulse_train(onsets: &[Onset]) -> Vec<f32> {
    let last = onsets.last().map(|o| o.timestamp_ms).unwrap_or(0.0);
    let len = (last / RESOLUTION_MS).ceil() as usize + 2;
    let mut train = vec![0.0f32; len];

    for onset in onsets {
        let bin = (onset.timestamp_ms / RESOLUTION_MS).round() as usize;
        if bin < train.len() {
            train[bin] += 1.0;
            if bin > 0 {
                train[bin - 1] += 0.5;
            }
            if bin + 1 < train.len() {
                train[bin + 1] += 0.5;
            }
        }
    }

    train
}

/// Normalized peak prominence of the weighted autocorrelation
fn peak_confidence(weighted: &[f64]) -> f32 {
    if weighted.len() < 2 {
        return 0.0;
    }
    let best = weighted.iter().cloned().fold(f64::MIN, f64::max);
    let mean = weighted.iter().sum::<f64>() / weighted.len() as f64;
    let variance =
        weighted.iter().map(|&x| (x - mean) * (x - mean)).sum::<f64>() / weighted.len() as f64;
    let std = variance.sqrt();
    if std <= 1e-12 {
        return 0.0;
    }
    (((best - mean) / std) as f32 / 4.0).clamp(0.0, 1.0)
}

/// Best beat phase in [0, beat_ms) by summed train energy at beat positions.
/// Returns (phase_ms, score). Ties resolve to the earliest phase.
fn best_phase(train: &[f32], bpm: f64) -> (f64, f32) {
    let beat_ms = 60_000.0 / bpm;
    let steps = (beat_ms / RESOLUTION_MS).floor().max(1.0) as usize;

    let mut best_phase = 0.0;
    let mut best_score = f32::MIN;
    for step in 0..steps {
        let phase = step as f64 * RESOLUTION_MS;
        let mut score = 0.0f32;
        let mut beat = phase;
        while (beat / RESOLUTION_MS) < train.len() as f64 {
            let bin = (beat / RESOLUTION_MS).round() as usize;
            if bin < train.len() {
                score += train[bin];
            }
            beat += beat_ms;
        }
        if score > best_score {
            best_score = score;
            best_phase = phase;
        }
    }

    (best_phase, best_score)
}

fn beat_grid(onsets: &[Onset], bpm: f64, phase_ms: f64) -> Vec<f64> {
    let beat_ms = 60_000.0 / bpm;
    let end = onsets.last().map(|o| o.timestamp_ms).unwrap_or(0.0) + beat_ms;

    let mut positions = Vec::new();
    let mut beat = phase_ms;
    while beat <= end {
        positions.push(beat);
        beat += beat_ms;
    }
    positions
}
