//! Per-onset acoustic feature extraction

use crate::audio::AudioBuffer;
use crate::events::{FeatureVector, Onset};
use crate::spectral;

/// Analysis window length in milliseconds
const WINDOW_MS: f64 = 50.0;

/// Pre-roll before the onset in milliseconds
const PRE_ROLL_MS: f64 = 5.0;

/// FFT size for the feature window (window is zero-padded up to this)
const FEATURE_FFT: usize = 4096;

/// Extract a feature vector for every onset. Pure and deterministic.
pub fn run(audio: &AudioBuffer, onsets: &[Onset]) -> Vec<FeatureVector> {
    onsets
        .iter()
        .map(|onset| extract_window(audio, onset))
        .collect()
}

fn extract_window(audio: &AudioBuffer, onset: &Onset) -> FeatureVector {
    let sr = audio.sample_rate as f64;
    let start_ms = (onset.timestamp_ms - PRE_ROLL_MS).max(0.0);
    let start = (start_ms / 1000.0 * sr) as usize;
    let len = (WINDOW_MS / 1000.0 * sr) as usize;
    let end = (start + len).min(audio.samples.len());

    if start >= end {
        return FeatureVector {
            peak_amplitude: onset.peak_amplitude,
            ..FeatureVector::zero()
        };
    }

    let window = &audio.samples[start..end];
    let n_fft = FEATURE_FFT.min(window.len().next_power_of_two().max(256));
    let spectrum = spectral::magnitude_spectrum(window, n_fft);
    let bands = spectral::band_energies(&spectrum, audio.sample_rate, n_fft);

    FeatureVector {
        spectral_centroid: spectral::spectral_centroid(&spectrum, audio.sample_rate, n_fft),
        zcr: spectral::zero_crossing_rate(window),
        low_band_energy: bands[0],
        mid_band_energy: bands[1],
        high_band_energy: bands[2],
        peak_amplitude: onset.peak_amplitude,
    }
}
