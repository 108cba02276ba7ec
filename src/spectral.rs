//! Spectral processing utilities (STFT, windows, flux, band measures)

use ndarray::Array2;
use rustfft::{num_complex::Complex32, FftPlanner};

/// Analysis window length for onset detection
pub const ONSET_WINDOW: usize = 1024;

/// Hop between onset analysis frames
pub const ONSET_HOP: usize = 512;

/// Generate a Hann window of the given size
pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}

/// Magnitude spectrum of one windowed block, zero-padded to `n_fft`.
/// Returns the `n_fft / 2 + 1` non-negative frequency bins.
pub fn magnitude_spectrum(samples: &[f32], n_fft: usize) -> Vec<f32> {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);

    let window = hann_window(samples.len().min(n_fft));
    let mut frame: Vec<Complex32> = vec![Complex32::new(0.0, 0.0); n_fft];
    for (i, (&sample, &win)) in samples.iter().zip(&window).enumerate() {
        frame[i] = Complex32::new(sample * win, 0.0);
    }

    fft.process(&mut frame);
    frame[..n_fft / 2 + 1].iter().map(|c| c.norm()).collect()
}

/// Compute a magnitude STFT as an `Array2<f32>` of shape (bins, frames)
pub fn stft_magnitudes(samples: &[f32], n_fft: usize, hop: usize) -> Array2<f32> {
    if samples.len() < n_fft || hop == 0 {
        return Array2::zeros((n_fft / 2 + 1, 0));
    }

    let n_frames = (samples.len() - n_fft) / hop + 1;
    let n_bins = n_fft / 2 + 1;
    let mut mag = Array2::<f32>::zeros((n_bins, n_frames));

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = hann_window(n_fft);

    let mut frame: Vec<Complex32> = vec![Complex32::new(0.0, 0.0); n_fft];
    for frame_idx in 0..n_frames {
        let start = frame_idx * hop;
        for (i, (&sample, &win)) in samples[start..start + n_fft].iter().zip(&window).enumerate() {
            frame[i] = Complex32::new(sample * win, 0.0);
        }
        fft.process(&mut frame);
        for (bin, value) in frame[..n_bins].iter().enumerate() {
            mag[[bin, frame_idx]] = value.norm();
        }
    }

    mag
}

/// Half-wave-rectified spectral flux per frame (positive magnitude increase)
pub fn spectral_flux(mag: &Array2<f32>) -> Vec<f32> {
    let n_frames = mag.shape()[1];
    let mut flux = vec![0.0; n_frames];

    for t in 1..n_frames {
        let mut frame_flux = 0.0;
        for f in 0..mag.shape()[0] {
            let diff = mag[[f, t]] - mag[[f, t - 1]];
            if diff > 0.0 {
                frame_flux += diff;
            }
        }
        flux[t] = frame_flux;
    }

    flux
}

/// Spectral centroid of a magnitude spectrum, in Hz
pub fn spectral_centroid(spectrum: &[f32], sample_rate: u32, n_fft: usize) -> f32 {
    if n_fft == 0 {
        return 0.0;
    }
    let bin_width = sample_rate as f32 / n_fft as f32;

    let mut weighted = 0.0;
    let mut total = 0.0;
    for (bin, &magnitude) in spectrum.iter().enumerate() {
        weighted += bin as f32 * bin_width * magnitude;
        total += magnitude;
    }

    if total > 0.0 {
        weighted / total
    } else {
        0.0
    }
}

/// Energy shares over [0, 200], [200, 2000], [2000, Nyquist] Hz.
/// Shares sum to 1 unless the window is silent, then all zeros.
pub fn band_energies(spectrum: &[f32], sample_rate: u32, n_fft: usize) -> [f32; 3] {
    if n_fft == 0 {
        return [0.0; 3];
    }
    let bin_width = sample_rate as f32 / n_fft as f32;

    let mut bands = [0.0f32; 3];
    for (bin, &magnitude) in spectrum.iter().enumerate() {
        let freq = bin as f32 * bin_width;
        let energy = magnitude * magnitude;
        if freq < 200.0 {
            bands[0] += energy;
        } else if freq < 2000.0 {
            bands[1] += energy;
        } else {
            bands[2] += energy;
        }
    }

    let total: f32 = bands.iter().sum();
    if total > 1e-12 {
        [bands[0] / total, bands[1] / total, bands[2] / total]
    } else {
        [0.0; 3]
    }
}

/// Zero-crossing rate: sign changes divided by window length
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / samples.len() as f32
}
