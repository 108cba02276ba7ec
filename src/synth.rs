//! Offline subtractive-synth renderer
//!
//! Renders an arrangement to 16-bit mono WAV at 44.1 kHz. Every voice is a
//! small fixed recipe (oscillator or noise through a biquad with an
//! envelope); pitched lanes are ducked by a kick-triggered sidechain
//! envelope scaled by the lane's `duck_amount`. Output is deterministic:
//! the only noise source is a xorshift generator seeded from note placement.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

use crate::stages::arrange::{
    Arrangement, Lane, LANE_ARP, LANE_BASS, LANE_HIHAT, LANE_KICK, LANE_PAD, LANE_SNARE,
};

/// Render sample rate; independent of the analysis rate
pub const RENDER_SAMPLE_RATE: u32 = 44_100;

/// Output ceiling
const LIMITER_CEILING: f32 = 0.95;

/// Sidechain envelope length in seconds
const DUCK_LENGTH_SEC: f32 = 0.15;

/// Render tail past the arrangement end, for releases and decays
const TAIL_MS: f64 = 1000.0;

/// Render an arrangement to WAV bytes
pub fn render_wav(arrangement: &Arrangement) -> Vec<u8> {
    let samples = render_samples(arrangement);

    let spec = WavSpec {
        channels: 1,
        sample_rate: RENDER_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).expect("in-memory WAV writer");
        for sample in samples {
            let quantized = (sample * 32_767.0).round().clamp(-32_768.0, 32_767.0) as i16;
            writer.write_sample(quantized).expect("in-memory WAV write");
        }
        writer.finalize().expect("in-memory WAV finalize");
    }
    cursor.into_inner()
}

/// Render an arrangement to a mono f32 buffer
pub fn render_samples(arrangement: &Arrangement) -> Vec<f32> {
    let sr = RENDER_SAMPLE_RATE as f64;
    let total_samples = ((arrangement.total_duration_ms + TAIL_MS) / 1000.0 * sr) as usize;
    let mut mix = vec![0.0f32; total_samples];

    let duck_env = build_duck_envelope(arrangement, total_samples);

    for lane in arrangement.all_lanes() {
        render_lane(lane, &mut mix, &duck_env);
    }

    for sample in mix.iter_mut() {
        *sample = sample.clamp(-LIMITER_CEILING, LIMITER_CEILING);
    }

    mix
}

/// Exponential sidechain envelope retriggered by every kick note
fn build_duck_envelope(arrangement: &Arrangement, total_samples: usize) -> Vec<f32> {
    let mut env = vec![0.0f32; total_samples];
    let kick_lane = arrangement.drum_lanes.iter().find(|l| l.name == LANE_KICK);
    let Some(kick_lane) = kick_lane else {
        return env;
    };

    let sr = RENDER_SAMPLE_RATE as f32;
    let length = (DUCK_LENGTH_SEC * sr) as usize;
    for note in &kick_lane.events {
        let start = ms_to_sample(note.timestamp_ms);
        for i in 0..length {
            let idx = start + i;
            if idx >= total_samples {
                break;
            }
            let value = (-(i as f32 / sr) / 0.05).exp();
            env[idx] = env[idx].max(value);
        }
    }

    env
}

fn render_lane(lane: &Lane, mix: &mut [f32], duck_env: &[f32]) {
    for note in &lane.events {
        let start = ms_to_sample(note.timestamp_ms);
        let amp = note.velocity as f32 / 127.0;
        let pitch = note.midi_note.unwrap_or(lane.midi_note);
        let duration_sec = (note.duration_ms / 1000.0) as f32;

        let voice: Vec<f32> = match lane.name.as_str() {
            LANE_KICK => kick_voice(amp),
            LANE_SNARE => snare_voice(amp, start as u64),
            LANE_HIHAT => hat_voice(amp, start as u64),
            LANE_BASS => bass_voice(midi_to_freq(pitch), duration_sec, amp),
            LANE_PAD => pad_voice(midi_to_freq(pitch), duration_sec, amp),
            LANE_ARP => arp_voice(midi_to_freq(pitch), duration_sec, amp),
            _ => Vec::new(),
        };

        let ducked = lane.duck_amount > 0.0;
        for (i, &sample) in voice.iter().enumerate() {
            let idx = start + i;
            if idx >= mix.len() {
                break;
            }
            let gain = if ducked {
                1.0 - lane.duck_amount * duck_env[idx]
            } else {
                1.0
            };
            mix[idx] += sample * gain;
        }
    }
}

/// A4 = 440 Hz at MIDI note 69
pub fn midi_to_freq(midi_note: u8) -> f32 {
    440.0 * 2.0f32.powf((midi_note as f32 - 69.0) / 12.0)
}

fn ms_to_sample(ms: f64) -> usize {
    (ms / 1000.0 * RENDER_SAMPLE_RATE as f64).round().max(0.0) as usize
}

/// Kick: 150 -> 60 Hz sine sweep over 50 ms, exponential decay to 300 ms
fn kick_voice(amp: f32) -> Vec<f32> {
    let sr = RENDER_SAMPLE_RATE as f32;
    let length = (0.3 * sr) as usize;
    let mut out = Vec::with_capacity(length);

    let mut phase = 0.0f32;
    for i in 0..length {
        let t = i as f32 / sr;
        let freq = if t < 0.05 {
            150.0 - (150.0 - 60.0) * (t / 0.05)
        } else {
            60.0
        };
        phase += 2.0 * std::f32::consts::PI * freq / sr;
        let env = (-t / 0.06).exp();
        out.push(phase.sin() * env * amp * 0.9);
    }

    out
}

/// Snare: bandpassed noise at 2 kHz plus a 200 Hz sine body
fn snare_voice(amp: f32, seed: u64) -> Vec<f32> {
    let sr = RENDER_SAMPLE_RATE as f32;
    let length = (0.15 * sr) as usize;
    let mut out = Vec::with_capacity(length);

    let mut noise = Xorshift64::new(seed);
    let mut bandpass = Biquad::bandpass(2000.0, 1.0, sr);
    for i in 0..length {
        let t = i as f32 / sr;
        let rattle = bandpass.process(noise.next_bipolar()) * (-t / 0.03).exp();
        let body = if t < 0.1 {
            (2.0 * std::f32::consts::PI * 200.0 * t).sin() * (-t / 0.02).exp() * 0.6
        } else {
            0.0
        };
        out.push((rattle + body) * amp * 0.7);
    }

    out
}

/// Hat: noise highpassed at 8 kHz, 40 ms decay
fn hat_voice(amp: f32, seed: u64) -> Vec<f32> {
    let sr = RENDER_SAMPLE_RATE as f32;
    let length = (0.04 * sr) as usize;
    let mut out = Vec::with_capacity(length);

    let mut noise = Xorshift64::new(seed);
    let mut highpass = Biquad::highpass(8000.0, 0.707, sr);
    for i in 0..length {
        let t = i as f32 / sr;
        let sample = highpass.process(noise.next_bipolar()) * (-t / 0.008).exp();
        out.push(sample * amp * 0.4);
    }

    out
}

/// Bass: sawtooth through an 800 Hz lowpass with ADSR
fn bass_voice(freq: f32, duration_sec: f32, amp: f32) -> Vec<f32> {
    let sr = RENDER_SAMPLE_RATE as f32;
    let release = duration_sec.min(0.3);
    let length = ((duration_sec + release) * sr) as usize;
    let mut out = Vec::with_capacity(length);

    let envelope = Adsr::new(0.005, 0.05, 0.6, release, duration_sec);
    let mut lowpass = Biquad::lowpass(800.0, 0.707, sr);
    let mut phase = 0.0f32;
    for i in 0..length {
        let t = i as f32 / sr;
        phase = (phase + freq / sr).fract();
        let saw = 2.0 * phase - 1.0;
        out.push(lowpass.process(saw) * envelope.level(t) * amp * 0.5);
    }

    out
}

/// Pad: square wave through a lowpass sweeping 1200 -> 400 Hz
fn pad_voice(freq: f32, duration_sec: f32, amp: f32) -> Vec<f32> {
    let sr = RENDER_SAMPLE_RATE as f32;
    let release = 0.1;
    let length = ((duration_sec + release) * sr) as usize;
    let mut out = Vec::with_capacity(length);

    let mut lowpass = Biquad::lowpass(1200.0, 0.707, sr);
    let mut phase = 0.0f32;
    for i in 0..length {
        let t = i as f32 / sr;

        // Coefficient update every millisecond keeps the sweep smooth
        // without recomputing per sample.
        if i % (sr as usize / 1000).max(1) == 0 {
            let progress = (t / duration_sec.max(0.001)).min(1.0);
            let cutoff = 1200.0 - (1200.0 - 400.0) * progress;
            lowpass.retune_lowpass(cutoff, 0.707, sr);
        }

        phase = (phase + freq / sr).fract();
        let square = if phase < 0.5 { 1.0 } else { -1.0 };

        let attack = (t / 0.02).min(1.0);
        let rel = if t > duration_sec {
            (1.0 - (t - duration_sec) / release).max(0.0)
        } else {
            1.0
        };
        out.push(lowpass.process(square) * attack * rel * amp * 0.35);
    }

    out
}

/// Arp: clean pulse with a short envelope
fn arp_voice(freq: f32, duration_sec: f32, amp: f32) -> Vec<f32> {
    let sr = RENDER_SAMPLE_RATE as f32;
    let release = 0.05;
    let length = ((duration_sec + release) * sr) as usize;
    let mut out = Vec::with_capacity(length);

    let envelope = Adsr::new(0.002, 0.03, 0.5, release, duration_sec);
    let mut lowpass = Biquad::lowpass(2500.0, 0.707, sr);
    let mut phase = 0.0f32;
    for i in 0..length {
        let t = i as f32 / sr;
        phase = (phase + freq / sr).fract();
        let pulse = if phase < 0.25 { 1.0 } else { -1.0 };
        out.push(lowpass.process(pulse) * envelope.level(t) * amp * 0.4);
    }

    out
}

/// Linear ADSR evaluated against absolute note time
struct Adsr {
    attack: f32,
    decay: f32,
    sustain: f32,
    release: f32,
    note_end: f32,
}

impl Adsr {
    fn new(attack: f32, decay: f32, sustain: f32, release: f32, note_end: f32) -> Self {
        Adsr {
            attack,
            decay,
            sustain,
            release,
            note_end,
        }
    }

    fn level(&self, t: f32) -> f32 {
        let held = if t < self.attack {
            t / self.attack
        } else if t < self.attack + self.decay {
            1.0 - (1.0 - self.sustain) * (t - self.attack) / self.decay
        } else {
            self.sustain
        };

        if t <= self.note_end {
            held
        } else if self.release > 0.0 {
            held * (1.0 - (t - self.note_end) / self.release).max(0.0)
        } else {
            0.0
        }
    }
}

/// RBJ cookbook biquad, direct form 1
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    fn from_coefficients(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Biquad {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    fn lowpass(cutoff: f32, q: f32, sr: f32) -> Self {
        let (_, cos_w, alpha) = Self::prewarp(cutoff, q, sr);
        Self::from_coefficients(
            (1.0 - cos_w) / 2.0,
            1.0 - cos_w,
            (1.0 - cos_w) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        )
    }

    fn highpass(cutoff: f32, q: f32, sr: f32) -> Self {
        let (_, cos_w, alpha) = Self::prewarp(cutoff, q, sr);
        Self::from_coefficients(
            (1.0 + cos_w) / 2.0,
            -(1.0 + cos_w),
            (1.0 + cos_w) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        )
    }

    fn bandpass(center: f32, q: f32, sr: f32) -> Self {
        let (sin_w, cos_w, alpha) = Self::prewarp(center, q, sr);
        Self::from_coefficients(
            sin_w / 2.0,
            0.0,
            -sin_w / 2.0,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        )
    }

    /// Swap in new lowpass coefficients, keeping filter state
    fn retune_lowpass(&mut self, cutoff: f32, q: f32, sr: f32) {
        let fresh = Self::lowpass(cutoff, q, sr);
        self.b0 = fresh.b0;
        self.b1 = fresh.b1;
        self.b2 = fresh.b2;
        self.a1 = fresh.a1;
        self.a2 = fresh.a2;
    }

    fn prewarp(freq: f32, q: f32, sr: f32) -> (f32, f32, f32) {
        let w = 2.0 * std::f32::consts::PI * (freq / sr).min(0.49);
        let sin_w = w.sin();
        (sin_w, w.cos(), sin_w / (2.0 * q))
    }

    fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// Deterministic noise: xorshift64 seeded from note placement
struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    fn new(seed: u64) -> Self {
        Xorshift64 {
            state: seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1,
        }
    }

    fn next_bipolar(&mut self) -> f32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        ((self.state >> 40) as f32 / 8_388_608.0) - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::arrange::ArrangedNote;
    use crate::templates::ArrangementTemplate;

    fn one_kick_arrangement() -> Arrangement {
        let mut kick = Lane::new(LANE_KICK, 36);
        kick.events.push(ArrangedNote::new(0.0, 100.0, 120));
        Arrangement {
            drum_lanes: vec![kick],
            bass_lane: None,
            pad_lane: None,
            arp_lane: None,
            template: ArrangementTemplate::SynthwaveStraight,
            total_duration_ms: 1000.0,
            bar_count: 1,
            bpm: 120.0,
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let arrangement = one_kick_arrangement();
        assert_eq!(render_wav(&arrangement), render_wav(&arrangement));
    }

    #[test]
    fn test_render_respects_limiter() {
        let mut arrangement = one_kick_arrangement();
        // Stack several loud coincident notes
        for lane in arrangement.drum_lanes.iter_mut() {
            for _ in 0..8 {
                lane.events.push(ArrangedNote::new(0.0, 100.0, 127));
            }
        }
        let samples = render_samples(&arrangement);
        assert!(samples.iter().all(|s| s.abs() <= LIMITER_CEILING + 1e-6));
    }

    #[test]
    fn test_kick_produces_energy() {
        let samples = render_samples(&one_kick_arrangement());
        let peak = samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        assert!(peak > 0.1, "kick peak {}", peak);
    }

    #[test]
    fn test_wav_header_shape() {
        let bytes = render_wav(&one_kick_arrangement());
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        let reader = hound::WavReader::new(Cursor::new(&bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, RENDER_SAMPLE_RATE);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
    }

    #[test]
    fn test_sidechain_ducks_pitched_lane() {
        // A pad held across a kick, duck fully on vs off
        let mut kick = Lane::new(LANE_KICK, 36);
        kick.events.push(ArrangedNote::new(500.0, 100.0, 127));
        let mut pad = Lane::new(LANE_PAD, 57);
        pad.events.push(ArrangedNote::new(0.0, 900.0, 100));

        let make = |duck: f32| {
            let mut pad = pad.clone();
            pad.duck_amount = duck;
            Arrangement {
                drum_lanes: vec![kick.clone()],
                bass_lane: None,
                pad_lane: Some(pad),
                arp_lane: None,
                template: ArrangementTemplate::SynthwaveStraight,
                total_duration_ms: 1000.0,
                bar_count: 1,
                bpm: 120.0,
            }
        };

        let loud = render_samples(&make(0.0));
        let ducked = render_samples(&make(1.0));

        // RMS right after the kick hit should drop when ducking is on
        let window = |buf: &[f32]| {
            let start = ms_to_sample(505.0);
            let end = ms_to_sample(560.0);
            (buf[start..end].iter().map(|s| s * s).sum::<f32>() / (end - start) as f32).sqrt()
        };
        assert!(
            window(&ducked) < window(&loud),
            "ducked {} vs loud {}",
            window(&ducked),
            window(&loud)
        );
    }

    #[test]
    fn test_midi_to_freq() {
        assert!((midi_to_freq(69) - 440.0).abs() < 0.01);
        assert!((midi_to_freq(57) - 220.0).abs() < 0.01);
    }

    #[test]
    fn test_noise_deterministic_per_seed() {
        let mut a = Xorshift64::new(42);
        let mut b = Xorshift64::new(42);
        for _ in 0..16 {
            assert_eq!(a.next_bipolar(), b.next_bipolar());
        }
        let mut c = Xorshift64::new(43);
        let first: Vec<f32> = (0..4).map(|_| c.next_bipolar()).collect();
        let mut d = Xorshift64::new(42);
        let second: Vec<f32> = (0..4).map(|_| d.next_bipolar()).collect();
        assert_ne!(first, second);
    }

    #[test]
    fn test_adsr_shape() {
        let env = Adsr::new(0.005, 0.05, 0.6, 0.3, 0.5);
        assert!(env.level(0.0) < 0.01);
        assert!((env.level(0.005) - 1.0).abs() < 0.01);
        assert!((env.level(0.2) - 0.6).abs() < 0.01);
        assert!(env.level(0.81) < 0.01); // past note end + release
    }
}
