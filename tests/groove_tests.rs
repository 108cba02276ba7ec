//! Tempo, grid, and quantization scenarios

mod common;

use beatsmith::audio::decode_wav;
use beatsmith::calibration::CalibrationProfile;
use beatsmith::events::{event_id, Event, EventClass, FeatureVector};
use beatsmith::grid::{GridDivision, GridPlan, GrooveFeel, TimeSignature};
use beatsmith::stages::{onset, quantize, tempo};

fn synthetic_event(index: usize, timestamp_ms: f64) -> Event {
    Event {
        id: event_id(index, timestamp_ms),
        timestamp_ms,
        duration_ms: 100.0,
        class: EventClass::Click,
        confidence: 0.9,
        features: FeatureVector::zero(),
    }
}

#[test]
fn test_four_kicks_estimate_120_bpm() {
    let wav = common::four_kick_clip();
    let buffer = decode_wav(&wav).unwrap();
    let onsets = onset::run(&buffer, &CalibrationProfile::default()).unwrap();

    let estimate = tempo::run(&onsets);
    assert!(
        (118.0..=122.0).contains(&estimate.bpm),
        "estimated {} BPM",
        estimate.bpm
    );
    assert!(!estimate.fallback);
}

#[test]
fn test_four_kicks_quantize_to_truth_at_full_strength() {
    let wav = common::four_kick_clip();
    let buffer = decode_wav(&wav).unwrap();
    let onsets = onset::run(&buffer, &CalibrationProfile::default()).unwrap();
    let estimate = tempo::run(&onsets);

    let events: Vec<Event> = onsets
        .iter()
        .enumerate()
        .map(|(i, o)| synthetic_event(i, o.timestamp_ms))
        .collect();

    let plan = GridPlan::new(
        estimate.bpm,
        TimeSignature::FourFour,
        GridDivision::Sixteenth,
        GrooveFeel::Straight,
        0.0,
        4,
        estimate.beat_phase_ms,
    );
    let outcome = quantize::run(&events, &plan, 1.0, 100.0);

    assert_eq!(outcome.events.len(), 4);
    for (q, truth) in outcome.events.iter().zip(&[500.0, 1000.0, 1500.0, 2000.0]) {
        assert!(
            (q.quantized_timestamp_ms - truth).abs() <= 1.0,
            "quantized {} vs truth {}",
            q.quantized_timestamp_ms,
            truth
        );
    }
}

#[test]
fn test_hat_pattern_near_120_bpm() {
    let wav = common::hat_pattern_clip();
    let buffer = decode_wav(&wav).unwrap();
    let onsets = onset::run(&buffer, &CalibrationProfile::default()).unwrap();

    let estimate = tempo::run(&onsets);
    assert!(
        (112.0..=128.0).contains(&estimate.bpm),
        "8ths at 120 estimated as {} BPM",
        estimate.bpm
    );
}

#[test]
fn test_swing_snaps_odd_sixteenths_only() {
    // Events exactly on the straight 1/16 grid, swung grid at 0.66
    let plan = GridPlan::new(
        120.0,
        TimeSignature::FourFour,
        GridDivision::Sixteenth,
        GrooveFeel::Swing,
        0.66,
        1,
        0.0,
    );
    let slot = 125.0;
    let swing_delay = 0.66 * slot * (2.0 / 3.0);

    let events: Vec<Event> = (0..16)
        .map(|i| synthetic_event(i, i as f64 * slot))
        .collect();
    let outcome = quantize::run(&events, &plan, 1.0, 100.0);
    assert_eq!(outcome.events.len(), 16);

    for (i, q) in outcome.events.iter().enumerate() {
        let expected = if i % 2 == 1 {
            i as f64 * slot + swing_delay
        } else {
            i as f64 * slot
        };
        assert!(
            (q.quantized_timestamp_ms - expected).abs() < 0.5,
            "slot {}: quantized {} expected {}",
            i,
            q.quantized_timestamp_ms,
            expected
        );
    }
}

#[test]
fn test_lookahead_drop_scenario() {
    // 1/16 at 120 BPM: slot_ms = 125, half-slot = 62.5
    let plan = GridPlan::new(
        120.0,
        TimeSignature::FourFour,
        GridDivision::Sixteenth,
        GrooveFeel::Straight,
        0.0,
        4,
        0.0,
    );

    // 40 ms from the nearest slot, zero lookahead: accepted
    let accepted = quantize::run(&[synthetic_event(0, 540.0)], &plan, 1.0, 0.0);
    assert_eq!(accepted.events.len(), 1);
    assert_eq!(accepted.dropped_outside_lookahead, 0);

    // 80 ms beyond the first slot's reach: dropped and reported
    let dropped = quantize::run(&[synthetic_event(0, -80.0)], &plan, 1.0, 0.0);
    assert_eq!(dropped.events.len(), 0);
    assert_eq!(dropped.dropped_outside_lookahead, 1);
}

#[test]
fn test_quantize_idempotent_at_full_strength() {
    let plan = GridPlan::new(
        97.0,
        TimeSignature::FourFour,
        GridDivision::Eighth,
        GrooveFeel::Straight,
        0.0,
        4,
        42.0,
    );
    let events: Vec<Event> = (0..8)
        .map(|i| synthetic_event(i, 60.0 + i as f64 * 311.0))
        .collect();

    let first = quantize::run(&events, &plan, 1.0, 150.0);
    let requantized: Vec<Event> = first
        .events
        .iter()
        .enumerate()
        .map(|(i, q)| synthetic_event(i, q.quantized_timestamp_ms))
        .collect();
    let second = quantize::run(&requantized, &plan, 1.0, 150.0);

    for (a, b) in first.events.iter().zip(&second.events) {
        assert!(
            (a.quantized_timestamp_ms - b.quantized_timestamp_ms).abs() < 1e-9,
            "requantizing moved {} to {}",
            a.quantized_timestamp_ms,
            b.quantized_timestamp_ms
        );
    }
}

#[test]
fn test_bpm_override_skips_estimation_but_fits_phase() {
    let wav = common::four_kick_clip();
    let buffer = decode_wav(&wav).unwrap();
    let onsets = onset::run(&buffer, &CalibrationProfile::default()).unwrap();

    let phase = tempo::fit_phase(&onsets, 120.0);
    // Kicks sit on the 120 BPM grid starting at 500 ms, so the fitted
    // phase is a multiple of the beat near zero
    assert!(phase < 60_000.0 / 120.0);
    assert!(phase >= 0.0);
}
