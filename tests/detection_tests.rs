//! Detection and classification scenarios against synthetic audio

mod common;

use beatsmith::audio::decode_wav;
use beatsmith::calibration::CalibrationProfile;
use beatsmith::events::EventClass;
use beatsmith::stages::{classify, features, onset};
use beatsmith::ErrorKind;

#[test]
fn test_silence_in_zero_out() {
    // Two seconds of zeros: decoding succeeds, detection reports NoOnsets
    let wav = common::wav_bytes(&common::silence(2000.0), common::SR);
    let buffer = decode_wav(&wav).unwrap();
    let result = onset::run(&buffer, &CalibrationProfile::default());
    assert!(matches!(result, Err(ErrorKind::NoOnsets)));
}

#[test]
fn test_four_kicks_detected_and_classified() {
    let wav = common::four_kick_clip();
    let buffer = decode_wav(&wav).unwrap();

    let onsets = onset::run(&buffer, &CalibrationProfile::default()).unwrap();
    assert!(onsets.len() >= 4, "found {} onsets", onsets.len());

    // Each synthetic kick has a detection within a few milliseconds
    for &truth in &[500.0, 1000.0, 1500.0, 2000.0] {
        let nearest = onsets
            .iter()
            .map(|o| (o.timestamp_ms - truth).abs())
            .fold(f64::MAX, f64::min);
        assert!(nearest < 10.0, "no onset within 10 ms of {} ms", truth);
    }

    let feats = features::run(&buffer, &onsets);
    let events = classify::run(&onsets, &feats, &CalibrationProfile::default());
    for event in &events {
        assert_eq!(
            event.class,
            EventClass::BilabialPlosive,
            "kick at {} ms classified as {:?} (features {:?})",
            event.timestamp_ms,
            event.class,
            event.features
        );
    }
}

#[test]
fn test_hat_pattern_classified_with_confidence() {
    let wav = common::hat_pattern_clip();
    let buffer = decode_wav(&wav).unwrap();

    let onsets = onset::run(&buffer, &CalibrationProfile::default()).unwrap();
    assert!(onsets.len() >= 8, "found {} onsets", onsets.len());

    let feats = features::run(&buffer, &onsets);
    let events = classify::run(&onsets, &feats, &CalibrationProfile::default());
    for event in &events {
        assert_eq!(
            event.class,
            EventClass::HihatNoise,
            "burst at {} ms classified as {:?} (features {:?})",
            event.timestamp_ms,
            event.class,
            event.features
        );
        assert!(
            event.confidence >= 0.7,
            "hat confidence {} below 0.7",
            event.confidence
        );
    }
}

#[test]
fn test_event_ids_stable_across_reruns() {
    let wav = common::four_kick_clip();
    let buffer = decode_wav(&wav).unwrap();

    let run_once = || {
        let onsets = onset::run(&buffer, &CalibrationProfile::default()).unwrap();
        let feats = features::run(&buffer, &onsets);
        classify::run(&onsets, &feats, &CalibrationProfile::default())
    };

    let a = run_once();
    let b = run_once();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.timestamp_ms, y.timestamp_ms);
    }
}

#[test]
fn test_events_sorted_by_timestamp() {
    let wav = common::hat_pattern_clip();
    let buffer = decode_wav(&wav).unwrap();
    let onsets = onset::run(&buffer, &CalibrationProfile::default()).unwrap();
    for pair in onsets.windows(2) {
        assert!(pair[0].timestamp_ms < pair[1].timestamp_ms);
    }
}

#[test]
fn test_classifier_total_on_arbitrary_audio() {
    // A messy clip: every detected onset still gets exactly one class
    let mut samples = common::silence(1500.0);
    common::add_kick(&mut samples, 200.0);
    common::add_hat(&mut samples, 600.0);
    common::add_kick(&mut samples, 900.0);
    common::add_hat(&mut samples, 1200.0);
    let wav = common::wav_bytes(&samples, common::SR);
    let buffer = decode_wav(&wav).unwrap();

    let onsets = onset::run(&buffer, &CalibrationProfile::default()).unwrap();
    let feats = features::run(&buffer, &onsets);
    let events = classify::run(&onsets, &feats, &CalibrationProfile::default());
    assert_eq!(events.len(), onsets.len());
    for event in &events {
        assert!((0.0..=1.0).contains(&event.confidence));
    }
}
