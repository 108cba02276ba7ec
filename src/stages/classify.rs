//! Rule-based event classification
//!
//! Four ordered rules with explicit numeric thresholds; the first match
//! wins and `HumVoiced` is the unconditional fallback, so classification is
//! total. A calibration profile scales every threshold in a class's rule by
//! that class's multiplier (default 1.0), which keeps calibration linear:
//! doubling all multipliers doubles all thresholds.

use crate::calibration::CalibrationProfile;
use crate::events::{event_id, Event, EventClass, FeatureVector, Onset};

/// Classify every onset into an `Event` with a stable content-derived id
pub fn run(
    onsets: &[Onset],
    features: &[FeatureVector],
    calibration: &CalibrationProfile,
) -> Vec<Event> {
    onsets
        .iter()
        .zip(features)
        .enumerate()
        .map(|(index, (onset, feature))| {
            let (class, confidence) = classify(feature, calibration);
            Event {
                id: event_id(index, onset.timestamp_ms),
                timestamp_ms: onset.timestamp_ms,
                duration_ms: onset.duration_ms,
                class,
                confidence,
                features: feature.clone(),
            }
        })
        .collect()
}

/// Apply the ordered rules to one feature vector
pub fn classify(f: &FeatureVector, calibration: &CalibrationProfile) -> (EventClass, f32) {
    // Rule 1: bilabial plosive (B/P). Low-band dominance with a dark
    // centroid and a real attack.
    let m = calibration.class_multiplier(EventClass::BilabialPlosive);
    if f.low_band_energy >= 0.55 * m
        && f.spectral_centroid < 700.0 * m
        && f.peak_amplitude >= 0.15 * m
    {
        return (
            EventClass::BilabialPlosive,
            threshold_confidence(f.low_band_energy, 0.55 * m),
        );
    }

    // Rule 2: hat noise (S/TS). Bright and noisy.
    let m = calibration.class_multiplier(EventClass::HihatNoise);
    if f.high_band_energy >= 0.45 * m && f.zcr >= 0.30 * m {
        return (
            EventClass::HihatNoise,
            threshold_confidence(f.high_band_energy, 0.45 * m),
        );
    }

    // Rule 3: click (T/K). Mid-band transient in the vowel-free zone.
    let m = calibration.class_multiplier(EventClass::Click);
    if f.mid_band_energy >= 0.40 * m
        && f.zcr >= 0.08 * m
        && f.zcr <= 0.30 * m
        && f.spectral_centroid >= 700.0 * m
        && f.spectral_centroid <= 3500.0 * m
    {
        return (
            EventClass::Click,
            threshold_confidence(f.mid_band_energy, 0.40 * m),
        );
    }

    // Rule 4: explicit hum. Very low ZCR with combined low+mid weight.
    let m = calibration.class_multiplier(EventClass::HumVoiced);
    if f.zcr < 0.05 * m && f.low_band_energy + f.mid_band_energy >= 0.7 * m {
        let threshold = 0.05 * m;
        let distance = if threshold > 0.0 {
            (threshold - f.zcr) / threshold
        } else {
            0.0
        };
        return (
            EventClass::HumVoiced,
            (0.5 + 0.5 * distance).clamp(0.5, 0.99),
        );
    }

    // Fallback keeps the classifier total
    (EventClass::HumVoiced, (1.0 - f.zcr * 2.0).max(0.3))
}

/// Confidence from how far the deciding feature clears its threshold
fn threshold_confidence(value: f32, threshold: f32) -> f32 {
    if threshold <= 0.0 {
        return 0.99;
    }
    let distance = (value - threshold) / threshold;
    (0.5 + distance).clamp(0.5, 0.99)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(
        centroid: f32,
        zcr: f32,
        low: f32,
        mid: f32,
        high: f32,
        peak: f32,
    ) -> FeatureVector {
        FeatureVector {
            spectral_centroid: centroid,
            zcr,
            low_band_energy: low,
            mid_band_energy: mid,
            high_band_energy: high,
            peak_amplitude: peak,
        }
    }

    #[test]
    fn test_kick_features_classify_bilabial() {
        let f = features(300.0, 0.04, 0.7, 0.2, 0.1, 0.8);
        let (class, confidence) = classify(&f, &CalibrationProfile::default());
        assert_eq!(class, EventClass::BilabialPlosive);
        assert!(confidence >= 0.5);
    }

    #[test]
    fn test_hat_features_classify_hihat() {
        let f = features(5000.0, 0.45, 0.05, 0.25, 0.7, 0.6);
        let (class, confidence) = classify(&f, &CalibrationProfile::default());
        assert_eq!(class, EventClass::HihatNoise);
        assert!(confidence >= 0.7, "confidence {}", confidence);
    }

    #[test]
    fn test_click_features_classify_click() {
        let f = features(1800.0, 0.2, 0.2, 0.6, 0.2, 0.7);
        let (class, _) = classify(&f, &CalibrationProfile::default());
        assert_eq!(class, EventClass::Click);
    }

    #[test]
    fn test_hum_explicit_rule() {
        let f = features(400.0, 0.02, 0.4, 0.4, 0.2, 0.1);
        // Low band 0.4 < 0.55 so the plosive rule passes over it
        let (class, confidence) = classify(&f, &CalibrationProfile::default());
        assert_eq!(class, EventClass::HumVoiced);
        assert!(confidence > 0.5);
    }

    #[test]
    fn test_fallback_is_total() {
        // Nothing matches: mid centroid, high zcr, scattered energy
        let f = features(4000.0, 0.6, 0.3, 0.3, 0.4, 0.05);
        let (class, confidence) = classify(&f, &CalibrationProfile::default());
        assert_eq!(class, EventClass::HumVoiced);
        assert!(confidence >= 0.3);
    }

    #[test]
    fn test_rule_precedence_plosive_beats_click() {
        // Satisfies both the plosive and click-ish shapes; rule 1 wins
        let f = features(650.0, 0.1, 0.6, 0.4, 0.0, 0.5);
        let (class, _) = classify(&f, &CalibrationProfile::default());
        assert_eq!(class, EventClass::BilabialPlosive);
    }

    #[test]
    fn test_calibration_relaxes_plosive_rule() {
        // Low band 0.4 misses the stock 0.55 threshold
        let f = features(300.0, 0.04, 0.4, 0.3, 0.3, 0.8);
        let stock = classify(&f, &CalibrationProfile::default());
        assert_ne!(stock.0, EventClass::BilabialPlosive);

        let mut profile = CalibrationProfile::default();
        profile
            .thresholds
            .insert("bilabial_plosive".to_string(), 0.7);
        let biased = classify(&f, &profile);
        assert_eq!(biased.0, EventClass::BilabialPlosive);
    }

    #[test]
    fn test_confidence_clipped_range() {
        // Far above threshold clips at 0.99
        let f = features(100.0, 0.01, 1.0, 0.0, 0.0, 1.0);
        let (_, confidence) = classify(&f, &CalibrationProfile::default());
        assert!(confidence <= 0.99);
        assert!(confidence >= 0.5);
    }

    #[test]
    fn test_run_assigns_stable_ids() {
        let onsets = vec![
            Onset {
                timestamp_ms: 100.0,
                duration_ms: 100.0,
                strength: 1.0,
                peak_amplitude: 0.8,
            },
            Onset {
                timestamp_ms: 600.0,
                duration_ms: 100.0,
                strength: 1.0,
                peak_amplitude: 0.8,
            },
        ];
        let feats = vec![
            features(300.0, 0.04, 0.7, 0.2, 0.1, 0.8),
            features(5000.0, 0.45, 0.05, 0.25, 0.7, 0.6),
        ];
        let events_a = run(&onsets, &feats, &CalibrationProfile::default());
        let events_b = run(&onsets, &feats, &CalibrationProfile::default());
        assert_eq!(events_a[0].id, events_b[0].id);
        assert_ne!(events_a[0].id, events_a[1].id);
        assert_eq!(events_a[0].class, EventClass::BilabialPlosive);
        assert_eq!(events_a[1].class, EventClass::HihatNoise);
    }
}
