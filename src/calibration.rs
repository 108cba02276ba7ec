//! Calibration profiles: per-class multiplicative threshold biases
//!
//! A profile is a small JSON blob produced offline from labeled feature
//! samples. The core treats it as opaque data: thresholds it recognizes are
//! applied as multipliers, unknown keys are ignored, missing keys act as 1.0.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::events::{EventClass, FeatureVector};

/// Reserved thresholds key scaling the onset-detector peak threshold
pub const ONSET_THRESHOLD_KEY: &str = "onset";

/// User calibration profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationProfile {
    /// Multiplicative biases keyed by class name (plus `"onset"`).
    /// BTreeMap keeps serialization order stable.
    pub thresholds: BTreeMap<String, f32>,
    pub notes: String,
}

impl CalibrationProfile {
    /// Multiplier for a thresholds key; 1.0 when absent
    pub fn multiplier(&self, key: &str) -> f32 {
        self.thresholds.get(key).copied().unwrap_or(1.0)
    }

    /// Multiplier for an event class's rule thresholds
    pub fn class_multiplier(&self, class: EventClass) -> f32 {
        self.multiplier(class.name())
    }

    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json_bytes(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}

/// Build a profile from labeled feature samples by comparing each class's
/// mean deciding feature against the stock rule threshold.
///
/// The deciding feature follows the classifier rules: low-band energy for
/// plosives, high-band energy for hats, mid-band energy for clicks, ZCR for
/// hums. A performer whose "B" carries less low end than the stock 0.55
/// threshold gets a bias below 1.0, relaxing that rule proportionally.
pub fn profile_from_samples(
    labeled: &[(EventClass, FeatureVector)],
    notes: impl Into<String>,
) -> CalibrationProfile {
    let mut profile = CalibrationProfile {
        thresholds: BTreeMap::new(),
        notes: notes.into(),
    };

    for class in EventClass::all() {
        let values: Vec<f32> = labeled
            .iter()
            .filter(|(c, _)| *c == class)
            .map(|(_, f)| deciding_feature(class, f))
            .collect();
        if values.is_empty() {
            continue;
        }
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let stock = stock_deciding_threshold(class);
        if stock > 0.0 && mean > 0.0 {
            profile
                .thresholds
                .insert(class.name().to_string(), (mean / stock).clamp(0.25, 4.0));
        }
    }

    profile
}

fn deciding_feature(class: EventClass, f: &FeatureVector) -> f32 {
    match class {
        EventClass::BilabialPlosive => f.low_band_energy,
        EventClass::HihatNoise => f.high_band_energy,
        EventClass::Click => f.mid_band_energy,
        EventClass::HumVoiced => f.zcr,
    }
}

fn stock_deciding_threshold(class: EventClass) -> f32 {
    match class {
        EventClass::BilabialPlosive => 0.55,
        EventClass::HihatNoise => 0.45,
        EventClass::Click => 0.40,
        EventClass::HumVoiced => 0.05,
    }
}
