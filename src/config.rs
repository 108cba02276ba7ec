//! Pipeline parameters
//!
//! Every option the caller can set, persisted verbatim in run records. The
//! whole pipeline output is a pure function of `(wav_bytes, Parameters)`.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationProfile;
use crate::error::{ErrorKind, PipelineError, Result};
use crate::grid::{GridDivision, GrooveFeel, TimeSignature};
use crate::templates::ArrangementTemplate;
use crate::theme;

/// Caller-facing parameter record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Theme catalog name
    pub theme: String,
    pub template: ArrangementTemplate,
    /// BPM override in [40, 240]; None uses the estimator
    pub bpm: Option<f64>,
    pub time_signature: TimeSignature,
    pub division: GridDivision,
    pub feel: GrooveFeel,
    /// Swing amount in [0, 1]
    pub swing_amount: f32,
    /// Bars to arrange: 1, 2, 4, 8 or 16
    pub bar_count: u32,
    /// Quantization strength in [0, 1]; 0 passes timing through
    pub quantize_strength: f32,
    /// Extra snap window in [0, 200] ms beyond half a slot
    pub lookahead_ms: f64,
    /// Bilabial-plosive emphasis in [0, 1]
    pub b_emphasis: f32,
    /// Optional calibration profile; missing keys behave as 1.0
    pub calibration_profile: Option<CalibrationProfile>,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            theme: "MIDNIGHT DRIVE".to_string(),
            template: ArrangementTemplate::SynthwaveStraight,
            bpm: None,
            time_signature: TimeSignature::FourFour,
            division: GridDivision::Sixteenth,
            feel: GrooveFeel::Straight,
            swing_amount: 0.0,
            bar_count: 4,
            quantize_strength: 0.85,
            lookahead_ms: 100.0,
            b_emphasis: 0.5,
            calibration_profile: None,
        }
    }
}

impl Parameters {
    /// The calibration profile, or an all-unity default
    pub fn calibration(&self) -> CalibrationProfile {
        self.calibration_profile.clone().unwrap_or_default()
    }
}

/// Validate every parameter against its documented range
pub fn validate_parameters(params: &Parameters) -> Result<()> {
    let invalid = |msg: String| {
        PipelineError::without_input("parameters", ErrorKind::InvalidParameter(msg))
    };

    if theme::get_theme(&params.theme).is_none() {
        return Err(PipelineError::without_input(
            "parameters",
            ErrorKind::ThemeUnknown(params.theme.clone()),
        ));
    }
    if let Some(bpm) = params.bpm {
        if !(40.0..=240.0).contains(&bpm) {
            return Err(invalid(format!("bpm override {} outside [40, 240]", bpm)));
        }
    }
    if !matches!(params.bar_count, 1 | 2 | 4 | 8 | 16) {
        return Err(invalid(format!(
            "bar_count {} not one of 1, 2, 4, 8, 16",
            params.bar_count
        )));
    }
    if !(0.0..=1.0).contains(&params.swing_amount) {
        return Err(invalid(format!(
            "swing_amount {} outside [0, 1]",
            params.swing_amount
        )));
    }
    if !(0.0..=1.0).contains(&params.quantize_strength) {
        return Err(invalid(format!(
            "quantize_strength {} outside [0, 1]",
            params.quantize_strength
        )));
    }
    if !(0.0..=200.0).contains(&params.lookahead_ms) {
        return Err(invalid(format!(
            "lookahead_ms {} outside [0, 200]",
            params.lookahead_ms
        )));
    }
    if !(0.0..=1.0).contains(&params.b_emphasis) {
        return Err(invalid(format!(
            "b_emphasis {} outside [0, 1]",
            params.b_emphasis
        )));
    }

    Ok(())
}

/// Load parameters from a JSON file
pub fn load_parameters<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Parameters> {
    let content = std::fs::read_to_string(path)?;
    let params: Parameters = serde_json::from_str(&content)?;
    validate_parameters(&params).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(params)
}

/// Save parameters to a JSON file
pub fn save_parameters<P: AsRef<std::path::Path>>(
    params: &Parameters,
    path: P,
) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(params)?;
    std::fs::write(path, content)?;
    Ok(())
}
