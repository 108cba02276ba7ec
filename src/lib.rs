//! Beatbox-to-arrangement engine
//!
//! Turns a short mono beatbox recording into a quantized, theme-styled
//! arrangement with MIDI and rendered-audio outputs. The pipeline is
//! offline and synchronous: decode, onset detection, feature extraction,
//! classification, tempo estimation, quantization, arrangement, MIDI
//! encoding, synthesis. Identical `(wav_bytes, Parameters)` inputs produce
//! byte-identical outputs.

pub mod audio;
pub mod calibration;
pub mod config;
pub mod error;
pub mod events;
pub mod explain;
pub mod grid;
pub mod midi;
pub mod spectral;
pub mod stages;
pub mod synth;
pub mod templates;
pub mod theme;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;

pub use config::Parameters;
pub use error::{ErrorKind, PipelineError, Result};
pub use explain::DecisionRecord;
pub use grid::GridPlan;
pub use stages::arrange::Arrangement;

/// Cooperative cancellation flag checked at stage boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Everything one invocation produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub arrangement: Arrangement,
    /// Format-1 SMF at 480 PPQ
    pub midi_bytes: Vec<u8>,
    /// 16-bit 44.1 kHz mono WAV
    pub wav_bytes: Vec<u8>,
    /// One record per detected event
    pub decisions: Vec<DecisionRecord>,
    pub grid_plan: GridPlan,
    pub bpm: f64,
    pub tempo_confidence: f32,
    /// True when tempo confidence fell below the floor and 120 BPM was used
    pub tempo_fallback: bool,
    /// Events the quantizer rejected as outside the lookahead window
    pub dropped_outside_lookahead: usize,
}

/// The pipeline engine. Holds parameters; all per-invocation state lives on
/// the stack of `process`.
pub struct Engine {
    params: Parameters,
}

impl Engine {
    pub fn new(params: Parameters) -> Self {
        Engine { params }
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Run the full pipeline on a WAV byte slice
    pub fn process(&self, wav_bytes: &[u8]) -> Result<PipelineOutput> {
        self.process_with_cancel(wav_bytes, &CancelToken::new())
    }

    /// Run the full pipeline, checking the token between stages. On cancel
    /// the invocation returns `Cancelled` and emits nothing partial.
    pub fn process_with_cancel(
        &self,
        wav_bytes: &[u8],
        cancel: &CancelToken,
    ) -> Result<PipelineOutput> {
        let hash = audio::input_hash(wav_bytes);
        let fail =
            |stage: &'static str, kind: ErrorKind| PipelineError::new(stage, hash.clone(), kind);
        let checkpoint = |stage: &'static str| {
            if cancel.is_cancelled() {
                Err(fail(stage, ErrorKind::Cancelled))
            } else {
                Ok(())
            }
        };

        config::validate_parameters(&self.params)
            .map_err(|e| PipelineError::new(e.stage, hash.clone(), e.kind))?;
        let theme = theme::get_theme(&self.params.theme)
            .ok_or_else(|| fail("parameters", ErrorKind::ThemeUnknown(self.params.theme.clone())))?;
        let calibration = self.params.calibration();

        let buffer = audio::decode_wav(wav_bytes).map_err(|kind| fail("decode", kind))?;
        info!(
            "decoded {:.1} ms at {} Hz",
            buffer.duration_ms(),
            buffer.sample_rate
        );

        let onsets = stages::onset::run(&buffer, &calibration)
            .map_err(|kind| fail("onset", kind))?;
        info!("detected {} onsets", onsets.len());
        checkpoint("onset")?;

        let features = stages::features::run(&buffer, &onsets);
        checkpoint("features")?;

        let events = stages::classify::run(&onsets, &features, &calibration);

        let (bpm, beat_phase_ms, tempo_confidence, tempo_fallback) = match self.params.bpm {
            Some(bpm) => (bpm, stages::tempo::fit_phase(&onsets, bpm), 1.0, false),
            None => {
                let estimate = stages::tempo::run(&onsets);
                (
                    estimate.bpm,
                    estimate.beat_phase_ms,
                    estimate.confidence,
                    estimate.fallback,
                )
            }
        };
        info!(
            "tempo {:.1} BPM (confidence {:.2}, fallback {})",
            bpm, tempo_confidence, tempo_fallback
        );
        checkpoint("tempo")?;

        let plan = GridPlan::new(
            bpm,
            self.params.time_signature,
            self.params.division,
            self.params.feel,
            self.params.swing_amount,
            self.params.bar_count,
            beat_phase_ms,
        );

        let quantized = stages::quantize::run(
            &events,
            &plan,
            self.params.quantize_strength,
            self.params.lookahead_ms,
        );
        checkpoint("quantize")?;

        let arrangement = stages::arrange::run(
            &quantized.events,
            self.params.template,
            &theme,
            &plan,
            self.params.b_emphasis,
        );
        checkpoint("arrange")?;

        let decisions = explain::build_records(&events, &quantized.events, &arrangement);

        let midi_bytes =
            midi::encode_midi(&arrangement, &plan).map_err(|kind| fail("midi", kind))?;
        checkpoint("midi")?;

        let wav_out = synth::render_wav(&arrangement);
        checkpoint("synth")?;

        Ok(PipelineOutput {
            arrangement,
            midi_bytes,
            wav_bytes: wav_out,
            decisions,
            grid_plan: plan,
            bpm,
            tempo_confidence,
            tempo_fallback,
            dropped_outside_lookahead: quantized.dropped_outside_lookahead,
        })
    }
}
