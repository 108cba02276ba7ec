//! Soft quantization against the grid plan
//!
//! Events snap toward their nearest slot with a strength blend; events
//! farther than half a slot plus the lookahead window are dropped and
//! reported as a count, never as an error.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::grid::GridPlan;

/// A quantized event with both original and aligned timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantizedEvent {
    pub event: Event,
    pub original_timestamp_ms: f64,
    pub quantized_timestamp_ms: f64,
    /// Signed displacement; quantized = original + snap_delta
    pub snap_delta_ms: f64,
    /// Index of the chosen slot in the grid plan
    pub slot_index: usize,
}

/// Quantizer result with the dropped-event count
#[derive(Debug, Clone, Default)]
pub struct QuantizeOutcome {
    pub events: Vec<QuantizedEvent>,
    /// Events farther than slot/2 + lookahead from any slot
    pub dropped_outside_lookahead: usize,
}

/// Quantize events in input order
pub fn run(
    events: &[Event],
    plan: &GridPlan,
    strength: f32,
    lookahead_ms: f64,
) -> QuantizeOutcome {
    let strength = strength.clamp(0.0, 1.0) as f64;
    let max_distance = plan.slot_ms() / 2.0 + lookahead_ms;

    let mut outcome = QuantizeOutcome::default();
    for event in events {
        let t = event.timestamp_ms;
        let (slot_time, slot_index) = plan.nearest_slot(t);

        if (t - slot_time).abs() > max_distance {
            outcome.dropped_outside_lookahead += 1;
            continue;
        }

        let quantized = t + strength * (slot_time - t);
        outcome.events.push(QuantizedEvent {
            event: event.clone(),
            original_timestamp_ms: t,
            quantized_timestamp_ms: quantized,
            snap_delta_ms: quantized - t,
            slot_index,
        });
    }

    // Two events on one slot would tie; a 1 ms bump keeps the stream
    // strictly monotone and leaves coalescing to the arranger.
    for i in 1..outcome.events.len() {
        if outcome.events[i].quantized_timestamp_ms
            <= outcome.events[i - 1].quantized_timestamp_ms
        {
            let bumped = outcome.events[i - 1].quantized_timestamp_ms + 1.0;
            outcome.events[i].quantized_timestamp_ms = bumped;
            outcome.events[i].snap_delta_ms = bumped - outcome.events[i].original_timestamp_ms;
        }
    }

    if outcome.dropped_outside_lookahead > 0 {
        debug!(
            "quantize: dropped {} events outside lookahead",
            outcome.dropped_outside_lookahead
        );
    }

    outcome
}
