//! Decision records: how each detected event moved through the pipeline

use serde::{Deserialize, Serialize};

use crate::events::{Event, EventClass, FeatureVector};
use crate::stages::arrange::Arrangement;
use crate::stages::quantize::QuantizedEvent;

/// One record per input event, for explainability output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub event_id: String,
    pub original_timestamp_ms: f64,
    pub quantized_timestamp_ms: f64,
    pub snap_delta_ms: f64,
    pub class: EventClass,
    pub confidence: f32,
    /// Lanes holding a note sourced from this event; empty when the event
    /// was dropped or filtered away
    pub mapped_to: Vec<String>,
    pub features: FeatureVector,
    pub reasoning: String,
}

/// Assemble a record per input event by joining quantizer output and lane
/// assignments
pub fn build_records(
    events: &[Event],
    quantized: &[QuantizedEvent],
    arrangement: &Arrangement,
) -> Vec<DecisionRecord> {
    events
        .iter()
        .map(|event| {
            let quantized_entry = quantized.iter().find(|q| q.event.id == event.id);

            let mapped_to: Vec<String> = arrangement
                .all_lanes()
                .iter()
                .filter(|lane| {
                    lane.events
                        .iter()
                        .any(|n| n.source_event_id.as_deref() == Some(event.id.as_str()))
                })
                .map(|lane| lane.name.clone())
                .collect();

            let (quantized_ms, snap_delta) = match quantized_entry {
                Some(q) => (q.quantized_timestamp_ms, q.snap_delta_ms),
                None => (event.timestamp_ms, 0.0),
            };

            DecisionRecord {
                event_id: event.id.clone(),
                original_timestamp_ms: event.timestamp_ms,
                quantized_timestamp_ms: quantized_ms,
                snap_delta_ms: snap_delta,
                class: event.class,
                confidence: event.confidence,
                reasoning: reasoning(event, quantized_entry.is_some(), &mapped_to),
                mapped_to,
                features: event.features.clone(),
            }
        })
        .collect()
}

fn reasoning(event: &Event, survived_quantize: bool, mapped_to: &[String]) -> String {
    let mut parts = vec![format!(
        "Classified as {} at {:.0}% confidence.",
        event.class.display_name(),
        event.confidence * 100.0
    )];

    if !survived_quantize {
        parts.push("Dropped: outside the quantizer lookahead window.".to_string());
    } else if mapped_to.is_empty() {
        parts.push("No lane kept a note for this event.".to_string());
    } else {
        parts.push(format!("Placed on: {}.", mapped_to.join(", ")));
    }

    parts.join(" ")
}
