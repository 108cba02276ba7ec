//! Template-driven arrangement over drum, bass, pad, and arp lanes
//!
//! One generator interprets every template's data tables: fill the drum
//! lanes from the template, map detected events onto their lanes, apply
//! B-emphasis, then derive the pitched lanes from the theme. The
//! arrangement timeline starts at the first downbeat, so quantized event
//! times are shifted by the grid's beat phase when they are placed.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::events::EventClass;
use crate::grid::GridPlan;
use crate::stages::quantize::QuantizedEvent;
use crate::templates::{ArrangementTemplate, TemplateSpec};
use crate::theme::{arp_notes, chord_notes, Theme};

/// General MIDI drum notes
pub const MIDI_KICK: u8 = 36;
pub const MIDI_SNARE: u8 = 38;
pub const MIDI_CLOSED_HIHAT: u8 = 42;

/// Fixed lane names, in output order
pub const LANE_KICK: &str = "KICK";
pub const LANE_SNARE: &str = "SNARE";
pub const LANE_HIHAT: &str = "HIHAT";
pub const LANE_BASS: &str = "BASS";
pub const LANE_PAD: &str = "PAD";
pub const LANE_ARP: &str = "ARP";

/// Drum hit length in milliseconds
const DRUM_NOTE_MS: f64 = 100.0;

/// Hat hit length in milliseconds
const HAT_NOTE_MS: f64 = 60.0;

/// Minimum sustained pad note in milliseconds
const PAD_MIN_MS: f64 = 300.0;

/// An arranged note. `midi_note` overrides the lane default when the lane
/// carries more than one pitch (bass, pad, arp).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrangedNote {
    pub timestamp_ms: f64,
    pub duration_ms: f64,
    /// MIDI velocity in [1, 127]
    pub velocity: u8,
    pub midi_note: Option<u8>,
    /// Id of the detected event this note came from, if any
    pub source_event_id: Option<String>,
}

impl ArrangedNote {
    pub fn new(timestamp_ms: f64, duration_ms: f64, velocity: u8) -> Self {
        ArrangedNote {
            timestamp_ms,
            duration_ms,
            velocity: velocity.clamp(1, 127),
            midi_note: None,
            source_event_id: None,
        }
    }

    pub fn with_pitch(mut self, midi_note: u8) -> Self {
        self.midi_note = Some(midi_note);
        self
    }
}

/// An ordered note stream for one instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lane {
    pub name: String,
    /// Default MIDI note for notes without a pitch override
    pub midi_note: u8,
    /// Sidechain duck amount consumed by the synth, in [0, 1]
    pub duck_amount: f32,
    pub events: Vec<ArrangedNote>,
}

impl Lane {
    pub fn new(name: &str, midi_note: u8) -> Self {
        Lane {
            name: name.to_string(),
            midi_note,
            duck_amount: 0.0,
            events: Vec::new(),
        }
    }
}

/// Complete multi-lane arrangement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arrangement {
    pub drum_lanes: Vec<Lane>,
    pub bass_lane: Option<Lane>,
    pub pad_lane: Option<Lane>,
    pub arp_lane: Option<Lane>,
    pub template: ArrangementTemplate,
    pub total_duration_ms: f64,
    pub bar_count: u32,
    pub bpm: f64,
}

impl Arrangement {
    /// All lanes in the fixed order kick, snare, hat, bass, pad, arp
    pub fn all_lanes(&self) -> Vec<&Lane> {
        let mut lanes: Vec<&Lane> = self.drum_lanes.iter().collect();
        lanes.extend(self.bass_lane.iter());
        lanes.extend(self.pad_lane.iter());
        lanes.extend(self.arp_lane.iter());
        lanes
    }

    pub fn lane(&self, name: &str) -> Option<&Lane> {
        self.all_lanes().into_iter().find(|l| l.name == name)
    }
}

/// Generate the arrangement. An empty event list yields a template-only
/// arrangement.
pub fn run(
    quantized: &[QuantizedEvent],
    template: ArrangementTemplate,
    theme: &Theme,
    plan: &GridPlan,
    b_emphasis: f32,
) -> Arrangement {
    let spec = template.spec();
    let b_emphasis = b_emphasis.clamp(0.0, 1.0);

    let beats_per_bar = plan.time_signature.beats_per_bar();
    // Halftime stretches the effective beat the templates are laid on
    let beat_step = plan.beat_ms() * plan.halftime_factor() as f64;
    let bar_span = beats_per_bar as f64 * beat_step;
    let total_ms = plan.total_duration_ms();

    let mut kick = Lane::new(LANE_KICK, MIDI_KICK);
    let mut snare = Lane::new(LANE_SNARE, MIDI_SNARE);
    let mut hat = Lane::new(LANE_HIHAT, MIDI_CLOSED_HIHAT);

    fill_drum_lanes(
        &mut kick, &mut snare, &mut hat, spec, plan.bar_count, beats_per_bar, beat_step, bar_span,
    );

    map_events(quantized, &mut kick, &mut snare, &mut hat, plan);

    apply_b_emphasis(&mut kick, b_emphasis, beat_step);

    let mut bass = build_bass_lane(theme, spec, plan.bar_count, beats_per_bar, beat_step, bar_span);
    let mut pad = build_pad_lane(
        quantized,
        theme,
        spec,
        plan.bar_count,
        bar_span,
        total_ms,
        plan.beat_phase_ms,
    );
    let mut arp = build_arp_lane(theme, spec, plan.bar_count, beats_per_bar, beat_step, bar_span);

    bass.duck_amount = b_emphasis;
    pad.duck_amount = b_emphasis;
    arp.duck_amount = b_emphasis;

    let beat_ms = plan.beat_ms();
    for lane in [&mut kick, &mut snare, &mut hat, &mut bass, &mut pad, &mut arp] {
        normalize_lane(lane, total_ms, beat_ms);
    }

    debug!(
        "arrange: {} kick / {} snare / {} hat / {} bass / {} pad / {} arp notes",
        kick.events.len(),
        snare.events.len(),
        hat.events.len(),
        bass.events.len(),
        pad.events.len(),
        arp.events.len()
    );

    Arrangement {
        drum_lanes: vec![kick, snare, hat],
        bass_lane: Some(bass),
        pad_lane: Some(pad),
        arp_lane: Some(arp),
        template,
        total_duration_ms: total_ms,
        bar_count: plan.bar_count,
        bpm: plan.bpm,
    }
}

#[allow(clippy::too_many_arguments)]
fn fill_drum_lanes(
    kick: &mut Lane,
    snare: &mut Lane,
    hat: &mut Lane,
    spec: &TemplateSpec,
    bar_count: u32,
    beats_per_bar: u32,
    beat_step: f64,
    bar_span: f64,
) {
    for bar in 0..bar_count {
        let bar_start = bar as f64 * bar_span;

        for &beat in spec.kick_beats.iter().filter(|&&b| b < beats_per_bar) {
            kick.events.push(ArrangedNote::new(
                bar_start + beat as f64 * beat_step,
                DRUM_NOTE_MS,
                spec.kick_velocity,
            ));
        }
        for &beat in spec.snare_beats.iter().filter(|&&b| b < beats_per_bar) {
            snare.events.push(ArrangedNote::new(
                bar_start + beat as f64 * beat_step,
                DRUM_NOTE_MS,
                spec.snare_velocity,
            ));
        }

        if spec.hat_subdivisions > 0 {
            let step = beat_step / spec.hat_subdivisions as f64;
            for beat in 0..beats_per_bar {
                for sub in 0..spec.hat_subdivisions {
                    let index = (beat * spec.hat_subdivisions + sub) as usize;
                    let velocity =
                        spec.hat_velocity_cycle[index % spec.hat_velocity_cycle.len()];
                    hat.events.push(ArrangedNote::new(
                        bar_start + beat as f64 * beat_step + sub as f64 * step,
                        HAT_NOTE_MS,
                        velocity,
                    ));
                }
            }
        }
    }
}

/// Map detected events to their template-implied lanes
fn map_events(
    quantized: &[QuantizedEvent],
    kick: &mut Lane,
    snare: &mut Lane,
    hat: &mut Lane,
    plan: &GridPlan,
) {
    let adopt_window = plan.slot_ms() / 2.0;
    let phase = plan.beat_phase_ms;

    for q in quantized {
        // Into arrangement time, which starts at the first downbeat
        let time = (q.quantized_timestamp_ms - phase).max(0.0);

        match q.event.class {
            EventClass::BilabialPlosive => adopt_or_insert(kick, time, adopt_window, q),
            EventClass::Click => adopt_or_insert(snare, time, adopt_window, q),
            EventClass::HihatNoise => adopt_or_insert(hat, time, adopt_window, q),
            // Voiced events land in the pad lane, built later
            EventClass::HumVoiced => {}
        }
    }
}

/// Replace a nearby template note's velocity and source, or insert a new hit
fn adopt_or_insert(lane: &mut Lane, time: f64, window: f64, q: &QuantizedEvent) {
    let confidence = q.event.confidence.clamp(0.0, 1.0);

    if let Some(note) = lane
        .events
        .iter_mut()
        .min_by(|a, b| {
            (a.timestamp_ms - time)
                .abs()
                .partial_cmp(&(b.timestamp_ms - time).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .filter(|note| (note.timestamp_ms - time).abs() <= window)
    {
        let scaled = (note.velocity as f32 * (0.7 + 0.3 * confidence)).round() as i32;
        note.velocity = scaled.clamp(1, 127) as u8;
        note.timestamp_ms = time;
        note.source_event_id = Some(q.event.id.clone());
    } else {
        let mut note = ArrangedNote::new(
            time,
            DRUM_NOTE_MS,
            event_velocity(confidence, q.event.features.peak_amplitude),
        );
        note.source_event_id = Some(q.event.id.clone());
        lane.events.push(note);
    }
}

/// Velocity from confidence and loudness, mapped into an always-audible range
fn event_velocity(confidence: f32, peak_amplitude: f32) -> u8 {
    let factor = (confidence.clamp(0.0, 1.0) * 0.3 + peak_amplitude.clamp(0.0, 1.0) * 0.7)
        .clamp(0.0, 1.0);
    (60.0 + factor * 67.0).round().clamp(1.0, 127.0) as u8
}

/// Anchor pull and velocity boost for sourced kick notes
fn apply_b_emphasis(kick: &mut Lane, b_emphasis: f32, beat_step: f64) {
    let anchor_window = 120.0 * (1.0 - b_emphasis as f64) + 30.0;
    let boost = (30.0 * b_emphasis).round() as i32;

    for note in kick.events.iter_mut() {
        if note.source_event_id.is_none() {
            continue;
        }
        let nearest_beat = (note.timestamp_ms / beat_step).round().max(0.0) * beat_step;
        if (note.timestamp_ms - nearest_beat).abs() <= anchor_window {
            note.timestamp_ms = nearest_beat;
        }
        note.velocity = (note.velocity as i32 + boost).clamp(1, 127) as u8;
    }
}

fn build_bass_lane(
    theme: &Theme,
    spec: &TemplateSpec,
    bar_count: u32,
    beats_per_bar: u32,
    beat_step: f64,
    bar_span: f64,
) -> Lane {
    // Bass plays an octave below the chord voicing
    let mut lane = Lane::new(LANE_BASS, theme.root_note.saturating_sub(12));
    let offsets = theme.bass_pattern.offsets();
    let mut cycle = 0usize;

    for bar in 0..bar_count {
        let bar_start = bar as f64 * bar_span;
        let symbol = theme.chord_progression.chord_for_bar(bar);
        let chord_root = chord_notes(theme.root_note, symbol, theme.scale_family)[0];
        let bass_root = chord_root.saturating_sub(12);

        for &beat in spec
            .bass_slots
            .beats()
            .iter()
            .filter(|&&b| b < beats_per_bar)
        {
            let pitch = (bass_root as u16 + offsets[cycle % offsets.len()] as u16).min(127) as u8;
            cycle += 1;
            lane.events.push(
                ArrangedNote::new(
                    bar_start + beat as f64 * beat_step,
                    beat_step * 0.8,
                    spec.bass_velocity,
                )
                .with_pitch(pitch),
            );
        }
    }

    lane
}

#[allow(clippy::too_many_arguments)]
fn build_pad_lane(
    quantized: &[QuantizedEvent],
    theme: &Theme,
    spec: &TemplateSpec,
    bar_count: u32,
    bar_span: f64,
    total_ms: f64,
    beat_phase_ms: f64,
) -> Lane {
    let mut lane = Lane::new(LANE_PAD, theme.root_note);

    if spec.pad_sustain {
        let span = theme.chord_progression.bars_per_chord.max(1);
        let mut bar = 0u32;
        while bar < bar_count {
            let symbol = theme.chord_progression.chord_for_bar(bar);
            let chord_root = chord_notes(theme.root_note, symbol, theme.scale_family)[0];
            let start = bar as f64 * bar_span;
            let bars_here = span.min(bar_count - bar);
            let duration = (bars_here as f64 * bar_span).min(total_ms - start);
            lane.events.push(
                ArrangedNote::new(start, duration, spec.pad_velocity).with_pitch(chord_root),
            );
            bar += span;
        }
    }

    // Voiced events land in the pad lane as extra sustained notes
    for q in quantized {
        if q.event.class != EventClass::HumVoiced {
            continue;
        }
        let time = (q.quantized_timestamp_ms - beat_phase_ms).max(0.0);
        if time >= total_ms {
            continue;
        }
        let mut note = ArrangedNote::new(
            time,
            q.event.duration_ms.max(PAD_MIN_MS),
            event_velocity(q.event.confidence, q.event.features.peak_amplitude),
        );
        note.source_event_id = Some(q.event.id.clone());
        lane.events.push(note);
    }

    lane
}

fn build_arp_lane(
    theme: &Theme,
    spec: &TemplateSpec,
    bar_count: u32,
    beats_per_bar: u32,
    beat_step: f64,
    bar_span: f64,
) -> Lane {
    let mut lane = Lane::new(LANE_ARP, theme.root_note);
    if spec.arp_rate == 0 {
        return lane;
    }

    let step = beat_step / spec.arp_rate as f64;
    let span = theme.chord_progression.bars_per_chord.max(1);
    let mut bar = 0u32;
    while bar < bar_count {
        let symbol = theme.chord_progression.chord_for_bar(bar);
        let chord = chord_notes(theme.root_note, symbol, theme.scale_family);
        let cycle = arp_notes(&chord, theme.arp_pattern, theme.arp_octave_range);
        if cycle.is_empty() {
            bar += span;
            continue;
        }

        let bars_here = span.min(bar_count - bar);
        let segment_start = bar as f64 * bar_span;
        let steps = (bars_here * beats_per_bar * spec.arp_rate) as usize;
        for (k, pitch) in (0..steps).map(|k| (k, cycle[k % cycle.len()])) {
            // Light accent at the top of each beat
            let accent = if k as u32 % spec.arp_rate == 0 { 10 } else { 0 };
            lane.events.push(
                ArrangedNote::new(
                    segment_start + k as f64 * step,
                    step * 0.8,
                    (spec.arp_velocity as i32 + accent).clamp(1, 127) as u8,
                )
                .with_pitch(pitch),
            );
        }
        bar += span;
    }

    lane
}

/// Sort, coalesce same-instant hits, clamp into the arrangement window, and
/// enforce strict monotonicity
fn normalize_lane(lane: &mut Lane, total_ms: f64, beat_ms: f64) {
    lane.events.retain(|n| n.timestamp_ms >= 0.0 && n.timestamp_ms < total_ms);
    lane.events.sort_by(|a, b| {
        a.timestamp_ms
            .partial_cmp(&b.timestamp_ms)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Coalesce collisions: a sourced note wins over a template note,
    // otherwise keep the louder one.
    let mut merged: Vec<ArrangedNote> = Vec::with_capacity(lane.events.len());
    for note in lane.events.drain(..) {
        if let Some(last) = merged.last_mut() {
            if (note.timestamp_ms - last.timestamp_ms).abs() < 0.5
                && note.midi_note == last.midi_note
            {
                let replace = note.source_event_id.is_some() && last.source_event_id.is_none()
                    || (note.source_event_id.is_some() == last.source_event_id.is_some()
                        && note.velocity > last.velocity);
                if replace {
                    *last = note;
                }
                continue;
            }
        }
        merged.push(note);
    }
    lane.events = merged;

    for i in 1..lane.events.len() {
        if lane.events[i].timestamp_ms <= lane.events[i - 1].timestamp_ms {
            lane.events[i].timestamp_ms = lane.events[i - 1].timestamp_ms + 1.0;
        }
    }

    // Sustain tails may run up to one beat past the end
    for note in lane.events.iter_mut() {
        let max_end = total_ms + beat_ms;
        if note.timestamp_ms + note.duration_ms > max_end {
            note.duration_ms = max_end - note.timestamp_ms;
        }
    }
}
