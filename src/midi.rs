//! MIDI encoding: arrangement to a format-1 Standard MIDI File
//!
//! One conductor track carrying tempo and time signature, then one named
//! track per non-empty lane in the fixed lane order. Output bytes are
//! stable for identical arrangements: no timestamps, no random content,
//! and all sorting is total.

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::error::ErrorKind;
use crate::grid::GridPlan;
use crate::stages::arrange::{Arrangement, Lane, LANE_ARP, LANE_BASS, LANE_PAD};

/// Pulses per quarter note
pub const PPQ: u16 = 480;

/// Serialize an arrangement to MIDI file bytes
pub fn encode_midi(arrangement: &Arrangement, plan: &GridPlan) -> Result<Vec<u8>, ErrorKind> {
    let ticks_per_ms = PPQ as f64 * plan.bpm / 60_000.0;

    let mut tracks = Vec::new();
    tracks.push(conductor_track(plan));
    for lane in arrangement.all_lanes() {
        if !lane.events.is_empty() {
            tracks.push(lane_track(lane, ticks_per_ms));
        }
    }

    let smf = Smf {
        header: Header {
            format: Format::Parallel,
            timing: Timing::Metrical(u15::from(PPQ)),
        },
        tracks,
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| ErrorKind::MidiEncode(e.to_string()))?;
    Ok(bytes)
}

/// Tempo and time-signature metadata at tick 0
fn conductor_track(plan: &GridPlan) -> Vec<TrackEvent<'_>> {
    let us_per_quarter = (60_000_000.0 / plan.bpm).round() as u32;

    vec![
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(b"CONDUCTOR")),
        },
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(us_per_quarter))),
        },
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
                plan.time_signature.beats_per_bar() as u8,
                2, // denominator as log2: quarter note
                24,
                8,
            )),
        },
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ]
}

/// MIDI channel for a lane: drums on channel 10 (0-indexed 9)
fn lane_channel(lane: &Lane) -> u8 {
    match lane.name.as_str() {
        LANE_BASS => 0,
        LANE_PAD => 1,
        LANE_ARP => 2,
        _ => 9,
    }
}

fn lane_track(lane: &Lane, ticks_per_ms: f64) -> Vec<TrackEvent<'_>> {
    let channel = u4::from(lane_channel(lane));

    // (tick, order) pairs give a total order; note-offs sort before
    // note-ons at the same tick so repeated pitches never hang.
    let mut events: Vec<(u32, u8, TrackEventKind)> = Vec::with_capacity(lane.events.len() * 2);
    for note in &lane.events {
        let key = u7::from(note.midi_note.unwrap_or(lane.midi_note).min(127));
        let tick_on = (note.timestamp_ms * ticks_per_ms).round() as u32;
        let tick_off = ((note.timestamp_ms + note.duration_ms) * ticks_per_ms).round() as u32;
        let tick_off = tick_off.max(tick_on + 1);

        events.push((
            tick_on,
            1,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key,
                    vel: u7::from(note.velocity.min(127)),
                },
            },
        ));
        events.push((
            tick_off,
            0,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key,
                    vel: u7::from(0),
                },
            },
        ));
    }

    events.sort_by_key(|&(tick, order, _)| (tick, order));

    let mut track = Vec::with_capacity(events.len() + 2);
    track.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(lane.name.as_bytes())),
    });

    let mut last_tick = 0u32;
    for (tick, _, kind) in events {
        track.push(TrackEvent {
            delta: u28::from(tick.saturating_sub(last_tick)),
            kind,
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    track
}
