//! Arrangement templates as data
//!
//! A template is a table of drum slots, velocities, and lane routings. One
//! generator in the arranger interprets every template; templates never own
//! code paths of their own.

use serde::{Deserialize, Serialize};

/// The three built-in arrangement styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrangementTemplate {
    /// Kick on 1/3, snare on 2/4, 8th hats, root-fifth bass, sustained pads
    SynthwaveStraight,
    /// Kick on 1, snare on 3, 8th hats with velocity movement, sparse bass
    SynthwaveHalftime,
    /// Kick on every beat, snare on 2/4, 16th hats, driving 16th arp
    ArpDrive,
}

impl ArrangementTemplate {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "synthwave_straight" => Some(ArrangementTemplate::SynthwaveStraight),
            "synthwave_halftime" => Some(ArrangementTemplate::SynthwaveHalftime),
            "arp_drive" => Some(ArrangementTemplate::ArpDrive),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArrangementTemplate::SynthwaveStraight => "synthwave_straight",
            ArrangementTemplate::SynthwaveHalftime => "synthwave_halftime",
            ArrangementTemplate::ArpDrive => "arp_drive",
        }
    }

    pub fn spec(&self) -> &'static TemplateSpec {
        match self {
            ArrangementTemplate::SynthwaveStraight => &SYNTHWAVE_STRAIGHT,
            ArrangementTemplate::SynthwaveHalftime => &SYNTHWAVE_HALFTIME,
            ArrangementTemplate::ArpDrive => &ARP_DRIVE,
        }
    }
}

/// Where bass notes fall within a bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BassSlots {
    /// One note on every beat
    EveryBeat,
    /// Beats 1 and 3 only
    OneAndThree,
    /// Downbeat of the bar only
    DownbeatOnly,
}

impl BassSlots {
    /// Beat indices within a bar, clipped to the bar's beat count by the caller
    pub fn beats(&self) -> &'static [u32] {
        match self {
            BassSlots::EveryBeat => &[0, 1, 2, 3],
            BassSlots::OneAndThree => &[0, 2],
            BassSlots::DownbeatOnly => &[0],
        }
    }
}

/// One arrangement style, fully described as data
#[derive(Debug, Clone)]
pub struct TemplateSpec {
    /// Beat indices (within a bar) that carry a template kick
    pub kick_beats: &'static [u32],
    /// Beat indices that carry a template snare
    pub snare_beats: &'static [u32],
    /// Hat hits per beat (0 = no template hats)
    pub hat_subdivisions: u32,
    /// Velocity cycle across consecutive hat hits
    pub hat_velocity_cycle: &'static [u8],
    pub kick_velocity: u8,
    pub snare_velocity: u8,
    pub bass_slots: BassSlots,
    pub bass_velocity: u8,
    /// Whether the template sustains a pad chord per progression step
    pub pad_sustain: bool,
    pub pad_velocity: u8,
    /// Arp notes per beat (0 = no arp lane content)
    pub arp_rate: u32,
    pub arp_velocity: u8,
}

static SYNTHWAVE_STRAIGHT: TemplateSpec = TemplateSpec {
    kick_beats: &[0, 2],
    snare_beats: &[1, 3],
    hat_subdivisions: 2,
    hat_velocity_cycle: &[72, 54],
    kick_velocity: 110,
    snare_velocity: 100,
    bass_slots: BassSlots::EveryBeat,
    bass_velocity: 96,
    pad_sustain: true,
    pad_velocity: 72,
    arp_rate: 0,
    arp_velocity: 0,
};

static SYNTHWAVE_HALFTIME: TemplateSpec = TemplateSpec {
    kick_beats: &[0],
    snare_beats: &[2],
    hat_subdivisions: 2,
    hat_velocity_cycle: &[76, 48, 62, 48],
    kick_velocity: 112,
    snare_velocity: 104,
    bass_slots: BassSlots::OneAndThree,
    bass_velocity: 92,
    pad_sustain: true,
    pad_velocity: 70,
    arp_rate: 0,
    arp_velocity: 0,
};

static ARP_DRIVE: TemplateSpec = TemplateSpec {
    kick_beats: &[0, 1, 2, 3],
    snare_beats: &[1, 3],
    hat_subdivisions: 4,
    hat_velocity_cycle: &[68, 46, 56, 46],
    kick_velocity: 108,
    snare_velocity: 96,
    bass_slots: BassSlots::DownbeatOnly,
    bass_velocity: 100,
    pad_sustain: false,
    pad_velocity: 64,
    arp_rate: 4,
    arp_velocity: 84,
};
