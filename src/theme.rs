//! Theme catalog: harmonic and timbral palettes
//!
//! Themes are harmonic systems, not just patches: each one fixes a root,
//! scale family, chord progression, and the bass/arp vocabulary the arranger
//! draws from. The catalog is read-only static data; lookups by name either
//! return an entry or fail with `ThemeUnknown` at the call site.

use serde::{Deserialize, Serialize};

/// Musical scale families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleFamily {
    Minor,
    Major,
    Dorian,
    Phrygian,
}

impl ScaleFamily {
    /// Semitone intervals from the root
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            ScaleFamily::Minor => &[0, 2, 3, 5, 7, 8, 10],
            ScaleFamily::Major => &[0, 2, 4, 5, 7, 9, 11],
            ScaleFamily::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            ScaleFamily::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
        }
    }
}

/// A chord symbol: scale degree plus quality.
///
/// Symbols use roman-numeral notation; lowercase is minor ("i", "iv"),
/// uppercase is major ("VI", "III").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordSymbol {
    /// Scale degree, 0-indexed (0 = tonic)
    pub degree: u8,
    pub minor: bool,
}

impl ChordSymbol {
    /// Parse a roman-numeral chord symbol
    pub fn parse(symbol: &str) -> Option<Self> {
        let minor = symbol.chars().next()?.is_lowercase();
        let degree = match symbol.to_ascii_uppercase().as_str() {
            "I" => 0,
            "II" => 1,
            "III" => 2,
            "IV" => 3,
            "V" => 4,
            "VI" => 5,
            "VII" => 6,
            _ => return None,
        };
        Some(ChordSymbol { degree, minor })
    }
}

/// Ordered chord symbols with a shared per-chord bar span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordProgression {
    pub chords: Vec<ChordSymbol>,
    pub bars_per_chord: u32,
}

impl ChordProgression {
    /// Build a progression from symbol strings; None on any bad symbol
    pub fn parse(symbols: &[&str], bars_per_chord: u32) -> Option<Self> {
        let chords = symbols
            .iter()
            .map(|s| ChordSymbol::parse(s))
            .collect::<Option<Vec<_>>>()?;
        Some(ChordProgression {
            chords,
            bars_per_chord,
        })
    }

    /// Chord active during a given bar
    pub fn chord_for_bar(&self, bar: u32) -> ChordSymbol {
        let span = self.bars_per_chord.max(1);
        let idx = (bar / span) as usize % self.chords.len().max(1);
        self.chords.get(idx).copied().unwrap_or(ChordSymbol {
            degree: 0,
            minor: true,
        })
    }
}

/// Bass pitch vocabularies, cycled across the template's rhythm slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BassPattern {
    Root,
    RootFifth,
    OffbeatEighths,
    Walking,
}

impl BassPattern {
    /// Semitone offsets from the chord root, cycled note by note
    pub fn offsets(&self) -> &'static [u8] {
        match self {
            BassPattern::Root => &[0],
            BassPattern::RootFifth => &[0, 7],
            BassPattern::OffbeatEighths => &[0, 0, 7, 0],
            BassPattern::Walking => &[0, 3, 7, 10],
        }
    }
}

/// Arpeggiator traversal orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArpPattern {
    Up,
    Down,
    Alternating,
}

/// Drum kit palettes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrumPalette {
    SynthwaveDrums,
    Tr808,
    AcousticKit,
}

/// Complete theme definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    /// Suggested BPM range for this palette
    pub bpm_range: (u32, u32),
    /// MIDI root note
    pub root_note: u8,
    pub scale_family: ScaleFamily,
    pub chord_progression: ChordProgression,
    pub bass_pattern: BassPattern,
    pub arp_pattern: ArpPattern,
    /// Octave span for arp expansion, e.g. (-1, 1)
    pub arp_octave_range: (i8, i8),
    pub drum_palette: DrumPalette,
}

/// Theme summary for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeSummary {
    pub name: String,
    pub description: String,
    pub bpm_range: (u32, u32),
    pub root_note: u8,
    pub scale_family: ScaleFamily,
}

impl Theme {
    pub fn summary(&self, description: &str) -> ThemeSummary {
        ThemeSummary {
            name: self.name.clone(),
            description: description.to_string(),
            bpm_range: self.bpm_range,
            root_note: self.root_note,
            scale_family: self.scale_family,
        }
    }
}

/// Scale notes from root and family, one octave
pub fn scale_notes(root: u8, family: ScaleFamily) -> Vec<u8> {
    family
        .intervals()
        .iter()
        .map(|&i| (root as u16 + i as u16).min(127) as u8)
        .collect()
}

/// Triad for a chord symbol against a theme's scale
pub fn chord_notes(root: u8, symbol: ChordSymbol, family: ScaleFamily) -> Vec<u8> {
    let scale = scale_notes(root, family);
    let chord_root = scale
        .get(symbol.degree as usize)
        .copied()
        .unwrap_or(root);

    let third = if symbol.minor { 3u16 } else { 4u16 };
    vec![
        chord_root,
        (chord_root as u16 + third).min(127) as u8,
        (chord_root as u16 + 7).min(127) as u8,
    ]
}

/// Expand chord tones across an octave range and order them by arp pattern
pub fn arp_notes(chord: &[u8], pattern: ArpPattern, octave_range: (i8, i8)) -> Vec<u8> {
    let mut notes = Vec::new();
    for octave in octave_range.0..=octave_range.1 {
        for &note in chord {
            let shifted = note as i16 + octave as i16 * 12;
            if (0..128).contains(&shifted) {
                notes.push(shifted as u8);
            }
        }
    }
    notes.sort_unstable();
    notes.dedup();

    match pattern {
        ArpPattern::Up => notes,
        ArpPattern::Down => {
            notes.reverse();
            notes
        }
        ArpPattern::Alternating => {
            // Walk up the low half and down the high half, interleaved
            let len = notes.len();
            (0..len)
                .map(|i| {
                    if i % 2 == 0 {
                        notes[i / 2]
                    } else {
                        notes[len - 1 - i / 2]
                    }
                })
                .collect()
        }
    }
}

/// Look up a theme by catalog name (case-insensitive)
pub fn get_theme(name: &str) -> Option<Theme> {
    match name.to_uppercase().as_str() {
        "MIDNIGHT DRIVE" => Some(midnight_drive()),
        "CHROME SUNRISE" => Some(chrome_sunrise()),
        "NEON GRID" => Some(neon_grid()),
        "RED SECTOR" => Some(red_sector()),
        _ => None,
    }
}

/// All catalog entries with one-line descriptions
pub fn list_themes() -> Vec<ThemeSummary> {
    vec![
        midnight_drive()
            .summary("Brooding minor synthwave. Root-fifth bass, wide pads, slow pulse."),
        chrome_sunrise()
            .summary("Bright major-key drive. Walking-adjacent bass, open voicings."),
        neon_grid().summary("Dorian groove with a restless walking bass and mirrored arps."),
        red_sector().summary("Phrygian tension. Static root bass, descending arps, long chords."),
    ]
}

pub fn list_theme_names() -> Vec<String> {
    list_themes().into_iter().map(|t| t.name).collect()
}

fn midnight_drive() -> Theme {
    Theme {
        name: "MIDNIGHT DRIVE".to_string(),
        bpm_range: (80, 110),
        root_note: 57, // A
        scale_family: ScaleFamily::Minor,
        chord_progression: ChordProgression::parse(&["i", "VI", "III", "VII"], 1)
            .expect("static progression"),
        bass_pattern: BassPattern::RootFifth,
        arp_pattern: ArpPattern::Up,
        arp_octave_range: (-1, 1),
        drum_palette: DrumPalette::SynthwaveDrums,
    }
}

fn chrome_sunrise() -> Theme {
    Theme {
        name: "CHROME SUNRISE".to_string(),
        bpm_range: (100, 128),
        root_note: 48, // C
        scale_family: ScaleFamily::Major,
        chord_progression: ChordProgression::parse(&["I", "V", "vi", "IV"], 1)
            .expect("static progression"),
        bass_pattern: BassPattern::Root,
        arp_pattern: ArpPattern::Up,
        arp_octave_range: (0, 1),
        drum_palette: DrumPalette::Tr808,
    }
}

fn neon_grid() -> Theme {
    Theme {
        name: "NEON GRID".to_string(),
        bpm_range: (100, 130),
        root_note: 50, // D
        scale_family: ScaleFamily::Dorian,
        chord_progression: ChordProgression::parse(&["i", "IV", "i", "VII"], 1)
            .expect("static progression"),
        bass_pattern: BassPattern::Walking,
        arp_pattern: ArpPattern::Alternating,
        arp_octave_range: (-1, 1),
        drum_palette: DrumPalette::SynthwaveDrums,
    }
}

fn red_sector() -> Theme {
    Theme {
        name: "RED SECTOR".to_string(),
        bpm_range: (85, 115),
        root_note: 52, // E
        scale_family: ScaleFamily::Phrygian,
        chord_progression: ChordProgression::parse(&["i", "II"], 2).expect("static progression"),
        bass_pattern: BassPattern::Root,
        arp_pattern: ArpPattern::Down,
        arp_octave_range: (-1, 0),
        drum_palette: DrumPalette::AcousticKit,
    }
}
