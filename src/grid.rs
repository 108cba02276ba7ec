//! Musical grid: time signature, division, feel, and the slot plan
//!
//! The grid plan precomputes every quantization slot for the clip. Swing is
//! baked into the slot table so that quantization and arrangement both see
//! the swung positions.

use serde::{Deserialize, Serialize};

/// Musical time signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSignature {
    FourFour,
    ThreeFour,
}

impl TimeSignature {
    pub fn beats_per_bar(&self) -> u32 {
        match self {
            TimeSignature::FourFour => 4,
            TimeSignature::ThreeFour => 3,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "4/4" => Some(TimeSignature::FourFour),
            "3/4" => Some(TimeSignature::ThreeFour),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeSignature::FourFour => "4/4",
            TimeSignature::ThreeFour => "3/4",
        }
    }
}

/// Grid resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridDivision {
    Quarter,
    Eighth,
    Sixteenth,
    Triplet,
}

impl GridDivision {
    pub fn subdivisions_per_beat(&self) -> u32 {
        match self {
            GridDivision::Quarter => 1,
            GridDivision::Eighth => 2,
            GridDivision::Sixteenth => 4,
            GridDivision::Triplet => 3,
        }
    }
}

/// Rhythmic interpretation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrooveFeel {
    Straight,
    Swing,
    Halftime,
}

/// The quantization grid for one clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridPlan {
    pub bpm: f64,
    pub time_signature: TimeSignature,
    pub division: GridDivision,
    pub feel: GrooveFeel,
    /// Swing amount in [0, 1]; only effective for swing feel at >= 1/8
    pub swing_amount: f32,
    pub bar_count: u32,
    /// Offset of the first beat from t = 0
    pub beat_phase_ms: f64,
    /// Precomputed slot times, ascending, covering the whole arrangement
    slot_times_ms: Vec<f64>,
}

impl GridPlan {
    pub fn new(
        bpm: f64,
        time_signature: TimeSignature,
        division: GridDivision,
        feel: GrooveFeel,
        swing_amount: f32,
        bar_count: u32,
        beat_phase_ms: f64,
    ) -> Self {
        let mut plan = GridPlan {
            bpm,
            time_signature,
            division,
            feel,
            swing_amount: swing_amount.clamp(0.0, 1.0),
            bar_count,
            beat_phase_ms: beat_phase_ms.max(0.0),
            slot_times_ms: Vec::new(),
        };
        plan.rebuild_slots();
        plan
    }

    /// Quarter-note length in milliseconds
    pub fn beat_ms(&self) -> f64 {
        60_000.0 / self.bpm
    }

    /// Slot length in milliseconds (unswung spacing)
    pub fn slot_ms(&self) -> f64 {
        self.beat_ms() / self.division.subdivisions_per_beat() as f64
    }

    /// Halftime doubles the effective bar length downstream
    pub fn halftime_factor(&self) -> u32 {
        if self.feel == GrooveFeel::Halftime {
            2
        } else {
            1
        }
    }

    /// Total arranged duration in milliseconds
    pub fn total_duration_ms(&self) -> f64 {
        self.bar_count as f64
            * self.time_signature.beats_per_bar() as f64
            * self.beat_ms()
            * self.halftime_factor() as f64
    }

    /// Whether swing displaces this grid's odd slots
    pub fn swing_active(&self) -> bool {
        // Triplet division ignores swing; 1/4 has no off-slot to swing.
        self.feel == GrooveFeel::Swing
            && self.swing_amount > 0.0
            && self.division != GridDivision::Triplet
            && self.division.subdivisions_per_beat() >= 2
    }

    /// Delay applied to odd-indexed subdivision slots
    pub fn swing_delay_ms(&self) -> f64 {
        if self.swing_active() {
            self.swing_amount as f64 * self.slot_ms() * (2.0 / 3.0)
        } else {
            0.0
        }
    }

    fn rebuild_slots(&mut self) {
        let subdivisions = self.division.subdivisions_per_beat();
        let total_beats = self.bar_count
            * self.time_signature.beats_per_bar()
            * self.halftime_factor();
        let total_slots = (total_beats * subdivisions) as usize;

        let slot_ms = self.slot_ms();
        let swing_delay = self.swing_delay_ms();

        self.slot_times_ms = (0..total_slots)
            .map(|i| {
                let mut position = self.beat_phase_ms + i as f64 * slot_ms;
                if (i as u32 % subdivisions) % 2 == 1 {
                    position += swing_delay;
                }
                position
            })
            .collect();
    }

    pub fn slot_times_ms(&self) -> &[f64] {
        &self.slot_times_ms
    }

    /// Nearest slot to a timestamp; returns (slot_time_ms, slot_index)
    pub fn nearest_slot(&self, timestamp_ms: f64) -> (f64, usize) {
        if self.slot_times_ms.is_empty() {
            return (self.beat_phase_ms, 0);
        }

        let idx = self
            .slot_times_ms
            .partition_point(|&slot| slot < timestamp_ms);
        let mut best = idx.min(self.slot_times_ms.len() - 1);
        if idx > 0 {
            let before = idx - 1;
            if (timestamp_ms - self.slot_times_ms[before]).abs()
                <= (self.slot_times_ms[best] - timestamp_ms).abs()
            {
                best = before;
            }
        }
        (self.slot_times_ms[best], best)
    }

    /// Quarter-note beat positions across the arrangement (anchor targets)
    pub fn beat_times_ms(&self) -> Vec<f64> {
        let total_beats =
            self.bar_count * self.time_signature.beats_per_bar() * self.halftime_factor();
        (0..total_beats)
            .map(|i| self.beat_phase_ms + i as f64 * self.beat_ms())
            .collect()
    }

    /// Nearest quarter-note beat to a timestamp
    pub fn nearest_beat(&self, timestamp_ms: f64) -> f64 {
        let beat_ms = self.beat_ms();
        let relative = (timestamp_ms - self.beat_phase_ms) / beat_ms;
        let index = relative.round().max(0.0);
        self.beat_phase_ms + index * beat_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_16ths(swing: f32, feel: GrooveFeel) -> GridPlan {
        GridPlan::new(
            120.0,
            TimeSignature::FourFour,
            GridDivision::Sixteenth,
            feel,
            swing,
            1,
            0.0,
        )
    }

    #[test]
    fn test_slot_count_and_spacing() {
        let plan = plan_16ths(0.0, GrooveFeel::Straight);
        // 1 bar of 4/4 at 1/16 = 16 slots, 125 ms apart at 120 BPM
        assert_eq!(plan.slot_times_ms().len(), 16);
        assert!((plan.slot_ms() - 125.0).abs() < 1e-9);
        assert!((plan.slot_times_ms()[1] - 125.0).abs() < 1e-9);
        assert!((plan.slot_times_ms()[4] - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_swing_shifts_only_odd_slots() {
        let straight = plan_16ths(0.0, GrooveFeel::Straight);
        let swung = plan_16ths(0.66, GrooveFeel::Swing);

        let expected_delay = 0.66 * 125.0 * (2.0 / 3.0);
        for i in 0..16 {
            let diff = swung.slot_times_ms()[i] - straight.slot_times_ms()[i];
            if i % 2 == 1 {
                assert!((diff - expected_delay).abs() < 1e-9, "odd slot {} delay {}", i, diff);
            } else {
                assert!(diff.abs() < 1e-9, "even slot {} moved by {}", i, diff);
            }
        }
    }

    #[test]
    fn test_triplet_ignores_swing() {
        let plan = GridPlan::new(
            120.0,
            TimeSignature::FourFour,
            GridDivision::Triplet,
            GrooveFeel::Swing,
            1.0,
            1,
            0.0,
        );
        assert!(!plan.swing_active());
        // Slots stay at exact beat/3 spacing
        let slot = plan.beat_ms() / 3.0;
        assert!((plan.slot_times_ms()[1] - slot).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_slot() {
        let plan = plan_16ths(0.0, GrooveFeel::Straight);
        let (time, idx) = plan.nearest_slot(520.0);
        assert_eq!(idx, 4);
        assert!((time - 500.0).abs() < 1e-9);

        let (time, idx) = plan.nearest_slot(-40.0);
        assert_eq!(idx, 0);
        assert!((time - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_phase_offsets_slots() {
        let plan = GridPlan::new(
            120.0,
            TimeSignature::FourFour,
            GridDivision::Quarter,
            GrooveFeel::Straight,
            0.0,
            1,
            130.0,
        );
        assert!((plan.slot_times_ms()[0] - 130.0).abs() < 1e-9);
        assert!((plan.slot_times_ms()[1] - 630.0).abs() < 1e-9);
    }

    #[test]
    fn test_halftime_doubles_duration_not_slot_spacing() {
        let straight = plan_16ths(0.0, GrooveFeel::Straight);
        let halftime = plan_16ths(0.0, GrooveFeel::Halftime);

        assert!((straight.total_duration_ms() - 2000.0).abs() < 1e-9);
        assert!((halftime.total_duration_ms() - 4000.0).abs() < 1e-9);
        assert!((halftime.slot_ms() - straight.slot_ms()).abs() < 1e-9);
        // Slot table covers the doubled duration
        assert_eq!(halftime.slot_times_ms().len(), 32);
    }

    #[test]
    fn test_nearest_beat() {
        let plan = plan_16ths(0.0, GrooveFeel::Straight);
        assert!((plan.nearest_beat(520.0) - 500.0).abs() < 1e-9);
        assert!((plan.nearest_beat(760.0) - 1000.0).abs() < 1e-9);
        assert!((plan.nearest_beat(-100.0) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_three_four_bar_length() {
        let plan = GridPlan::new(
            120.0,
            TimeSignature::ThreeFour,
            GridDivision::Quarter,
            GrooveFeel::Straight,
            0.0,
            2,
            0.0,
        );
        assert!((plan.total_duration_ms() - 3000.0).abs() < 1e-9);
        assert_eq!(plan.slot_times_ms().len(), 6);
    }
}
