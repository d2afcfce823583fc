use serde::{Deserialize, Serialize};

use crate::Result;

/// Pulses per quarter note. The symbolic tick resolution is fixed; a
/// quarter note always spans 960 ticks regardless of tempo.
pub const PPQ: f64 = 960.0;

/// Converts a tick distance at the given tempo into milliseconds.
///
/// No rounding is applied; callers round only at the point of display
/// or persistence. `bpm` must be positive — guard zero/negative tempo
/// before calling.
pub fn ticks_to_milliseconds(tick_distance: f64, bpm: f64) -> f64 {
    tick_distance * 60_000.0 / (bpm * PPQ)
}

/// Converts a millisecond duration at the given tempo into ticks.
pub fn milliseconds_to_ticks(milliseconds: f64, bpm: f64) -> f64 {
    milliseconds * (bpm * PPQ) / 60_000.0
}

/// A tempo change at an absolute tick position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    pub tick: u64,
    pub bpm: f64,
}

/// One concrete playback pass of one bar. Bars can be played several
/// times due to repeats and jumps; `occurrence` disambiguates the
/// passes of the same `bar_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarOccurrence {
    pub bar_index: usize,
    pub occurrence: usize,
    pub start_tick: u64,
    pub end_tick: u64,
    /// Ordered tempo changes inside this bar. Well-formed timelines
    /// carry at least one entry at the bar's own tempo; consumers
    /// treat an empty list as "no change at this bar".
    pub tempo_changes: Vec<TempoChange>,
}

impl BarOccurrence {
    pub fn length_ticks(&self) -> u64 {
        self.end_tick.saturating_sub(self.start_tick)
    }
}

/// Read-only view over a score's bar/tempo structure.
///
/// This is the only contact surface between the synchronization engine
/// and the host's notation model: occurrences are expected in playback
/// (tick) order, contiguous, starting at tick zero.
pub trait TempoTimeline {
    /// Bar occurrences in playback order.
    fn occurrences(&self) -> &[BarOccurrence];

    /// Tick position at the end of the last occurrence.
    fn end_tick(&self) -> u64 {
        self.occurrences().last().map_or(0, |o| o.end_tick)
    }
}

/// Owned, precomputed implementation of [`TempoTimeline`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreTimeline {
    occurrences: Vec<BarOccurrence>,
}

impl ScoreTimeline {
    pub fn new(occurrences: Vec<BarOccurrence>) -> Self {
        Self { occurrences }
    }

    /// Convenience constructor for a straight-through score at one
    /// tempo: `bar_count` bars of `ticks_per_bar` each, no repeats.
    pub fn constant_tempo(bar_count: usize, ticks_per_bar: u64, bpm: f64) -> Self {
        let occurrences = (0..bar_count)
            .map(|index| {
                let start_tick = index as u64 * ticks_per_bar;
                BarOccurrence {
                    bar_index: index,
                    occurrence: 0,
                    start_tick,
                    end_tick: start_tick + ticks_per_bar,
                    tempo_changes: vec![TempoChange {
                        tick: start_tick,
                        bpm,
                    }],
                }
            })
            .collect();
        Self { occurrences }
    }

    /// Parses a timeline from its JSON representation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses a timeline from a JSON reader.
    pub fn from_json_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

impl TempoTimeline for ScoreTimeline {
    fn occurrences(&self) -> &[BarOccurrence] {
        &self.occurrences
    }
}
