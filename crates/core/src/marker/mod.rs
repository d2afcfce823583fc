use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Role of a marker on the combined timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMarkerKind {
    /// First marker of the sequence, pinned at tick zero. Always an
    /// anchor, never deletable.
    Start,
    /// Last marker of the sequence, pinned at the end tick. Always an
    /// anchor, never deletable.
    End,
    /// Marker sitting on a bar boundary.
    MasterBar,
    /// Marker inside a bar (fractional `ratio_position`).
    Intermediate,
}

/// One point on the combined symbolic/real timeline.
///
/// `synth_*` fields describe the position as computed purely from the
/// tempo map (the un-synced reference timeline); `sync_time` is the
/// real-world media position in milliseconds. A marker carrying
/// `modified_tempo` is an anchor: it pins a real-time offset and fixes
/// the tempo of the segment that follows it until the next anchor.
/// Markers without it are interpolation points, fully determined by
/// their neighboring anchors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPointMarker {
    pub sync_time: f64,
    pub synth_time: f64,
    pub synth_tick: u64,
    pub synth_bpm: f64,
    pub master_bar_index: usize,
    pub occurrence: usize,
    /// Fractional offset within the bar: 0 = bar start, 1 = bar end.
    pub ratio_position: f64,
    pub modified_tempo: Option<f64>,
    pub kind: SyncMarkerKind,
}

impl SyncPointMarker {
    pub fn is_anchor(&self) -> bool {
        self.modified_tempo.is_some()
    }
}

/// Decoded audio channels shared with the engine.
///
/// The caller decodes (and owns) the samples once; the engine only
/// ever reads them, so snapshots of [`SyncPointInfo`] share the same
/// buffers instead of copying them.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffers {
    pub sample_rate: u32,
    pub left: Arc<[f32]>,
    pub right: Arc<[f32]>,
}

impl SampleBuffers {
    pub fn new(sample_rate: u32, left: Vec<f32>, right: Vec<f32>) -> Self {
        Self {
            sample_rate,
            left: left.into(),
            right: right.into(),
        }
    }

    /// True when no audio has been loaded.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }

    /// Number of sample frames (the longer channel wins if the two
    /// differ in length).
    pub fn frames(&self) -> usize {
        self.left.len().max(self.right.len())
    }
}

/// Aggregate synchronization state: the ordered marker sequence plus
/// the audio it is aligned against.
///
/// Invariants, maintained by every operation in this crate:
/// 1. markers are sorted by `synth_tick` ascending with non-decreasing
///    `sync_time`;
/// 2. the first marker is `Start` at tick 0, the last is `End` at
///    `end_tick`, and both are anchors;
/// 3. interpolation markers between two anchors are linear-in-tick at
///    the left anchor's tempo;
/// 4. deleting an `Intermediate` marker removes it, un-anchoring a
///    `MasterBar` only clears its `modified_tempo`.
#[derive(Debug, Clone, Default)]
pub struct SyncPointInfo {
    pub end_tick: u64,
    pub end_time: f64,
    pub audio: SampleBuffers,
    pub markers: Vec<SyncPointMarker>,
}

impl SyncPointInfo {
    /// Index of the nearest anchor at or before `index`.
    pub(crate) fn anchor_at_or_before(&self, index: usize) -> Option<usize> {
        let end = index.min(self.markers.len().checked_sub(1)?);
        self.markers[..=end]
            .iter()
            .rposition(SyncPointMarker::is_anchor)
    }

    /// Index of the nearest anchor strictly after `index`.
    pub(crate) fn anchor_after(&self, index: usize) -> Option<usize> {
        self.markers
            .iter()
            .skip(index + 1)
            .position(SyncPointMarker::is_anchor)
            .map(|offset| index + 1 + offset)
    }
}
