//! User edits over the marker sequence.
//!
//! Every edit recomputes only the span between the two anchors
//! neighboring the edited marker, so edit latency depends on anchor
//! density rather than score length. Each operation exists twice: the
//! in-place form for a single owner, and a `with_*` snapshot form that
//! clones first (sample buffers are shared, so the clone is cheap) for
//! callers keeping undo history.

use crate::error::MediaSyncError;
use crate::marker::{SyncMarkerKind, SyncPointInfo};
use crate::tempo::ticks_to_milliseconds;
use crate::Result;

impl SyncPointInfo {
    /// Moves a marker to a new real-time position (clamped to ≥ 0) and
    /// recomputes the surrounding spans. The moved marker becomes an
    /// anchor when a later anchor exists to measure its segment
    /// against.
    pub fn move_marker(&mut self, index: usize, new_time: f64) -> Result<()> {
        if index >= self.markers.len() {
            return Err(MediaSyncError::MarkerOutOfRange(index));
        }
        self.markers[index].sync_time = new_time.max(0.0);
        self.recompute_after_edit(index);
        self.refresh_end_time();
        Ok(())
    }

    /// Toggles a marker's anchor role.
    ///
    /// Start/end markers are permanent anchors; toggling them is a
    /// no-op. An anchored bar marker is demoted to an interpolation
    /// point (the marker itself stays, its span merges into the left
    /// anchor's). An unanchored bar marker is pinned at its current
    /// real time. An intermediate marker is removed outright.
    pub fn toggle_marker(&mut self, index: usize) -> Result<()> {
        let Some(marker) = self.markers.get(index) else {
            return Err(MediaSyncError::MarkerOutOfRange(index));
        };
        match marker.kind {
            SyncMarkerKind::Start | SyncMarkerKind::End => return Ok(()),
            SyncMarkerKind::MasterBar => {
                if marker.is_anchor() {
                    self.markers[index].modified_tempo = None;
                    self.merge_span_around(index);
                } else {
                    self.recompute_after_edit(index);
                }
            }
            SyncMarkerKind::Intermediate => {
                self.markers.remove(index);
                self.merge_span_around(index.saturating_sub(1));
            }
        }
        self.refresh_end_time();
        Ok(())
    }

    /// Snapshot form of [`move_marker`](Self::move_marker).
    pub fn with_moved_marker(&self, index: usize, new_time: f64) -> Result<Self> {
        let mut next = self.clone();
        next.move_marker(index, new_time)?;
        Ok(next)
    }

    /// Snapshot form of [`toggle_marker`](Self::toggle_marker).
    pub fn with_toggled_marker(&self, index: usize) -> Result<Self> {
        let mut next = self.clone();
        next.toggle_marker(index)?;
        Ok(next)
    }

    /// Recomputation for a non-deleting edit at `index`: the left
    /// anchor's tempo is refitted to the edited marker's position and
    /// the markers between redistributed, then the same on the right
    /// side with the edited marker taking the anchor role.
    fn recompute_after_edit(&mut self, index: usize) {
        let left = index
            .checked_sub(1)
            .and_then(|position| self.anchor_at_or_before(position));
        if let Some(left) = left {
            let tempo = self.fitted_tempo(left, index, self.marker_tempo(left));
            self.markers[left].modified_tempo = Some(tempo);
            self.redistribute(left, index, tempo);
        }
        if let Some(right) = self.anchor_after(index) {
            let tempo = self.fitted_tempo(index, right, self.marker_tempo(index));
            self.markers[index].modified_tempo = Some(tempo);
            self.redistribute(index, right, tempo);
        }
    }

    /// Recomputation after an anchor disappeared near `position`: the
    /// left anchor's tempo is refitted across the merged span up to
    /// the next surviving anchor, keeping interpolation markers
    /// consistent with both pinned ends.
    fn merge_span_around(&mut self, position: usize) {
        let Some(left) = self.anchor_at_or_before(position) else {
            return;
        };
        let Some(right) = self.anchor_after(left) else {
            return;
        };
        let tempo = self.fitted_tempo(left, right, self.marker_tempo(left));
        self.markers[left].modified_tempo = Some(tempo);
        self.redistribute(left, right, tempo);
    }

    /// Tempo that makes the tick span between `from` and `to` last
    /// exactly their real-time distance. A zero-or-negative distance
    /// (coincident markers) keeps `previous_bpm` instead of collapsing
    /// to 0 or infinity.
    fn fitted_tempo(&self, from: usize, to: usize, previous_bpm: f64) -> f64 {
        let tick_span = self.markers[to].synth_tick - self.markers[from].synth_tick;
        let time_span = self.markers[to].sync_time - self.markers[from].sync_time;
        if time_span <= 0.0 {
            return previous_bpm;
        }
        ticks_to_milliseconds(tick_span as f64, previous_bpm) / time_span * previous_bpm
    }

    /// Repositions every marker strictly between two indices,
    /// linear-in-tick at the segment tempo.
    fn redistribute(&mut self, left: usize, right: usize, tempo: f64) {
        let origin_tick = self.markers[left].synth_tick;
        let origin_time = self.markers[left].sync_time;
        for marker in &mut self.markers[left + 1..right] {
            marker.sync_time = origin_time
                + ticks_to_milliseconds((marker.synth_tick - origin_tick) as f64, tempo);
        }
    }

    fn marker_tempo(&self, index: usize) -> f64 {
        let marker = &self.markers[index];
        marker.modified_tempo.unwrap_or(marker.synth_bpm)
    }

    fn refresh_end_time(&mut self) {
        self.end_time = self.markers.last().map_or(0.0, |marker| marker.sync_time);
    }
}
