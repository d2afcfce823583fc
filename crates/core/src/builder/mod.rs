use std::collections::HashMap;

use crate::error::MediaSyncError;
use crate::flatten::FlatSyncPoint;
use crate::marker::{SampleBuffers, SyncMarkerKind, SyncPointInfo, SyncPointMarker};
use crate::tempo::{ticks_to_milliseconds, TempoTimeline};
use crate::Result;

/// Cursor through the un-synced reference timeline: position and tempo
/// as computed purely from the tempo map.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DerivedCursor {
    pub tick: u64,
    pub time: f64,
    pub bpm: f64,
}

impl DerivedCursor {
    pub fn advance_to(&mut self, tick: u64) {
        if tick > self.tick {
            self.time += ticks_to_milliseconds((tick - self.tick) as f64, self.bpm);
            self.tick = tick;
        }
    }
}

/// The anchor currently governing the real timeline during the walk.
///
/// `scale` converts derived-time deltas into real-time deltas: an
/// anchor whose pinned tempo is twice the map tempo plays the same
/// ticks in half the time.
#[derive(Debug, Clone, Copy)]
struct ActiveAnchor {
    tick: u64,
    time: f64,
    synth_time: f64,
    scale: f64,
}

impl ActiveAnchor {
    fn new(tick: u64, time: f64, synth_time: f64, synth_bpm: f64, modified_tempo: f64) -> Self {
        let scale = if modified_tempo > 0.0 {
            synth_bpm / modified_tempo
        } else {
            1.0
        };
        Self {
            tick,
            time,
            synth_time,
            scale,
        }
    }
}

/// Derives the full ordered marker sequence from a tempo timeline and
/// the score's persisted anchors.
///
/// Bar occurrences are walked in tick order. Occurrences holding
/// persisted anchors emit one marker per anchor at the anchor's exact
/// tick, after all tempo changes up to that tick have been consumed
/// (so the recorded `synth_bpm` is the tempo immediately preceding the
/// anchor). Anchorless occurrences emit a single interpolation marker
/// at the bar start, its real time carried forward from the last
/// anchor, or equal to the derived time while no anchor has been seen.
/// The first marker becomes the `Start` anchor and a trailing `End`
/// anchor is appended, taken from a persisted bar-end anchor of the
/// final occurrence when one exists. Bar-end records on any earlier
/// occurrence are ignored (see [`FlatSyncPoint::bar_position`]).
pub fn build_sync_point_markers(
    timeline: &dyn TempoTimeline,
    persisted: &[FlatSyncPoint],
    audio: SampleBuffers,
) -> Result<SyncPointInfo> {
    let occurrences = timeline.occurrences();
    let Some(first) = occurrences.first() else {
        return Err(MediaSyncError::EmptyTimeline);
    };

    let mut anchors_by_bar: HashMap<(usize, usize), Vec<&FlatSyncPoint>> = HashMap::new();
    for point in persisted {
        anchors_by_bar
            .entry((point.bar_index, point.bar_occurrence))
            .or_default()
            .push(point);
    }
    for points in anchors_by_bar.values_mut() {
        points.sort_by(|a, b| a.bar_position.total_cmp(&b.bar_position));
    }

    let initial_bpm = first.tempo_changes.first().map_or(120.0, |change| change.bpm);
    let mut cursor = DerivedCursor {
        tick: first.start_tick,
        time: 0.0,
        bpm: initial_bpm,
    };
    let mut active: Option<ActiveAnchor> = None;
    let mut markers: Vec<SyncPointMarker> = Vec::new();
    let mut end_anchor: Option<FlatSyncPoint> = None;
    let last_index = occurrences.len() - 1;

    for (index, occurrence) in occurrences.iter().enumerate() {
        let mut changes = occurrence.tempo_changes.iter().peekable();
        let bar_anchors = anchors_by_bar
            .get(&(occurrence.bar_index, occurrence.occurrence))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let in_bar: Vec<&&FlatSyncPoint> = bar_anchors
            .iter()
            .filter(|point| point.bar_position < 1.0)
            .collect();
        if index == last_index {
            end_anchor = bar_anchors
                .iter()
                .find(|point| point.bar_position >= 1.0)
                .map(|point| (*point).clone());
        }

        if in_bar.is_empty() {
            // Changes sitting exactly on the bar line belong to this
            // bar's own tempo, so consume them before emitting.
            while let Some(change) = changes.peek() {
                if change.tick > occurrence.start_tick {
                    break;
                }
                cursor.advance_to(change.tick);
                cursor.bpm = change.bpm;
                changes.next();
            }
            cursor.advance_to(occurrence.start_tick);
            markers.push(SyncPointMarker {
                sync_time: carry_forward(active, cursor.time),
                synth_time: cursor.time,
                synth_tick: occurrence.start_tick,
                synth_bpm: cursor.bpm,
                master_bar_index: occurrence.bar_index,
                occurrence: occurrence.occurrence,
                ratio_position: 0.0,
                modified_tempo: None,
                kind: SyncMarkerKind::MasterBar,
            });
        } else {
            for point in in_bar {
                let offset = point.bar_position * occurrence.length_ticks() as f64;
                let anchor_tick = occurrence.start_tick + offset.round() as u64;
                while let Some(change) = changes.peek() {
                    if change.tick > anchor_tick {
                        break;
                    }
                    cursor.advance_to(change.tick);
                    cursor.bpm = change.bpm;
                    changes.next();
                }
                cursor.advance_to(anchor_tick);
                let sync_time = point.millisecond_offset as f64;
                markers.push(SyncPointMarker {
                    sync_time,
                    synth_time: cursor.time,
                    synth_tick: anchor_tick,
                    synth_bpm: cursor.bpm,
                    master_bar_index: occurrence.bar_index,
                    occurrence: occurrence.occurrence,
                    ratio_position: point.bar_position,
                    modified_tempo: Some(point.modified_tempo),
                    kind: if point.bar_position <= 0.0 {
                        SyncMarkerKind::MasterBar
                    } else {
                        SyncMarkerKind::Intermediate
                    },
                });
                active = Some(ActiveAnchor::new(
                    anchor_tick,
                    sync_time,
                    cursor.time,
                    cursor.bpm,
                    point.modified_tempo,
                ));
            }
        }

        for change in changes {
            cursor.advance_to(change.tick);
            cursor.bpm = change.bpm;
        }
        cursor.advance_to(occurrence.end_tick);
    }

    let end_tick = timeline.end_tick();
    cursor.advance_to(end_tick);
    let (end_time, end_tempo) = match &end_anchor {
        Some(point) => (point.millisecond_offset as f64, point.modified_tempo),
        None => {
            let time = carry_forward(active, cursor.time);
            let tempo = match active {
                Some(anchor) if anchor.scale > 0.0 => cursor.bpm / anchor.scale,
                _ => cursor.bpm,
            };
            (time, tempo)
        }
    };
    let last = &occurrences[last_index];
    markers.push(SyncPointMarker {
        sync_time: end_time,
        synth_time: cursor.time,
        synth_tick: end_tick,
        synth_bpm: cursor.bpm,
        master_bar_index: last.bar_index,
        occurrence: last.occurrence,
        ratio_position: 1.0,
        modified_tempo: Some(end_tempo),
        kind: SyncMarkerKind::End,
    });

    // The sequence always opens with an anchored start marker, even
    // when the score never persisted one.
    let start = &mut markers[0];
    start.kind = SyncMarkerKind::Start;
    if start.modified_tempo.is_none() {
        start.modified_tempo = Some(start.synth_bpm);
    }

    Ok(SyncPointInfo {
        end_tick,
        end_time,
        audio,
        markers,
    })
}

/// Projects a tick's real time from the anchor currently in effect;
/// before the first anchor the real timeline equals the derived one.
fn carry_forward(active: Option<ActiveAnchor>, synth_time: f64) -> f64 {
    match active {
        Some(anchor) => anchor.time + (synth_time - anchor.synth_time) * anchor.scale,
        None => synth_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::to_flat_sync_points;
    use crate::tempo::{BarOccurrence, ScoreTimeline, TempoChange};

    fn two_bar_score() -> ScoreTimeline {
        ScoreTimeline::constant_tempo(2, 3_840, 120.0)
    }

    fn varied_tempo_score() -> ScoreTimeline {
        // 4 bars of 4/4; the tempo rises to 150 at bar 2 and drops to
        // 90 halfway through bar 3.
        let mut occurrences = Vec::new();
        for index in 0..4 {
            let start_tick = index as u64 * 3_840;
            let mut tempo_changes = vec![TempoChange {
                tick: start_tick,
                bpm: match index {
                    0 | 1 => 120.0,
                    2 => 150.0,
                    _ => 90.0,
                },
            }];
            if index == 3 {
                tempo_changes[0].bpm = 150.0;
                tempo_changes.push(TempoChange {
                    tick: start_tick + 1_920,
                    bpm: 90.0,
                });
            }
            occurrences.push(BarOccurrence {
                bar_index: index,
                occurrence: 0,
                start_tick,
                end_tick: start_tick + 3_840,
                tempo_changes,
            });
        }
        ScoreTimeline::new(occurrences)
    }

    #[test]
    fn empty_timeline_yields_no_result() {
        let timeline = ScoreTimeline::default();
        let result =
            build_sync_point_markers(&timeline, &[], SampleBuffers::default());
        assert!(matches!(result, Err(MediaSyncError::EmptyTimeline)));
    }

    #[test]
    fn constant_tempo_walk_produces_bookended_sequence() {
        let info =
            build_sync_point_markers(&two_bar_score(), &[], SampleBuffers::default()).unwrap();

        assert_eq!(info.markers.len(), 3);
        let start = &info.markers[0];
        assert_eq!(start.kind, SyncMarkerKind::Start);
        assert_eq!(start.synth_tick, 0);
        assert_eq!(start.sync_time, 0.0);
        assert_eq!(start.modified_tempo, Some(120.0));

        let middle = &info.markers[1];
        assert_eq!(middle.kind, SyncMarkerKind::MasterBar);
        assert_eq!(middle.synth_tick, 3_840);
        assert_eq!(middle.sync_time, 2_000.0);
        assert!(middle.modified_tempo.is_none());

        let end = &info.markers[2];
        assert_eq!(end.kind, SyncMarkerKind::End);
        assert_eq!(end.synth_tick, 7_680);
        assert_eq!(end.sync_time, 4_000.0);
        assert_eq!(end.modified_tempo, Some(120.0));
        assert_eq!(info.end_tick, 7_680);
        assert_eq!(info.end_time, 4_000.0);
    }

    #[test]
    fn bars_without_tempo_events_walk_at_the_carried_tempo() {
        // Only bar 0 announces a tempo; the later bars carry no events
        // and inherit it.
        let occurrences = (0..3)
            .map(|index| {
                let start_tick = index as u64 * 3_840;
                BarOccurrence {
                    bar_index: index,
                    occurrence: 0,
                    start_tick,
                    end_tick: start_tick + 3_840,
                    tempo_changes: if index == 0 {
                        vec![TempoChange { tick: 0, bpm: 150.0 }]
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect();
        let timeline = ScoreTimeline::new(occurrences);

        let info =
            build_sync_point_markers(&timeline, &[], SampleBuffers::default()).unwrap();
        let bar_ms = ticks_to_milliseconds(3_840.0, 150.0);
        assert_eq!(info.markers[0].modified_tempo, Some(150.0));
        assert_eq!(info.markers[1].synth_bpm, 150.0);
        assert!((info.markers[1].sync_time - bar_ms).abs() < 1e-9);
        assert!((info.end_time - 3.0 * bar_ms).abs() < 1e-9);
    }

    #[test]
    fn an_event_free_score_falls_back_to_120_bpm() {
        let occurrences = (0..2)
            .map(|index| BarOccurrence {
                bar_index: index,
                occurrence: 0,
                start_tick: index as u64 * 3_840,
                end_tick: (index as u64 + 1) * 3_840,
                tempo_changes: Vec::new(),
            })
            .collect();
        let timeline = ScoreTimeline::new(occurrences);

        let info =
            build_sync_point_markers(&timeline, &[], SampleBuffers::default()).unwrap();
        assert_eq!(info.markers[0].synth_bpm, 120.0);
        assert_eq!(info.markers[0].modified_tempo, Some(120.0));
        assert_eq!(info.end_time, 4_000.0);
    }

    #[test]
    fn ticks_and_times_stay_monotonic_with_tempo_changes() {
        let info = build_sync_point_markers(
            &varied_tempo_score(),
            &[],
            SampleBuffers::default(),
        )
        .unwrap();

        for pair in info.markers.windows(2) {
            assert!(pair[0].synth_tick < pair[1].synth_tick);
            assert!(pair[0].sync_time <= pair[1].sync_time);
        }
    }

    #[test]
    fn persisted_anchor_pins_real_time_and_tempo() {
        let anchor = FlatSyncPoint {
            bar_index: 1,
            bar_occurrence: 0,
            bar_position: 0.0,
            millisecond_offset: 2_500,
            modified_tempo: 96.0,
        };
        let info =
            build_sync_point_markers(&two_bar_score(), &[anchor], SampleBuffers::default())
                .unwrap();

        let pinned = &info.markers[1];
        assert_eq!(pinned.sync_time, 2_500.0);
        assert_eq!(pinned.modified_tempo, Some(96.0));
        assert_eq!(pinned.synth_time, 2_000.0);
        // The segment after the anchor runs at the pinned tempo.
        let end = info.markers.last().unwrap();
        let expected = 2_500.0 + ticks_to_milliseconds(3_840.0, 96.0);
        assert!((end.sync_time - expected).abs() < 1e-9);
    }

    #[test]
    fn tempo_changes_before_an_anchor_are_consumed_first() {
        let mut occurrence = BarOccurrence {
            bar_index: 0,
            occurrence: 0,
            start_tick: 0,
            end_tick: 3_840,
            tempo_changes: vec![
                TempoChange { tick: 0, bpm: 120.0 },
                TempoChange {
                    tick: 1_920,
                    bpm: 140.0,
                },
            ],
        };
        occurrence.tempo_changes.sort_by_key(|change| change.tick);
        let timeline = ScoreTimeline::new(vec![occurrence]);
        let anchors = [
            FlatSyncPoint {
                bar_index: 0,
                bar_occurrence: 0,
                bar_position: 0.0,
                millisecond_offset: 0,
                modified_tempo: 120.0,
            },
            FlatSyncPoint {
                bar_index: 0,
                bar_occurrence: 0,
                bar_position: 0.5,
                millisecond_offset: 900,
                modified_tempo: 130.0,
            },
        ];

        let info =
            build_sync_point_markers(&timeline, &anchors, SampleBuffers::default()).unwrap();
        let pinned = info
            .markers
            .iter()
            .find(|marker| marker.kind == SyncMarkerKind::Intermediate)
            .unwrap();
        // The 140 BPM change sits exactly on the anchor tick and must
        // be reflected in the recorded map tempo.
        assert_eq!(pinned.synth_tick, 1_920);
        assert_eq!(pinned.synth_bpm, 140.0);
    }

    #[test]
    fn bar_end_records_only_bind_on_the_final_occurrence() {
        let stray = FlatSyncPoint {
            bar_index: 0,
            bar_occurrence: 0,
            bar_position: 1.0,
            millisecond_offset: 2_500,
            modified_tempo: 96.0,
        };
        let info =
            build_sync_point_markers(&two_bar_score(), &[stray], SampleBuffers::default())
                .unwrap();

        // The record sits at the end of a non-final bar and pins
        // nothing; the walk is identical to the anchorless one.
        assert_eq!(info.markers.len(), 3);
        assert!(info.markers[1].modified_tempo.is_none());
        assert_eq!(info.markers[1].sync_time, 2_000.0);
        assert_eq!(info.markers.last().unwrap().sync_time, 4_000.0);
    }

    #[test]
    fn flattening_and_rebuilding_reproduces_the_sequence() {
        let timeline = varied_tempo_score();
        let first =
            build_sync_point_markers(&timeline, &[], SampleBuffers::default()).unwrap();
        let flat = to_flat_sync_points(&first);
        let second =
            build_sync_point_markers(&timeline, &flat, SampleBuffers::default()).unwrap();

        assert_eq!(second.markers.len(), first.markers.len());
        for (a, b) in first.markers.iter().zip(second.markers.iter()) {
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.synth_tick, b.synth_tick);
            assert_eq!(a.master_bar_index, b.master_bar_index);
            assert!((a.sync_time - b.sync_time).abs() <= 1.0);
            assert_eq!(a.modified_tempo.is_some(), b.modified_tempo.is_some());
        }
    }

    #[test]
    fn repeated_bars_match_anchors_by_occurrence() {
        // The same bar played twice; only the second pass is anchored.
        let occurrences = (0..2)
            .map(|occurrence| BarOccurrence {
                bar_index: 0,
                occurrence,
                start_tick: occurrence as u64 * 3_840,
                end_tick: (occurrence as u64 + 1) * 3_840,
                tempo_changes: vec![TempoChange {
                    tick: occurrence as u64 * 3_840,
                    bpm: 120.0,
                }],
            })
            .collect();
        let timeline = ScoreTimeline::new(occurrences);
        let anchor = FlatSyncPoint {
            bar_index: 0,
            bar_occurrence: 1,
            bar_position: 0.0,
            millisecond_offset: 2_400,
            modified_tempo: 110.0,
        };

        let info =
            build_sync_point_markers(&timeline, &[anchor], SampleBuffers::default()).unwrap();
        assert!(info.markers[0].modified_tempo.is_some());
        assert!((info.markers[1].sync_time - 2_400.0).abs() < 1e-9);
        assert_eq!(info.markers[1].occurrence, 1);
    }
}
