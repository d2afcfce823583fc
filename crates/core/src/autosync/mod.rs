use crate::builder::DerivedCursor;
use crate::config::SilenceConfig;
use crate::error::MediaSyncError;
use crate::marker::{SampleBuffers, SyncMarkerKind, SyncPointInfo, SyncPointMarker};
use crate::silence::find_audio_start_and_end;
use crate::tempo::{ticks_to_milliseconds, TempoTimeline};
use crate::Result;

/// Proposes a brand-new marker sequence from the tempo map alone,
/// ignoring any previously persisted anchors.
///
/// Pass 1 walks the timeline and anchors the start, every tempo change
/// whose tempo actually differs from the running tempo, and the end;
/// a constant-tempo score therefore yields exactly two markers. With
/// `pad_to_audio` set and audio loaded, pass 2 measures the non-silent
/// span of the recording and stretches the whole sequence uniformly
/// onto it: one global scale factor, all relative proportions intact.
pub fn auto_sync(
    timeline: &dyn TempoTimeline,
    audio: SampleBuffers,
    pad_to_audio: bool,
    config: &SilenceConfig,
) -> Result<SyncPointInfo> {
    let occurrences = timeline.occurrences();
    let Some(first) = occurrences.first() else {
        return Err(MediaSyncError::EmptyTimeline);
    };

    let initial_bpm = first.tempo_changes.first().map_or(120.0, |change| change.bpm);
    let mut cursor = DerivedCursor {
        tick: first.start_tick,
        time: 0.0,
        bpm: initial_bpm,
    };
    let mut running_bpm = initial_bpm;
    let mut markers = vec![SyncPointMarker {
        sync_time: 0.0,
        synth_time: 0.0,
        synth_tick: first.start_tick,
        synth_bpm: initial_bpm,
        master_bar_index: first.bar_index,
        occurrence: first.occurrence,
        ratio_position: 0.0,
        modified_tempo: Some(initial_bpm),
        kind: SyncMarkerKind::Start,
    }];

    for occurrence in occurrences {
        for change in &occurrence.tempo_changes {
            cursor.advance_to(change.tick);
            cursor.bpm = change.bpm;
            if change.bpm != running_bpm {
                let length = occurrence.length_ticks();
                let ratio = if length > 0 {
                    (change.tick - occurrence.start_tick) as f64 / length as f64
                } else {
                    0.0
                };
                markers.push(SyncPointMarker {
                    sync_time: cursor.time,
                    synth_time: cursor.time,
                    synth_tick: change.tick,
                    synth_bpm: change.bpm,
                    master_bar_index: occurrence.bar_index,
                    occurrence: occurrence.occurrence,
                    ratio_position: ratio,
                    modified_tempo: Some(change.bpm),
                    kind: if change.tick == occurrence.start_tick {
                        SyncMarkerKind::MasterBar
                    } else {
                        SyncMarkerKind::Intermediate
                    },
                });
                running_bpm = change.bpm;
            }
        }
        cursor.advance_to(occurrence.end_tick);
    }

    let end_tick = timeline.end_tick();
    cursor.advance_to(end_tick);
    let last = occurrences.last().unwrap_or(first);
    markers.push(SyncPointMarker {
        sync_time: cursor.time,
        synth_time: cursor.time,
        synth_tick: end_tick,
        synth_bpm: cursor.bpm,
        master_bar_index: last.bar_index,
        occurrence: last.occurrence,
        ratio_position: 1.0,
        modified_tempo: Some(cursor.bpm),
        kind: SyncMarkerKind::End,
    });

    let mut info = SyncPointInfo {
        end_tick,
        end_time: cursor.time,
        audio,
        markers,
    };

    if pad_to_audio && !info.audio.is_empty() {
        let (song_start, song_end) = find_audio_start_and_end(&info.audio, config);
        let synthetic = cursor.time;
        let span = song_end - song_start;
        if synthetic > 0.0 && span > 0.0 {
            rescale_to_span(&mut info, song_start, span / synthetic);
        }
    }

    Ok(info)
}

/// Stretches every anchor segment by the one global `scale`,
/// accumulating real time from `song_start`, then re-walks the
/// interpolation markers with the scaled tempo active at each point.
fn rescale_to_span(info: &mut SyncPointInfo, song_start: f64, scale: f64) {
    let anchors: Vec<usize> = info
        .markers
        .iter()
        .enumerate()
        .filter(|(_, marker)| marker.is_anchor())
        .map(|(index, _)| index)
        .collect();

    let mut accumulated = song_start;
    for pair in anchors.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        let tempo = info.markers[current]
            .modified_tempo
            .unwrap_or(info.markers[current].synth_bpm);
        let tick_span = info.markers[next].synth_tick - info.markers[current].synth_tick;
        let derived_ms = ticks_to_milliseconds(tick_span as f64, tempo);
        let scaled_ms = derived_ms * scale;
        info.markers[current].sync_time = accumulated;
        info.markers[current].modified_tempo = Some(if scaled_ms > 0.0 {
            derived_ms / scaled_ms * tempo
        } else {
            tempo
        });
        accumulated += scaled_ms;
    }
    if let Some(&final_anchor) = anchors.last() {
        info.markers[final_anchor].sync_time = accumulated;
        if anchors.len() >= 2 {
            let previous_tempo = info.markers[anchors[anchors.len() - 2]].modified_tempo;
            info.markers[final_anchor].modified_tempo = previous_tempo;
        }
    }

    let mut active: Option<(u64, f64, f64)> = None;
    for marker in &mut info.markers {
        match marker.modified_tempo {
            Some(tempo) => active = Some((marker.synth_tick, marker.sync_time, tempo)),
            None => {
                if let Some((tick, time, tempo)) = active {
                    marker.sync_time =
                        time + ticks_to_milliseconds((marker.synth_tick - tick) as f64, tempo);
                }
            }
        }
    }
    info.end_time = info.markers.last().map_or(accumulated, |m| m.sync_time);
}
