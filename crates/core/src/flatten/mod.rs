use serde::{Deserialize, Serialize};

use crate::marker::SyncPointInfo;

/// Minimal persisted representation of one anchor.
///
/// This is the only shape written back into the host score and the
/// only shape exported to generated code snippets. Real-time offsets
/// are rounded to integer milliseconds at this boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatSyncPoint {
    pub bar_index: usize,
    pub bar_occurrence: usize,
    /// Fractional position within the bar, 0 = bar start, 1 = bar end.
    /// A bar-end value (>= 1) is only meaningful on the score's final
    /// occurrence, where it pins the trailing end anchor; on any other
    /// occurrence the record is ignored on rebuild.
    pub bar_position: f64,
    pub millisecond_offset: i64,
    pub modified_tempo: f64,
}

/// Projects the marker sequence down to its anchors, in marker order.
pub fn to_flat_sync_points(info: &SyncPointInfo) -> Vec<FlatSyncPoint> {
    info.markers
        .iter()
        .filter_map(|marker| {
            marker.modified_tempo.map(|tempo| FlatSyncPoint {
                bar_index: marker.master_bar_index,
                bar_occurrence: marker.occurrence,
                bar_position: marker.ratio_position,
                millisecond_offset: marker.sync_time.round() as i64,
                modified_tempo: tempo,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::{SyncMarkerKind, SyncPointMarker};

    fn marker(tick: u64, sync_time: f64, tempo: Option<f64>) -> SyncPointMarker {
        SyncPointMarker {
            sync_time,
            synth_time: sync_time,
            synth_tick: tick,
            synth_bpm: 120.0,
            master_bar_index: (tick / 3840) as usize,
            occurrence: 0,
            ratio_position: 0.0,
            modified_tempo: tempo,
            kind: SyncMarkerKind::MasterBar,
        }
    }

    #[test]
    fn emits_only_anchors_in_marker_order() {
        let info = SyncPointInfo {
            end_tick: 11_520,
            end_time: 6_000.0,
            markers: vec![
                marker(0, 0.0, Some(120.0)),
                marker(3_840, 2_000.4, None),
                marker(7_680, 3_999.6, Some(96.0)),
            ],
            ..Default::default()
        };

        let flat = to_flat_sync_points(&info);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].millisecond_offset, 0);
        assert_eq!(flat[0].modified_tempo, 120.0);
        assert_eq!(flat[1].bar_index, 2);
        assert_eq!(flat[1].millisecond_offset, 4_000);
    }
}
