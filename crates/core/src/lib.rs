//! Core library for the media synchronization engine.
//!
//! The crate aligns a musical score's symbolic timeline (ticks, as
//! described by a tempo map) with an external audio or video recording
//! (wall-clock milliseconds), so a playback cursor can stay in sync
//! with the real media. It derives the tick → time mapping, lets a
//! host plant, move and delete anchor points that pin musical
//! positions to real-time offsets, recomputes the span between
//! neighboring anchors after every edit, and can propose an initial
//! alignment from silence detection over the raw sample buffers.
//! Rendering, audio decoding and undo storage stay with the host.

pub mod autosync;
pub mod builder;
pub mod config;
pub mod edit;
pub mod error;
pub mod flatten;
pub mod marker;
pub mod silence;
pub mod tempo;

pub use autosync::auto_sync;
pub use builder::build_sync_point_markers;
pub use config::{SilenceConfig, SyncConfig};
pub use error::{MediaSyncError, Result};
pub use flatten::{to_flat_sync_points, FlatSyncPoint};
pub use marker::{SampleBuffers, SyncMarkerKind, SyncPointInfo, SyncPointMarker};
pub use silence::find_audio_start_and_end;
pub use tempo::{
    milliseconds_to_ticks, ticks_to_milliseconds, BarOccurrence, ScoreTimeline, TempoChange,
    TempoTimeline, PPQ,
};
