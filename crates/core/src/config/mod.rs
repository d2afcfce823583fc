use serde::{Deserialize, Serialize};

/// Top-level configuration for the synchronization engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    pub silence: SilenceConfig,
}

/// Tuning knobs for the silence detector.
///
/// The defaults match the documented detection policy: a sample is
/// audible above an absolute amplitude of `0.001`, a boundary is
/// confirmed after one second of cumulatively audible material, a
/// silent gap longer than 200 ms resets the candidate, and the scan
/// never looks past the first/last `min(10 s, 10 %)` of the buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilenceConfig {
    /// Absolute per-sample amplitude at or above which a sample counts
    /// as audible (checked on either channel).
    pub amplitude_threshold: f32,
    /// Cumulative audible time required to confirm a candidate
    /// boundary, in milliseconds.
    pub confirm_ms: f64,
    /// Longest silent gap tolerated inside a candidate region before
    /// the candidate is discarded, in milliseconds.
    pub max_gap_ms: f64,
    /// Absolute cap on the search window, in milliseconds.
    pub window_cap_ms: f64,
    /// Relative cap on the search window as a fraction of the total
    /// buffer length.
    pub window_cap_fraction: f64,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            amplitude_threshold: 0.001,
            confirm_ms: 1_000.0,
            max_gap_ms: 200.0,
            window_cap_ms: 10_000.0,
            window_cap_fraction: 0.1,
        }
    }
}
