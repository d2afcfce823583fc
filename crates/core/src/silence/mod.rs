use crate::config::SilenceConfig;
use crate::marker::SampleBuffers;

/// Locates the first and last non-silent positions in the sample
/// buffers, in milliseconds.
///
/// Head and tail are scanned independently (the tail backward), each
/// within a window of `min(window_cap_ms, window_cap_fraction *
/// length)` — nothing beyond that boundary is ever inspected. A
/// candidate boundary opens at the first audible sample and is
/// confirmed once `confirm_ms` of cumulatively audible material has
/// been seen; a silent gap longer than `max_gap_ms` discards the
/// candidate. Without a confirmed boundary the window edge itself is
/// returned.
pub fn find_audio_start_and_end(buffers: &SampleBuffers, config: &SilenceConfig) -> (f64, f64) {
    let frames = buffers.frames();
    if frames == 0 || buffers.sample_rate == 0 {
        return (0.0, 0.0);
    }

    let ms_per_frame = 1_000.0 / f64::from(buffers.sample_rate);
    let cap_frames = (config.window_cap_ms / ms_per_frame).round() as usize;
    let window = cap_frames
        .min((frames as f64 * config.window_cap_fraction) as usize)
        .clamp(1, frames);
    let confirm_frames = ((config.confirm_ms / ms_per_frame).round() as usize).max(1);
    let gap_frames = (config.max_gap_ms / ms_per_frame).round() as usize;

    let threshold = config.amplitude_threshold;
    let audible = |index: usize| {
        let left = buffers.left.get(index).copied().unwrap_or(0.0);
        let right = buffers.right.get(index).copied().unwrap_or(0.0);
        left.abs() >= threshold || right.abs() >= threshold
    };

    let start_frame =
        scan_boundary(0..window, confirm_frames, gap_frames, &audible).unwrap_or(window);
    let floor = frames - window;
    let end_frame = scan_boundary((floor..frames).rev(), confirm_frames, gap_frames, &audible)
        .map(|frame| frame + 1)
        .unwrap_or(floor);

    (
        start_frame as f64 * ms_per_frame,
        end_frame as f64 * ms_per_frame,
    )
}

/// Runs the candidate/confirm scan over one edge of the buffer.
/// Returns the frame index of the confirmed candidate, or `None` when
/// the window is exhausted first.
fn scan_boundary<I>(
    frames: I,
    confirm_frames: usize,
    gap_frames: usize,
    audible: &dyn Fn(usize) -> bool,
) -> Option<usize>
where
    I: Iterator<Item = usize>,
{
    let mut candidate: Option<usize> = None;
    let mut audible_run = 0usize;
    let mut gap = 0usize;

    for index in frames {
        if audible(index) {
            if candidate.is_none() {
                candidate = Some(index);
                audible_run = 0;
            }
            audible_run += 1;
            gap = 0;
            if audible_run >= confirm_frames {
                return candidate;
            }
        } else if candidate.is_some() {
            gap += 1;
            if gap > gap_frames {
                candidate = None;
                audible_run = 0;
                gap = 0;
            }
        }
    }

    None
}
