use crate::{total_duration_ms, Ms, TimelineEntry, TimelineError};

/// A point on the timeline expressed as (entry index, local media seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenePosition {
    pub index: usize,
    pub local_sec: f64,
}

/// Entry whose window contains `global_ms` (`start <= t < end`). Zero-width
/// entries can never match. Scenes are tens of shots, so a linear scan is
/// fine.
pub fn entry_index_at(entries: &[TimelineEntry], global_ms: Ms) -> Option<usize> {
    entries
        .iter()
        .position(|e| global_ms >= e.start_ms && global_ms < e.end_ms)
}

/// Resolve a global time to a shot and a local media time. Callers must clamp
/// `global_ms` into `[0, total)` first; anything outside resolves to `None`.
pub fn global_to_local(entries: &[TimelineEntry], global_ms: Ms) -> Option<ScenePosition> {
    let index = entry_index_at(entries, global_ms)?;
    let entry = &entries[index];
    let local_sec = (global_ms - entry.start_ms + entry.trim_start_ms) as f64 / 1000.0;
    Some(ScenePosition { index, local_sec })
}

/// Global time for a local media time within `entry`. This is how the
/// scrubber position is derived from the active handle during playback.
pub fn local_to_global(entry: &TimelineEntry, local_sec: f64) -> Ms {
    let past_trim_ms = (local_sec * 1000.0 - entry.trim_start_ms as f64).max(0.0);
    entry.start_ms.saturating_add(past_trim_ms.round() as Ms)
}

/// Checked variant of `global_to_local` for callers that promised to clamp:
/// an out-of-range time is reported as an error instead of failing silently.
pub fn position_at(
    entries: &[TimelineEntry],
    global_ms: Ms,
) -> Result<ScenePosition, TimelineError> {
    global_to_local(entries, global_ms)
        .ok_or_else(|| TimelineError::OutOfRange(global_ms, total_duration_ms(entries)))
}

/// Clamp a requested global time into the playable range `[0, total)`.
pub fn clamp_global(entries: &[TimelineEntry], global_ms: Ms) -> Ms {
    let total = total_duration_ms(entries);
    if total == 0 {
        0
    } else {
        global_ms.min(total - 1)
    }
}
