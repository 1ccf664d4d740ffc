use crate::{total_duration_ms, ShotId, TimelineEntry};

/// Smallest visual width a shot marker may take on the timeline strip. Purely
/// cosmetic: zero-width shots keep a grabbable sliver without affecting the
/// timing model.
pub const MIN_SPAN_FRACTION: f32 = 0.01;

/// Normalized marker geometry for one shot: `left` and `width` are fractions
/// of the strip in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpan {
    pub index: usize,
    pub shot_id: ShotId,
    pub left: f32,
    pub width: f32,
}

/// Marker spans for the timeline strip. Widths get the `MIN_SPAN_FRACTION`
/// floor; an empty or all-zero-width scene falls back to evenly slotted
/// slivers instead of dividing by zero.
pub fn marker_spans(entries: &[TimelineEntry]) -> Vec<MarkerSpan> {
    let total = total_duration_ms(entries);
    if total == 0 {
        return entries
            .iter()
            .enumerate()
            .map(|(index, entry)| MarkerSpan {
                index,
                shot_id: entry.shot_id,
                left: index as f32 * MIN_SPAN_FRACTION,
                width: MIN_SPAN_FRACTION,
            })
            .collect();
    }

    let total = total as f32;
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| MarkerSpan {
            index,
            shot_id: entry.shot_id,
            left: entry.start_ms as f32 / total,
            width: (entry.duration_ms as f32 / total).max(MIN_SPAN_FRACTION),
        })
        .collect()
}
