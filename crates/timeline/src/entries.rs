use std::collections::HashMap;

use crate::{Ms, Shot, ShotId};

/// Base duration assumed for a clip until either a stored or a measured
/// duration is available.
pub const FALLBACK_DURATION_MS: Ms = 5_000;

/// Durations reported by a media backend after metadata load, keyed by shot.
/// These outrank whatever duration the shot carries from the editor.
#[derive(Debug, Clone, Default)]
pub struct MeasuredDurations {
    map: HashMap<ShotId, Ms>,
}

impl MeasuredDurations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a measurement; returns true when the value actually changed, so
    /// callers know whether the timeline needs a re-derive.
    pub fn record(&mut self, shot: ShotId, duration_ms: Ms) -> bool {
        match self.map.insert(shot, duration_ms) {
            Some(previous) => previous != duration_ms,
            None => true,
        }
    }

    pub fn get(&self, shot: &ShotId) -> Option<Ms> {
        self.map.get(shot).copied()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

/// A playable shot placed on the scene clock, trims applied. Derived, never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub shot_id: ShotId,
    pub url: String,
    pub start_ms: Ms,
    pub end_ms: Ms,
    /// Effective duration after trims; zero when trims swallow the clip.
    pub duration_ms: Ms,
    pub trim_start_ms: Ms,
    pub trim_end_ms: Ms,
    pub base_duration_ms: Ms,
    pub audio_muted: bool,
}

impl TimelineEntry {
    pub fn trim_start_sec(&self) -> f64 {
        self.trim_start_ms as f64 / 1000.0
    }

    /// Local media time at which playback must leave this clip.
    pub fn out_point_sec(&self) -> f64 {
        self.base_duration_ms.saturating_sub(self.trim_end_ms) as f64 / 1000.0
    }

    /// Zero-width entries keep their slot in the sequence but are never a
    /// playback target.
    pub fn is_zero_width(&self) -> bool {
        self.duration_ms == 0
    }
}

/// Best-known base duration for a shot: measured > stored > fallback.
pub fn base_duration_ms(shot: &Shot, measured: &MeasuredDurations, fallback_ms: Ms) -> Ms {
    measured
        .get(&shot.id)
        .or_else(|| shot.video.stored_duration_ms())
        .unwrap_or(fallback_ms)
}

/// Fold the playable shots into contiguous timeline entries. The input is
/// expected to be filtered and ordered already (see `Scene::playable_shots`).
pub fn compute_timeline(
    shots: &[&Shot],
    measured: &MeasuredDurations,
    fallback_ms: Ms,
) -> Vec<TimelineEntry> {
    let mut entries = Vec::with_capacity(shots.len());
    let mut current_ms: Ms = 0;
    for shot in shots {
        let url = match shot.video.playable_url() {
            Some(url) => url.to_string(),
            None => continue,
        };
        let base = base_duration_ms(shot, measured, fallback_ms);
        let trimmed = shot.trim_start_ms.saturating_add(shot.trim_end_ms);
        let effective = base.saturating_sub(trimmed);
        let start_ms = current_ms;
        current_ms = current_ms.saturating_add(effective);
        entries.push(TimelineEntry {
            shot_id: shot.id,
            url,
            start_ms,
            end_ms: current_ms,
            duration_ms: effective,
            trim_start_ms: shot.trim_start_ms,
            trim_end_ms: shot.trim_end_ms,
            base_duration_ms: base,
            audio_muted: shot.audio_muted,
        });
    }
    entries
}

pub fn total_duration_ms(entries: &[TimelineEntry]) -> Ms {
    entries.last().map(|e| e.end_ms).unwrap_or(0)
}
