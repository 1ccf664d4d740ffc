use serde::{Deserialize, Serialize};
use timeline::{Ms, FALLBACK_DURATION_MS};

/// Playback tuning knobs. The defaults assume the host ticks the player at
/// roughly 30-60 Hz; a slower tick needs a wider boundary tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Slack when testing the trim-out boundary; an exact-equality test would
    /// miss the boundary between ticks.
    #[serde(default = "default_boundary_tolerance_sec")]
    pub boundary_tolerance_sec: f64,
    /// Audio is only repositioned when it drifts further than this from its
    /// target; constant micro-seeking stutters audibly.
    #[serde(default = "default_drift_tolerance_sec")]
    pub drift_tolerance_sec: f64,
    /// Open the next shot's handle ahead of the boundary for a seamless cut.
    #[serde(default = "default_preload")]
    pub preload: bool,
    #[serde(default = "default_preload_lookahead_sec")]
    pub preload_lookahead_sec: f64,
    /// Base duration assumed for clips with no stored or measured duration.
    #[serde(default = "default_fallback_duration_ms")]
    pub fallback_duration_ms: Ms,
}

fn default_boundary_tolerance_sec() -> f64 {
    0.05
}

fn default_drift_tolerance_sec() -> f64 {
    0.1
}

fn default_preload() -> bool {
    true
}

fn default_preload_lookahead_sec() -> f64 {
    1.0
}

fn default_fallback_duration_ms() -> Ms {
    FALLBACK_DURATION_MS
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            boundary_tolerance_sec: default_boundary_tolerance_sec(),
            drift_tolerance_sec: default_drift_tolerance_sec(),
            preload: default_preload(),
            preload_lookahead_sec: default_preload_lookahead_sec(),
            fallback_duration_ms: default_fallback_duration_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let cfg: PlayerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.boundary_tolerance_sec, 0.05);
        assert_eq!(cfg.drift_tolerance_sec, 0.1);
        assert!(cfg.preload);
        assert_eq!(cfg.fallback_duration_ms, FALLBACK_DURATION_MS);
    }
}
