use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::Ms;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ShotId(pub Uuid);

impl ShotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ShotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ShotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a shot's video resource. A shot is born `Empty`, moves through
/// `Pending`/`Processing` while generation or upload runs, and ends up
/// `Completed` (playable) or `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ShotVideo {
    Empty,
    Pending,
    Processing,
    Completed {
        url: String,
        /// Last known duration of the clip. The real value is only known once
        /// a media backend has loaded metadata; see `base_duration_ms`.
        #[serde(default)]
        duration_ms: Option<Ms>,
        #[serde(default)]
        thumbnail_url: Option<String>,
    },
    Failed {
        reason: String,
    },
}

impl Default for ShotVideo {
    fn default() -> Self {
        Self::Empty
    }
}

impl ShotVideo {
    /// Url of a playable resource, if this shot has one.
    pub fn playable_url(&self) -> Option<&str> {
        match self {
            ShotVideo::Completed { url, .. } if !url.is_empty() => Some(url),
            _ => None,
        }
    }

    pub fn stored_duration_ms(&self) -> Option<Ms> {
        match self {
            ShotVideo::Completed { duration_ms, .. } => *duration_ms,
            _ => None,
        }
    }
}

/// One ordered video clip within a scene.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shot {
    pub id: ShotId,
    pub order: i32,
    #[serde(default)]
    pub video: ShotVideo,
    #[serde(default)]
    pub trim_start_ms: Ms,
    #[serde(default)]
    pub trim_end_ms: Ms,
    /// Suppress the clip's own embedded audio during playback.
    #[serde(default)]
    pub audio_muted: bool,
    /// Generation prompt; an input to external tooling, irrelevant here.
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Shot {
    pub fn new(order: i32) -> Self {
        Self {
            id: ShotId::new(),
            order,
            video: ShotVideo::Empty,
            trim_start_ms: 0,
            trim_end_ms: 0,
            audio_muted: false,
            prompt: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn is_playable(&self) -> bool {
        self.video.playable_url().is_some()
    }
}

fn default_volume() -> f32 {
    1.0
}

/// One scene-scoped audio layer, positioned on the scene clock independently
/// of any shot. Windows may overlap each other or run past the last shot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioTrack {
    pub id: TrackId,
    pub source_url: String,
    /// Offset from scene start where the track begins playing.
    #[serde(default)]
    pub start_time_ms: Ms,
    /// Effective (post-trim) duration of the track itself.
    pub duration_ms: Ms,
    #[serde(default)]
    pub trim_start_ms: Ms,
    #[serde(default)]
    pub trim_end_ms: Ms,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub muted: bool,
    /// Pre-trim resource, kept so trims stay reversible.
    #[serde(default)]
    pub original_source_url: Option<String>,
    #[serde(default)]
    pub original_duration_ms: Option<Ms>,
}

impl AudioTrack {
    pub fn new(source_url: impl Into<String>, start_time_ms: Ms, duration_ms: Ms) -> Self {
        Self {
            id: TrackId::new(),
            source_url: source_url.into(),
            start_time_ms,
            duration_ms,
            trim_start_ms: 0,
            trim_end_ms: 0,
            volume: 1.0,
            muted: false,
            original_source_url: None,
            original_duration_ms: None,
        }
    }

    pub fn end_time_ms(&self) -> Ms {
        self.start_time_ms.saturating_add(self.duration_ms)
    }

    /// Whether the track should be audible at `global_ms`.
    pub fn contains(&self, global_ms: Ms) -> bool {
        global_ms >= self.start_time_ms && global_ms < self.end_time_ms()
    }
}

/// The playback contract the editor hands to the engine: an ordered set of
/// shots plus the scene's audio layers. How shots are created, uploaded, or
/// persisted is not this crate's concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub shots: Vec<Shot>,
    #[serde(default)]
    pub audio_tracks: Vec<AudioTrack>,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shots: Vec::new(),
            audio_tracks: Vec::new(),
        }
    }

    /// Shots that participate in the timeline: completed with a url, ordered
    /// by `order`. The sort is stable, so shots sharing an `order` value keep
    /// their original array position.
    pub fn playable_shots(&self) -> Vec<&Shot> {
        let mut shots: Vec<&Shot> = self.shots.iter().filter(|s| s.is_playable()).collect();
        shots.sort_by_key(|s| s.order);
        shots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(order: i32, url: &str) -> Shot {
        let mut shot = Shot::new(order);
        shot.video = ShotVideo::Completed {
            url: url.to_string(),
            duration_ms: Some(4000),
            thumbnail_url: None,
        };
        shot
    }

    #[test]
    fn test_playable_filters_unfinished_shots() {
        let mut scene = Scene::new("test");
        scene.shots.push(completed(2, "b.mp4"));
        scene.shots.push(Shot::new(0));
        let mut failed = Shot::new(1);
        failed.video = ShotVideo::Failed {
            reason: "render error".to_string(),
        };
        scene.shots.push(failed);
        scene.shots.push(completed(1, "a.mp4"));

        let playable = scene.playable_shots();
        assert_eq!(playable.len(), 2);
        assert_eq!(playable[0].video.playable_url(), Some("a.mp4"));
        assert_eq!(playable[1].video.playable_url(), Some("b.mp4"));
    }

    #[test]
    fn test_playable_sort_is_stable_on_ties() {
        let mut scene = Scene::new("ties");
        let first = completed(1, "first.mp4");
        let second = completed(1, "second.mp4");
        let first_id = first.id;
        let second_id = second.id;
        scene.shots.push(first);
        scene.shots.push(second);

        let playable = scene.playable_shots();
        assert_eq!(playable[0].id, first_id);
        assert_eq!(playable[1].id, second_id);
    }

    #[test]
    fn test_audio_track_window() {
        let track = AudioTrack::new("music.mp3", 2000, 4000);
        assert!(!track.contains(1999));
        assert!(track.contains(2000));
        assert!(track.contains(5999));
        assert!(!track.contains(6000));
    }

    #[test]
    fn test_shot_video_json_tags() {
        let shot = completed(0, "clip.mp4");
        let json = serde_json::to_value(&shot).unwrap();
        assert_eq!(json["video"]["status"], "completed");
        assert_eq!(json["video"]["url"], "clip.mp4");

        let back: Shot = serde_json::from_value(json).unwrap();
        assert_eq!(back, shot);
    }
}
