use std::sync::Arc;

use tracing::{debug, warn};

use timeline::{AudioTrack, Ms};

use crate::{MediaFactory, MediaHandle, PlayerConfig};

/// Master bus applied multiplicatively to every track and to the shot's own
/// embedded audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterAudio {
    pub volume: f32,
    pub muted: bool,
}

impl Default for MasterAudio {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
        }
    }
}

impl MasterAudio {
    pub fn effective(&self, volume: f32, muted: bool) -> f32 {
        if muted || self.muted {
            0.0
        } else {
            (volume * self.volume).clamp(0.0, 1.0)
        }
    }
}

struct TrackSlot {
    track: AudioTrack,
    handle: Option<Box<dyn MediaHandle>>,
    open_failed: bool,
}

/// Keeps every audio track's handle where the scene clock says it should be.
/// Tracks have no seek or transition logic of their own: scrubbing, skipping
/// shots and pausing all resolve through the same re-evaluation against
/// (global time, play state).
pub struct AudioSyncEngine {
    cfg: PlayerConfig,
    factory: Arc<dyn MediaFactory>,
    master: MasterAudio,
    slots: Vec<TrackSlot>,
}

impl AudioSyncEngine {
    pub(crate) fn new(cfg: PlayerConfig, factory: Arc<dyn MediaFactory>) -> Self {
        Self {
            cfg,
            factory,
            master: MasterAudio::default(),
            slots: Vec::new(),
        }
    }

    pub fn master(&self) -> MasterAudio {
        self.master
    }

    pub fn set_master(&mut self, master: MasterAudio) {
        self.master = master;
    }

    /// Replace the track list, reusing handles whose id and source survived.
    pub fn set_tracks(&mut self, tracks: &[AudioTrack]) {
        let mut previous: Vec<TrackSlot> = std::mem::take(&mut self.slots);
        for track in tracks {
            let found = previous.iter().position(|slot| {
                slot.track.id == track.id && slot.track.source_url == track.source_url
            });
            let reused = found.map(|i| previous.swap_remove(i));
            match reused {
                Some(mut slot) => {
                    slot.track = track.clone();
                    self.slots.push(slot);
                }
                None => {
                    let (handle, open_failed) = match self.factory.open(&track.source_url) {
                        Ok(handle) => (Some(handle), false),
                        Err(err) => {
                            warn!(error = %err, url = %track.source_url, "audio track failed to open");
                            (None, true)
                        }
                    };
                    self.slots.push(TrackSlot {
                        track: track.clone(),
                        handle,
                        open_failed,
                    });
                }
            }
        }
        // Anything left in `previous` was removed; dropping the slot stops it.
    }

    /// Reconcile every track against the scene clock. Invoked on every
    /// global-time change and on every play/pause transition.
    pub fn sync(&mut self, global_ms: Ms, playing: bool) {
        let drift_tolerance = self.cfg.drift_tolerance_sec;
        let master = self.master;
        for slot in &mut self.slots {
            if slot.open_failed {
                continue;
            }
            let Some(handle) = slot.handle.as_mut() else {
                continue;
            };
            let track = &slot.track;

            if !track.contains(global_ms) {
                // Idempotent: do not re-pause an already-paused handle.
                if handle.is_playing() {
                    handle.pause();
                }
                continue;
            }
            if !handle.is_ready() {
                continue;
            }

            let target_sec =
                (global_ms - track.start_time_ms + track.trim_start_ms) as f64 / 1000.0;
            if (handle.current_time() - target_sec).abs() > drift_tolerance {
                handle.seek(target_sec);
            }

            let volume = master.effective(track.volume, track.muted);
            if (handle.volume() - volume).abs() > f32::EPSILON {
                handle.set_volume(volume);
            }

            if playing && !handle.is_playing() {
                // A track that cannot start must not take the scene down.
                if let Err(err) = handle.play() {
                    debug!(error = %err, track = %track.id, "audio play rejected, ignoring");
                }
            } else if !playing && handle.is_playing() {
                handle.pause();
            }
        }
    }

    /// Local playback position of a track, for inspection and tests.
    pub fn track_position_sec(&self, index: usize) -> Option<f64> {
        self.slots
            .get(index)
            .and_then(|slot| slot.handle.as_ref())
            .map(|handle| handle.current_time())
    }

    pub fn track_is_playing(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .and_then(|slot| slot.handle.as_ref())
            .map(|handle| handle.is_playing())
            .unwrap_or(false)
    }

    pub fn track_volume(&self, index: usize) -> Option<f32> {
        self.slots
            .get(index)
            .and_then(|slot| slot.handle.as_ref())
            .map(|handle| handle.volume())
    }
}
