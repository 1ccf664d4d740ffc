//! Deterministic media backend for headless simulation and tests. Handles
//! share a manually advanced clock and keep an anchor (media position at the
//! clock instant playback last changed), so position math matches a real
//! element advancing on its own timer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{MediaError, MediaFactory, MediaHandle};

/// Manually advanced clock shared by every simulated handle.
#[derive(Clone, Default)]
pub struct SimClock(Arc<Mutex<f64>>);

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, dt_sec: f64) {
        *self.0.lock() += dt_sec.max(0.0);
    }

    pub fn now(&self) -> f64 {
        *self.0.lock()
    }
}

/// Behavior of one simulated url.
#[derive(Debug, Clone)]
pub struct SimMediaSpec {
    pub duration_sec: f64,
    /// Clock seconds before the handle reports ready.
    pub load_delay_sec: f64,
    pub fail_open: bool,
    /// Reject `play()` the way a browser autoplay policy would.
    pub reject_play: bool,
}

impl Default for SimMediaSpec {
    fn default() -> Self {
        Self {
            duration_sec: 5.0,
            load_delay_sec: 0.0,
            fail_open: false,
            reject_play: false,
        }
    }
}

pub struct SimMediaFactory {
    clock: SimClock,
    specs: Mutex<HashMap<String, SimMediaSpec>>,
}

impl SimMediaFactory {
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            specs: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_spec(&self, url: impl Into<String>, spec: SimMediaSpec) {
        self.specs.lock().insert(url.into(), spec);
    }

    pub fn set_duration(&self, url: impl Into<String>, duration_sec: f64) {
        self.set_spec(
            url,
            SimMediaSpec {
                duration_sec,
                ..SimMediaSpec::default()
            },
        );
    }

    pub fn clock(&self) -> SimClock {
        self.clock.clone()
    }
}

impl MediaFactory for SimMediaFactory {
    fn open(&self, url: &str) -> Result<Box<dyn MediaHandle>, MediaError> {
        let spec = self.specs.lock().get(url).cloned().unwrap_or_default();
        if spec.fail_open {
            return Err(MediaError::OpenFailed {
                url: url.to_string(),
                reason: "simulated open failure".to_string(),
            });
        }
        Ok(Box::new(SimMedia {
            spec,
            clock: self.clock.clone(),
            opened_at: self.clock.now(),
            playing: false,
            anchor_clock_sec: 0.0,
            anchor_media_sec: 0.0,
            volume: 1.0,
        }))
    }
}

pub struct SimMedia {
    spec: SimMediaSpec,
    clock: SimClock,
    opened_at: f64,
    playing: bool,
    anchor_clock_sec: f64,
    anchor_media_sec: f64,
    volume: f32,
}

impl SimMedia {
    fn position(&self) -> f64 {
        if self.playing {
            let elapsed = self.clock.now() - self.anchor_clock_sec;
            (self.anchor_media_sec + elapsed).min(self.spec.duration_sec)
        } else {
            self.anchor_media_sec
        }
    }
}

impl MediaHandle for SimMedia {
    fn play(&mut self) -> Result<(), MediaError> {
        if self.spec.reject_play {
            return Err(MediaError::PlayRejected("autoplay policy".to_string()));
        }
        if !self.playing {
            // re-anchor to avoid jumps
            self.anchor_clock_sec = self.clock.now();
            self.playing = true;
        }
        Ok(())
    }

    fn pause(&mut self) {
        if self.playing {
            self.anchor_media_sec = self.position();
            self.playing = false;
        }
    }

    fn seek(&mut self, position_sec: f64) {
        self.anchor_media_sec = position_sec.clamp(0.0, self.spec.duration_sec);
        self.anchor_clock_sec = self.clock.now();
    }

    fn current_time(&self) -> f64 {
        self.position()
    }

    fn duration_sec(&self) -> Option<f64> {
        self.is_ready().then_some(self.spec.duration_sec)
    }

    fn is_ready(&self) -> bool {
        self.clock.now() >= self.opened_at + self.spec.load_delay_sec
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn take_error(&mut self) -> Option<MediaError> {
        None
    }
}
