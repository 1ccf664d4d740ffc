use std::sync::Arc;

use tracing::{debug, info, warn};

use timeline::{
    clamp_global, compute_timeline, global_to_local, local_to_global, total_duration_ms,
    MeasuredDurations, Ms, Shot, ShotId, TimelineEntry,
};

use crate::{EventHub, MasterAudio, MediaError, MediaFactory, MediaHandle, PlayerConfig, PlayerEvent};

/// A deferred reposition waiting for the active handle to become ready. The
/// epoch token ties it to the transition that created it; any newer
/// transition bumps the epoch and the stale entry is dropped instead of
/// racing the new one.
struct PendingPosition {
    epoch: u64,
    local_sec: f64,
    resume: bool,
}

/// Hidden handle buffering the next shot ahead of the boundary. Never the
/// handle the user sees until `switch_to` promotes it.
struct PreloadSlot {
    index: usize,
    shot_id: ShotId,
    handle: Box<dyn MediaHandle>,
}

/// Owns the single active video handle and drives it across the shot
/// timeline: play/pause, seeks, trim-out boundary detection, auto-advance,
/// and lookahead preloading. No other component touches the video handle.
pub struct PlaybackController {
    cfg: PlayerConfig,
    factory: Arc<dyn MediaFactory>,
    events: EventHub,
    shots: Vec<Shot>,
    measured: MeasuredDurations,
    entries: Vec<TimelineEntry>,
    current_index: usize,
    playing: bool,
    video: Option<Box<dyn MediaHandle>>,
    preload: Option<PreloadSlot>,
    preload_failed_index: Option<usize>,
    pending: Option<PendingPosition>,
    epoch: u64,
    master: MasterAudio,
    video_error: Option<String>,
    last_emitted_ms: Option<Ms>,
}

impl PlaybackController {
    pub(crate) fn new(cfg: PlayerConfig, factory: Arc<dyn MediaFactory>, events: EventHub) -> Self {
        Self {
            cfg,
            factory,
            events,
            shots: Vec::new(),
            measured: MeasuredDurations::new(),
            entries: Vec::new(),
            current_index: 0,
            playing: false,
            video: None,
            preload: None,
            preload_failed_index: None,
            pending: None,
            epoch: 0,
            master: MasterAudio::default(),
            video_error: None,
            last_emitted_ms: None,
        }
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn total_duration_ms(&self) -> Ms {
        total_duration_ms(&self.entries)
    }

    pub fn current_shot_index(&self) -> usize {
        self.current_index
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn video_error(&self) -> Option<&str> {
        self.video_error.as_deref()
    }

    /// Volume currently applied to the active handle, for transport UI.
    pub fn video_volume(&self) -> Option<f32> {
        self.video.as_ref().map(|v| v.volume())
    }

    pub fn set_master_audio(&mut self, master: MasterAudio) {
        self.master = master;
    }

    /// Replace the playable shot list (already filtered and ordered). Keeps
    /// the active handle when the current shot survived with the same url;
    /// otherwise playback degrades to a paused state at the first shot.
    pub fn set_shots(&mut self, shots: Vec<Shot>) {
        let previous = self
            .entries
            .get(self.current_index)
            .map(|e| (e.shot_id, e.url.clone()));
        self.shots = shots;
        self.preload = None;
        self.preload_failed_index = None;
        self.pending = None;
        self.epoch += 1;
        self.rebuild_entries();

        let surviving = previous.as_ref().and_then(|(id, url)| {
            self.entries
                .iter()
                .position(|e| e.shot_id == *id && e.url == *url)
        });
        match surviving {
            Some(index) => self.current_index = index,
            None => {
                self.video = None;
                self.video_error = None;
                self.current_index = self.first_playable_index().unwrap_or(0);
                if self.playing {
                    self.playing = false;
                    self.events.emit(PlayerEvent::PlaybackPaused);
                }
            }
        }
    }

    /// Scene time derived from the active handle. Nothing else originates
    /// time; audio and UI both follow this value.
    pub fn global_time_ms(&self) -> Ms {
        let Some(entry) = self.entries.get(self.current_index) else {
            return 0;
        };
        if let Some(video) = self.video.as_ref() {
            if video.is_ready() {
                return local_to_global(entry, video.current_time()).min(entry.end_ms);
            }
        }
        if let Some(pending) = self.pending.as_ref() {
            return local_to_global(entry, pending.local_sec).min(entry.end_ms);
        }
        entry.start_ms
    }

    pub fn play(&mut self) {
        if self.playing {
            return;
        }
        let Some(first) = self.first_playable_index() else {
            debug!("play requested with no playable shots");
            return;
        };
        self.playing = true;
        self.events.emit(PlayerEvent::PlaybackStarted);

        if self.video.is_none() {
            let index = match self.entries.get(self.current_index) {
                Some(entry) if !entry.is_zero_width() => self.current_index,
                _ => first,
            };
            let local_sec = self.entries[index].trim_start_sec();
            self.switch_to(index, local_sec, true);
            return;
        }
        if let Some(pending) = self.pending.as_mut() {
            pending.resume = true;
            return;
        }
        if let Some(video) = self.video.as_mut() {
            if video.is_ready() {
                if let Err(err) = video.play() {
                    self.fail_video(err);
                }
            }
        }
    }

    pub fn pause(&mut self) {
        if !self.playing {
            return;
        }
        self.playing = false;
        if let Some(pending) = self.pending.as_mut() {
            pending.resume = false;
        }
        if let Some(video) = self.video.as_mut() {
            if video.is_playing() {
                video.pause();
            }
        }
        self.events.emit(PlayerEvent::PlaybackPaused);
    }

    pub fn toggle(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Scrub/seek entry point. Resolves the target through the time mapper;
    /// a same-shot seek repositions in place, a cross-shot seek switches the
    /// active handle. Play state is preserved either way.
    pub fn seek_to_global_ms(&mut self, target_ms: Ms) {
        if self.total_duration_ms() == 0 {
            return;
        }
        let clamped = clamp_global(&self.entries, target_ms);
        let Some(pos) = global_to_local(&self.entries, clamped) else {
            return;
        };
        if pos.index == self.current_index && self.video.is_some() {
            let ready = self.video.as_ref().is_some_and(|v| v.is_ready());
            if ready && self.pending.is_none() {
                if let Some(video) = self.video.as_mut() {
                    video.seek(pos.local_sec);
                }
                self.emit_time(clamped);
            } else {
                self.pending = Some(PendingPosition {
                    epoch: self.epoch,
                    local_sec: pos.local_sec,
                    resume: self.playing,
                });
            }
        } else {
            self.switch_to(pos.index, pos.local_sec, self.playing);
        }
    }

    /// Drive one step of the engine. The host calls this from its event
    /// loop; all deferred work (pending repositions, boundary crossings,
    /// preloading, error draining) happens here.
    pub fn tick(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        self.drain_video_error();
        self.record_measured_durations();
        self.apply_pending();
        self.update_playback();
        self.manage_preload();
    }

    fn first_playable_index(&self) -> Option<usize> {
        self.next_playable_index(0)
    }

    fn next_playable_index(&self, from: usize) -> Option<usize> {
        self.entries
            .get(from..)?
            .iter()
            .position(|e| !e.is_zero_width())
            .map(|offset| from + offset)
    }

    fn rebuild_entries(&mut self) {
        let refs: Vec<&Shot> = self.shots.iter().collect();
        self.entries = compute_timeline(&refs, &self.measured, self.cfg.fallback_duration_ms);
        self.events.emit(PlayerEvent::TimelineRecomputed {
            total_duration_ms: self.total_duration_ms(),
        });
    }

    /// Make `index` the active shot. Promotes a matching preload handle or
    /// opens a cold one, seeks the trim head away before anything is heard,
    /// and defers the precise reposition until the handle is ready.
    fn switch_to(&mut self, index: usize, local_sec: f64, resume: bool) {
        self.epoch += 1;
        self.pending = None;
        self.current_index = index;
        self.video_error = None;
        let Some(entry) = self.entries.get(index).cloned() else {
            return;
        };

        let mut handle = match self.preload.take() {
            Some(slot) if slot.index == index && slot.shot_id == entry.shot_id => {
                debug!(index, "promoting preloaded handle");
                Some(slot.handle)
            }
            _ => None,
        };
        if handle.is_none() {
            match self.factory.open(&entry.url) {
                Ok(h) => handle = Some(h),
                Err(err) => {
                    self.video = None;
                    self.events.emit(PlayerEvent::ShotChanged { index });
                    self.fail_video(err);
                    return;
                }
            }
        }
        let mut video = handle.expect("handle opened above");
        video.seek(entry.trim_start_sec());
        let ready = video.is_ready();
        self.video = Some(video);
        self.events.emit(PlayerEvent::ShotChanged { index });

        if ready {
            if let Some(video) = self.video.as_mut() {
                video.seek(local_sec);
                if resume {
                    if let Err(err) = video.play() {
                        self.fail_video(err);
                        return;
                    }
                }
            }
            self.emit_time(local_to_global(&entry, local_sec).min(entry.end_ms));
        } else {
            self.pending = Some(PendingPosition {
                epoch: self.epoch,
                local_sec,
                resume,
            });
        }
    }

    fn drain_video_error(&mut self) {
        let err = self.video.as_mut().and_then(|v| v.take_error());
        if let Some(err) = err {
            self.fail_video(err);
        }
    }

    fn fail_video(&mut self, err: MediaError) {
        warn!(error = %err, "video playback error");
        self.pending = None;
        self.video_error = Some(err.to_string());
        self.events.emit(PlayerEvent::VideoError {
            message: err.to_string(),
        });
        if self.playing {
            self.playing = false;
            self.events.emit(PlayerEvent::PlaybackPaused);
        }
    }

    /// Fold freshly measured durations into the timeline. A better estimate
    /// re-derives entry geometry but never resets a playing handle.
    fn record_measured_durations(&mut self) {
        let mut changed = false;
        if let Some(duration) = self.video.as_ref().and_then(|v| v.duration_sec()) {
            if let Some(shot_id) = self.entries.get(self.current_index).map(|e| e.shot_id) {
                changed |= self
                    .measured
                    .record(shot_id, (duration * 1000.0).round() as Ms);
            }
        }
        if let Some(slot) = self.preload.as_ref() {
            if let Some(duration) = slot.handle.duration_sec() {
                let shot_id = slot.shot_id;
                changed |= self
                    .measured
                    .record(shot_id, (duration * 1000.0).round() as Ms);
            }
        }
        if changed {
            self.rebuild_entries();
        }
    }

    fn apply_pending(&mut self) {
        let Some(pending) = self.pending.as_ref() else {
            return;
        };
        if pending.epoch != self.epoch {
            self.pending = None;
            return;
        }
        if !self.video.as_ref().is_some_and(|v| v.is_ready()) {
            return;
        }
        let pending = self.pending.take().expect("checked above");
        let Some(entry) = self.entries.get(self.current_index).cloned() else {
            return;
        };
        if let Some(video) = self.video.as_mut() {
            video.seek(pending.local_sec);
            if pending.resume {
                if let Err(err) = video.play() {
                    self.fail_video(err);
                    return;
                }
                if !self.playing {
                    self.playing = true;
                    self.events.emit(PlayerEvent::PlaybackStarted);
                }
            }
        }
        self.emit_time(local_to_global(&entry, pending.local_sec).min(entry.end_ms));
    }

    fn update_playback(&mut self) {
        let Some(video) = self.video.as_ref() else {
            return;
        };
        if !video.is_ready() {
            return;
        }
        let local_sec = video.current_time();
        let handle_playing = video.is_playing();
        let Some(entry) = self.entries.get(self.current_index).cloned() else {
            return;
        };

        let embedded_volume = self.master.effective(1.0, entry.audio_muted);
        if let Some(video) = self.video.as_mut() {
            if (video.volume() - embedded_volume).abs() > f32::EPSILON {
                video.set_volume(embedded_volume);
            }
        }

        if self.playing && !handle_playing && self.pending.is_none() {
            if let Some(video) = self.video.as_mut() {
                if let Err(err) = video.play() {
                    self.fail_video(err);
                    return;
                }
            }
        } else if !self.playing && handle_playing {
            if let Some(video) = self.video.as_mut() {
                video.pause();
            }
        }

        if self.playing && local_sec >= entry.out_point_sec() - self.cfg.boundary_tolerance_sec {
            match self.next_playable_index(self.current_index + 1) {
                Some(next) => {
                    info!(from = self.current_index, to = next, "shot boundary, advancing");
                    let local = self.entries[next].trim_start_sec();
                    self.switch_to(next, local, true);
                    return;
                }
                None => {
                    if let Some(video) = self.video.as_mut() {
                        video.pause();
                    }
                    self.playing = false;
                    self.emit_time(entry.end_ms);
                    self.events.emit(PlayerEvent::PlaybackPaused);
                    self.events.emit(PlayerEvent::ReachedEnd);
                    return;
                }
            }
        }

        self.emit_time(local_to_global(&entry, local_sec).min(entry.end_ms));
    }

    /// Open the next shot's handle once the boundary is close. Purely an
    /// optimization: a failed or missing preload falls back to a cold open.
    fn manage_preload(&mut self) {
        if !self.cfg.preload || !self.playing {
            return;
        }
        let Some(video) = self.video.as_ref() else {
            return;
        };
        if !video.is_ready() {
            return;
        }
        let Some(entry) = self.entries.get(self.current_index) else {
            return;
        };
        let remaining = entry.out_point_sec() - video.current_time();
        if remaining > self.cfg.preload_lookahead_sec {
            return;
        }
        let Some(next) = self.next_playable_index(self.current_index + 1) else {
            return;
        };
        if self.preload.as_ref().is_some_and(|slot| slot.index == next)
            || self.preload_failed_index == Some(next)
        {
            return;
        }
        let next_entry = self.entries[next].clone();
        match self.factory.open(&next_entry.url) {
            Ok(mut handle) => {
                handle.seek(next_entry.trim_start_sec());
                debug!(index = next, "preload opened");
                self.preload = Some(PreloadSlot {
                    index: next,
                    shot_id: next_entry.shot_id,
                    handle,
                });
            }
            Err(err) => {
                warn!(error = %err, index = next, "preload failed, will cold-open at the boundary");
                self.preload_failed_index = Some(next);
            }
        }
    }

    fn emit_time(&mut self, global_ms: Ms) {
        if self.last_emitted_ms != Some(global_ms) {
            self.last_emitted_ms = Some(global_ms);
            self.events.emit(PlayerEvent::TimeChanged { global_ms });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimClock, SimMediaFactory, SimMediaSpec};
    use crossbeam_channel::Receiver;
    use timeline::ShotVideo;

    fn shot(url: &str, base_ms: Ms, trim_start_ms: Ms, trim_end_ms: Ms) -> Shot {
        let mut shot = Shot::new(0);
        shot.video = ShotVideo::Completed {
            url: url.to_string(),
            duration_ms: Some(base_ms),
            thumbnail_url: None,
        };
        shot.trim_start_ms = trim_start_ms;
        shot.trim_end_ms = trim_end_ms;
        shot
    }

    fn controller_with(
        shots: Vec<Shot>,
        factory: SimMediaFactory,
    ) -> (PlaybackController, Receiver<PlayerEvent>, SimClock) {
        let clock = factory.clock();
        let (events, rx) = EventHub::new();
        let mut controller =
            PlaybackController::new(PlayerConfig::default(), Arc::new(factory), events);
        controller.set_shots(shots);
        (controller, rx, clock)
    }

    /// Tick at ~40Hz for the given span of simulated seconds.
    fn run(controller: &mut PlaybackController, clock: &SimClock, seconds: f64) {
        let steps = (seconds / 0.025).ceil() as usize;
        for _ in 0..steps {
            clock.advance(0.025);
            controller.tick();
        }
    }

    fn two_shot_setup() -> (PlaybackController, Receiver<PlayerEvent>, SimClock) {
        let factory = SimMediaFactory::new(SimClock::new());
        factory.set_duration("a.mp4", 5.0);
        factory.set_duration("b.mp4", 3.0);
        let shots = vec![shot("a.mp4", 5000, 0, 0), shot("b.mp4", 3000, 500, 0)];
        controller_with(shots, factory)
    }

    #[test]
    fn test_boundary_advances_and_keeps_playing() {
        let (mut controller, rx, clock) = two_shot_setup();
        controller.play();
        run(&mut controller, &clock, 5.2);

        assert_eq!(controller.current_shot_index(), 1);
        assert!(controller.is_playing());
        // Shot 1 entered at its trim head; global time sits a little past the cut.
        let global = controller.global_time_ms();
        assert!((5000..5600).contains(&global), "global was {global}");

        let events: Vec<PlayerEvent> = rx.try_iter().collect();
        assert!(events.contains(&PlayerEvent::ShotChanged { index: 1 }));
        assert!(!events.contains(&PlayerEvent::ReachedEnd));
    }

    #[test]
    fn test_end_of_scene_pauses_and_reports() {
        let factory = SimMediaFactory::new(SimClock::new());
        factory.set_duration("a.mp4", 2.0);
        let (mut controller, rx, clock) = controller_with(vec![shot("a.mp4", 2000, 0, 0)], factory);

        controller.play();
        run(&mut controller, &clock, 2.5);

        assert!(!controller.is_playing());
        assert_eq!(controller.global_time_ms(), 2000);
        let events: Vec<PlayerEvent> = rx.try_iter().collect();
        assert!(events.contains(&PlayerEvent::ReachedEnd));
        assert!(events.contains(&PlayerEvent::PlaybackPaused));
    }

    #[test]
    fn test_trimmed_head_is_skipped_on_load() {
        let factory = SimMediaFactory::new(SimClock::new());
        factory.set_duration("a.mp4", 5.0);
        let (mut controller, _rx, clock) =
            controller_with(vec![shot("a.mp4", 5000, 500, 0)], factory);

        controller.play();
        assert_eq!(controller.global_time_ms(), 0);
        run(&mut controller, &clock, 0.1);
        // 0.1s of playback from a 0.5s trim head: local ~0.6s, global ~100ms.
        let global = controller.global_time_ms();
        assert!((50..250).contains(&global), "global was {global}");
    }

    #[test]
    fn test_seek_crosses_shots_and_preserves_pause() {
        let (mut controller, rx, _clock) = two_shot_setup();
        controller.seek_to_global_ms(6000);

        assert_eq!(controller.current_shot_index(), 1);
        assert_eq!(controller.global_time_ms(), 6000);
        assert!(!controller.is_playing());
        let events: Vec<PlayerEvent> = rx.try_iter().collect();
        assert!(events.contains(&PlayerEvent::ShotChanged { index: 1 }));
    }

    #[test]
    fn test_newer_seek_supersedes_pending_one() {
        let factory = SimMediaFactory::new(SimClock::new());
        factory.set_duration("a.mp4", 5.0);
        factory.set_spec(
            "b.mp4",
            SimMediaSpec {
                duration_sec: 3.0,
                load_delay_sec: 1.0,
                ..SimMediaSpec::default()
            },
        );
        let shots = vec![shot("a.mp4", 5000, 0, 0), shot("b.mp4", 3000, 500, 0)];
        let (mut controller, _rx, clock) = controller_with(shots, factory);

        controller.play();
        controller.seek_to_global_ms(5500); // shot 1, still loading
        assert_eq!(controller.current_shot_index(), 1);
        controller.seek_to_global_ms(2000); // back into shot 0 before it resolves

        run(&mut controller, &clock, 1.5); // long enough for shot 1 to have loaded
        assert_eq!(controller.current_shot_index(), 0);
        assert!(controller.is_playing());
        let global = controller.global_time_ms();
        assert!((2000..4200).contains(&global), "global was {global}");
    }

    #[test]
    fn test_zero_width_shots_are_skipped_on_advance() {
        let factory = SimMediaFactory::new(SimClock::new());
        factory.set_duration("a.mp4", 1.0);
        factory.set_duration("b.mp4", 1.0);
        factory.set_duration("c.mp4", 2.0);
        let shots = vec![
            shot("a.mp4", 1000, 0, 0),
            shot("b.mp4", 1000, 500, 500), // trimmed to nothing
            shot("c.mp4", 2000, 0, 0),
        ];
        let (mut controller, _rx, clock) = controller_with(shots, factory);

        controller.play();
        run(&mut controller, &clock, 1.2);
        assert_eq!(controller.current_shot_index(), 2);
        assert!(controller.is_playing());
    }

    #[test]
    fn test_open_failure_leaves_transport_usable() {
        let factory = SimMediaFactory::new(SimClock::new());
        factory.set_spec(
            "broken.mp4",
            SimMediaSpec {
                fail_open: true,
                ..SimMediaSpec::default()
            },
        );
        factory.set_duration("b.mp4", 3.0);
        let shots = vec![
            shot("broken.mp4", 5000, 0, 0),
            shot("b.mp4", 3000, 500, 0),
        ];
        let (mut controller, rx, _clock) = controller_with(shots, factory);

        controller.play();
        assert!(controller.video_error().is_some());
        assert!(!controller.is_playing());
        let events: Vec<PlayerEvent> = rx.try_iter().collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, PlayerEvent::VideoError { .. })));

        // Skipping to the healthy shot recovers.
        controller.seek_to_global_ms(6000);
        assert_eq!(controller.current_shot_index(), 1);
        assert!(controller.video_error().is_none());
        assert_eq!(controller.global_time_ms(), 6000);
    }

    #[test]
    fn test_measured_duration_rederives_timeline() {
        let factory = SimMediaFactory::new(SimClock::new());
        factory.set_duration("a.mp4", 5.0);
        // Editor stored a stale 4000ms estimate.
        let (mut controller, rx, _clock) = controller_with(vec![shot("a.mp4", 4000, 0, 0)], factory);
        assert_eq!(controller.total_duration_ms(), 4000);

        controller.play();
        controller.tick();
        assert_eq!(controller.total_duration_ms(), 5000);
        assert!(controller.is_playing());
        let events: Vec<PlayerEvent> = rx.try_iter().collect();
        assert!(events.contains(&PlayerEvent::TimelineRecomputed {
            total_duration_ms: 5000
        }));
    }

    #[test]
    fn test_failed_preload_falls_back_to_cold_open() {
        let factory = SimMediaFactory::new(SimClock::new());
        factory.set_duration("a.mp4", 2.0);
        factory.set_spec(
            "late.mp4",
            SimMediaSpec {
                fail_open: true,
                ..SimMediaSpec::default()
            },
        );
        let shots = vec![shot("a.mp4", 2000, 0, 0), shot("late.mp4", 3000, 0, 0)];
        let (mut controller, _rx, clock) = controller_with(shots, factory);

        controller.play();
        run(&mut controller, &clock, 2.2);
        // The cold open at the boundary fails too; the error is surfaced and
        // playback stops instead of panicking.
        assert_eq!(controller.current_shot_index(), 1);
        assert!(controller.video_error().is_some());
        assert!(!controller.is_playing());
    }

    #[test]
    fn test_empty_scene_is_inert() {
        let factory = SimMediaFactory::new(SimClock::new());
        let (mut controller, rx, _clock) = controller_with(Vec::new(), factory);

        controller.play();
        controller.tick();
        controller.seek_to_global_ms(1000);
        assert!(!controller.is_playing());
        assert_eq!(controller.total_duration_ms(), 0);
        assert_eq!(controller.global_time_ms(), 0);
        let events: Vec<PlayerEvent> = rx.try_iter().collect();
        assert!(!events.contains(&PlayerEvent::PlaybackStarted));
    }

    #[test]
    fn test_master_mute_silences_embedded_audio() {
        let (mut controller, _rx, clock) = two_shot_setup();
        controller.play();
        run(&mut controller, &clock, 0.1);
        assert_eq!(controller.video_volume(), Some(1.0));

        controller.set_master_audio(MasterAudio {
            volume: 1.0,
            muted: true,
        });
        run(&mut controller, &clock, 0.1);
        assert_eq!(controller.video_volume(), Some(0.0));
    }
}
