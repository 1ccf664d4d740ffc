use std::sync::Arc;

use crossbeam_channel::Receiver;

use timeline::{Ms, Scene, Shot, TimelineEntry};

use crate::{
    AudioSyncEngine, EventHub, MasterAudio, MediaFactory, PlaybackController, PlayerConfig,
    PlayerEvent,
};

/// One scene's playback: the controller drives the video timeline, the audio
/// engine follows the derived scene clock. The host owns the loop and calls
/// `tick` once per frame.
pub struct ScenePlayer {
    controller: PlaybackController,
    audio: AudioSyncEngine,
    events_rx: Receiver<PlayerEvent>,
}

impl ScenePlayer {
    pub fn new(cfg: PlayerConfig, factory: Arc<dyn MediaFactory>) -> Self {
        let (events, events_rx) = EventHub::new();
        Self {
            controller: PlaybackController::new(cfg.clone(), factory.clone(), events),
            audio: AudioSyncEngine::new(cfg, factory),
            events_rx,
        }
    }

    /// Event stream for the surrounding UI. Clones share the same queue.
    pub fn events(&self) -> Receiver<PlayerEvent> {
        self.events_rx.clone()
    }

    /// Load (or reload) the scene. Call again whenever shots, trims or audio
    /// tracks change; the derived timeline is recomputed from scratch.
    pub fn set_scene(&mut self, scene: &Scene) {
        let shots: Vec<Shot> = scene.playable_shots().into_iter().cloned().collect();
        self.controller.set_shots(shots);
        self.audio.set_tracks(&scene.audio_tracks);
    }

    pub fn play(&mut self) {
        self.controller.play();
        self.sync_audio();
    }

    pub fn pause(&mut self) {
        self.controller.pause();
        self.sync_audio();
    }

    pub fn toggle(&mut self) {
        self.controller.toggle();
        self.sync_audio();
    }

    pub fn seek_to_ms(&mut self, global_ms: Ms) {
        self.controller.seek_to_global_ms(global_ms);
        self.sync_audio();
    }

    pub fn tick(&mut self) {
        self.controller.tick();
        self.sync_audio();
    }

    fn sync_audio(&mut self) {
        let global_ms = self.controller.global_time_ms();
        self.audio.sync(global_ms, self.controller.is_playing());
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        let mut master = self.audio.master();
        master.volume = volume.clamp(0.0, 1.0);
        self.apply_master(master);
    }

    pub fn set_master_muted(&mut self, muted: bool) {
        let mut master = self.audio.master();
        master.muted = muted;
        self.apply_master(master);
    }

    fn apply_master(&mut self, master: MasterAudio) {
        self.audio.set_master(master);
        self.controller.set_master_audio(master);
        self.sync_audio();
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        self.controller.entries()
    }

    pub fn total_duration_ms(&self) -> Ms {
        self.controller.total_duration_ms()
    }

    pub fn global_time_ms(&self) -> Ms {
        self.controller.global_time_ms()
    }

    pub fn current_shot_index(&self) -> usize {
        self.controller.current_shot_index()
    }

    pub fn is_playing(&self) -> bool {
        self.controller.is_playing()
    }

    pub fn video_error(&self) -> Option<&str> {
        self.controller.video_error()
    }

    pub fn audio(&self) -> &AudioSyncEngine {
        &self.audio
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }
}
