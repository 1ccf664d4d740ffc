use crossbeam_channel::{unbounded, Receiver, Sender};
use timeline::Ms;

/// Notifications the surrounding editor UI consumes. The engine never calls
/// back into the host; it only emits.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    PlaybackStarted,
    PlaybackPaused,
    ShotChanged { index: usize },
    TimeChanged { global_ms: Ms },
    TimelineRecomputed { total_duration_ms: Ms },
    ReachedEnd,
    VideoError { message: String },
}

#[derive(Clone)]
pub(crate) struct EventHub {
    tx: Sender<PlayerEvent>,
}

impl EventHub {
    pub(crate) fn new() -> (Self, Receiver<PlayerEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    pub(crate) fn emit(&self, event: PlayerEvent) {
        // A host that dropped its receiver just stops listening.
        let _ = self.tx.send(event);
    }
}
