use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MediaError {
    #[error("failed to open media source {url}: {reason}")]
    OpenFailed { url: String, reason: String },
    #[error("playback rejected by the media backend: {0}")]
    PlayRejected(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// One playable media resource (a video clip or an audio layer), owned by
/// exactly one engine component at a time. Implemented per platform; the
/// timeline and sync logic never touch a real media element directly.
pub trait MediaHandle {
    /// May be rejected by the backend (e.g. an autoplay policy). Audio
    /// callers ignore the rejection; the primary video surfaces it.
    fn play(&mut self) -> Result<(), MediaError>;
    fn pause(&mut self);
    fn seek(&mut self, position_sec: f64);
    fn current_time(&self) -> f64;
    /// `None` until the backend has loaded enough metadata to know.
    fn duration_sec(&self) -> Option<f64>;
    fn is_ready(&self) -> bool;
    fn is_playing(&self) -> bool;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    /// Drain a load/decode error raised since the last call.
    fn take_error(&mut self) -> Option<MediaError>;
}

/// Opens handles for media urls. The engine holds one factory and opens a
/// fresh handle per shot or track; preloading uses a second, hidden handle
/// from the same factory.
pub trait MediaFactory: Send + Sync {
    fn open(&self, url: &str) -> Result<Box<dyn MediaHandle>, MediaError>;
}
