use thiserror::Error;

mod scene;
pub use scene::*;
mod entries;
pub use entries::*;
mod mapping;
pub use mapping::*;
mod layout;
pub use layout::*;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("invalid operation: {0}")]
    InvalidOp(String),
    #[error("global time {0}ms outside scene range 0..{1}ms")]
    OutOfRange(Ms, Ms),
}

pub type Ms = u64; // integer milliseconds on the scene clock
