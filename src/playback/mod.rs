pub mod engine;
pub mod entry;
mod monitor;
pub mod queue;
pub mod state;

pub use engine::{
    EngineError, Enqueued, PlaybackEngine, PlaylistEnqueued, VoteOutcome, required_votes,
};
pub use entry::{EntryInfo, TrackEntry};
pub use queue::PlaybackQueue;
pub use state::{Activity, EngineSnapshot, EngineState, Phase};
