//! Track resolution: query classification, the remote load service, and
//! the coordinator that turns load results into playback decisions.

pub mod coordinator;
pub mod pending;
pub mod query;
pub mod remote;

use async_trait::async_trait;

pub use coordinator::{LoadCoordinator, LoadHandler, LoadOutcome, LoadRequest};
pub use pending::{ChoiceError, PendingSessions};
pub use query::{LoadQuery, QueryKind};
pub use remote::RemoteLoadService;

use crate::{common::Severity, protocol::TrackHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub message: String,
    pub severity: Severity,
}

impl LoadFailure {
    pub fn fault(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Fault,
        }
    }
}

/// What the load service made of an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadResult {
    Track(TrackHandle),
    Playlist {
        name: Option<String>,
        tracks: Vec<TrackHandle>,
    },
    Search(Vec<TrackHandle>),
    Empty,
    Error(LoadFailure),
}

/// Resolves identifiers into tracks. Implementations must be safe to call
/// concurrently for different guilds.
#[async_trait]
pub trait LoadService: Send + Sync {
    async fn load(&self, identifier: &str) -> LoadResult;
}
