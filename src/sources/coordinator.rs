use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{LoadFailure, LoadQuery, LoadResult, LoadService, PendingSessions};
use crate::{
    common::{GuildId, UserId},
    configs::LoaderConfig,
    protocol::TrackHandle,
};

#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub guild_id: GuildId,
    pub requester: UserId,
    /// Raw user input.
    pub query: String,
    /// Whether the caller can ask the requester to pick among results.
    pub allow_choice: bool,
}

/// A load result classified into the action the caller should take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Single(TrackHandle),
    Playlist {
        name: Option<String>,
        tracks: Vec<TrackHandle>,
    },
    /// Several search hits; a pending session now holds them.
    Choose(Vec<TrackHandle>),
    NoMatch,
    Failure(LoadFailure),
}

impl LoadOutcome {
    /// Multi-track results are playlists when the query named them directly
    /// and choices when it was a search.
    pub fn classify(
        query: &LoadQuery,
        result: LoadResult,
        allow_choice: bool,
        max_choices: usize,
    ) -> Self {
        match result {
            LoadResult::Track(track) => Self::Single(track),
            LoadResult::Empty => Self::NoMatch,
            LoadResult::Error(failure) => Self::Failure(failure),
            LoadResult::Playlist { name, tracks } => {
                if query.is_search() {
                    Self::choices(tracks, allow_choice, max_choices)
                } else {
                    Self::playlist(name, tracks)
                }
            }
            LoadResult::Search(tracks) => {
                if query.is_search() {
                    Self::choices(tracks, allow_choice, max_choices)
                } else {
                    Self::playlist(None, tracks)
                }
            }
        }
    }

    fn playlist(name: Option<String>, tracks: Vec<TrackHandle>) -> Self {
        if tracks.is_empty() {
            Self::NoMatch
        } else {
            Self::Playlist { name, tracks }
        }
    }

    fn choices(mut tracks: Vec<TrackHandle>, allow_choice: bool, max_choices: usize) -> Self {
        if tracks.is_empty() {
            return Self::NoMatch;
        }
        tracks.truncate(max_choices.max(1));
        if tracks.len() == 1 || !allow_choice {
            Self::Single(tracks.swap_remove(0))
        } else {
            Self::Choose(tracks)
        }
    }
}

/// Receives the classified outcome of a [`LoadCoordinator::resolve`] call.
#[async_trait]
pub trait LoadHandler: Send + Sync {
    async fn on_single(&self, request: &LoadRequest, track: TrackHandle);

    async fn on_playlist(
        &self,
        request: &LoadRequest,
        name: Option<String>,
        tracks: Vec<TrackHandle>,
    );

    async fn on_choice(&self, request: &LoadRequest, choices: Vec<TrackHandle>);

    async fn on_no_match(&self, request: &LoadRequest);

    async fn on_failure(&self, request: &LoadRequest, failure: LoadFailure);
}

/// Turns user queries into playback decisions. Exactly one load service
/// call per request; failures are forwarded, never retried.
pub struct LoadCoordinator {
    service: Arc<dyn LoadService>,
    pending: Arc<PendingSessions>,
    default_prefix: String,
    max_choices: usize,
}

impl LoadCoordinator {
    pub fn new(
        service: Arc<dyn LoadService>,
        pending: Arc<PendingSessions>,
        config: &LoaderConfig,
    ) -> Self {
        Self {
            service,
            pending,
            default_prefix: config.default_search_prefix.clone(),
            max_choices: config.max_choices,
        }
    }

    pub fn pending(&self) -> &Arc<PendingSessions> {
        &self.pending
    }

    pub async fn load(&self, request: &LoadRequest) -> LoadOutcome {
        let Some(query) = LoadQuery::parse(&request.query, &self.default_prefix) else {
            return LoadOutcome::NoMatch;
        };

        let result = self.service.load(&query.identifier).await;
        let outcome =
            LoadOutcome::classify(&query, result, request.allow_choice, self.max_choices);
        if let LoadOutcome::Choose(choices) = &outcome {
            self.pending.insert(
                request.guild_id,
                request.requester,
                request.query.clone(),
                choices.clone(),
            );
        }
        debug!(
            "[{}] '{}' resolved: {}",
            request.guild_id,
            query.identifier,
            outcome_name(&outcome)
        );
        outcome
    }

    /// Runs the load on its own task and hands the outcome to `handler`.
    /// Callers never wait on the load service.
    pub fn resolve(
        self: &Arc<Self>,
        request: LoadRequest,
        handler: Arc<dyn LoadHandler>,
    ) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            match this.load(&request).await {
                LoadOutcome::Single(track) => handler.on_single(&request, track).await,
                LoadOutcome::Playlist { name, tracks } => {
                    handler.on_playlist(&request, name, tracks).await
                }
                LoadOutcome::Choose(choices) => handler.on_choice(&request, choices).await,
                LoadOutcome::NoMatch => handler.on_no_match(&request).await,
                LoadOutcome::Failure(failure) => handler.on_failure(&request, failure).await,
            }
        })
    }
}

fn outcome_name(outcome: &LoadOutcome) -> &'static str {
    match outcome {
        LoadOutcome::Single(_) => "single",
        LoadOutcome::Playlist { .. } => "playlist",
        LoadOutcome::Choose(_) => "choose",
        LoadOutcome::NoMatch => "no match",
        LoadOutcome::Failure(_) => "failure",
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use parking_lot::Mutex;

    use super::*;
    use crate::{common::Severity, testing::track};

    struct CannedService {
        result: LoadResult,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl CannedService {
        fn new(result: LoadResult) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LoadService for CannedService {
        async fn load(&self, identifier: &str) -> LoadResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(identifier.to_string());
            self.result.clone()
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LoadHandler for Recorder {
        async fn on_single(&self, _: &LoadRequest, track: TrackHandle) {
            self.calls.lock().push(format!("single:{}", track.title));
        }

        async fn on_playlist(&self, _: &LoadRequest, name: Option<String>, tracks: Vec<TrackHandle>) {
            self.calls
                .lock()
                .push(format!("playlist:{}:{}", name.unwrap_or_default(), tracks.len()));
        }

        async fn on_choice(&self, _: &LoadRequest, choices: Vec<TrackHandle>) {
            self.calls.lock().push(format!("choice:{}", choices.len()));
        }

        async fn on_no_match(&self, _: &LoadRequest) {
            self.calls.lock().push("none".into());
        }

        async fn on_failure(&self, _: &LoadRequest, failure: LoadFailure) {
            self.calls.lock().push(format!("failure:{}", failure.message));
        }
    }

    fn coordinator(service: Arc<CannedService>) -> Arc<LoadCoordinator> {
        Arc::new(LoadCoordinator::new(
            service,
            Arc::new(PendingSessions::new(Duration::from_secs(25))),
            &LoaderConfig::default(),
        ))
    }

    fn request(query: &str, allow_choice: bool) -> LoadRequest {
        LoadRequest {
            guild_id: GuildId(1),
            requester: UserId(2),
            query: query.to_string(),
            allow_choice,
        }
    }

    async fn run(service: Arc<CannedService>, req: LoadRequest) -> Vec<String> {
        let recorder = Arc::new(Recorder::default());
        coordinator(service)
            .resolve(req, recorder.clone())
            .await
            .unwrap();
        let calls = recorder.calls.lock().clone();
        calls
    }

    fn six() -> Vec<TrackHandle> {
        ["A", "B", "C", "D", "E", "F"].iter().map(|t| track(t)).collect()
    }

    #[tokio::test]
    async fn test_single_track() {
        let service = CannedService::new(LoadResult::Track(track("A")));
        assert_eq!(run(service, request("https://x.test/a", true)).await, ["single:A"]);
    }

    #[tokio::test]
    async fn test_search_creates_pending_choice() {
        let service = CannedService::new(LoadResult::Search(six()));
        let coordinator = coordinator(service.clone());
        let outcome = coordinator.load(&request("lofi", true)).await;

        let LoadOutcome::Choose(choices) = outcome else {
            panic!("expected choices, got {outcome:?}");
        };
        assert_eq!(choices.len(), 5);
        assert_eq!(service.seen.lock().as_slice(), ["ytsearch:lofi"]);
        assert_eq!(
            coordinator
                .pending()
                .choose(GuildId(1), UserId(2), 4)
                .unwrap()
                .title,
            "E"
        );
    }

    #[tokio::test]
    async fn test_search_without_choice_takes_first() {
        let service = CannedService::new(LoadResult::Search(six()));
        assert_eq!(run(service, request("lofi", false)).await, ["single:A"]);
    }

    #[tokio::test]
    async fn test_direct_url_with_many_tracks_is_playlist() {
        let service = CannedService::new(LoadResult::Playlist {
            name: Some("Mix".into()),
            tracks: six(),
        });
        assert_eq!(
            run(service, request("https://x.test/list", true)).await,
            ["playlist:Mix:6"]
        );
    }

    #[tokio::test]
    async fn test_empty_results_are_no_match() {
        let service = CannedService::new(LoadResult::Search(Vec::new()));
        assert_eq!(run(service.clone(), request("nothing", true)).await, ["none"]);

        let service = CannedService::new(LoadResult::Empty);
        assert_eq!(run(service, request("nothing", true)).await, ["none"]);
    }

    #[tokio::test]
    async fn test_blank_query_skips_service() {
        let service = CannedService::new(LoadResult::Track(track("A")));
        assert_eq!(run(service.clone(), request("   ", true)).await, ["none"]);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_is_forwarded_without_retry() {
        let service = CannedService::new(LoadResult::Error(LoadFailure {
            message: "rate limited".into(),
            severity: Severity::Suspicious,
        }));
        assert_eq!(
            run(service.clone(), request("lofi", true)).await,
            ["failure:rate limited"]
        );
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }
}
