use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::{LoadFailure, LoadResult, LoadService};
use crate::{
    common::HttpClient,
    configs::LoaderConfig,
    protocol::{LoadResponse, Track, TrackHandle},
};

/// Resolves identifiers through a node speaking the `/v4/loadtracks`
/// REST protocol.
pub struct RemoteLoadService {
    client: Client,
    base_url: String,
    password: String,
}

impl RemoteLoadService {
    pub fn new(config: &LoaderConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: HttpClient::new(config.request_timeout())?,
            base_url: config.node_url.trim_end_matches('/').to_string(),
            password: config.node_password.clone(),
        })
    }

    fn url(&self, identifier: &str) -> String {
        format!(
            "{}/v4/loadtracks?identifier={}",
            self.base_url,
            urlencoding::encode(identifier)
        )
    }

    async fn fetch(&self, identifier: &str) -> Result<LoadResponse, reqwest::Error> {
        self.client
            .get(self.url(identifier))
            .header("Authorization", &self.password)
            .send()
            .await?
            .error_for_status()?
            .json::<LoadResponse>()
            .await
    }
}

#[async_trait]
impl LoadService for RemoteLoadService {
    async fn load(&self, identifier: &str) -> LoadResult {
        debug!("loading '{}' from {}", identifier, self.base_url);
        match self.fetch(identifier).await {
            Ok(response) => response.into(),
            Err(e) => {
                warn!("load request for '{}' failed: {}", identifier, e);
                LoadResult::Error(LoadFailure::fault(e.to_string()))
            }
        }
    }
}

impl From<LoadResponse> for LoadResult {
    fn from(response: LoadResponse) -> Self {
        let handles = |tracks: Vec<Track>| -> Vec<TrackHandle> {
            tracks.into_iter().map(|t| TrackHandle::from(t.info)).collect()
        };

        match response {
            LoadResponse::Track(track) => Self::Track(track.info.into()),
            LoadResponse::Playlist(data) => Self::Playlist {
                name: Some(data.info.name).filter(|n| !n.trim().is_empty()),
                tracks: handles(data.tracks),
            },
            LoadResponse::Search(tracks) => Self::Search(handles(tracks)),
            LoadResponse::Empty {} => Self::Empty,
            LoadResponse::Error(e) => Self::Error(LoadFailure {
                message: e.message.unwrap_or(e.cause),
                severity: e.severity,
            }),
        }
    }
}
