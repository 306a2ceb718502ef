use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::Severity;

/// A resolved, playable item. Produced by a load service and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackHandle {
    pub identifier: String,
    /// Source URI; the identity of the track.
    pub uri: String,
    pub title: String,
    pub author: String,
    /// Duration in milliseconds. 0 for live streams.
    pub length: u64,
    pub is_stream: bool,
    pub source_name: String,
}

impl TrackHandle {
    pub fn new(uri: impl Into<String>, title: impl Into<String>, length: u64) -> Self {
        let uri = uri.into();
        Self {
            identifier: uri.clone(),
            uri,
            title: title.into(),
            author: "Unknown".to_string(),
            length,
            is_stream: false,
            source_name: "http".to_string(),
        }
    }

    pub fn live(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            is_stream: true,
            ..Self::new(uri, title, 0)
        }
    }

    /// `None` for unbounded (live) tracks.
    pub fn duration(&self) -> Option<Duration> {
        if self.is_stream {
            None
        } else {
            Some(Duration::from_millis(self.length))
        }
    }
}

impl From<TrackInfo> for TrackHandle {
    fn from(info: TrackInfo) -> Self {
        Self {
            uri: info.uri.unwrap_or_else(|| info.identifier.clone()),
            identifier: info.identifier,
            title: info.title,
            author: info.author,
            length: if info.is_stream { 0 } else { info.length },
            is_stream: info.is_stream,
            source_name: info.source_name,
        }
    }
}

// ---------------------------------------------------------------------------
// Lavalink v4 `/loadtracks` wire format
// ---------------------------------------------------------------------------

/// A single audio track as returned by a Lavalink-compatible node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Base64-encoded track data, opaque to us.
    pub encoded: String,
    pub info: TrackInfo,
    #[serde(default = "default_json_object")]
    pub plugin_info: serde_json::Value,
    #[serde(default = "default_json_object")]
    pub user_data: serde_json::Value,
}

fn default_json_object() -> serde_json::Value {
    serde_json::json!({})
}

/// Metadata for an audio track.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    /// Duration in milliseconds. 0 for live streams.
    pub length: u64,
    pub is_stream: bool,
    pub position: u64,
    pub title: String,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
    pub source_name: String,
}

/// Result envelope of `GET /v4/loadtracks`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "camelCase")]
pub enum LoadResponse {
    Track(Track),
    Playlist(PlaylistData),
    Search(Vec<Track>),
    Empty {},
    Error(LoadException),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistData {
    pub info: PlaylistInfo,
    #[serde(default = "default_json_object")]
    pub plugin_info: serde_json::Value,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub name: String,
    /// Index of the selected track, or -1 if none.
    pub selected_track: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadException {
    pub message: Option<String>,
    pub severity: Severity,
    pub cause: String,
}
