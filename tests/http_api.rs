use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tunelink::{
    common::GuildId,
    configs::Config,
    player::ClockPlayerFactory,
    protocol::TrackHandle,
    server::AppState,
    sources::{LoadResult, LoadService},
    transport::http_server,
};

const PASSWORD: &str = "test-password";

struct OneTrack;

#[async_trait]
impl LoadService for OneTrack {
    async fn load(&self, identifier: &str) -> LoadResult {
        LoadResult::Track(TrackHandle::new(identifier, "Song", 60_000))
    }
}

/// Serves the full router on an ephemeral port and returns its base url.
async fn serve() -> (String, Arc<AppState>) {
    let mut config = Config::default();
    config.server.password = PASSWORD.to_string();
    let components = AppState::assemble(
        config,
        Arc::new(ClockPlayerFactory::default()),
        Arc::new(OneTrack),
    );
    let state = components.state;
    tokio::spawn(components.dispatcher.run(Default::default()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = http_server::router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

fn client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_requests_without_password_are_rejected() {
    let (base, _) = serve().await;

    let res = client().get(format!("{base}/v1/info")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.headers()
            .get("Tunelink-Api-Version")
            .and_then(|v| v.to_str().ok()),
        Some("1")
    );
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], 401);
    assert_eq!(body["path"], "/v1/info");

    let res = client()
        .get(format!("{base}/v1/info"))
        .header("Authorization", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_info_reports_version_and_stats() {
    let (base, _) = serve().await;

    let version = client()
        .get(format!("{base}/version"))
        .header("Authorization", PASSWORD)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(version, env!("CARGO_PKG_VERSION"));

    let info: Value = client()
        .get(format!("{base}/v1/info"))
        .header("Authorization", PASSWORD)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["version"]["semver"], env!("CARGO_PKG_VERSION"));
    assert_eq!(info["stats"]["guilds"], 0);
}

#[tokio::test]
async fn test_play_then_control_a_guild() {
    let (base, state) = serve().await;
    let http = client();

    let res = http
        .get(format!("{base}/v1/guilds/5"))
        .header("Authorization", PASSWORD)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = http
        .post(format!("{base}/v1/guilds/5/play"))
        .header("Authorization", PASSWORD)
        .json(&json!({
            "query": "https://tracks.test/song",
            "requester": 1,
            "textChannelId": 9,
            "voiceChannelId": 3,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    tokio::time::timeout(Duration::from_secs(2), async {
        while state.registry.get(GuildId(5)).and_then(|e| e.snapshot().current).is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("track never started");

    let guild: Value = http
        .get(format!("{base}/v1/guilds/5"))
        .header("Authorization", PASSWORD)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(guild["phase"], "playing");
    assert_eq!(guild["current"]["track"]["title"], "Song");
    assert_eq!(guild["voice"]["channelId"], 3);

    let pause = |path: &'static str| {
        http.post(format!("{base}/v1/guilds/5/{path}"))
            .header("Authorization", PASSWORD)
            .send()
    };
    assert_eq!(pause("pause").await.unwrap().status(), StatusCode::NO_CONTENT);
    assert_eq!(pause("pause").await.unwrap().status(), StatusCode::CONFLICT);
    assert_eq!(pause("resume").await.unwrap().status(), StatusCode::NO_CONTENT);

    let res = http
        .delete(format!("{base}/v1/guilds/5/queue/3"))
        .header("Authorization", PASSWORD)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = http
        .delete(format!("{base}/v1/guilds/5"))
        .header("Authorization", PASSWORD)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(!state.registry.contains(GuildId(5)));
}

#[tokio::test]
async fn test_choose_without_pending_search_is_not_found() {
    let (base, _) = serve().await;

    let res = client()
        .post(format!("{base}/v1/guilds/5/choose"))
        .header("Authorization", PASSWORD)
        .json(&json!({ "requester": 1, "choice": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client()
        .post(format!("{base}/v1/guilds/5/choose"))
        .header("Authorization", PASSWORD)
        .json(&json!({ "requester": 1, "choice": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
