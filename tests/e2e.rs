mod common;

use std::time::Duration;

use futures_util::StreamExt;
use tickstream::stream::{AbortReason, Limit, SessionState};

fn header_session_id(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("x-session-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_e2e_bounded_stream_over_tcp() {
    let mut config = common::fast_config();
    config.tick_interval = Duration::from_millis(20);
    let server = common::TestServer::with_config(config);
    let base = server.spawn().await;

    let response = reqwest::get(format!("{base}/events?limit=5")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-cache");
    let id = header_session_id(&response);

    let body = tokio::time::timeout(Duration::from_secs(5), response.text())
        .await
        .expect("server never closed the stream")
        .unwrap();
    let frames = common::parse_frames(&body);
    assert_eq!(common::counts(&frames), vec![1, 2, 3, 4, 5]);
    assert_eq!(frames[4]["count"], 5);

    let summary = server.wait_for_summary(&id).await;
    assert_eq!(summary.state, SessionState::Completed);
}

#[tokio::test]
async fn test_e2e_client_disconnect_is_detected() {
    let mut config = common::fast_config();
    config.limit = Limit::Unbounded;
    config.tick_interval = Duration::from_millis(50);
    let server = common::TestServer::with_config(config);
    let base = server.spawn().await;

    let response = reqwest::get(format!("{base}/events")).await.unwrap();
    let id = header_session_id(&response);
    let mut chunks = response.bytes_stream();
    let mut received = String::new();
    while received.matches("\n\n").count() < 2 {
        let chunk = tokio::time::timeout(Duration::from_secs(5), chunks.next())
            .await
            .expect("stream stalled")
            .expect("stream ended")
            .unwrap();
        received.push_str(std::str::from_utf8(&chunk).unwrap());
    }
    assert_eq!(common::counts(&common::parse_frames(&received)), vec![1, 2]);
    drop(chunks);

    let summary = server.wait_for_summary(&id).await;
    assert_eq!(
        summary.state,
        SessionState::Aborted(AbortReason::ClientGone)
    );
    assert_eq!(server.state.sessions.stats().active, 0);
}

#[tokio::test]
async fn test_e2e_concurrent_streams() {
    let server = common::TestServer::new();
    let base = server.spawn().await;
    let client = reqwest::Client::new();

    let requests = (1..=4).map(|limit| {
        let client = client.clone();
        let url = format!("{base}/events?limit={limit}");
        async move { client.get(url).send().await.unwrap().text().await.unwrap() }
    });
    let bodies = futures_util::future::join_all(requests).await;

    for (i, body) in bodies.iter().enumerate() {
        let expected: Vec<u64> = (1..=(i as u64 + 1)).collect();
        assert_eq!(common::counts(&common::parse_frames(body)), expected);
    }
    assert_eq!(server.state.sessions.stats().completed, 4);
}
