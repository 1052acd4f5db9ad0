// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use jobboard_client::feed::{FeedEvent, FeedStatus};

use common::{serve, test_client, test_config};

type Received = Arc<Mutex<Vec<serde_json::Value>>>;

async fn ws_handler(ws: WebSocketUpgrade, State(received): State<Received>) -> Response {
    ws.on_upgrade(move |socket| session(socket, received))
}

fn reply(text: &str) -> Message {
    Message::Text(text.to_owned().into())
}

/// Authenticate, push one job, answer one client message, then close.
async fn session(mut socket: WebSocket, received: Received) {
    let Some(Ok(Message::Text(hello))) = socket.recv().await else { return };
    received.lock().unwrap().push(serde_json::from_str(hello.as_str()).unwrap_or_default());
    let _ = socket.send(reply(r#"{"type":"authenticated"}"#)).await;
    let _ = socket.send(reply(r#"{"type":"new_job","job":{"id":1,"title":"Rust dev"}}"#)).await;

    if let Some(Ok(Message::Text(msg))) = socket.recv().await {
        received.lock().unwrap().push(serde_json::from_str(msg.as_str()).unwrap_or_default());
        let _ = socket
            .send(reply(r#"{"type":"job_status_changed","job_id":1,"status":"closed"}"#))
            .await;
    }
    let _ = socket.send(Message::Close(None)).await;
}

async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<FeedEvent>) -> anyhow::Result<FeedEvent> {
    Ok(tokio::time::timeout(Duration::from_secs(5), rx.recv()).await??)
}

#[tokio::test]
async fn authenticates_and_streams_job_events() -> anyhow::Result<()> {
    let received: Received = Arc::default();
    let router = Router::new().route("/ws/", get(ws_handler)).with_state(Arc::clone(&received));
    let base = serve(router).await?;

    let mut config = test_config(&format!("{base}/api/v1/"));
    config.feed_url = format!("{}/ws/", base.replacen("http://", "ws://", 1));
    config.api_key = Some("pk-test".into());
    config.feed_max_reconnects = 0;
    let (client, _store) = test_client(config)?;

    let feed = client.job_feed("u-7")?;
    let mut rx = feed.subscribe();
    feed.start();

    assert_eq!(next_event(&mut rx).await?, FeedEvent::Connected);
    assert_eq!(next_event(&mut rx).await?, FeedEvent::Authenticated);
    assert!(matches!(next_event(&mut rx).await?, FeedEvent::NewJob(ref job) if job["title"] == "Rust dev"));
    assert!(feed.status().connected);

    assert!(feed.send(&serde_json::json!({ "type": "subscribe", "channel": "jobs" })));
    assert!(matches!(
        next_event(&mut rx).await?,
        FeedEvent::JobStatusChanged(ref v) if v["status"] == "closed"
    ));
    assert_eq!(next_event(&mut rx).await?, FeedEvent::Disconnected);
    assert_eq!(next_event(&mut rx).await?, FeedEvent::GaveUp);

    let received = received.lock().unwrap().clone();
    assert_eq!(
        received[0],
        serde_json::json!({ "type": "authenticate", "userId": "u-7", "apiKey": "pk-test" })
    );
    assert_eq!(received[1]["type"], "subscribe");

    feed.stop().await;
    assert_eq!(feed.status(), FeedStatus::default());
    Ok(())
}

#[tokio::test]
async fn job_feed_requires_api_key() -> anyhow::Result<()> {
    let (client, _store) = test_client(test_config("http://127.0.0.1:9/api/v1/"))?;
    assert!(client.job_feed("u-7").is_err());
    Ok(())
}
