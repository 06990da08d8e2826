mod support;

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as TungsteniteMessage},
};

use support::spawn_server;

async fn next_json<S>(socket: &mut S) -> Value
where
    S: StreamExt<Item = Result<TungsteniteMessage, WsError>> + Unpin,
{
    loop {
        let frame = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("frame in time")
            .expect("socket open")
            .expect("frame ok");
        if let TungsteniteMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("json frame");
        }
    }
}

#[tokio::test]
async fn websocket_receives_only_its_room() {
    let server = spawn_server().await;
    let token = server.register("streamer", "password123").await;

    let (mut socket, _) = connect_async(server.ws(&format!(
        "/api/v1/rooms/lobby/stream?token={token}"
    )))
    .await
    .expect("connect websocket");
    // 订阅在升级前已建立，稍等握手完成
    sleep(Duration::from_millis(50)).await;

    server.post_message(&token, "elsewhere", "not for you").await;
    let sent = server.post_message(&token, "lobby", "hello").await;

    let received = next_json(&mut socket).await;
    assert_eq!(received["id"], sent["id"]);
    assert_eq!(received["content"], "hello");
    assert_eq!(received["display_name"], "streamer");

    let extra = timeout(Duration::from_millis(100), socket.next()).await;
    assert!(extra.is_err(), "no frame expected for other rooms");
}

#[tokio::test]
async fn anonymous_websocket_uses_stored_username() {
    let server = spawn_server().await;
    let token = server.register("author", "password123").await;

    let (mut socket, _) = connect_async(server.ws("/api/v1/rooms/lobby/stream"))
        .await
        .expect("connect websocket");
    sleep(Duration::from_millis(50)).await;

    server.post_message(&token, "lobby", "public").await;

    let received = next_json(&mut socket).await;
    assert_eq!(received["display_name"], "author");
}

#[tokio::test]
async fn invalid_token_rejects_upgrade() {
    let server = spawn_server().await;

    let result = connect_async(server.ws("/api/v1/rooms/lobby/stream?token=bogus")).await;
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 401),
        other => panic!("expected http rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn shutdown_closes_open_streams() {
    let server = spawn_server().await;

    let (mut socket, _) = connect_async(server.ws("/api/v1/rooms/lobby/stream"))
        .await
        .expect("connect websocket");
    sleep(Duration::from_millis(50)).await;

    server.shutdown.cancel();

    let frame = timeout(Duration::from_secs(2), socket.next())
        .await
        .expect("close in time");
    match frame {
        Some(Ok(TungsteniteMessage::Close(_))) | None => {}
        other => panic!("expected close, got {other:?}"),
    }
}
