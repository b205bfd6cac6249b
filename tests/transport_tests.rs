mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use followstock::config::Settings;
use followstock::transport::{self, ChatMessage, SendChat};

async fn local_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

#[tokio::test]
async fn queued_messages_flush_in_order_once_connected() {
    let (listener, url) = local_server().await;
    let mut settings = Settings::default();
    settings.chat_url = url;
    settings.backoff_floor_secs = 1;
    let h = common::harness(settings);

    transport::spawn(h.state.clone(), h.outbound);

    // enqueue while the handshake is still pending
    transport::notify(&h.state.chat.outbound_tx, "a@y.z", "first".to_string()).await;
    transport::notify(&h.state.chat.outbound_tx, "a@y.z", "second".to_string()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(stream).await.unwrap();

    let mut texts = Vec::new();
    for _ in 0..2 {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            let msg: SendChat = serde_json::from_str(&text).unwrap();
            texts.push(msg.text);
        }
    }
    assert_eq!(texts, vec!["first".to_string(), "second".to_string()]);
}

#[tokio::test]
async fn inbound_commands_are_answered_on_the_same_connection() {
    let (listener, url) = local_server().await;
    let mut settings = Settings::default();
    settings.chat_url = url;
    settings.backoff_floor_secs = 1;
    let h = common::harness(settings);

    let stamp_before = h
        .state
        .chat
        .last_inbound
        .load(std::sync::atomic::Ordering::Relaxed);

    transport::spawn(h.state.clone(), h.outbound);

    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(stream).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let inbound = serde_json::to_string(&ChatMessage {
        from: "x@y.z".to_string(),
        text: "ping are-you-there".to_string(),
    })
    .unwrap();
    ws.send(Message::Text(inbound)).await.unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let reply: SendChat = match frame {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("unexpected frame: {other:?}"),
    };
    assert_eq!(reply.to, "x@y.z");
    assert_eq!(reply.text, "!pong are-you-there");

    // the liveness stamp moved forward with the inbound traffic
    tokio::time::sleep(Duration::from_millis(50)).await;
    let stamp_after = h
        .state
        .chat
        .last_inbound
        .load(std::sync::atomic::Ordering::Relaxed);
    assert!(stamp_after >= stamp_before);
}

#[tokio::test]
async fn outbound_survives_a_dropped_connection() {
    let (listener, url) = local_server().await;
    let mut settings = Settings::default();
    settings.chat_url = url;
    settings.backoff_floor_secs = 1;
    let h = common::harness(settings);

    transport::spawn(h.state.clone(), h.outbound);

    // first session: deliver one message, then drop the connection
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(stream).await.unwrap();
    transport::notify(&h.state.chat.outbound_tx, "a@y.z", "before".to_string()).await;
    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(matches!(frame, Message::Text(_)));
    drop(ws);

    // a message sent while disconnected is held until the next session
    tokio::time::sleep(Duration::from_millis(100)).await;
    transport::notify(&h.state.chat.outbound_tx, "a@y.z", "after".to_string()).await;

    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(stream).await.unwrap();
    let frame = tokio::time::timeout(Duration::from_secs(10), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let msg: SendChat = match frame {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("unexpected frame: {other:?}"),
    };
    assert_eq!(msg.text, "after");
}
