use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::services::commands;
use crate::AppState;

/// Inbound chat frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: String,
    pub text: String,
}

/// Outbound chat frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendChat {
    pub to: String,
    pub text: String,
}

/// Bounded queue depth for both directions. A full queue applies
/// backpressure to producers instead of growing without limit.
const QUEUE: usize = 10;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// The handles the rest of the engine holds onto: where to enqueue
/// outbound messages, and the liveness stamp the watchdog reads.
#[derive(Clone)]
pub struct ChatHandles {
    pub outbound_tx: mpsc::Sender<SendChat>,
    pub last_inbound: Arc<AtomicI64>,
}

/// Builds the outbound queue and its handles. The receiver half goes to
/// `spawn` once the application state exists.
pub fn channels() -> (ChatHandles, mpsc::Receiver<SendChat>) {
    let (outbound_tx, outbound_rx) = mpsc::channel(QUEUE);
    let handles = ChatHandles {
        outbound_tx,
        last_inbound: Arc::new(AtomicI64::new(chrono::Utc::now().timestamp_millis())),
    };
    (handles, outbound_rx)
}

/// Enqueues one outbound message, waiting if the queue is full.
pub async fn notify(tx: &mpsc::Sender<SendChat>, to: &str, text: String) {
    let frame = SendChat {
        to: to.to_string(),
        text,
    };
    if tx.send(frame).await.is_err() {
        tracing::warn!("outbound queue closed, message dropped");
    }
}

/// Next reconnect delay: one more second per consecutive failure, capped.
fn next_backoff(current: Duration, cap: Duration) -> Duration {
    (current + Duration::from_secs(1)).min(cap)
}

/// Starts the three transport tasks: the session loop that owns the
/// connection, the outbound pump, and the inbound dispatcher.
pub fn spawn(state: AppState, outbound_rx: mpsc::Receiver<SendChat>) {
    let sink: Arc<Mutex<Option<WsSink>>> = Arc::new(Mutex::new(None));
    let (inbound_tx, inbound_rx) = mpsc::channel::<ChatMessage>(QUEUE);

    tokio::spawn(session_loop(state.clone(), sink.clone(), inbound_tx));
    tokio::spawn(outbound_loop(sink, outbound_rx));
    tokio::spawn(inbound_loop(state, inbound_rx));
}

/// Owns the websocket connection. Reconnects forever with a growing
/// backoff; a successful connect resets the backoff to the floor.
async fn session_loop(
    state: AppState,
    sink: Arc<Mutex<Option<WsSink>>>,
    inbound_tx: mpsc::Sender<ChatMessage>,
) {
    let floor = Duration::from_secs(state.settings.backoff_floor_secs);
    let cap = Duration::from_secs(state.settings.backoff_cap_secs);
    let mut backoff = floor;

    loop {
        let stream = match connect_async(state.settings.chat_url.as_str()).await {
            Ok((stream, _)) => stream,
            Err(err) => {
                tracing::warn!(
                    "connect to {} failed ({}), retrying in {:?}",
                    state.settings.chat_url,
                    err,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff, cap);
                continue;
            }
        };

        tracing::info!("connected to {}", state.settings.chat_url);
        backoff = floor;

        let (tx_half, mut rx_half) = stream.split();
        *sink.lock().await = Some(tx_half);

        while let Some(frame) = rx_half.next().await {
            state
                .chat
                .last_inbound
                .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);

            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<ChatMessage>(&text) {
                    Ok(msg) => {
                        // backpressure: a full queue stalls the read loop
                        if inbound_tx.send(msg).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => tracing::warn!("unreadable inbound frame: {}", err),
                },
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("read failed: {}", err);
                    break;
                }
            }
        }

        *sink.lock().await = None;
        tracing::warn!("disconnected from {}", state.settings.chat_url);
    }
}

/// Drains the outbound queue. While disconnected it holds the current
/// message and retries until a session comes back, so nothing pulled off
/// the queue is ever lost.
async fn outbound_loop(sink: Arc<Mutex<Option<WsSink>>>, mut outbound_rx: mpsc::Receiver<SendChat>) {
    while let Some(frame) = outbound_rx.recv().await {
        let payload = match serde_json::to_string(&frame) {
            Ok(p) => p,
            Err(err) => {
                tracing::error!("unserializable outbound frame: {}", err);
                continue;
            }
        };

        loop {
            // the sink leaves the lock for the duration of the send, so a
            // wedged write can never block the session loop's sink swap
            let taken = sink.lock().await.take();
            match taken {
                Some(mut ws) => match ws.send(Message::Text(payload.clone())).await {
                    Ok(()) => {
                        let mut guard = sink.lock().await;
                        // a reconnect may have installed a fresh sink while
                        // we were sending; keep that one
                        if guard.is_none() {
                            *guard = Some(ws);
                        }
                        break;
                    }
                    Err(err) => {
                        tracing::warn!("send failed ({}), waiting for reconnect", err);
                    }
                },
                None => {}
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

/// Feeds parsed inbound messages to the command handler, one at a time.
async fn inbound_loop(state: AppState, mut inbound_rx: mpsc::Receiver<ChatMessage>) {
    while let Some(msg) = inbound_rx.recv().await {
        tracing::info!("{}: {}", msg.from, msg.text);
        commands::handle_line(&state, &msg.from, &msg.text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_by_one_second_up_to_the_cap() {
        let cap = Duration::from_secs(120);
        let mut b = Duration::from_secs(5);
        b = next_backoff(b, cap);
        assert_eq!(b, Duration::from_secs(6));
        for _ in 0..200 {
            b = next_backoff(b, cap);
        }
        assert_eq!(b, cap);
    }
}
