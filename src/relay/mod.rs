//! Realtime relay over WebSocket
//!
//! Project-scoped broadcast groups for the marketplace frontend: agreement
//! signing, chat, typing presence, and project status notifications. State
//! is in-memory only and transient; persisted mutations go through the REST
//! API, and callers invoke both when a change must also be broadcast.
//!
//! ## Protocol
//!
//! Connect: `ws://host:port/ws`
//!
//! Frames both ways are `{"event": "<name>", "data": {...}}`. A client
//! first sends `user:join`, then `project:join` per project it wants live
//! events for. Missing required fields produce an `error` frame to the
//! sender only; the connection stays open.

pub mod dispatch;
pub mod events;
pub mod store;

pub use store::{ConnId, RelayStore};

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response, StatusCode};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// WebSocket type after upgrade
type HyperWebSocket =
    hyper_tungstenite::WebSocketStream<hyper_util::rt::TokioIo<hyper::upgrade::Upgraded>>;

/// Handle a WebSocket upgrade request for the relay
pub fn handle_relay_upgrade(
    store: Arc<RelayStore>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    if !hyper_tungstenite::is_upgrade_request(&req) {
        return Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(
                r#"{"error": "WebSocket upgrade required"}"#,
            )))
            .unwrap_or_default();
    }

    if store.is_at_capacity() {
        return Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(r#"{"error": "Relay at capacity"}"#)))
            .unwrap_or_default();
    }

    let (response, websocket) = match hyper_tungstenite::upgrade(req, None) {
        Ok((resp, ws)) => (resp, ws),
        Err(e) => {
            error!("WebSocket upgrade failed: {}", e);
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from("WebSocket upgrade failed")))
                .unwrap_or_default();
        }
    };

    tokio::spawn(async move {
        match websocket.await {
            Ok(ws) => handle_relay_connection(store, ws).await,
            Err(e) => error!("WebSocket connection failed: {}", e),
        }
    });

    let (parts, _body) = response.into_parts();
    Response::from_parts(parts, Full::new(Bytes::new()))
}

/// Drive one relay connection to completion
async fn handle_relay_connection(store: Arc<RelayStore>, ws: HyperWebSocket) {
    let (mut sink, mut stream) = ws.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let Some(conn) = store.register(tx) else {
        // capacity raced between the upgrade check and registration
        warn!("relay connection dropped at capacity");
        let _ = sink.close().await;
        return;
    };

    info!(conn, "relay client connected");

    // writer task: pump the outbound channel into the socket
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => dispatch::dispatch(&store, conn, &text),
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
            Ok(Message::Binary(_)) => {
                debug!(conn, "ignoring binary frame");
            }
            Err(e) => {
                debug!(conn, "relay read error: {}", e);
                break;
            }
        }
    }

    let cleanup = store.disconnect(conn);
    if let Some(user_id) = &cleanup.user_id {
        dispatch::broadcast_disconnect_cleanup(&store, user_id, &cleanup.typing_projects);
        info!(conn, user_id, "relay client disconnected");
    } else {
        info!(conn, "relay client disconnected");
    }

    writer.abort();
}
