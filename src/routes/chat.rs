//! Support chat route
//!
//! `POST /api/chat` forwards the message and prior turns to the assistant.
//! Upstream failures degrade to a friendly canned reply rather than an
//! error the frontend would have to special-case.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use super::{error_response, json_response, read_json};
use crate::assistant::ChatTurn;
use crate::server::AppState;
use crate::types::GatewayError;

#[derive(Deserialize)]
struct ChatBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    history: Vec<ChatTurn>,
}

pub async fn handle_chat(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let body: ChatBody = match read_json(req).await {
        Ok(body) => body,
        Err(e) => return error_response(&e),
    };

    match state.assistant.chat(&body.message, &body.history).await {
        Ok(response) => json_response(StatusCode::OK, &json!({ "response": response })),
        Err(GatewayError::Assistant(e)) => {
            warn!("assistant request failed: {}", e);
            json_response(
                StatusCode::BAD_GATEWAY,
                &json!({
                    "response": "I'm having trouble connecting right now. Please try again in a moment!",
                }),
            )
        }
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_body_defaults() {
        let body: ChatBody = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(body.message.is_empty());
        assert!(body.history.is_empty());
    }

    #[test]
    fn test_chat_body_with_history() {
        let body: ChatBody = serde_json::from_value(serde_json::json!({
            "message": "hi",
            "history": [{ "role": "user", "content": "earlier" }]
        }))
        .unwrap();
        assert_eq!(body.history.len(), 1);
    }
}
