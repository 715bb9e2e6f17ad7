//! Generative chat assistant proxy
//!
//! Thin request/response wrapper over the Gemini REST API with a scripted
//! keyword fallback when no API key is configured. The conversation history
//! rides along with every request; nothing is persisted here.

pub mod fallback;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::types::{GatewayError, Result};

pub use fallback::fallback_response;

const MODEL: &str = "gemini-2.0-flash";
const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const SYSTEM_PROMPT: &str = "You are TrustHire's helpful AI assistant. TrustHire is a freelancing platform that connects clients with skilled freelancers (coders, designers, writers, etc.) and workers (for tasks like delivery, cleaning, repairs, etc.).

Key features of TrustHire:
- Secure escrow payments via Razorpay (UPI, Cards, NetBanking) and Crypto (MetaMask)
- Verified freelancers and workers
- Project-based and hourly work options
- Safe milestone-based payments
- Rating and review system
- Both digital (coding, design) and physical (delivery, repairs) work categories

Your role:
- Help users understand how TrustHire works
- Answer questions about posting projects, hiring freelancers, or becoming a freelancer
- Explain the payment and escrow system
- Be friendly, concise, and helpful
- If you don't know something specific about TrustHire, provide general helpful guidance

Keep responses short and conversational (2-3 sentences max unless more detail is needed).";

const SYSTEM_ACK: &str = "I understand. I'm TrustHire's AI assistant, ready to help users with questions about the platform, freelancing, payments, and more. I'll keep my responses friendly and concise.";

/// One prior exchange in the conversation
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Map conversation turns onto the wire roles the model API expects
fn wire_role(role: &str) -> &'static str {
    if role == "assistant" {
        "model"
    } else {
        "user"
    }
}

fn build_contents(history: &[ChatTurn], message: &str) -> serde_json::Value {
    let mut contents = vec![
        json!({ "role": "user", "parts": [{ "text": SYSTEM_PROMPT }] }),
        json!({ "role": "model", "parts": [{ "text": SYSTEM_ACK }] }),
    ];
    for turn in history {
        contents.push(json!({
            "role": wire_role(&turn.role),
            "parts": [{ "text": turn.content }],
        }));
    }
    contents.push(json!({ "role": "user", "parts": [{ "text": message }] }));
    serde_json::Value::Array(contents)
}

/// Assistant proxy; falls back to the keyword script without an API key
#[derive(Clone)]
pub struct AssistantService {
    client: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
}

impl AssistantService {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Answer a user message given its conversation history
    pub async fn chat(&self, message: &str, history: &[ChatTurn]) -> Result<String> {
        if message.is_empty() {
            return Err(GatewayError::InvalidArgument("Message is required".into()));
        }

        let Some(api_key) = &self.api_key else {
            return Ok(fallback_response(message).to_string());
        };

        let body = json!({
            "contents": build_contents(history, message),
            "generationConfig": { "maxOutputTokens": 500, "temperature": 0.7 },
        });

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_url, MODEL, api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Assistant(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(%status, "assistant backend rejected request");
            return Err(GatewayError::Assistant(format!(
                "backend returned {}",
                status
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Assistant(format!("malformed response: {}", e)))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| GatewayError::Assistant("empty response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_assistant_uses_fallback() {
        let assistant = AssistantService::new(None);
        let reply = tokio_test::block_on(assistant.chat("what is escrow?", &[])).unwrap();
        assert!(reply.contains("escrow"));
    }

    #[test]
    fn test_empty_message_rejected() {
        let assistant = AssistantService::new(None);
        let err = tokio_test::block_on(assistant.chat("", &[])).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArgument(_)));
    }

    #[test]
    fn test_history_roles_mapped() {
        assert_eq!(wire_role("assistant"), "model");
        assert_eq!(wire_role("user"), "user");
        assert_eq!(wire_role("anything"), "user");
    }

    #[test]
    fn test_contents_order_system_prompt_first() {
        let history = vec![
            ChatTurn { role: "user".into(), content: "hi".into() },
            ChatTurn { role: "assistant".into(), content: "hello".into() },
        ];
        let contents = build_contents(&history, "how do payments work?");
        let arr = contents.as_array().unwrap();

        assert_eq!(arr.len(), 5);
        assert_eq!(arr[0]["role"], "user");
        assert_eq!(arr[1]["role"], "model");
        assert_eq!(arr[3]["role"], "model");
        assert_eq!(arr[4]["parts"][0]["text"], "how do payments work?");
    }
}
