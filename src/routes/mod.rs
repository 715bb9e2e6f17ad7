//! HTTP routes for the TrustHire gateway

pub mod applications;
pub mod chat;
pub mod health;
pub mod jobs;
pub mod payments;
pub mod projects;
pub mod transactions;
pub mod users;

pub use applications::handle_applications_request;
pub use chat::handle_chat;
pub use health::{health_check, readiness_check, version_info};
pub use jobs::handle_jobs_request;
pub use payments::{handle_create_order, handle_verify_payment};
pub use projects::handle_projects_request;
pub use transactions::{handle_earnings, handle_transactions_request, handle_withdrawal};
pub use users::handle_users_request;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::types::{GatewayError, Result};

/// Build a JSON response
pub fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_default()
}

/// Map a service error onto its HTTP shape
pub fn error_response(err: &GatewayError) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": err.to_string(),
        "code": err.code(),
    });
    json_response(err.status(), &body)
}

/// 404 for unrouted paths
pub fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Route not found",
        "path": path,
    });
    json_response(StatusCode::NOT_FOUND, &body)
}

/// Read and deserialize a JSON request body
pub async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    let bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|e| GatewayError::InvalidArgument(format!("failed to read body: {}", e)))?
        .to_bytes();

    serde_json::from_slice(&bytes)
        .map_err(|e| GatewayError::InvalidArgument(format!("invalid JSON body: {}", e)))
}

/// Parse a URL query string into a key/value map
///
/// Later duplicates win; keys without values map to the empty string.
pub fn parse_query_params(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Parse the `limit` query parameter with a default
pub fn parse_limit(params: &HashMap<String, String>, default: i64) -> i64 {
    params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Serialize a stored document for the API, surfacing `_id` as `id`
///
/// ObjectIds serialize to JSON as `{"$oid": "<hex>"}`; string keys pass
/// through. Either way the wire shape is a flat `id` field.
pub fn doc_json<T: Serialize>(doc: &T) -> Value {
    let mut value = serde_json::to_value(doc).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        if let Some(raw_id) = map.remove("_id") {
            let id = match &raw_id {
                Value::Object(oid) => oid.get("$oid").cloned().unwrap_or(raw_id.clone()),
                _ => raw_id,
            };
            map.insert("id".to_string(), id);
        }
    }
    value
}

/// Serialize a list of stored documents for the API
pub fn docs_json<T: Serialize>(docs: &[T]) -> Value {
    Value::Array(docs.iter().map(doc_json).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    #[test]
    fn test_parse_query_params() {
        let params = parse_query_params("clientId=c1&limit=10&flag");
        assert_eq!(params.get("clientId").unwrap(), "c1");
        assert_eq!(params.get("limit").unwrap(), "10");
        assert_eq!(params.get("flag").unwrap(), "");
        assert!(parse_query_params("").is_empty());
    }

    #[test]
    fn test_parse_limit_default_and_garbage() {
        let params = parse_query_params("limit=25");
        assert_eq!(parse_limit(&params, 50), 25);
        let params = parse_query_params("limit=abc");
        assert_eq!(parse_limit(&params, 50), 50);
        assert_eq!(parse_limit(&HashMap::new(), 50), 50);
    }

    #[test]
    fn test_doc_json_flattens_object_id() {
        let oid = ObjectId::new();
        let doc = serde_json::json!({ "_id": { "$oid": oid.to_hex() }, "title": "t" });
        let out = doc_json(&doc);
        assert_eq!(out["id"], oid.to_hex());
        assert!(out.get("_id").is_none());
        assert_eq!(out["title"], "t");
    }

    #[test]
    fn test_doc_json_passes_string_ids() {
        let doc = serde_json::json!({ "_id": "user-1", "name": "Ada" });
        let out = doc_json(&doc);
        assert_eq!(out["id"], "user-1");
    }
}
