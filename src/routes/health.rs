//! Health check endpoints
//!
//! Kubernetes-style probes:
//! - /health, /api/health - liveness (is the gateway running?)
//! - /ready - readiness (is the database reachable?)
//! - /version - build info for deployment verification
//!
//! In dev mode the database is optional, so readiness only requires the
//! process itself.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use super::json_response;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime: u64,
    pub timestamp: String,
    #[serde(rename = "nodeId")]
    pub node_id: String,
    pub database: DatabaseHealth,
    pub relay: RelayHealth,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
}

#[derive(Serialize)]
pub struct RelayHealth {
    pub connections: usize,
}

/// Liveness probe; healthy whenever the process is serving
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let health = HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: crate::relay::events::now_iso(),
        node_id: state.args.node_id.to_string(),
        database: DatabaseHealth {
            connected: state.stores.is_some(),
        },
        relay: RelayHealth {
            connections: state.relay.connection_count(),
        },
    };

    json_response(
        StatusCode::OK,
        &serde_json::to_value(&health).unwrap_or_default(),
    )
}

/// Readiness probe; requires the database outside dev mode
pub fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let ready = state.stores.is_some() || state.args.dev_mode;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    json_response(
        status,
        &serde_json::json!({
            "ready": ready,
            "database": state.stores.is_some(),
        }),
    )
}

/// Build metadata captured at compile time
pub fn version_info() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "commit": env!("GIT_COMMIT_SHORT"),
            "built": env!("BUILD_TIMESTAMP"),
        }),
    )
}
