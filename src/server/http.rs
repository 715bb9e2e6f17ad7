//! HTTP server implementation
//!
//! hyper http1 with TokioIo for async handling. One task per connection;
//! WebSocket upgrades for the relay ride the same listener via
//! `with_upgrades()`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::assistant::AssistantService;
use crate::config::Args;
use crate::db::{MongoClient, Stores};
use crate::lifecycle::{LifecyclePolicy, LifecycleService};
use crate::payments::{PaymentGateway, PaymentService};
use crate::relay::{self, RelayStore};
use crate::routes;
use crate::types::{GatewayError, Result};
use crate::wallet::WalletService;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: Option<MongoClient>,
    /// Typed collections; absent when running without a database (dev mode)
    pub stores: Option<Stores>,
    pub lifecycle: Option<LifecycleService>,
    pub wallet: Option<WalletService>,
    /// Payment gateway; absent until credentials are configured
    pub payments: Option<PaymentService>,
    pub assistant: AssistantService,
    pub relay: Arc<RelayStore>,
    pub started_at: Instant,
}

impl AppState {
    /// Initialize services from configuration
    ///
    /// Outside dev mode an unreachable database is fatal. In dev mode the
    /// gateway comes up with the relay and assistant only.
    pub async fn init(args: Args) -> Result<Self> {
        let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(client) => Some(client),
            Err(e) if args.dev_mode => {
                warn!("MongoDB unavailable, API routes disabled: {}", e);
                None
            }
            Err(e) => return Err(e),
        };

        let stores = match &mongo {
            Some(client) => Some(Stores::new(client).await?),
            None => None,
        };

        let wallet = stores.as_ref().map(WalletService::new);

        let policy = LifecyclePolicy {
            strict_stage_order: args.strict_stage_order,
            require_verified_payment: args.require_verified_payment,
        };
        let lifecycle = match (&stores, &wallet) {
            (Some(stores), Some(wallet)) => {
                Some(LifecycleService::new(stores, wallet.clone(), policy))
            }
            _ => None,
        };

        let payments = match (&args.payment_key_id, &args.payment_key_secret) {
            (Some(key_id), Some(key_secret)) => {
                let gateway = PaymentGateway::new(
                    key_id.clone(),
                    key_secret.clone(),
                    args.payment_api_url.clone(),
                );
                let orders = stores.as_ref().map(|s| s.payments.clone());
                Some(PaymentService::new(gateway, orders))
            }
            _ => {
                warn!("Payment gateway credentials not configured, payment routes disabled");
                None
            }
        };

        let assistant = AssistantService::new(args.gemini_api_key.clone());
        let relay = Arc::new(RelayStore::new(args.relay_max_clients));

        Ok(Self {
            args,
            mongo,
            stores,
            lifecycle,
            wallet,
            payments,
            assistant,
            relay,
            started_at: Instant::now(),
        })
    }

    pub fn stores(&self) -> Result<&Stores> {
        self.stores.as_ref().ok_or(GatewayError::StoreUnavailable)
    }

    pub fn lifecycle(&self) -> Result<&LifecycleService> {
        self.lifecycle
            .as_ref()
            .ok_or(GatewayError::StoreUnavailable)
    }

    pub fn wallet(&self) -> Result<&WalletService> {
        self.wallet.as_ref().ok_or(GatewayError::StoreUnavailable)
    }

    pub fn payments(&self) -> Result<&PaymentService> {
        self.payments
            .as_ref()
            .ok_or_else(|| GatewayError::Payment("payment gateway not configured".into()))
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "TrustHire gateway listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .with_upgrades()
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let origin = req
        .headers()
        .get("origin")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    info!("[{}] {} {}", addr, method, path);

    let mut response = match (method, path.as_str()) {
        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/api/health") => {
            routes::health_check(Arc::clone(&state))
        }

        // Readiness probe for deployment orchestration
        (Method::GET, "/ready") => routes::readiness_check(Arc::clone(&state)),

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // Realtime relay WebSocket
        (Method::GET, "/ws") => {
            return Ok(relay::handle_relay_upgrade(Arc::clone(&state.relay), req));
        }

        (_, p) if p == "/api/projects" || p.starts_with("/api/projects/") => {
            routes::handle_projects_request(Arc::clone(&state), req).await
        }
        (_, p) if p == "/api/jobs" || p.starts_with("/api/jobs/") => {
            routes::handle_jobs_request(Arc::clone(&state), req).await
        }
        (_, p) if p == "/api/applications" || p.starts_with("/api/applications/") => {
            routes::handle_applications_request(Arc::clone(&state), req).await
        }
        (_, p) if p.starts_with("/api/users/") => {
            routes::handle_users_request(Arc::clone(&state), req).await
        }
        (_, "/api/transactions") => routes::handle_transactions_request(Arc::clone(&state), req).await,
        (Method::POST, "/api/withdrawals") => routes::handle_withdrawal(Arc::clone(&state), req).await,
        (Method::GET, p) if p.starts_with("/api/earnings/") => {
            let user_id = p.strip_prefix("/api/earnings/").unwrap_or("").to_string();
            routes::handle_earnings(Arc::clone(&state), &user_id).await
        }
        (Method::POST, "/api/payments/create-order") => {
            routes::handle_create_order(Arc::clone(&state), req).await
        }
        (Method::POST, "/api/payments/verify") => {
            routes::handle_verify_payment(Arc::clone(&state), req).await
        }
        (Method::POST, "/api/chat") => routes::handle_chat(Arc::clone(&state), req).await,

        // Not found
        _ => routes::not_found_response(&path),
    };

    apply_cors(&state, origin.as_deref(), &mut response);
    Ok(response)
}

/// Stamp the CORS origin header onto a response
///
/// With no configured origin list every origin is allowed. With a list, the
/// request origin is echoed back only when it appears in the list.
fn apply_cors(state: &AppState, origin: Option<&str>, response: &mut Response<Full<Bytes>>) {
    let allowed = state.args.allowed_origin_list();

    let value = if allowed.is_empty() {
        Some(HeaderValue::from_static("*"))
    } else {
        origin
            .filter(|o| allowed.iter().any(|a| a == o))
            .and_then(|o| HeaderValue::from_str(o).ok())
    };

    if let Some(value) = value {
        response
            .headers_mut()
            .insert("Access-Control-Allow-Origin", value);
    }
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn state_without_services() -> AppState {
        AppState {
            args: Args::parse_from(["trusthire", "--dev-mode"]),
            mongo: None,
            stores: None,
            lifecycle: None,
            wallet: None,
            payments: None,
            assistant: AssistantService::new(None),
            relay: Arc::new(RelayStore::new(8)),
            started_at: Instant::now(),
        }
    }

    #[test]
    fn test_accessors_error_without_database() {
        let state = state_without_services();
        assert!(matches!(
            state.stores().unwrap_err(),
            GatewayError::StoreUnavailable
        ));
        assert!(matches!(
            state.lifecycle().unwrap_err(),
            GatewayError::StoreUnavailable
        ));
        assert!(matches!(
            state.payments().unwrap_err(),
            GatewayError::Payment(_)
        ));
    }

    #[test]
    fn test_cors_wildcard_without_allowlist() {
        let state = state_without_services();
        let mut response = Response::new(Full::new(Bytes::new()));
        apply_cors(&state, Some("http://evil.example"), &mut response);
        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );
    }

    #[test]
    fn test_cors_allowlist_filters_origins() {
        let mut state = state_without_services();
        state.args.allowed_origins = Some("http://localhost:3000".to_string());

        let mut response = Response::new(Full::new(Bytes::new()));
        apply_cors(&state, Some("http://localhost:3000"), &mut response);
        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin").unwrap(),
            "http://localhost:3000"
        );

        let mut denied = Response::new(Full::new(Bytes::new()));
        apply_cors(&state, Some("http://evil.example"), &mut denied);
        assert!(denied.headers().get("Access-Control-Allow-Origin").is_none());
    }

    #[test]
    fn test_preflight_allows_methods() {
        let response = preflight_response();
        assert_eq!(response.status(), StatusCode::OK);
        let methods = response
            .headers()
            .get("Access-Control-Allow-Methods")
            .unwrap();
        assert!(methods.to_str().unwrap().contains("PUT"));
    }
}
