//! TrustHire gateway
//!
//! REST + realtime backend for the TrustHire freelance marketplace.
//!
//! ## Services
//!
//! - **API**: jobs, applications, projects, users, transactions over MongoDB
//! - **Lifecycle**: escrow project workflow (agreement, payment, stages, release, rating)
//! - **Payments**: gateway order creation and HMAC signature verification
//! - **Assistant**: AI chat proxy with a static fallback script
//! - **Relay**: project-scoped realtime event fan-out over WebSocket

pub mod assistant;
pub mod config;
pub mod db;
pub mod lifecycle;
pub mod payments;
pub mod relay;
pub mod routes;
pub mod server;
pub mod types;
pub mod wallet;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{GatewayError, Result};
