//! Configuration for the TrustHire gateway
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// TrustHire gateway - REST API + realtime relay for the marketplace
#[derive(Parser, Debug, Clone)]
#[command(name = "trusthire")]
#[command(about = "REST + realtime gateway for the TrustHire freelance marketplace")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:4000")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "trusthire")]
    pub mongodb_db: String,

    /// Enable development mode (MongoDB and payment credentials optional)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Comma-separated list of allowed CORS origins (empty = allow all)
    #[arg(long, env = "ALLOWED_ORIGINS")]
    pub allowed_origins: Option<String>,

    /// Payment gateway key id
    #[arg(long, env = "PAYMENT_KEY_ID")]
    pub payment_key_id: Option<String>,

    /// Payment gateway key secret (HMAC signing secret)
    #[arg(long, env = "PAYMENT_KEY_SECRET")]
    pub payment_key_secret: Option<String>,

    /// Payment gateway API base URL
    #[arg(long, env = "PAYMENT_API_URL", default_value = "https://api.razorpay.com/v1")]
    pub payment_api_url: String,

    /// Generative assistant API key (fallback script used when absent)
    #[arg(long, env = "GEMINI_API_KEY")]
    pub gemini_api_key: Option<String>,

    /// Maximum concurrent relay connections
    #[arg(long, env = "RELAY_MAX_CLIENTS", default_value = "32768")]
    pub relay_max_clients: usize,

    /// Require stages to complete in order (stage N needs 0..N completed)
    #[arg(long, env = "STRICT_STAGE_ORDER", default_value = "false")]
    pub strict_stage_order: bool,

    /// Require a verified payment order before securing escrow
    #[arg(long, env = "REQUIRE_VERIFIED_PAYMENT", default_value = "false")]
    pub require_verified_payment: bool,
}

impl Args {
    /// Parsed list of allowed CORS origins
    pub fn allowed_origin_list(&self) -> Vec<String> {
        self.allowed_origins
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Whether the payment gateway is configured
    pub fn payments_configured(&self) -> bool {
        self.payment_key_id.is_some() && self.payment_key_secret.is_some()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && !self.payments_configured() {
            return Err(
                "PAYMENT_KEY_ID and PAYMENT_KEY_SECRET are required in production mode".to_string(),
            );
        }

        if self.relay_max_clients == 0 {
            return Err("RELAY_MAX_CLIENTS must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_args() -> Args {
        Args::parse_from(["trusthire", "--dev-mode"])
    }

    #[test]
    fn test_allowed_origin_list() {
        let mut args = dev_args();
        args.allowed_origins = Some("http://localhost:3000, https://trusthire.app".to_string());
        assert_eq!(
            args.allowed_origin_list(),
            vec!["http://localhost:3000", "https://trusthire.app"]
        );

        args.allowed_origins = None;
        assert!(args.allowed_origin_list().is_empty());
    }

    #[test]
    fn test_validate_requires_payment_secret_in_production() {
        let mut args = dev_args();
        args.dev_mode = false;
        assert!(args.validate().is_err());

        args.payment_key_id = Some("key".to_string());
        args.payment_key_secret = Some("secret".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_dev_mode_relaxed() {
        let args = dev_args();
        assert!(args.validate().is_ok());
    }
}
