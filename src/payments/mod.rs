//! Payment gateway integration
//!
//! Order creation goes out to the gateway's REST API with basic auth; the
//! verification callback is checked locally against the shared key secret
//! (see [`signature`]). Order records are persisted keyed by the gateway's
//! order id so verification can be cross-checked later.

pub mod signature;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::db::mongo::now_rfc3339;
use crate::db::schemas::PaymentOrderDoc;
use crate::db::MongoCollection;
use crate::types::{GatewayError, Result};

/// Caller-supplied order parameters
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub project_id: Option<String>,
    pub client_id: Option<String>,
    pub freelancer_id: Option<String>,
    pub project_title: Option<String>,
}

fn default_currency() -> String {
    "INR".to_string()
}

/// Order as the gateway reports it back
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GatewayOrder {
    pub id: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

/// Convert a major-unit amount to the gateway's minor units
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Receipt tag tying a gateway order back to a project
pub fn order_receipt(project_id: Option<&str>, millis: i64) -> String {
    format!("project_{}_{}", project_id.unwrap_or("generic"), millis)
}

/// HTTP client for the payment gateway's order API
#[derive(Clone, Debug)]
pub struct PaymentGateway {
    client: reqwest::Client,
    key_id: String,
    key_secret: String,
    api_url: String,
}

impl PaymentGateway {
    pub fn new(key_id: String, key_secret: String, api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            key_id,
            key_secret,
            api_url,
        }
    }

    /// Create an order at the gateway
    pub async fn create_order(&self, req: &OrderRequest) -> Result<GatewayOrder> {
        if req.amount <= 0.0 {
            return Err(GatewayError::InvalidArgument("invalid amount".into()));
        }

        let body = json!({
            "amount": to_minor_units(req.amount),
            "currency": req.currency,
            "receipt": order_receipt(req.project_id.as_deref(), Utc::now().timestamp_millis()),
            "notes": {
                "projectId": req.project_id,
                "clientId": req.client_id,
                "freelancerId": req.freelancer_id,
                "projectTitle": req.project_title,
                "type": "escrow_payment",
            },
        });

        let response = self
            .client
            .post(format!("{}/orders", self.api_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Payment(format!("order request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "gateway rejected order creation");
            return Err(GatewayError::Payment(format!(
                "gateway returned {}: {}",
                status, text
            )));
        }

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|e| GatewayError::Payment(format!("malformed order response: {}", e)))
    }

    /// Check a payment callback signature against the key secret
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        signature::verify_signature(order_id, payment_id, &self.key_secret, signature)
    }
}

/// Fields merged onto an existing order record by a verification callback
fn verification_update(payment_id: &str, signature: &str, verified: bool) -> bson::Document {
    bson::doc! { "$set": {
        "status": if verified { "verified" } else { "failed" },
        "paymentId": payment_id,
        "signature": signature,
        "verified": verified,
        "verifiedAt": now_rfc3339(),
    }}
}

/// Gateway plus order-record persistence
///
/// The order store is optional; without a database (dev mode) orders are
/// created and verified but not recorded.
#[derive(Clone, Debug)]
pub struct PaymentService {
    gateway: PaymentGateway,
    orders: Option<MongoCollection<PaymentOrderDoc>>,
}

impl PaymentService {
    pub fn new(gateway: PaymentGateway, orders: Option<MongoCollection<PaymentOrderDoc>>) -> Self {
        Self { gateway, orders }
    }

    /// Create an order at the gateway and record it
    pub async fn create_order(&self, req: &OrderRequest) -> Result<GatewayOrder> {
        let order = self.gateway.create_order(req).await?;

        if let Some(orders) = &self.orders {
            let record = PaymentOrderDoc::new(
                order.id.clone(),
                order.amount,
                order.currency.clone(),
                req.project_id.clone(),
                req.client_id.clone(),
                req.freelancer_id.clone(),
            );
            let mut set = bson::to_document(&record)
                .map_err(|e| GatewayError::Database(format!("Serialization failed: {}", e)))?;
            // _id comes from the filter, not the $set
            set.remove("_id");
            orders
                .upsert_one(
                    bson::doc! { "_id": &order.id },
                    bson::doc! { "$set": set },
                )
                .await?;
        }

        info!(order_id = %order.id, amount = order.amount, "payment order created");
        Ok(order)
    }

    /// Verify a payment callback and persist the outcome on the order record
    ///
    /// Only records written by [`create_order`](Self::create_order) are
    /// touched; a verification for an unknown order must not create a
    /// partial document that later fails typed reads.
    pub async fn verify_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool> {
        let verified = self.gateway.verify(order_id, payment_id, signature);

        if let Some(orders) = &self.orders {
            let result = orders
                .update_one(
                    bson::doc! { "_id": order_id },
                    verification_update(payment_id, signature, verified),
                )
                .await?;
            if result.matched_count == 0 {
                warn!(order_id, "verification outcome has no recorded order");
            }
        }

        if verified {
            info!(order_id, payment_id, "payment verified");
        } else {
            warn!(order_id, payment_id, "payment signature rejected");
        }
        Ok(verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_unit_conversion_rounds() {
        assert_eq!(to_minor_units(500.0), 50000);
        assert_eq!(to_minor_units(0.1), 10);
        assert_eq!(to_minor_units(19.995), 2000);
    }

    #[test]
    fn test_receipt_falls_back_to_generic() {
        assert_eq!(order_receipt(Some("p1"), 42), "project_p1_42");
        assert_eq!(order_receipt(None, 42), "project_generic_42");
    }

    #[test]
    fn test_order_request_defaults_currency() {
        let req: OrderRequest =
            serde_json::from_value(serde_json::json!({ "amount": 10.0 })).unwrap();
        assert_eq!(req.currency, "INR");
    }

    #[test]
    fn test_verification_update_merges_outcome_fields_only() {
        let update = verification_update("pay_1", "sig", true);
        let set = update.get_document("$set").unwrap();

        assert_eq!(set.get_str("status").unwrap(), "verified");
        assert_eq!(set.get_str("paymentId").unwrap(), "pay_1");
        assert!(set.get_bool("verified").unwrap());
        // a plain merge, nothing that could seed a fresh document
        assert!(!set.contains_key("_id"));
        assert!(!update.contains_key("$setOnInsert"));

        let failed = verification_update("pay_1", "sig", false);
        let set = failed.get_document("$set").unwrap();
        assert_eq!(set.get_str("status").unwrap(), "failed");
        assert!(!set.get_bool("verified").unwrap());
    }

    #[test]
    fn test_gateway_rejects_non_positive_amount() {
        let gateway = PaymentGateway::new("k".into(), "s".into(), "http://localhost".into());
        let req = OrderRequest {
            amount: 0.0,
            currency: "INR".into(),
            project_id: None,
            client_id: None,
            freelancer_id: None,
            project_title: None,
        };
        let err = tokio_test::block_on(gateway.create_order(&req)).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArgument(_)));
    }
}
