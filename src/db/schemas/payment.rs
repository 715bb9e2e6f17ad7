//! Payment order schema
//!
//! One document per gateway order, keyed by the order id the gateway
//! assigned (string `_id`). Verification flips the status and records the
//! payment id and signature.

use bson::Document;
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for payment orders
pub const PAYMENT_COLLECTION: &str = "payments";

/// Order verification status
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOrderStatus {
    Created,
    Verified,
    Failed,
}

/// Payment order document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrderDoc {
    /// Gateway-assigned order id
    #[serde(rename = "_id")]
    pub id: String,

    /// Amount in minor currency units, as the gateway counts it
    pub amount: i64,
    pub currency: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freelancer_id: Option<String>,

    pub status: PaymentOrderStatus,
    #[serde(default)]
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl PaymentOrderDoc {
    pub fn new(
        order_id: String,
        amount: i64,
        currency: String,
        project_id: Option<String>,
        client_id: Option<String>,
        freelancer_id: Option<String>,
    ) -> Self {
        Self {
            id: order_id,
            amount,
            currency,
            project_id,
            client_id,
            freelancer_id,
            status: PaymentOrderStatus::Created,
            verified: false,
            payment_id: None,
            signature: None,
            created_at: Utc::now(),
            verified_at: None,
        }
    }
}

impl IntoIndexes for PaymentOrderDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        // Keyed by the gateway order id; lookups are by _id only
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order_unverified() {
        let order = PaymentOrderDoc::new(
            "order_abc".into(),
            50000,
            "INR".into(),
            Some("p1".into()),
            None,
            None,
        );
        assert_eq!(order.status, PaymentOrderStatus::Created);
        assert!(!order.verified);
        assert!(order.payment_id.is_none());
    }

    #[test]
    fn test_order_id_is_primary_key() {
        let order = PaymentOrderDoc::new("order_abc".into(), 1, "INR".into(), None, None, None);
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["_id"], "order_abc");
        assert_eq!(json["status"], "created");
    }
}
