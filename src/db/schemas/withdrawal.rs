//! Withdrawal request schema
//!
//! Admin-facing payout queue; entries stay "pending" until settled outside
//! this service.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for withdrawal requests
pub const WITHDRAWAL_COLLECTION: &str = "withdrawals";

/// Withdrawal request document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub user_id: String,
    pub amount: f64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_details: Option<serde_json::Value>,
    pub status: String,
    pub requested_at: DateTime<Utc>,
}

impl WithdrawalDoc {
    pub fn new(
        user_id: &str,
        amount: f64,
        method: &str,
        account_details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: None,
            user_id: user_id.to_string(),
            amount,
            method: method.to_string(),
            account_details,
            status: "pending".to_string(),
            requested_at: Utc::now(),
        }
    }
}

impl IntoIndexes for WithdrawalDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "userId": 1, "requestedAt": -1 },
            Some(IndexOptions::builder().name("user_requested".to_string()).build()),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_pending() {
        let w = WithdrawalDoc::new("u1", 40.0, "bank", None);
        assert_eq!(w.status, "pending");
        assert_eq!(w.amount, 40.0);
    }
}
