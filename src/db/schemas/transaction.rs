//! Wallet transaction ledger schema
//!
//! Append-only record of escrow releases and withdrawals; the earnings
//! summary is computed by summing entries per freelancer.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for wallet transactions
pub const TRANSACTION_COLLECTION: &str = "transactions";

/// Transaction document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// "escrow_release" or "withdrawal"
    #[serde(rename = "type")]
    pub transaction_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freelancer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub status: String,
    pub description: String,

    pub created_at: DateTime<Utc>,
}

impl TransactionDoc {
    /// Ledger entry for an escrow release into a freelancer's balance
    pub fn escrow_release(
        project_id: &str,
        freelancer_id: &str,
        client_id: &str,
        amount: f64,
        title: &str,
    ) -> Self {
        Self {
            id: None,
            transaction_type: "escrow_release".to_string(),
            project_id: Some(project_id.to_string()),
            freelancer_id: Some(freelancer_id.to_string()),
            client_id: Some(client_id.to_string()),
            amount,
            method: None,
            status: "completed".to_string(),
            description: format!("Escrow release for project: {}", title),
            created_at: Utc::now(),
        }
    }

    /// Ledger entry for a withdrawal out of a freelancer's balance
    pub fn withdrawal(freelancer_id: &str, amount: f64, method: &str) -> Self {
        Self {
            id: None,
            transaction_type: "withdrawal".to_string(),
            project_id: None,
            freelancer_id: Some(freelancer_id.to_string()),
            client_id: None,
            amount,
            method: Some(method.to_string()),
            status: "completed".to_string(),
            description: format!("Withdrawal via {}", method),
            created_at: Utc::now(),
        }
    }
}

impl IntoIndexes for TransactionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "freelancerId": 1, "createdAt": -1 },
                Some(IndexOptions::builder().name("freelancer_created".to_string()).build()),
            ),
            (
                doc! { "clientId": 1, "createdAt": -1 },
                Some(IndexOptions::builder().name("client_created".to_string()).build()),
            ),
        ]
    }
}
