//! Freelancer wallet: balance mutations, withdrawals, earnings
//!
//! Balance writes go through single guarded atomic updates instead of a
//! read-then-write pair, so concurrent releases and withdrawals against the
//! same user cannot observe a stale balance. A debit matches only while the
//! balance covers the amount; a credit is a plain `$inc` upsert.

use bson::{doc, Document};
use serde::Serialize;
use tracing::info;

use crate::db::mongo::now_rfc3339;
use crate::db::schemas::{TransactionDoc, UserDoc, WithdrawalDoc};
use crate::db::{MongoCollection, Stores};
use crate::types::{GatewayError, Result};

/// Update document crediting a balance
fn credit_update(amount: f64) -> Document {
    doc! {
        "$inc": { "availableBalance": amount },
        "$set": { "updatedAt": now_rfc3339() },
    }
}

/// Filter matching a user only while their balance covers `amount`
fn debit_filter(user_id: &str, amount: f64) -> Document {
    doc! {
        "_id": user_id,
        "availableBalance": { "$gte": amount },
    }
}

/// Update document debiting a balance
fn debit_update(amount: f64) -> Document {
    doc! {
        "$inc": { "availableBalance": -amount },
        "$set": { "updatedAt": now_rfc3339() },
    }
}

/// Per-user earnings rollup
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EarningsSummary {
    pub available_balance: f64,
    pub total_earnings: f64,
    pub total_withdrawn: f64,
    pub transactions: Vec<TransactionDoc>,
}

/// Wallet service over the users, transactions, and withdrawals collections
#[derive(Clone, Debug)]
pub struct WalletService {
    users: MongoCollection<UserDoc>,
    transactions: MongoCollection<TransactionDoc>,
    withdrawals: MongoCollection<WithdrawalDoc>,
}

impl WalletService {
    pub fn new(stores: &Stores) -> Self {
        Self {
            users: stores.users.clone(),
            transactions: stores.transactions.clone(),
            withdrawals: stores.withdrawals.clone(),
        }
    }

    /// Credit a user's available balance
    ///
    /// Upserts so a release to a user without a profile document still lands.
    pub async fn credit(&self, user_id: &str, amount: f64) -> Result<()> {
        self.users
            .upsert_one(doc! { "_id": user_id }, credit_update(amount))
            .await?;
        info!(user_id, amount, "credited balance");
        Ok(())
    }

    /// Debit a user's available balance, returning the new balance
    ///
    /// The filter carries the balance check, so the debit either applies
    /// against a covering balance or matches nothing.
    pub async fn debit(&self, user_id: &str, amount: f64) -> Result<f64> {
        let result = self
            .users
            .update_one(debit_filter(user_id, amount), debit_update(amount))
            .await?;

        if result.matched_count == 0 {
            return match self.users.find_one(doc! { "_id": user_id }).await? {
                Some(_) => Err(GatewayError::InsufficientBalance),
                None => Err(GatewayError::NotFound("user")),
            };
        }

        let balance = self
            .users
            .find_one(doc! { "_id": user_id })
            .await?
            .map(|u| u.available_balance)
            .unwrap_or(0.0);

        info!(user_id, amount, balance, "debited balance");
        Ok(balance)
    }

    /// Process a withdrawal request
    ///
    /// Debits first; the ledger entry and the pending payout record are only
    /// written once the guarded debit has landed. Returns the new balance.
    pub async fn withdraw(
        &self,
        user_id: &str,
        amount: f64,
        method: &str,
        account_details: Option<serde_json::Value>,
    ) -> Result<f64> {
        if amount <= 0.0 {
            return Err(GatewayError::InvalidArgument(
                "withdrawal amount must be positive".into(),
            ));
        }

        let new_balance = self.debit(user_id, amount).await?;

        self.transactions
            .insert_one(&TransactionDoc::withdrawal(user_id, amount, method))
            .await?;
        self.withdrawals
            .insert_one(&WithdrawalDoc::new(user_id, amount, method, account_details))
            .await?;

        Ok(new_balance)
    }

    /// List ledger entries, optionally filtered by party
    pub async fn list_transactions(
        &self,
        freelancer_id: Option<&str>,
        client_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<TransactionDoc>> {
        let mut filter = doc! {};
        if let Some(fid) = freelancer_id {
            filter.insert("freelancerId", fid);
        }
        if let Some(cid) = client_id {
            filter.insert("clientId", cid);
        }

        self.transactions
            .find_many(filter, Some(doc! { "createdAt": -1 }), Some(limit))
            .await
    }

    /// Record an externally-shaped ledger entry
    pub async fn record_transaction(&self, tx: &TransactionDoc) -> Result<String> {
        self.transactions.insert_one(tx).await
    }

    /// Earnings rollup for one freelancer: balance plus recent ledger sums
    pub async fn earnings(&self, user_id: &str) -> Result<EarningsSummary> {
        let available_balance = self
            .users
            .find_one(doc! { "_id": user_id })
            .await?
            .map(|u| u.available_balance)
            .unwrap_or(0.0);

        let transactions = self
            .transactions
            .find_many(
                doc! { "freelancerId": user_id },
                Some(doc! { "createdAt": -1 }),
                Some(50),
            )
            .await?;

        let total_earnings = sum_by_type(&transactions, "escrow_release");
        let total_withdrawn = sum_by_type(&transactions, "withdrawal");

        Ok(EarningsSummary {
            available_balance,
            total_earnings,
            total_withdrawn,
            transactions,
        })
    }
}

fn sum_by_type(transactions: &[TransactionDoc], transaction_type: &str) -> f64 {
    transactions
        .iter()
        .filter(|t| t.transaction_type == transaction_type)
        .map(|t| t.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_filter_guards_balance() {
        let filter = debit_filter("u1", 150.0);
        assert_eq!(filter.get_str("_id").unwrap(), "u1");
        let guard = filter.get_document("availableBalance").unwrap();
        assert_eq!(guard.get_f64("$gte").unwrap(), 150.0);
    }

    #[test]
    fn test_debit_update_decrements() {
        let update = debit_update(40.0);
        let inc = update.get_document("$inc").unwrap();
        assert_eq!(inc.get_f64("availableBalance").unwrap(), -40.0);
    }

    #[test]
    fn test_credit_update_increments() {
        let update = credit_update(500.0);
        let inc = update.get_document("$inc").unwrap();
        assert_eq!(inc.get_f64("availableBalance").unwrap(), 500.0);
        assert!(update.get_document("$set").unwrap().contains_key("updatedAt"));
    }

    #[test]
    fn test_earnings_sums_by_type() {
        let transactions = vec![
            TransactionDoc::escrow_release("p1", "f1", "c1", 300.0, "Site"),
            TransactionDoc::escrow_release("p2", "f1", "c2", 200.0, "App"),
            TransactionDoc::withdrawal("f1", 100.0, "bank"),
        ];

        assert_eq!(sum_by_type(&transactions, "escrow_release"), 500.0);
        assert_eq!(sum_by_type(&transactions, "withdrawal"), 100.0);
    }
}
