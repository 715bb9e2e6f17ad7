//! Wallet routes: ledger, withdrawals, earnings
//!
//! - `GET /api/transactions` - list ledger entries (freelancerId/clientId filters)
//! - `POST /api/transactions` - record a ledger entry
//! - `POST /api/withdrawals` - request a withdrawal
//! - `GET /api/earnings/{userId}` - earnings rollup

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{
    docs_json, error_response, json_response, not_found_response, parse_limit,
    parse_query_params, read_json,
};
use crate::db::schemas::TransactionDoc;
use crate::server::AppState;
use crate::types::Result;

pub async fn handle_transactions_request(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    let result = match (&method, path.as_str()) {
        (&Method::GET, "/api/transactions") => list_transactions(&state, &query).await,
        (&Method::POST, "/api/transactions") => record_transaction(&state, req).await,
        _ => return not_found_response(&path),
    };

    result.unwrap_or_else(|e| error_response(&e))
}

async fn list_transactions(state: &AppState, query: &str) -> Result<Response<Full<Bytes>>> {
    let params = parse_query_params(query);
    let transactions = state
        .wallet()?
        .list_transactions(
            params.get("freelancerId").map(String::as_str),
            params.get("clientId").map(String::as_str),
            parse_limit(&params, 50),
        )
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "transactions": docs_json(&transactions) }),
    ))
}

async fn record_transaction(
    state: &AppState,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let tx: TransactionDoc = read_json(req).await?;
    let transaction_id = state.wallet()?.record_transaction(&tx).await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "transactionId": transaction_id,
            "message": "Transaction recorded",
        }),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawalBody {
    user_id: String,
    amount: f64,
    method: String,
    account_details: Option<serde_json::Value>,
}

/// POST /api/withdrawals
pub async fn handle_withdrawal(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let result: Result<Response<Full<Bytes>>> = async {
        let body: WithdrawalBody = read_json(req).await?;
        let new_balance = state
            .wallet()?
            .withdraw(
                &body.user_id,
                body.amount,
                &body.method,
                body.account_details,
            )
            .await?;

        Ok(json_response(
            StatusCode::OK,
            &json!({
                "success": true,
                "message": "Withdrawal request submitted successfully",
                "newBalance": new_balance,
            }),
        ))
    }
    .await;

    result.unwrap_or_else(|e| error_response(&e))
}

/// GET /api/earnings/{userId}
pub async fn handle_earnings(state: Arc<AppState>, user_id: &str) -> Response<Full<Bytes>> {
    let result: Result<Response<Full<Bytes>>> = async {
        let summary = state.wallet()?.earnings(user_id).await?;

        Ok(json_response(
            StatusCode::OK,
            &json!({
                "success": true,
                "earnings": {
                    "availableBalance": summary.available_balance,
                    "totalEarnings": summary.total_earnings,
                    "totalWithdrawn": summary.total_withdrawn,
                    "transactions": docs_json(&summary.transactions),
                },
            }),
        ))
    }
    .await;

    result.unwrap_or_else(|e| error_response(&e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdrawal_body_parses() {
        let body: WithdrawalBody = serde_json::from_value(serde_json::json!({
            "userId": "f1",
            "amount": 250.0,
            "method": "bank_transfer",
            "accountDetails": { "iban": "XX00" }
        }))
        .unwrap();
        assert_eq!(body.amount, 250.0);
        assert!(body.account_details.is_some());
    }

    #[test]
    fn test_withdrawal_requires_amount() {
        assert!(serde_json::from_value::<WithdrawalBody>(serde_json::json!({
            "userId": "f1",
            "method": "bank_transfer"
        }))
        .is_err());
    }
}
