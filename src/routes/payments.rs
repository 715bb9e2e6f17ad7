//! Payment gateway routes
//!
//! - `POST /api/payments/create-order` - create an escrow order at the gateway
//! - `POST /api/payments/verify` - verify a payment callback signature

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{error_response, json_response, read_json};
use crate::payments::OrderRequest;
use crate::server::AppState;
use crate::types::Result;

/// POST /api/payments/create-order
pub async fn handle_create_order(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let result: Result<Response<Full<Bytes>>> = async {
        let body: OrderRequest = read_json(req).await?;
        let order = state.payments()?.create_order(&body).await?;

        Ok(json_response(
            StatusCode::OK,
            &json!({
                "success": true,
                "order": {
                    "id": order.id,
                    "amount": order.amount,
                    "currency": order.currency,
                    "receipt": order.receipt,
                },
            }),
        ))
    }
    .await;

    result.unwrap_or_else(|e| error_response(&e))
}

/// Verification callback fields
///
/// Accepts both the gateway's prefixed callback names and the plain names
/// the frontend uses when relaying them.
#[derive(Deserialize)]
struct VerifyBody {
    #[serde(alias = "razorpay_order_id")]
    #[serde(rename = "orderId")]
    order_id: Option<String>,
    #[serde(alias = "razorpay_payment_id")]
    #[serde(rename = "paymentId")]
    payment_id: Option<String>,
    #[serde(alias = "razorpay_signature")]
    #[serde(rename = "signature")]
    signature: Option<String>,
}

/// POST /api/payments/verify
pub async fn handle_verify_payment(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let body: VerifyBody = match read_json(req).await {
        Ok(body) => body,
        Err(e) => return error_response(&e),
    };

    let (Some(order_id), Some(payment_id), Some(signature)) =
        (body.order_id, body.payment_id, body.signature)
    else {
        return json_response(
            StatusCode::BAD_REQUEST,
            &json!({ "error": "Missing payment fields", "verified": false }),
        );
    };

    let verified = match state.payments() {
        Ok(payments) => match payments
            .verify_payment(&order_id, &payment_id, &signature)
            .await
        {
            Ok(v) => v,
            Err(e) => return error_response(&e),
        },
        Err(e) => return error_response(&e),
    };

    if !verified {
        return json_response(
            StatusCode::BAD_REQUEST,
            &json!({ "error": "Invalid payment signature", "verified": false }),
        );
    }

    json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "verified": true,
            "orderId": order_id,
            "paymentId": payment_id,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_body_accepts_gateway_names() {
        let body: VerifyBody = serde_json::from_value(serde_json::json!({
            "razorpay_order_id": "order_1",
            "razorpay_payment_id": "pay_1",
            "razorpay_signature": "sig"
        }))
        .unwrap();
        assert_eq!(body.order_id.as_deref(), Some("order_1"));
        assert_eq!(body.payment_id.as_deref(), Some("pay_1"));
    }

    #[test]
    fn test_verify_body_accepts_plain_names() {
        let body: VerifyBody = serde_json::from_value(serde_json::json!({
            "orderId": "order_1",
            "paymentId": "pay_1",
            "signature": "sig"
        }))
        .unwrap();
        assert_eq!(body.signature.as_deref(), Some("sig"));
    }

    #[test]
    fn test_verify_body_tolerates_missing_fields() {
        let body: VerifyBody = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(body.order_id.is_none());
    }
}
