use axum::{Json, extract::State, response::IntoResponse};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{error, info};

use bookshare_types::api::{ApiResponse, CreatePaymentOrderRequest, GatewayOrder, VerifyPaymentRequest};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

type HmacSha256 = Hmac<Sha256>;

/// Payment gateway credentials and endpoint. The key secret signs
/// callback payloads and must never be sent to a client.
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_url: String,
    pub client: reqwest::Client,
}

impl PaymentConfig {
    pub fn from_env() -> Self {
        Self {
            key_id: std::env::var("BOOKSHARE_PAYMENT_KEY_ID").unwrap_or_default(),
            key_secret: std::env::var("BOOKSHARE_PAYMENT_KEY_SECRET").unwrap_or_default(),
            api_url: std::env::var("BOOKSHARE_PAYMENT_API_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com/v1".into()),
            client: reqwest::Client::new(),
        }
    }
}

/// Create a gateway order for the checkout amount. The gateway works in
/// the smallest currency unit, so rupees are converted to paise here.
pub async fn create_payment_order(
    State(state): State<AppState>,
    Json(req): Json<CreatePaymentOrderRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(amount), Some(book_title)) = (req.amount, req.book_title.as_deref()) else {
        return Err(ApiError::validation("Amount and bookTitle are required"));
    };
    if amount <= 0.0 {
        return Err(ApiError::validation("Amount must be positive"));
    }

    let amount_paise = (amount * 100.0).round() as u64;
    let receipt = format!("receipt_{}", chrono::Utc::now().timestamp_millis());

    let body = serde_json::json!({
        "amount": amount_paise,
        "currency": "INR",
        "receipt": receipt,
        "notes": {
            "bookTitle": book_title,
        },
    });

    let response = state
        .payment
        .client
        .post(format!("{}/orders", state.payment.api_url))
        .basic_auth(&state.payment.key_id, Some(&state.payment.key_secret))
        .json(&body)
        .send()
        .await
        .map_err(|e| {
            error!("Payment gateway unreachable: {}", e);
            ApiError::Upstream
        })?;

    if !response.status().is_success() {
        error!("Payment gateway returned {}", response.status());
        return Err(ApiError::Upstream);
    }

    let order: GatewayOrder = response.json().await.map_err(|e| {
        error!("Payment gateway response unreadable: {}", e);
        ApiError::Upstream
    })?;

    info!("Gateway order {} created for {} paise", order.id, amount_paise);
    Ok(Json(ApiResponse::ok(order)))
}

/// Callback verification: recompute the HMAC the gateway signed and
/// compare in constant time.
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(req): Json<VerifyPaymentRequest>,
) -> ApiResult<impl IntoResponse> {
    if verify_signature(
        &state.payment.key_secret,
        &req.order_id,
        &req.payment_id,
        &req.signature,
    ) {
        Ok(Json(ApiResponse::<()>::message("Payment verified successfully")))
    } else {
        Err(ApiError::validation("Invalid signature"))
    }
}

/// Hex HMAC-SHA256 over `"{order_id}|{payment_id}"`.
pub fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a client-supplied hex signature.
pub fn verify_signature(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(supplied) = hex::decode(signature) else {
        return false;
    };

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    mac.verify_slice(&supplied).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-key-secret";

    #[test]
    fn valid_signature_verifies() {
        let sig = sign(SECRET, "order_N1a2b3", "pay_X9y8z7");
        assert!(verify_signature(SECRET, "order_N1a2b3", "pay_X9y8z7", &sig));
    }

    #[test]
    fn any_mutation_is_rejected() {
        let sig = sign(SECRET, "order_N1a2b3", "pay_X9y8z7");

        // flip one character of the signature
        let mut flipped = sig.clone().into_bytes();
        flipped[0] = if flipped[0] == b'0' { b'1' } else { b'0' };
        let flipped = String::from_utf8(flipped).unwrap();
        assert!(!verify_signature(SECRET, "order_N1a2b3", "pay_X9y8z7", &flipped));

        // mutate each input
        assert!(!verify_signature(SECRET, "order_N1a2b4", "pay_X9y8z7", &sig));
        assert!(!verify_signature(SECRET, "order_N1a2b3", "pay_X9y8z8", &sig));
        assert!(!verify_signature("other-secret", "order_N1a2b3", "pay_X9y8z7", &sig));
    }

    #[test]
    fn garbage_signature_is_rejected() {
        assert!(!verify_signature(SECRET, "order", "pay", "not-hex"));
        assert!(!verify_signature(SECRET, "order", "pay", ""));
    }
}
