use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use actix_web::{post, web, HttpRequest, HttpResponse};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::order::Order;
use crate::types::StripeEvent;
use crate::{AppConfig, AppState};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "stripe-signature";
const TOLERANCE_SECS: u64 = 300;

fn invalid_signature(msg: &str) -> AppError {
    AppError::BadRequest(msg.to_string())
}

/// Checks a `t=<unix secs>,v1=<hex hmac>` header against `"{t}.{body}"`.
pub fn verify_stripe_signature(
    header: &str,
    body: &str,
    secret: &str,
    now_secs: u64,
) -> AppResult<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| invalid_signature("Missing timestamp"))?;
    if signatures.is_empty() {
        return Err(invalid_signature("Missing signature"));
    }

    let issued = timestamp
        .parse::<u64>()
        .map_err(|_| invalid_signature("Invalid timestamp"))?;
    if issued.saturating_add(TOLERANCE_SECS) < now_secs {
        return Err(invalid_signature("Timestamp is too old"));
    }

    let message = format!("{}.{}", timestamp, body);
    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| AppError::Internal(anyhow::anyhow!("HMAC initialization error")))?;
        mac.update(message.as_bytes());
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(invalid_signature("Invalid signature"))
}

#[post("/stripe")]
async fn stripe_webhook(
    app_state: web::Data<Arc<AppState>>,
    app_config: web::Data<Arc<AppConfig>>,
    req: HttpRequest,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .ok_or_else(|| invalid_signature("Missing signature"))?
        .to_str()
        .map_err(|_| invalid_signature("Invalid signature format"))?;

    let body_str =
        std::str::from_utf8(&body).map_err(|_| AppError::bad_request("Invalid body format"))?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("System time error")))?
        .as_secs();
    verify_stripe_signature(signature, body_str, &app_config.stripe_webhook_secret, now)?;

    let event: StripeEvent =
        serde_json::from_slice(&body).map_err(|_| AppError::bad_request("Invalid JSON body"))?;

    if event.event_type != "checkout.session.completed" {
        debug!("Ignoring Stripe event {} ({})", event.id, event.event_type);
        return Ok(HttpResponse::Ok().finish());
    }

    let session = event.data.object;
    if session.payment_status.as_deref() != Some("paid") {
        info!("Checkout session {} completed without payment", session.id);
        return Ok(HttpResponse::Ok().finish());
    }

    match session
        .client_reference_id
        .as_deref()
        .and_then(|id| Uuid::parse_str(id).ok())
    {
        Some(order_id) => {
            Order::mark_paid(&app_state.pool, order_id, &session.id).await?;
        }
        None => warn!("Checkout session {} has no order reference", session.id),
    }

    Ok(HttpResponse::Ok().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(stripe_webhook);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &str = r#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    fn sign(timestamp: u64, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, body).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_valid_signature() {
        let header = format!("t=1700000000,v1={}", sign(1_700_000_000, BODY));
        assert!(verify_stripe_signature(&header, BODY, SECRET, 1_700_000_010).is_ok());
    }

    #[test]
    fn accepts_any_matching_v1() {
        let header = format!(
            "t=1700000000,v1=deadbeef,v0=abc,v1={}",
            sign(1_700_000_000, BODY)
        );
        assert!(verify_stripe_signature(&header, BODY, SECRET, 1_700_000_000).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let header = format!("t=1700000000,v1={}", sign(1_700_000_000, BODY));
        assert!(verify_stripe_signature(&header, "{}", SECRET, 1_700_000_000).is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let header = format!("t=1700000000,v1={}", sign(1_700_000_000, BODY));
        assert!(verify_stripe_signature(&header, BODY, SECRET, 1_700_000_301).is_err());
    }

    #[test]
    fn rejects_malformed_headers() {
        assert!(verify_stripe_signature("", BODY, SECRET, 0).is_err());
        assert!(verify_stripe_signature("t=abc,v1=00", BODY, SECRET, 0).is_err());
        assert!(verify_stripe_signature("t=1700000000", BODY, SECRET, 0).is_err());
    }

    #[test]
    fn far_future_timestamp_does_not_overflow() {
        let header = format!("t={},v1=00", u64::MAX);
        assert!(verify_stripe_signature(&header, BODY, SECRET, 1_700_000_000).is_err());
    }

    #[test]
    fn parses_checkout_event() {
        let raw = r#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_test_1",
                "client_reference_id": "6f1c1d3e-3b1a-4d4f-9d55-0a2b7c2b1f10",
                "payment_status": "paid"
            }}
        }"#;
        let event: StripeEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");
        assert_eq!(event.data.object.payment_status.as_deref(), Some("paid"));
    }
}
