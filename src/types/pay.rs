use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize)]
pub struct PaymentSuccessQuery {
    pub session_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub url: String,
}

/// The subset of a Stripe event this service reads.
#[derive(Deserialize, Debug)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Deserialize, Debug)]
pub struct StripeEventData {
    pub object: StripeCheckoutObject,
}

#[derive(Deserialize, Debug)]
pub struct StripeCheckoutObject {
    #[serde(default)]
    pub id: String,
    pub client_reference_id: Option<String>,
    pub payment_status: Option<String>,
}
