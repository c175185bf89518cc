use std::sync::Arc;

use actix_web::{get, post, web, HttpRequest, Responder};
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, CheckoutSessionPaymentStatus,
    CreateCheckoutSession, CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::order::{Order, OrderItem, OrderStatus};
use crate::models::user::User;
use crate::types::{CheckoutResponse, PaymentSuccessQuery};
use crate::{AppConfig, AppState};

pub fn order_page_url(frontend_url: &str, order_id: Uuid) -> String {
    format!("{}/orders/{}", frontend_url, order_id)
}

fn line_items(items: &[OrderItem]) -> AppResult<Vec<CreateCheckoutSessionLineItems>> {
    items
        .iter()
        .map(|item| {
            let quantity = u64::try_from(item.quantity)
                .map_err(|_| AppError::bad_request("Invalid line quantity"))?;
            Ok(CreateCheckoutSessionLineItems {
                price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                    currency: Currency::USD,
                    product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                        name: item.product_name.clone(),
                        ..Default::default()
                    }),
                    unit_amount: Some(item.unit_price_cents),
                    ..Default::default()
                }),
                quantity: Some(quantity),
                ..Default::default()
            })
        })
        .collect()
}

#[post("/checkout/{order_id}")]
async fn checkout(
    app_state: web::Data<Arc<AppState>>,
    app_config: web::Data<Arc<AppConfig>>,
    authenticated_user: AuthenticatedUser,
    order_id: web::Path<Uuid>,
    req: HttpRequest,
) -> AppResult<web::Json<CheckoutResponse>> {
    let order = Order::get(&app_state.pool, order_id.into_inner()).await?;
    if order.user_id != authenticated_user.user_id {
        return Err(AppError::not_found("Order not found"));
    }
    if order.status != OrderStatus::Pending {
        return Err(AppError::conflict("Only pending orders can be paid"));
    }

    let user = User::get(&app_state.pool, authenticated_user.user_id).await?;
    let items = Order::items(&app_state.pool, order.id).await?;
    if items.is_empty() {
        return Err(AppError::bad_request("Order has no items"));
    }

    // Stripe substitutes the placeholder with the real session id.
    let success_url = {
        let connection = req.connection_info();
        format!(
            "{}://{}/pay/success?session_id={{CHECKOUT_SESSION_ID}}",
            connection.scheme(),
            connection.host()
        )
    };
    let cancel_url = order_page_url(&app_config.frontend_url, order.id);
    let order_ref = order.id.to_string();

    let mut params = CreateCheckoutSession::new();
    params.mode = Some(CheckoutSessionMode::Payment);
    params.success_url = Some(success_url.as_str());
    params.cancel_url = Some(cancel_url.as_str());
    params.client_reference_id = Some(order_ref.as_str());
    params.customer_email = Some(user.email.as_str());
    params.line_items = Some(line_items(&items)?);

    let session = CheckoutSession::create(&app_state.stripe_client, params)
        .await
        .map_err(|e| {
            error!("Failed to create checkout session: {:?}", e);
            AppError::from(e)
        })?;

    Order::set_stripe_session(&app_state.pool, order.id, session.id.as_str()).await?;
    info!(
        "Created checkout session {} for order {}",
        session.id, order.reference
    );

    let url = session
        .url
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Checkout session has no url")))?;
    Ok(web::Json(CheckoutResponse { url }))
}

#[get("/success")]
async fn payment_success(
    app_state: web::Data<Arc<AppState>>,
    app_config: web::Data<Arc<AppConfig>>,
    query: web::Query<PaymentSuccessQuery>,
) -> AppResult<impl Responder> {
    let session_id = query
        .session_id
        .parse::<CheckoutSessionId>()
        .map_err(|_| AppError::bad_request("Invalid session id"))?;

    let session = CheckoutSession::retrieve(&app_state.stripe_client, &session_id, &[]).await?;
    let order_id = session
        .client_reference_id
        .as_deref()
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| AppError::bad_request("Session is not linked to an order"))?;

    if session.payment_status == CheckoutSessionPaymentStatus::Paid {
        Order::mark_paid(&app_state.pool, order_id, session_id.as_str()).await?;
    } else {
        warn!(
            "Checkout session {} returned unpaid for order {}",
            session_id, order_id
        );
    }

    Ok(web::Redirect::to(order_page_url(&app_config.frontend_url, order_id)).see_other())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(checkout).service(payment_success);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, price: i64, quantity: i32) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            order_id: Uuid::nil(),
            product_id: Some(Uuid::new_v4()),
            product_name: name.to_string(),
            unit_price_cents: price,
            quantity,
        }
    }

    #[test]
    fn builds_usd_line_items() {
        let lines = line_items(&[item("Print A4", 1250, 2), item("Frame", 3000, 1)]).unwrap();
        assert_eq!(lines.len(), 2);
        let price = lines[0].price_data.as_ref().unwrap();
        assert_eq!(price.currency, Currency::USD);
        assert_eq!(price.unit_amount, Some(1250));
        assert_eq!(price.product_data.as_ref().unwrap().name, "Print A4");
        assert_eq!(lines[0].quantity, Some(2));
    }

    #[test]
    fn rejects_negative_quantities() {
        assert!(line_items(&[item("Broken", 100, -1)]).is_err());
    }

    #[test]
    fn order_page_points_at_frontend() {
        let id = Uuid::nil();
        assert_eq!(
            order_page_url("http://localhost:5173", id),
            format!("http://localhost:5173/orders/{}", id)
        );
    }
}
