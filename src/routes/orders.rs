use std::sync::Arc;

use actix_web::{get, post, put, web, HttpResponse};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AdminUser, AuthenticatedUser};
use crate::models::order::Order;
use crate::types::{OrderQuery, OrderWithItems, PlaceOrderRequest, UpdateOrderStatusRequest};
use crate::AppState;

#[post("")]
async fn place_order(
    app_state: web::Data<Arc<AppState>>,
    user: AuthenticatedUser,
    req: Option<web::Json<PlaceOrderRequest>>,
) -> AppResult<HttpResponse> {
    let req = req.map(web::Json::into_inner).unwrap_or_default();
    let address = req
        .shipping_address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty());

    let order = Order::place(
        &app_state.pool,
        user.user_id,
        address,
        &app_state.product_cache,
    )
    .await?;
    Ok(HttpResponse::Created().json(order))
}

#[get("/mine")]
async fn my_orders(
    app_state: web::Data<Arc<AppState>>,
    user: AuthenticatedUser,
) -> AppResult<web::Json<Vec<OrderWithItems>>> {
    Ok(web::Json(
        Order::list_for_user(&app_state.pool, user.user_id).await?,
    ))
}

#[get("/{order_id}")]
async fn get_order(
    app_state: web::Data<Arc<AppState>>,
    user: AuthenticatedUser,
    admin: Option<AdminUser>,
    order_id: web::Path<Uuid>,
) -> AppResult<web::Json<OrderWithItems>> {
    let order = Order::get(&app_state.pool, order_id.into_inner()).await?;
    if order.user_id != user.user_id && admin.is_none() {
        return Err(AppError::not_found("Order not found"));
    }
    Ok(web::Json(Order::with_items(&app_state.pool, order).await?))
}

#[post("/{order_id}/cancel")]
async fn cancel_order(
    app_state: web::Data<Arc<AppState>>,
    user: AuthenticatedUser,
    order_id: web::Path<Uuid>,
) -> AppResult<web::Json<Order>> {
    let order = Order::cancel_for_user(
        &app_state.pool,
        order_id.into_inner(),
        user.user_id,
        &app_state.product_cache,
    )
    .await?;
    Ok(web::Json(order))
}

#[put("/{order_id}/status")]
async fn update_order_status(
    app_state: web::Data<Arc<AppState>>,
    admin: AdminUser,
    order_id: web::Path<Uuid>,
    web::Json(req): web::Json<UpdateOrderStatusRequest>,
) -> AppResult<web::Json<Order>> {
    let order = Order::update_status(
        &app_state.pool,
        order_id.into_inner(),
        req.status,
        &app_state.product_cache,
    )
    .await?;
    info!(
        "Admin {} set order {} to {}",
        admin.user_id,
        order.reference,
        order.status.as_str()
    );
    Ok(web::Json(order))
}

#[get("/orders")]
pub async fn admin_list_orders(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    query: web::Query<OrderQuery>,
) -> AppResult<web::Json<Vec<Order>>> {
    Ok(web::Json(Order::list(&app_state.pool, query.status).await?))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(place_order)
        .service(my_orders)
        .service(get_order)
        .service(cancel_order)
        .service(update_order_status);
}
