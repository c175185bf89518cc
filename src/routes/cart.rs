use std::sync::Arc;

use actix_web::{delete, get, post, put, web, HttpResponse};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::cart::CartItem;
use crate::types::{AddToCartRequest, CartResponse, UpdateCartItemRequest};
use crate::AppState;

#[get("")]
async fn get_cart(
    app_state: web::Data<Arc<AppState>>,
    user: AuthenticatedUser,
) -> AppResult<web::Json<CartResponse>> {
    Ok(web::Json(
        CartItem::get_cart(&app_state.pool, user.user_id).await?,
    ))
}

#[post("")]
async fn add_to_cart(
    app_state: web::Data<Arc<AppState>>,
    user: AuthenticatedUser,
    web::Json(req): web::Json<AddToCartRequest>,
) -> AppResult<web::Json<CartResponse>> {
    let cart = CartItem::add(
        &app_state.pool,
        user.user_id,
        req.product_id,
        req.quantity,
        &app_state.product_cache,
    )
    .await?;
    Ok(web::Json(cart))
}

#[put("/{product_id}")]
async fn update_cart_item(
    app_state: web::Data<Arc<AppState>>,
    user: AuthenticatedUser,
    product_id: web::Path<Uuid>,
    web::Json(req): web::Json<UpdateCartItemRequest>,
) -> AppResult<web::Json<CartResponse>> {
    let cart = CartItem::set_quantity(
        &app_state.pool,
        user.user_id,
        product_id.into_inner(),
        req.quantity,
        &app_state.product_cache,
    )
    .await?;
    Ok(web::Json(cart))
}

#[delete("/{product_id}")]
async fn remove_cart_item(
    app_state: web::Data<Arc<AppState>>,
    user: AuthenticatedUser,
    product_id: web::Path<Uuid>,
) -> AppResult<web::Json<CartResponse>> {
    let cart = CartItem::remove(&app_state.pool, user.user_id, product_id.into_inner()).await?;
    Ok(web::Json(cart))
}

#[delete("")]
async fn clear_cart(
    app_state: web::Data<Arc<AppState>>,
    user: AuthenticatedUser,
) -> AppResult<HttpResponse> {
    CartItem::clear(&app_state.pool, user.user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_cart)
        .service(add_to_cart)
        .service(update_cart_item)
        .service(remove_cart_item)
        .service(clear_cart);
}
