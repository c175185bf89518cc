use std::sync::Arc;

use actix_web::{delete, get, post, put, web, HttpResponse};
use tracing::info;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::AdminUser;
use crate::models::product::Product;
use crate::types::{CreateProductRequest, Page, ProductQuery, UpdateProductRequest};
use crate::AppState;

#[get("")]
async fn list_products(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<ProductQuery>,
) -> AppResult<web::Json<Page<Product>>> {
    let page = Product::list_active(&app_state.pool, &query).await?;
    Ok(web::Json(page))
}

#[get("/{product_id}")]
async fn get_product(
    app_state: web::Data<Arc<AppState>>,
    product_id: web::Path<Uuid>,
) -> AppResult<web::Json<Product>> {
    let product =
        Product::get_active(&app_state.pool, product_id.into_inner(), &app_state.product_cache)
            .await?;
    Ok(web::Json(product))
}

#[post("")]
async fn create_product(
    app_state: web::Data<Arc<AppState>>,
    admin: AdminUser,
    web::Json(req): web::Json<CreateProductRequest>,
) -> AppResult<HttpResponse> {
    let product = Product::create(&app_state.pool, &req).await?;
    info!("Admin {} created product {}", admin.user_id, product.id);
    Ok(HttpResponse::Created().json(product))
}

#[put("/{product_id}")]
async fn update_product(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    product_id: web::Path<Uuid>,
    web::Json(req): web::Json<UpdateProductRequest>,
) -> AppResult<web::Json<Product>> {
    let product = Product::update(
        &app_state.pool,
        product_id.into_inner(),
        &req,
        &app_state.product_cache,
    )
    .await?;
    Ok(web::Json(product))
}

#[delete("/{product_id}")]
async fn delete_product(
    app_state: web::Data<Arc<AppState>>,
    admin: AdminUser,
    product_id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let product_id = product_id.into_inner();
    Product::delete(&app_state.pool, product_id, &app_state.product_cache).await?;
    info!("Admin {} deleted product {}", admin.user_id, product_id);
    Ok(HttpResponse::NoContent().finish())
}

/// Inactive products included.
#[get("/products")]
pub async fn admin_list_products(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<web::Json<Vec<Product>>> {
    Ok(web::Json(Product::list_all(&app_state.pool).await?))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_products)
        .service(get_product)
        .service(create_product)
        .service(update_product)
        .service(delete_product);
}
