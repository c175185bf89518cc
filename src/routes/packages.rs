use std::sync::Arc;

use actix_web::{delete, get, post, put, web, HttpResponse};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AdminUser;
use crate::models::package::{Package, PackageRemoval};
use crate::types::{CreatePackageRequest, UpdatePackageRequest};
use crate::AppState;

#[get("")]
async fn list_packages(app_state: web::Data<Arc<AppState>>) -> AppResult<web::Json<Vec<Package>>> {
    let packages = Package::list_active(&app_state.pool, &app_state.package_cache).await?;
    Ok(web::Json(packages))
}

#[get("/{package_id}")]
async fn get_package(
    app_state: web::Data<Arc<AppState>>,
    package_id: web::Path<Uuid>,
) -> AppResult<web::Json<Package>> {
    let package = Package::get(&app_state.pool, package_id.into_inner()).await?;
    if !package.is_active {
        return Err(AppError::not_found("Package not found"));
    }
    Ok(web::Json(package))
}

#[post("")]
async fn create_package(
    app_state: web::Data<Arc<AppState>>,
    admin: AdminUser,
    web::Json(req): web::Json<CreatePackageRequest>,
) -> AppResult<HttpResponse> {
    let package = Package::create(&app_state.pool, &req, &app_state.package_cache).await?;
    info!("Admin {} created package {}", admin.user_id, package.id);
    Ok(HttpResponse::Created().json(package))
}

#[put("/{package_id}")]
async fn update_package(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    package_id: web::Path<Uuid>,
    web::Json(req): web::Json<UpdatePackageRequest>,
) -> AppResult<web::Json<Package>> {
    let package = Package::update(
        &app_state.pool,
        package_id.into_inner(),
        &req,
        &app_state.package_cache,
    )
    .await?;
    Ok(web::Json(package))
}

#[delete("/{package_id}")]
async fn delete_package(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    package_id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    match Package::remove(&app_state.pool, package_id.into_inner(), &app_state.package_cache)
        .await?
    {
        PackageRemoval::Deleted => Ok(HttpResponse::NoContent().finish()),
        PackageRemoval::Deactivated => Ok(HttpResponse::Ok().json(json!({
            "message": "Package has bookings and was deactivated instead"
        }))),
    }
}

#[get("/packages")]
pub async fn admin_list_packages(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<web::Json<Vec<Package>>> {
    Ok(web::Json(Package::list_all(&app_state.pool).await?))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_packages)
        .service(get_package)
        .service(create_package)
        .service(update_package)
        .service(delete_package);
}
