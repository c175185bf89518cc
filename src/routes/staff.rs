use std::sync::Arc;

use actix_web::{delete, get, post, put, web, HttpResponse};
use tracing::info;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::AdminUser;
use crate::models::staff::Staff;
use crate::types::{CreateStaffRequest, StaffQuery, UpdateStaffRequest};
use crate::AppState;

#[get("")]
async fn list_staff(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    query: web::Query<StaffQuery>,
) -> AppResult<web::Json<Vec<Staff>>> {
    Ok(web::Json(Staff::list(&app_state.pool, query.role).await?))
}

#[get("/{staff_id}")]
async fn get_staff(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    staff_id: web::Path<Uuid>,
) -> AppResult<web::Json<Staff>> {
    Ok(web::Json(Staff::get(&app_state.pool, staff_id.into_inner()).await?))
}

#[post("")]
async fn create_staff(
    app_state: web::Data<Arc<AppState>>,
    admin: AdminUser,
    web::Json(req): web::Json<CreateStaffRequest>,
) -> AppResult<HttpResponse> {
    let staff = Staff::create(&app_state.pool, &req).await?;
    info!("Admin {} added staff member {}", admin.user_id, staff.id);
    Ok(HttpResponse::Created().json(staff))
}

#[put("/{staff_id}")]
async fn update_staff(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    staff_id: web::Path<Uuid>,
    web::Json(req): web::Json<UpdateStaffRequest>,
) -> AppResult<web::Json<Staff>> {
    let staff = Staff::update(&app_state.pool, staff_id.into_inner(), &req).await?;
    Ok(web::Json(staff))
}

#[delete("/{staff_id}")]
async fn delete_staff(
    app_state: web::Data<Arc<AppState>>,
    admin: AdminUser,
    staff_id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let staff_id = staff_id.into_inner();
    Staff::delete(&app_state.pool, staff_id).await?;
    info!("Admin {} removed staff member {}", admin.user_id, staff_id);
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_staff)
        .service(get_staff)
        .service(create_staff)
        .service(update_staff)
        .service(delete_staff);
}
