use std::sync::Arc;

use actix_web::{delete, get, post, put, web, HttpResponse};
use tracing::info;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::{AdminUser, AuthenticatedUser};
use crate::models::notification::Notification;
use crate::models::user::User;
use crate::types::{CreateNotificationRequest, UpdateNotificationRequest};
use crate::AppState;

#[get("/active")]
async fn active_notifications(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> AppResult<web::Json<Vec<Notification>>> {
    let user = User::get(&app_state.pool, authenticated_user.user_id).await?;
    Ok(web::Json(
        Notification::active_for(&app_state.pool, user.is_verified).await?,
    ))
}

#[get("")]
async fn list_notifications(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<web::Json<Vec<Notification>>> {
    Ok(web::Json(Notification::list(&app_state.pool).await?))
}

#[get("/{notification_id}")]
async fn get_notification(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    notification_id: web::Path<Uuid>,
) -> AppResult<web::Json<Notification>> {
    Ok(web::Json(
        Notification::get(&app_state.pool, notification_id.into_inner()).await?,
    ))
}

#[post("")]
async fn create_notification(
    app_state: web::Data<Arc<AppState>>,
    admin: AdminUser,
    web::Json(req): web::Json<CreateNotificationRequest>,
) -> AppResult<HttpResponse> {
    let notification = Notification::create(&app_state.pool, &req, admin.user_id).await?;
    info!("Admin {} created notification {}", admin.user_id, notification.id);
    Ok(HttpResponse::Created().json(notification))
}

#[put("/{notification_id}")]
async fn update_notification(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    notification_id: web::Path<Uuid>,
    web::Json(req): web::Json<UpdateNotificationRequest>,
) -> AppResult<web::Json<Notification>> {
    let notification =
        Notification::update(&app_state.pool, notification_id.into_inner(), &req).await?;
    Ok(web::Json(notification))
}

#[delete("/{notification_id}")]
async fn delete_notification(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    notification_id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    Notification::delete(&app_state.pool, notification_id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(active_notifications)
        .service(list_notifications)
        .service(get_notification)
        .service(create_notification)
        .service(update_notification)
        .service(delete_notification);
}
