use std::sync::Arc;

use actix_web::{delete, get, post, put, web, HttpResponse};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AdminUser, AuthenticatedUser};
use crate::models::booking::{Booking, BookingDetail};
use crate::types::{
    AssignStaffRequest, BookingQuery, CreateBookingRequest, UpdateBookingStatusRequest,
};
use crate::AppState;

#[post("")]
async fn create_booking(
    app_state: web::Data<Arc<AppState>>,
    user: AuthenticatedUser,
    web::Json(req): web::Json<CreateBookingRequest>,
) -> AppResult<HttpResponse> {
    let booking = Booking::create(&app_state.pool, user.user_id, &req).await?;
    Ok(HttpResponse::Created().json(booking))
}

#[get("/mine")]
async fn my_bookings(
    app_state: web::Data<Arc<AppState>>,
    user: AuthenticatedUser,
) -> AppResult<web::Json<Vec<BookingDetail>>> {
    Ok(web::Json(
        Booking::list_for_user(&app_state.pool, user.user_id).await?,
    ))
}

#[get("")]
async fn list_bookings(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    query: web::Query<BookingQuery>,
) -> AppResult<web::Json<Vec<BookingDetail>>> {
    Ok(web::Json(Booking::list(&app_state.pool, &query).await?))
}

#[get("/{booking_id}")]
async fn get_booking(
    app_state: web::Data<Arc<AppState>>,
    user: AuthenticatedUser,
    admin: Option<AdminUser>,
    booking_id: web::Path<Uuid>,
) -> AppResult<web::Json<Booking>> {
    let booking = Booking::get(&app_state.pool, booking_id.into_inner()).await?;
    if booking.user_id != user.user_id && admin.is_none() {
        return Err(AppError::not_found("Booking not found"));
    }
    Ok(web::Json(booking))
}

#[post("/{booking_id}/cancel")]
async fn cancel_booking(
    app_state: web::Data<Arc<AppState>>,
    user: AuthenticatedUser,
    booking_id: web::Path<Uuid>,
) -> AppResult<web::Json<Booking>> {
    let booking =
        Booking::cancel_for_user(&app_state.pool, booking_id.into_inner(), user.user_id).await?;
    Ok(web::Json(booking))
}

#[put("/{booking_id}/status")]
async fn update_booking_status(
    app_state: web::Data<Arc<AppState>>,
    admin: AdminUser,
    booking_id: web::Path<Uuid>,
    web::Json(req): web::Json<UpdateBookingStatusRequest>,
) -> AppResult<web::Json<Booking>> {
    let booking =
        Booking::update_status(&app_state.pool, booking_id.into_inner(), req.status).await?;
    info!(
        "Admin {} set booking {} to {}",
        admin.user_id,
        booking.id,
        booking.status.as_str()
    );
    Ok(web::Json(booking))
}

#[put("/{booking_id}/staff")]
async fn assign_staff(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    booking_id: web::Path<Uuid>,
    web::Json(req): web::Json<AssignStaffRequest>,
) -> AppResult<web::Json<Booking>> {
    let booking =
        Booking::assign_staff(&app_state.pool, booking_id.into_inner(), req.staff_id).await?;
    Ok(web::Json(booking))
}

#[delete("/{booking_id}")]
async fn delete_booking(
    app_state: web::Data<Arc<AppState>>,
    admin: AdminUser,
    booking_id: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let booking_id = booking_id.into_inner();
    Booking::delete(&app_state.pool, booking_id).await?;
    info!("Admin {} deleted booking {}", admin.user_id, booking_id);
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    // `/mine` must be registered ahead of `/{booking_id}`
    cfg.service(create_booking)
        .service(my_bookings)
        .service(list_bookings)
        .service(get_booking)
        .service(cancel_booking)
        .service(update_booking_status)
        .service(assign_staff)
        .service(delete_booking);
}
