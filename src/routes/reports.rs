use std::sync::Arc;

use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{get, web, HttpResponse};
use chrono::Utc;

use crate::error::AppResult;
use crate::middleware::auth::AdminUser;
use crate::models::report::{
    self, booking_report_csv, resolve_range, sales_report_csv, user_report_csv,
    DEFAULT_TOP_DOMAINS,
};
use crate::types::{
    BookingReport, BookingReportQuery, SalesReport, SalesReportQuery, UserReport, UserReportQuery,
};
use crate::AppState;

const MAX_TOP_DOMAINS: usize = 50;

fn csv_attachment(filename: &str, body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename.to_string())],
        })
        .body(body)
}

async fn load_booking_report(
    app_state: &AppState,
    query: &BookingReportQuery,
) -> AppResult<BookingReport> {
    let (from, to) = resolve_range(query.from, query.to, Utc::now().date_naive())?;
    report::booking_report(&app_state.pool, from, to, query.interval).await
}

async fn load_user_report(app_state: &AppState, query: &UserReportQuery) -> AppResult<UserReport> {
    let top = query
        .top
        .unwrap_or(DEFAULT_TOP_DOMAINS)
        .clamp(1, MAX_TOP_DOMAINS);
    report::user_report(&app_state.pool, top).await
}

async fn load_sales_report(
    app_state: &AppState,
    query: &SalesReportQuery,
) -> AppResult<SalesReport> {
    let (from, to) = resolve_range(query.from, query.to, Utc::now().date_naive())?;
    report::sales_report(&app_state.pool, from, to).await
}

#[get("/bookings")]
async fn booking_report(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    query: web::Query<BookingReportQuery>,
) -> AppResult<web::Json<BookingReport>> {
    Ok(web::Json(load_booking_report(&app_state, &query).await?))
}

#[get("/bookings/export")]
async fn export_booking_report(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    query: web::Query<BookingReportQuery>,
) -> AppResult<HttpResponse> {
    let report = load_booking_report(&app_state, &query).await?;
    let filename = format!("bookings_{}_{}.csv", report.from, report.to);
    Ok(csv_attachment(&filename, booking_report_csv(&report)))
}

#[get("/users")]
async fn user_report(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    query: web::Query<UserReportQuery>,
) -> AppResult<web::Json<UserReport>> {
    Ok(web::Json(load_user_report(&app_state, &query).await?))
}

#[get("/users/export")]
async fn export_user_report(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    query: web::Query<UserReportQuery>,
) -> AppResult<HttpResponse> {
    let report = load_user_report(&app_state, &query).await?;
    Ok(csv_attachment("users.csv", user_report_csv(&report)))
}

#[get("/sales")]
async fn sales_report(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    query: web::Query<SalesReportQuery>,
) -> AppResult<web::Json<SalesReport>> {
    Ok(web::Json(load_sales_report(&app_state, &query).await?))
}

#[get("/sales/export")]
async fn export_sales_report(
    app_state: web::Data<Arc<AppState>>,
    _admin: AdminUser,
    query: web::Query<SalesReportQuery>,
) -> AppResult<HttpResponse> {
    let report = load_sales_report(&app_state, &query).await?;
    let filename = format!("sales_{}_{}.csv", report.from, report.to);
    Ok(csv_attachment(&filename, sales_report_csv(&report)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(booking_report)
        .service(export_booking_report)
        .service(user_report)
        .service(export_user_report)
        .service(sales_report)
        .service(export_sales_report);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::http::header::CONTENT_DISPOSITION;

    #[actix_web::test]
    async fn csv_is_sent_as_attachment() {
        let response = csv_attachment("users.csv", "a,b\r\n1,2\r\n".to_string());
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/csv; charset=utf-8"
        );
        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment"));
        assert!(disposition.contains("users.csv"));

        let body = to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], b"a,b\r\n1,2\r\n");
    }
}
