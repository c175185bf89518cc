use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::booking::BookingStatus;

#[derive(Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    pub package_id: Uuid,
    pub booking_date: NaiveDate,
    #[schema(value_type = String, example = "14:30:00")]
    pub booking_time: NaiveTime,
    pub venue: String,
    pub notes: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct BookingQuery {
    pub status: Option<BookingStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct AssignStaffRequest {
    pub staff_id: Option<Uuid>,
}
