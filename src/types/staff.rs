use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::models::staff::StaffRole;

#[derive(Deserialize)]
pub struct StaffQuery {
    pub role: Option<StaffRole>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateStaffRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: StaffRole,
    pub hired_on: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct UpdateStaffRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<StaffRole>,
    pub is_active: Option<bool>,
    pub hired_on: Option<NaiveDate>,
}
