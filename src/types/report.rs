use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    #[default]
    Day,
    Week,
    Month,
}

#[derive(Deserialize, Debug, Default)]
pub struct BookingReportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub interval: Interval,
}

#[derive(Deserialize, Debug, Default)]
pub struct SalesReportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UserReportQuery {
    pub top: Option<usize>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct TrendPoint {
    pub bucket: NaiveDate,
    pub pending: i64,
    pub approved: i64,
    pub cancelled: i64,
    pub total: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct BookingReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub interval: Interval,
    pub series: Vec<TrendPoint>,
    pub by_package: Vec<LabelCount>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct UserReport {
    pub total: i64,
    pub verified: i64,
    pub unverified: i64,
    pub age_groups: Vec<LabelCount>,
    pub email_domains: Vec<LabelCount>,
    pub signups_by_month: Vec<LabelCount>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct SalesPoint {
    pub month: NaiveDate,
    pub orders: i64,
    pub revenue_cents: i64,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct ProductSales {
    pub product_name: String,
    pub quantity: i64,
    pub revenue_cents: i64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct SalesReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub series: Vec<SalesPoint>,
    pub total_revenue_cents: i64,
    pub top_products: Vec<ProductSales>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct DashboardStats {
    pub users: i64,
    pub verified_users: i64,
    pub pending_bookings: i64,
    pub upcoming_bookings: i64,
    pub orders: i64,
    pub revenue_cents: i64,
    pub active_notifications: i64,
    pub products: i64,
    pub staff: i64,
}
