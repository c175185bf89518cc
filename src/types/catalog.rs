use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Deserialize, Debug, Default)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i32,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<i64>,
    pub stock: Option<i32>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreatePackageRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    pub duration_minutes: i32,
    #[serde(default)]
    pub features: Vec<String>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct UpdatePackageRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub duration_minutes: Option<i32>,
    pub features: Option<Vec<String>>,
    pub is_active: Option<bool>,
}
