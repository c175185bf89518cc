use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct PresignRequest {
    pub filename: String,
    pub content_type: String,
}

#[derive(Serialize, ToSchema)]
pub struct PresignResponse {
    pub upload_url: String,
    pub public_url: String,
    pub expires_in: u64,
}
