use std::sync::Arc;

use actix_web::{post, web};
use tracing::debug;

use crate::error::AppResult;
use crate::middleware::auth::AdminUser;
use crate::storage::presign_product_image;
use crate::types::{PresignRequest, PresignResponse};
use crate::{AppConfig, AppState};

#[post("/presign")]
async fn presign(
    app_state: web::Data<Arc<AppState>>,
    app_config: web::Data<Arc<AppConfig>>,
    admin: AdminUser,
    web::Json(req): web::Json<PresignRequest>,
) -> AppResult<web::Json<PresignResponse>> {
    debug!(
        "Admin {} requested upload for {} ({})",
        admin.user_id, req.filename, req.content_type
    );
    let response =
        presign_product_image(&app_state.s3_client, &app_config, &req.content_type).await?;
    Ok(web::Json(response))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(presign);
}
