use std::time::Duration;

use anyhow::anyhow;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::types::PresignResponse;

pub const UPLOAD_URL_TTL_SECS: u64 = 15 * 60;

const ALLOWED_IMAGE_TYPES: [(&str, &str); 3] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
];

pub async fn s3_client(app_config: &AppConfig) -> Client {
    let credentials = Credentials::new(
        app_config.aws_access_key_id.clone(),
        app_config.aws_secret_access_key.clone(),
        None,
        None,
        "app-config",
    );
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(app_config.aws_region.clone()))
        .credentials_provider(credentials)
        .load()
        .await;
    Client::new(&sdk_config)
}

pub fn extension_for(content_type: &str) -> AppResult<&'static str> {
    ALLOWED_IMAGE_TYPES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(content_type.trim()))
        .map(|(_, ext)| *ext)
        .ok_or_else(|| AppError::bad_request("Only JPEG, PNG and WebP images can be uploaded"))
}

pub fn object_key(ext: &str) -> String {
    format!("products/{}.{}", Uuid::new_v4(), ext)
}

pub fn public_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key)
}

pub async fn presign_product_image(
    client: &Client,
    app_config: &AppConfig,
    content_type: &str,
) -> AppResult<PresignResponse> {
    let ext = extension_for(content_type)?;
    let key = object_key(ext);

    let presigning = PresigningConfig::expires_in(Duration::from_secs(UPLOAD_URL_TTL_SECS))
        .map_err(|e| anyhow!("Invalid presigning config: {}", e))?;
    let request = client
        .put_object()
        .bucket(&app_config.s3_bucket)
        .key(&key)
        .content_type(content_type.trim())
        .presigned(presigning)
        .await
        .map_err(|e| anyhow!("Failed to presign upload: {}", e))?;

    debug!("Presigned upload for {}", key);
    Ok(PresignResponse {
        upload_url: request.uri().to_string(),
        public_url: public_url(&app_config.s3_bucket, &app_config.aws_region, &key),
        expires_in: UPLOAD_URL_TTL_SECS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_images_allowed() {
        assert_eq!(extension_for("image/png").unwrap(), "png");
        assert_eq!(extension_for(" IMAGE/JPEG ").unwrap(), "jpg");
        assert!(extension_for("application/pdf").is_err());
    }

    #[test]
    fn keys_live_under_products() {
        let key = object_key("webp");
        assert!(key.starts_with("products/"));
        assert!(key.ends_with(".webp"));
    }

    #[test]
    fn public_url_shape() {
        assert_eq!(
            public_url("studio", "eu-west-1", "products/a.png"),
            "https://studio.s3.eu-west-1.amazonaws.com/products/a.png"
        );
    }
}
