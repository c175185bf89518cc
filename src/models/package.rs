use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, PgPool};
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::types::{trimmed_edit, CreatePackageRequest, UpdatePackageRequest};

pub type PackageCache = Cache<String, Vec<Package>>;

const ACTIVE_KEY: &str = "active";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Package {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    pub duration_minutes: i32,
    pub features: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of an admin delete: packages with booking history are retired instead.
#[derive(Debug, PartialEq, Eq)]
pub enum PackageRemoval {
    Deleted,
    Deactivated,
}

fn clean_features(features: &[String]) -> Vec<String> {
    features
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate(price_cents: Option<i64>, duration_minutes: Option<i32>) -> AppResult<()> {
    if price_cents.is_some_and(|p| p < 0) {
        return Err(AppError::bad_request("Price cannot be negative"));
    }
    if duration_minutes.is_some_and(|d| d <= 0) {
        return Err(AppError::bad_request("Duration must be positive"));
    }
    Ok(())
}

impl Package {
    pub async fn list_active(pool: &PgPool, cache: &PackageCache) -> AppResult<Vec<Self>> {
        if let Some(packages) = cache.get(ACTIVE_KEY).await {
            debug!("Active packages served from cache");
            return Ok(packages);
        }

        let packages = query_as::<_, Package>(
            "SELECT * FROM packages WHERE is_active ORDER BY price_cents ASC",
        )
        .fetch_all(pool)
        .await?;

        cache.insert(ACTIVE_KEY.to_string(), packages.clone()).await;
        Ok(packages)
    }

    pub async fn list_all(pool: &PgPool) -> AppResult<Vec<Self>> {
        let packages = query_as::<_, Package>("SELECT * FROM packages ORDER BY created_at DESC")
            .fetch_all(pool)
            .await?;
        Ok(packages)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> AppResult<Self> {
        query_as::<_, Package>("SELECT * FROM packages WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("Package not found"))
    }

    pub async fn create(
        pool: &PgPool,
        req: &CreatePackageRequest,
        cache: &PackageCache,
    ) -> AppResult<Self> {
        if req.title.trim().is_empty() {
            return Err(AppError::bad_request("Package title is required"));
        }
        validate(Some(req.price_cents), Some(req.duration_minutes))?;

        let package = query_as::<_, Package>(
            r#"
            INSERT INTO packages
                (id, title, description, price_cents, duration_minutes, features, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.title.trim())
        .bind(&req.description)
        .bind(req.price_cents)
        .bind(req.duration_minutes)
        .bind(clean_features(&req.features))
        .bind(req.is_active.unwrap_or(true))
        .fetch_one(pool)
        .await?;

        cache.invalidate(ACTIVE_KEY).await;
        debug!("Package created: {:?}", package.id);
        Ok(package)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &UpdatePackageRequest,
        cache: &PackageCache,
    ) -> AppResult<Self> {
        validate(req.price_cents, req.duration_minutes)?;
        let title = trimmed_edit(req.title.as_deref(), "Title")?;

        let package = query_as::<_, Package>(
            r#"
            UPDATE packages
            SET title = COALESCE($1, title),
                description = COALESCE($2, description),
                price_cents = COALESCE($3, price_cents),
                duration_minutes = COALESCE($4, duration_minutes),
                features = COALESCE($5, features),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(title)
        .bind(req.description.as_deref())
        .bind(req.price_cents)
        .bind(req.duration_minutes)
        .bind(req.features.as_deref().map(clean_features))
        .bind(req.is_active)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Package not found"))?;

        cache.invalidate(ACTIVE_KEY).await;
        debug!("Package updated: {:?}", package.id);
        Ok(package)
    }

    pub async fn remove(
        pool: &PgPool,
        id: Uuid,
        cache: &PackageCache,
    ) -> AppResult<PackageRemoval> {
        let (bookings,): (i64,) = query_as("SELECT COUNT(*) FROM bookings WHERE package_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;

        let (query, outcome) = if bookings > 0 {
            (
                "UPDATE packages SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
                PackageRemoval::Deactivated,
            )
        } else {
            ("DELETE FROM packages WHERE id = $1", PackageRemoval::Deleted)
        };

        let result = sqlx::query(query).bind(id).execute(pool).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Package not found"));
        }

        cache.invalidate(ACTIVE_KEY).await;
        info!("Package {} removed: {:?}", id, outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_are_trimmed_and_blank_dropped() {
        let features = vec![
            " 2 hour shoot ".to_string(),
            "".to_string(),
            "   ".to_string(),
            "20 edited photos".to_string(),
        ];
        assert_eq!(
            clean_features(&features),
            vec!["2 hour shoot".to_string(), "20 edited photos".to_string()]
        );
    }

    #[test]
    fn duration_must_be_positive() {
        assert!(validate(Some(1000), Some(0)).is_err());
        assert!(validate(Some(-1), Some(60)).is_err());
        assert!(validate(Some(0), Some(60)).is_ok());
    }
}
