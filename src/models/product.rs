use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, PgPool};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::types::{
    trimmed_edit, CreateProductRequest, Page, Pagination, ProductQuery, UpdateProductRequest,
};

pub type ProductCache = Cache<Uuid, Product>;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price_cents: i64,
    pub stock: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn validate_price_and_stock(
    price_cents: Option<i64>,
    stock: Option<i32>,
) -> AppResult<()> {
    if price_cents.is_some_and(|p| p < 0) {
        return Err(AppError::bad_request("Price cannot be negative"));
    }
    if stock.is_some_and(|s| s < 0) {
        return Err(AppError::bad_request("Stock cannot be negative"));
    }
    Ok(())
}

impl Product {
    /// Active products only, filtered by category and a free-text term.
    pub async fn list_active(pool: &PgPool, query: &ProductQuery) -> AppResult<Page<Self>> {
        let (page, limit, offset) = Pagination {
            page: query.page,
            limit: query.limit,
        }
        .resolve();
        let search = query
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", q));
        let category = query.category.as_deref().filter(|c| !c.is_empty());

        let items = query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE is_active
              AND ($1::TEXT IS NULL OR category = $1)
              AND ($2::TEXT IS NULL OR name ILIKE $2 OR description ILIKE $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(category)
        .bind(search.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let (total,): (i64,) = query_as(
            r#"
            SELECT COUNT(*) FROM products
            WHERE is_active
              AND ($1::TEXT IS NULL OR category = $1)
              AND ($2::TEXT IS NULL OR name ILIKE $2 OR description ILIKE $2)
            "#,
        )
        .bind(category)
        .bind(search.as_deref())
        .fetch_one(pool)
        .await?;

        Ok(Page {
            items,
            total,
            page,
            limit,
        })
    }

    pub async fn list_all(pool: &PgPool) -> AppResult<Vec<Self>> {
        let products = query_as::<_, Product>("SELECT * FROM products ORDER BY created_at DESC")
            .fetch_all(pool)
            .await?;
        Ok(products)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> AppResult<Self> {
        query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found"))
    }

    pub async fn get_active(pool: &PgPool, id: Uuid, cache: &ProductCache) -> AppResult<Self> {
        if let Some(product) = cache.get(&id).await {
            debug!("Product found in cache: {}", id);
            return Ok(product);
        }

        let product = Self::get(pool, id).await?;
        if !product.is_active {
            return Err(AppError::not_found("Product not found"));
        }
        cache.insert(id, product.clone()).await;
        Ok(product)
    }

    pub async fn create(pool: &PgPool, req: &CreateProductRequest) -> AppResult<Self> {
        if req.name.trim().is_empty() {
            return Err(AppError::bad_request("Product name is required"));
        }
        validate_price_and_stock(Some(req.price_cents), Some(req.stock))?;

        let product = query_as::<_, Product>(
            r#"
            INSERT INTO products
                (id, name, description, category, price_cents, stock, image_url, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.name.trim())
        .bind(&req.description)
        .bind(req.category.as_deref().unwrap_or("general"))
        .bind(req.price_cents)
        .bind(req.stock)
        .bind(req.image_url.as_deref())
        .bind(req.is_active.unwrap_or(true))
        .fetch_one(pool)
        .await?;

        debug!("Product created: {:?}", product.id);
        Ok(product)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &UpdateProductRequest,
        cache: &ProductCache,
    ) -> AppResult<Self> {
        validate_price_and_stock(req.price_cents, req.stock)?;
        let name = trimmed_edit(req.name.as_deref(), "Name")?;

        let product = query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                category = COALESCE($3, category),
                price_cents = COALESCE($4, price_cents),
                stock = COALESCE($5, stock),
                image_url = COALESCE($6, image_url),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(req.description.as_deref())
        .bind(req.category.as_deref())
        .bind(req.price_cents)
        .bind(req.stock)
        .bind(req.image_url.as_deref())
        .bind(req.is_active)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

        cache.invalidate(&id).await;
        debug!("Product updated: {:?}", product.id);
        Ok(product)
    }

    pub async fn delete(pool: &PgPool, id: Uuid, cache: &ProductCache) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Product not found"));
        }

        cache.invalidate(&id).await;
        debug!("Product deleted: {:?}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_values_rejected() {
        assert!(validate_price_and_stock(Some(-1), None).is_err());
        assert!(validate_price_and_stock(None, Some(-5)).is_err());
        assert!(validate_price_and_stock(Some(0), Some(0)).is_ok());
        assert!(validate_price_and_stock(None, None).is_ok());
    }
}
