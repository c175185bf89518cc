use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::product::{Product, ProductCache};
use crate::types::{CartLine, CartResponse};

pub const MAX_LINE_QUANTITY: i32 = 99;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct CartRow {
    product_id: Uuid,
    name: String,
    image_url: Option<String>,
    price_cents: i64,
    quantity: i32,
}

pub(crate) fn check_quantity(quantity: i32, stock: i32) -> AppResult<()> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(AppError::bad_request(format!(
            "Quantity must be between 1 and {}",
            MAX_LINE_QUANTITY
        )));
    }
    if quantity > stock {
        return Err(AppError::bad_request(format!(
            "Only {} left in stock",
            stock
        )));
    }
    Ok(())
}

/// Quantity of a line after adding to whatever is already in the cart.
pub(crate) fn merged_quantity(existing: i32, added: i32, stock: i32) -> AppResult<i32> {
    let total = existing.checked_add(added).ok_or_else(|| {
        AppError::bad_request(format!(
            "Quantity must be between 1 and {}",
            MAX_LINE_QUANTITY
        ))
    })?;
    check_quantity(total, stock)?;
    Ok(total)
}

pub(crate) fn summarize(lines: Vec<CartLine>) -> CartResponse {
    let total_cents = lines.iter().map(|l| l.line_total_cents).sum();
    let item_count = lines.iter().map(|l| l.quantity as i64).sum();
    CartResponse {
        items: lines,
        item_count,
        total_cents,
    }
}

impl CartItem {
    pub async fn get_cart(pool: &PgPool, user_id: Uuid) -> AppResult<CartResponse> {
        let rows = query_as::<_, CartRow>(
            r#"
            SELECT c.product_id, p.name, p.image_url, p.price_cents, c.quantity
            FROM cart_items c
            JOIN products p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let lines = rows
            .into_iter()
            .map(|row| CartLine {
                product_id: row.product_id,
                name: row.name,
                image_url: row.image_url,
                unit_price_cents: row.price_cents,
                quantity: row.quantity,
                line_total_cents: row.price_cents * row.quantity as i64,
            })
            .collect();

        Ok(summarize(lines))
    }

    async fn current_quantity(pool: &PgPool, user_id: Uuid, product_id: Uuid) -> AppResult<i32> {
        let row: Option<(i32,)> = query_as(
            "SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(q,)| q).unwrap_or(0))
    }

    /// Adds to an existing line when the product is already in the cart.
    pub async fn add(
        pool: &PgPool,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        products: &ProductCache,
    ) -> AppResult<CartResponse> {
        if quantity < 1 {
            return Err(AppError::bad_request("Quantity must be at least 1"));
        }
        let product = Product::get_active(pool, product_id, products).await?;
        let existing = Self::current_quantity(pool, user_id, product_id).await?;
        merged_quantity(existing, quantity, product.stock)?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (id, user_id, product_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(pool)
        .await?;

        debug!("Added {} x {} to cart of {}", quantity, product_id, user_id);
        Self::get_cart(pool, user_id).await
    }

    /// Zero removes the line.
    pub async fn set_quantity(
        pool: &PgPool,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        products: &ProductCache,
    ) -> AppResult<CartResponse> {
        if quantity == 0 {
            return Self::remove(pool, user_id, product_id).await;
        }

        let product = Product::get_active(pool, product_id, products).await?;
        check_quantity(quantity, product.stock)?;

        let result = sqlx::query(
            r#"
            UPDATE cart_items SET quantity = $1, updated_at = NOW()
            WHERE user_id = $2 AND product_id = $3
            "#,
        )
        .bind(quantity)
        .bind(user_id)
        .bind(product_id)
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Product is not in the cart"));
        }

        Self::get_cart(pool, user_id).await
    }

    pub async fn remove(pool: &PgPool, user_id: Uuid, product_id: Uuid) -> AppResult<CartResponse> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(pool)
            .await?;
        Self::get_cart(pool, user_id).await
    }

    pub async fn clear(pool: &PgPool, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        debug!("Cart cleared for {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: i32) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            name: "Print".to_string(),
            image_url: None,
            unit_price_cents: price,
            quantity,
            line_total_cents: price * quantity as i64,
        }
    }

    #[test]
    fn totals_sum_lines() {
        let cart = summarize(vec![line(1_250, 2), line(4_000, 1)]);
        assert_eq!(cart.total_cents, 6_500);
        assert_eq!(cart.item_count, 3);
    }

    #[test]
    fn empty_cart_is_zero() {
        let cart = summarize(vec![]);
        assert_eq!(cart.total_cents, 0);
        assert!(cart.items.is_empty());
    }

    #[test]
    fn quantity_limits() {
        assert!(check_quantity(0, 10).is_err());
        assert!(check_quantity(100, 500).is_err());
        assert!(check_quantity(11, 10).is_err());
        assert!(check_quantity(10, 10).is_ok());
    }

    #[test]
    fn merged_quantity_rejects_overflow() {
        assert!(merged_quantity(5, i32::MAX, 500).is_err());
        assert!(merged_quantity(98, 2, 500).is_err());
        assert_eq!(merged_quantity(3, 4, 10).unwrap(), 7);
    }
}
