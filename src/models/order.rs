use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, PgPool, Postgres, Transaction, Type};
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::product::ProductCache;
use crate::types::OrderWithItems;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, Cancelled)
                | (Paid, Processing)
                | (Paid, Cancelled)
                | (Processing, Completed)
        )
    }

    /// Statuses whose totals count as revenue.
    pub fn is_revenue(self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Processing | OrderStatus::Completed
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub reference: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub shipping_address: Option<String>,
    pub stripe_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub quantity: i32,
}

#[derive(Debug, FromRow)]
struct CheckoutLine {
    product_id: Uuid,
    quantity: i32,
    name: String,
    price_cents: i64,
    stock: i32,
    is_active: bool,
}

pub(crate) fn generate_reference() -> String {
    let code: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("ORD-{}", code.to_uppercase())
}

fn group_items(orders: Vec<Order>, items: Vec<OrderItem>) -> Vec<OrderWithItems> {
    let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }
    orders
        .into_iter()
        .map(|order| {
            let items = by_order.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect()
}

/// Locks the cart rows too, so a second checkout of the same cart waits and then sees it empty.
const CHECKOUT_LINES: &str = r#"
    SELECT c.product_id, c.quantity, p.name, p.price_cents, p.stock, p.is_active
    FROM cart_items c
    JOIN products p ON p.id = c.product_id
    WHERE c.user_id = $1
    ORDER BY p.id
    FOR UPDATE OF c, p
"#;

fn check_line(line: &CheckoutLine) -> AppResult<()> {
    if !line.is_active {
        return Err(AppError::bad_request(format!(
            "{} is no longer available",
            line.name
        )));
    }
    if line.quantity > line.stock {
        return Err(AppError::bad_request(format!(
            "Only {} of {} left in stock",
            line.stock, line.name
        )));
    }
    Ok(())
}

/// `Ok(false)` when the order already has the requested status.
fn check_status_change(
    current: OrderStatus,
    expected: Option<OrderStatus>,
    next: OrderStatus,
) -> AppResult<bool> {
    if let Some(expected) = expected {
        if current != expected {
            return Err(AppError::bad_request(format!(
                "Only {} orders can be changed to {}",
                expected.as_str(),
                next.as_str()
            )));
        }
    }
    if current == next {
        return Ok(false);
    }
    if !current.can_transition_to(next) {
        return Err(AppError::bad_request(format!(
            "Cannot change order from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }
    Ok(true)
}

impl Order {
    /// Turns the cart into an order, reserving stock in the same transaction.
    pub async fn place(
        pool: &PgPool,
        user_id: Uuid,
        shipping_address: Option<&str>,
        products: &ProductCache,
    ) -> AppResult<OrderWithItems> {
        let mut tx = pool.begin().await?;

        let lines = query_as::<_, CheckoutLine>(CHECKOUT_LINES)
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await?;

        if lines.is_empty() {
            return Err(AppError::bad_request("Your cart is empty"));
        }
        for line in &lines {
            check_line(line)?;
        }

        let total_cents: i64 = lines
            .iter()
            .map(|l| l.price_cents * l.quantity as i64)
            .sum();

        let order = query_as::<_, Order>(
            r#"
            INSERT INTO orders (id, reference, user_id, status, total_cents, shipping_address)
            VALUES ($1, $2, $3, 'pending', $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(generate_reference())
        .bind(user_id)
        .bind(total_cents)
        .bind(shipping_address)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = query_as::<_, OrderItem>(
                r#"
                INSERT INTO order_items
                    (id, order_id, product_id, product_name, unit_price_cents, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(line.price_cents)
            .bind(line.quantity)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);

            sqlx::query("UPDATE products SET stock = stock - $1, updated_at = NOW() WHERE id = $2")
                .bind(line.quantity)
                .bind(line.product_id)
                .execute(&mut *tx)
                .await?;
        }

        let ordered: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = ANY($2)")
            .bind(user_id)
            .bind(&ordered)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        for line in &lines {
            products.invalidate(&line.product_id).await;
        }

        info!(
            "Order {} placed by {} for {} cents",
            order.reference, user_id, total_cents
        );
        Ok(OrderWithItems { order, items })
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> AppResult<Self> {
        query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("Order not found"))
    }

    pub async fn items(pool: &PgPool, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
        let items = query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1 ORDER BY product_name ASC",
        )
        .bind(order_id)
        .fetch_all(pool)
        .await?;
        Ok(items)
    }

    pub async fn with_items(pool: &PgPool, order: Order) -> AppResult<OrderWithItems> {
        let items = Self::items(pool, order.id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Newest first, each with its line items.
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<OrderWithItems>> {
        let orders = query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY product_name ASC",
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;

        Ok(group_items(orders, items))
    }

    pub async fn list(pool: &PgPool, status: Option<OrderStatus>) -> AppResult<Vec<Self>> {
        let orders = query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE ($1::order_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(pool)
        .await?;
        Ok(orders)
    }

    async fn restock(tx: &mut Transaction<'_, Postgres>, order_id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE products p
            SET stock = p.stock + i.quantity, updated_at = NOW()
            FROM order_items i
            WHERE i.order_id = $1 AND i.product_id = p.id
            "#,
        )
        .bind(order_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        next: OrderStatus,
        products: &ProductCache,
    ) -> AppResult<Self> {
        Self::transition(pool, id, None, next, products).await
    }

    /// The status is read under a row lock, so `expected` holds at write time.
    async fn transition(
        pool: &PgPool,
        id: Uuid,
        expected: Option<OrderStatus>,
        next: OrderStatus,
        products: &ProductCache,
    ) -> AppResult<Self> {
        let mut tx = pool.begin().await?;

        let order = query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Order not found"))?;

        if !check_status_change(order.status, expected, next)? {
            return Ok(order);
        }

        if next == OrderStatus::Cancelled {
            Self::restock(&mut tx, id).await?;
        }

        let order = query_as::<_, Order>(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(next)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        if next == OrderStatus::Cancelled {
            products.invalidate_all();
        }
        info!("Order {} is now {}", order.reference, next.as_str());
        Ok(order)
    }

    /// Owners may only cancel orders that have not been paid.
    pub async fn cancel_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        products: &ProductCache,
    ) -> AppResult<Self> {
        let order = Self::get(pool, id).await?;
        if order.user_id != user_id {
            return Err(AppError::not_found("Order not found"));
        }
        Self::transition(
            pool,
            id,
            Some(OrderStatus::Pending),
            OrderStatus::Cancelled,
            products,
        )
        .await
    }

    pub async fn set_stripe_session(pool: &PgPool, id: Uuid, session_id: &str) -> AppResult<()> {
        sqlx::query("UPDATE orders SET stripe_session_id = $1, updated_at = NOW() WHERE id = $2")
            .bind(session_id)
            .bind(id)
            .execute(pool)
            .await?;
        debug!("Order {} linked to checkout session {}", id, session_id);
        Ok(())
    }

    /// Idempotent: orders already past pending are left alone.
    pub async fn mark_paid(pool: &PgPool, id: Uuid, session_id: &str) -> AppResult<Option<Self>> {
        let order = query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = 'paid', stripe_session_id = $1, updated_at = NOW()
            WHERE id = $2 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(id)
        .fetch_optional(pool)
        .await?;

        match &order {
            Some(order) => info!("Order {} paid via {}", order.reference, session_id),
            None => warn!("Order {} was not pending when payment arrived", id),
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_are_prefixed_and_random() {
        let a = generate_reference();
        let b = generate_reference();
        assert!(a.starts_with("ORD-"));
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
    }

    #[test]
    fn order_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Paid.can_transition_to(Cancelled));
        assert!(!Processing.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Paid));
    }

    #[test]
    fn owner_cancel_requires_pending_at_write_time() {
        use OrderStatus::*;
        assert!(check_status_change(Pending, Some(Pending), Cancelled).unwrap());
        assert!(check_status_change(Paid, Some(Pending), Cancelled).is_err());
        assert!(check_status_change(Cancelled, Some(Pending), Cancelled).is_err());
        assert!(check_status_change(Paid, None, Cancelled).unwrap());
        assert!(!check_status_change(Paid, None, Paid).unwrap());
        assert!(check_status_change(Completed, None, Pending).is_err());
    }

    #[test]
    fn checkout_locks_cart_and_product_rows() {
        let lock = CHECKOUT_LINES.trim().lines().last().unwrap().trim();
        assert_eq!(lock, "FOR UPDATE OF c, p");
    }

    #[test]
    fn revenue_statuses() {
        assert!(!OrderStatus::Pending.is_revenue());
        assert!(OrderStatus::Paid.is_revenue());
        assert!(OrderStatus::Completed.is_revenue());
        assert!(!OrderStatus::Cancelled.is_revenue());
    }

    #[test]
    fn unavailable_lines_rejected() {
        let line = CheckoutLine {
            product_id: Uuid::new_v4(),
            quantity: 3,
            name: "Canvas print".to_string(),
            price_cents: 2_000,
            stock: 2,
            is_active: true,
        };
        assert!(check_line(&line).is_err());

        let inactive = CheckoutLine {
            stock: 10,
            is_active: false,
            ..line
        };
        assert!(check_line(&inactive).is_err());
    }

    #[test]
    fn items_grouped_under_their_order() {
        let order = |id: Uuid| Order {
            id,
            reference: generate_reference(),
            user_id: Uuid::nil(),
            status: OrderStatus::Pending,
            total_cents: 0,
            shipping_address: None,
            stripe_session_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let item = |order_id: Uuid, name: &str| OrderItem {
            id: Uuid::new_v4(),
            order_id,
            product_id: None,
            product_name: name.to_string(),
            unit_price_cents: 500,
            quantity: 1,
        };

        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let grouped = group_items(
            vec![order(a), order(b)],
            vec![item(a, "Mug"), item(a, "Print")],
        );
        assert_eq!(grouped[0].order.id, a);
        assert_eq!(grouped[0].items.len(), 2);
        assert!(grouped[1].items.is_empty());
    }
}
