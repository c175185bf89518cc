use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, PgPool, Type};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::types::{trimmed_edit, CreateNotificationRequest, UpdateNotificationRequest};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "audience", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    #[default]
    All,
    Verified,
    Unverified,
}

impl Audience {
    pub fn includes(self, is_verified: bool) -> bool {
        match self {
            Audience::All => true,
            Audience::Verified => is_verified,
            Audience::Unverified => !is_verified,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub audience: Audience,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_visible(&self, now: DateTime<Utc>, is_verified: bool) -> bool {
        self.is_active
            && self.starts_at <= now
            && now < self.ends_at
            && self.audience.includes(is_verified)
    }
}

fn check_window(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> AppResult<()> {
    if ends_at <= starts_at {
        return Err(AppError::bad_request(
            "Notification must end after it starts",
        ));
    }
    Ok(())
}

impl Notification {
    pub async fn list(pool: &PgPool) -> AppResult<Vec<Self>> {
        let notifications =
            query_as::<_, Notification>("SELECT * FROM notifications ORDER BY starts_at DESC")
                .fetch_all(pool)
                .await?;
        Ok(notifications)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> AppResult<Self> {
        query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("Notification not found"))
    }

    pub async fn create(
        pool: &PgPool,
        req: &CreateNotificationRequest,
        created_by: Uuid,
    ) -> AppResult<Self> {
        if req.title.trim().is_empty() || req.message.trim().is_empty() {
            return Err(AppError::bad_request("Title and message are required"));
        }
        let starts_at = req.starts_at.unwrap_or_else(Utc::now);
        check_window(starts_at, req.ends_at)?;

        let notification = query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, title, message, audience, starts_at, ends_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.title.trim())
        .bind(req.message.trim())
        .bind(req.audience)
        .bind(starts_at)
        .bind(req.ends_at)
        .bind(created_by)
        .fetch_one(pool)
        .await?;

        debug!("Notification created: {:?}", notification.id);
        Ok(notification)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &UpdateNotificationRequest,
    ) -> AppResult<Self> {
        let title = trimmed_edit(req.title.as_deref(), "Title")?;
        let message = trimmed_edit(req.message.as_deref(), "Message")?;
        let current = Self::get(pool, id).await?;
        check_window(
            req.starts_at.unwrap_or(current.starts_at),
            req.ends_at.unwrap_or(current.ends_at),
        )?;

        let notification = query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET title = COALESCE($1, title),
                message = COALESCE($2, message),
                audience = COALESCE($3, audience),
                starts_at = COALESCE($4, starts_at),
                ends_at = COALESCE($5, ends_at),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(title)
        .bind(message)
        .bind(req.audience)
        .bind(req.starts_at)
        .bind(req.ends_at)
        .bind(req.is_active)
        .bind(id)
        .fetch_one(pool)
        .await?;

        debug!("Notification updated: {:?}", id);
        Ok(notification)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Notification not found"));
        }
        Ok(())
    }

    pub async fn active_for(pool: &PgPool, is_verified: bool) -> AppResult<Vec<Self>> {
        let now = Utc::now();
        let notifications = query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE is_active AND starts_at <= $1 AND ends_at > $1
            ORDER BY starts_at DESC
            "#,
        )
        .bind(now)
        .fetch_all(pool)
        .await?;

        Ok(notifications
            .into_iter()
            .filter(|n| n.is_visible(now, is_verified))
            .collect())
    }

    pub async fn deactivate_expired(pool: &PgPool) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET is_active = FALSE, updated_at = NOW()
            WHERE is_active AND ends_at <= NOW()
            "#,
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn notification(audience: Audience, is_active: bool) -> Notification {
        let now = Utc::now();
        Notification {
            id: Uuid::new_v4(),
            title: "Holiday hours".to_string(),
            message: "Closed on the 25th".to_string(),
            audience,
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::hours(1),
            is_active,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn audience_matching() {
        assert!(Audience::All.includes(true));
        assert!(Audience::All.includes(false));
        assert!(Audience::Verified.includes(true));
        assert!(!Audience::Verified.includes(false));
        assert!(Audience::Unverified.includes(false));
        assert!(!Audience::Unverified.includes(true));
    }

    #[test]
    fn visibility_respects_window_and_flag() {
        let now = Utc::now();
        let n = notification(Audience::Verified, true);
        assert!(n.is_visible(now, true));
        assert!(!n.is_visible(now, false));
        assert!(!n.is_visible(now + Duration::hours(2), true));
        assert!(!n.is_visible(now - Duration::hours(2), true));
        assert!(!notification(Audience::All, false).is_visible(now, true));
    }

    #[test]
    fn window_must_be_ordered() {
        let now = Utc::now();
        assert!(check_window(now, now).is_err());
        assert!(check_window(now, now - Duration::minutes(1)).is_err());
        assert!(check_window(now, now + Duration::minutes(1)).is_ok());
    }

    #[test]
    fn audience_defaults_to_all() {
        assert_eq!(Audience::default(), Audience::All);
    }
}
