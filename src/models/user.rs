use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, PgPool, Type};
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{is_unique_violation, AppError, AppResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Admin,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_verified: bool,
    pub verification_token: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What leaves the API: no hash, no token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_verified: bool,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        PublicUser {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            is_verified: user.is_verified,
            date_of_birth: user.date_of_birth,
            phone: user.phone,
            created_at: user.created_at,
        }
    }
}

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: String,
    pub role: UserRole,
    pub is_verified: bool,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<&'a str>,
}

impl User {
    pub async fn create(pool: &PgPool, new_user: NewUser<'_>) -> AppResult<Self> {
        let verification_token = if new_user.is_verified {
            None
        } else {
            Some(Uuid::new_v4().simple().to_string())
        };

        let user = query_as::<_, User>(
            r#"
            INSERT INTO users
                (id, name, email, password_hash, role, is_verified, verification_token,
                 date_of_birth, phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_user.name)
        .bind(new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .bind(new_user.is_verified)
        .bind(verification_token)
        .bind(new_user.date_of_birth)
        .bind(new_user.phone)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::conflict("Email already registered")
            } else {
                AppError::from(e)
            }
        })?;

        debug!("User created: {}", user.id);
        Ok(user)
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> AppResult<Option<Self>> {
        let user = query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> AppResult<Self> {
        query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        name: Option<&str>,
        phone: Option<&str>,
        date_of_birth: Option<NaiveDate>,
    ) -> AppResult<Self> {
        let user = query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($1, name),
                phone = COALESCE($2, phone),
                date_of_birth = COALESCE($3, date_of_birth),
                updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(phone)
        .bind(date_of_birth)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

        debug!("User profile updated: {}", id);
        Ok(user)
    }

    pub async fn set_password(pool: &PgPool, id: Uuid, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn verify_email(pool: &PgPool, token: &str) -> AppResult<Self> {
        let user = query_as::<_, User>(
            r#"
            UPDATE users
            SET is_verified = TRUE, verification_token = NULL, updated_at = NOW()
            WHERE verification_token = $1
            RETURNING *
            "#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Verification link is invalid or already used"))?;

        info!("User {} verified their email", user.id);
        Ok(user)
    }

    pub async fn list(pool: &PgPool, verified: Option<bool>) -> AppResult<Vec<Self>> {
        let users = query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::BOOLEAN IS NULL OR is_verified = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(verified)
        .fetch_all(pool)
        .await?;
        Ok(users)
    }

    pub async fn set_role(pool: &PgPool, id: Uuid, role: UserRole) -> AppResult<Self> {
        query_as::<_, User>(
            "UPDATE users SET role = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(role)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
    }

    /// Creates the configured admin unless the address is already taken.
    pub async fn ensure_admin(pool: &PgPool, email: &str, password_hash: String) -> AppResult<()> {
        if Self::find_by_email(pool, email).await?.is_some() {
            debug!("Admin seed skipped, {} already exists", email);
            return Ok(());
        }

        Self::create(
            pool,
            NewUser {
                name: "Administrator",
                email,
                password_hash,
                role: UserRole::Admin,
                is_verified: true,
                date_of_birth: None,
                phone: None,
            },
        )
        .await?;
        info!("Seeded admin account {}", email);
        Ok(())
    }
}
