use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, PgPool, Type};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::normalize_email;
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::types::{trimmed_edit, CreateStaffRequest, UpdateStaffRequest};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "staff_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Photographer,
    Manager,
    Editor,
    Other,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Staff {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: StaffRole,
    pub is_active: bool,
    pub hired_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn duplicate_email(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::conflict("A staff member with this email already exists")
    } else {
        AppError::from(e)
    }
}

impl Staff {
    pub async fn list(pool: &PgPool, role: Option<StaffRole>) -> AppResult<Vec<Self>> {
        let staff = query_as::<_, Staff>(
            r#"
            SELECT * FROM staff
            WHERE ($1::staff_role IS NULL OR role = $1)
            ORDER BY name ASC
            "#,
        )
        .bind(role)
        .fetch_all(pool)
        .await?;
        Ok(staff)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> AppResult<Self> {
        query_as::<_, Staff>("SELECT * FROM staff WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("Staff member not found"))
    }

    pub async fn create(pool: &PgPool, req: &CreateStaffRequest) -> AppResult<Self> {
        if req.name.trim().is_empty() {
            return Err(AppError::bad_request("Staff name is required"));
        }
        let email = normalize_email(&req.email)?;

        let staff = query_as::<_, Staff>(
            r#"
            INSERT INTO staff (id, name, email, phone, role, hired_on)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.name.trim())
        .bind(email)
        .bind(req.phone.as_deref())
        .bind(req.role)
        .bind(req.hired_on)
        .fetch_one(pool)
        .await
        .map_err(duplicate_email)?;

        debug!("Staff member created: {:?}", staff.id);
        Ok(staff)
    }

    pub async fn update(pool: &PgPool, id: Uuid, req: &UpdateStaffRequest) -> AppResult<Self> {
        let name = trimmed_edit(req.name.as_deref(), "Name")?;
        let email = req.email.as_deref().map(normalize_email).transpose()?;

        let staff = query_as::<_, Staff>(
            r#"
            UPDATE staff
            SET name = COALESCE($1, name),
                email = COALESCE($2, email),
                phone = COALESCE($3, phone),
                role = COALESCE($4, role),
                is_active = COALESCE($5, is_active),
                hired_on = COALESCE($6, hired_on),
                updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(req.phone.as_deref())
        .bind(req.role)
        .bind(req.is_active)
        .bind(req.hired_on)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(duplicate_email)?
        .ok_or_else(|| AppError::not_found("Staff member not found"))?;

        debug!("Staff member updated: {:?}", staff.id);
        Ok(staff)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM staff WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Staff member not found"));
        }
        debug!("Staff member deleted: {:?}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_use_lowercase_names() {
        let role: StaffRole = serde_json::from_str("\"photographer\"").unwrap();
        assert_eq!(role, StaffRole::Photographer);
        assert_eq!(serde_json::to_string(&StaffRole::Editor).unwrap(), "\"editor\"");
    }
}
