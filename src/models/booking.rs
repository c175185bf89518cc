use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, PgPool, Type};
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{is_unique_violation, AppError, AppResult};
use crate::models::package::Package;
use crate::models::staff::Staff;
use crate::types::{BookingQuery, CreateBookingRequest};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Cancelled is terminal; approval only happens from pending.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Approved)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Approved, BookingStatus::Cancelled)
        )
    }
}

fn check_transition(current: BookingStatus, next: BookingStatus) -> AppResult<()> {
    if current.can_transition_to(next) {
        return Ok(());
    }
    Err(AppError::bad_request(format!(
        "Cannot change booking from {} to {}",
        current.as_str(),
        next.as_str()
    )))
}

fn check_clashes(clashes: i64) -> AppResult<()> {
    if clashes > 0 {
        return Err(AppError::conflict(
            "Staff member already has an approved booking at that time",
        ));
    }
    Ok(())
}

/// The partial unique index on approved staff slots catches what the count misses.
fn slot_taken(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        return AppError::conflict("Staff member already has an approved booking at that time");
    }
    err.into()
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub booking_date: NaiveDate,
    #[schema(value_type = String, example = "14:30:00")]
    pub booking_time: NaiveTime,
    pub venue: String,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A booking joined with the names an admin table or customer history shows.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct BookingDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub package_id: Uuid,
    pub package_title: String,
    pub staff_id: Option<Uuid>,
    pub staff_name: Option<String>,
    pub booking_date: NaiveDate,
    #[schema(value_type = String, example = "14:30:00")]
    pub booking_time: NaiveTime,
    pub venue: String,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

const DETAIL_SELECT: &str = r#"
    SELECT b.id, b.user_id, u.name AS customer_name, u.email AS customer_email,
           b.package_id, p.title AS package_title, b.staff_id, s.name AS staff_name,
           b.booking_date, b.booking_time, b.venue, b.notes, b.status, b.created_at
    FROM bookings b
    JOIN users u ON u.id = b.user_id
    JOIN packages p ON p.id = b.package_id
    LEFT JOIN staff s ON s.id = b.staff_id
"#;

pub(crate) fn validate_new_booking(
    req: &CreateBookingRequest,
    package: &Package,
    today: NaiveDate,
) -> AppResult<()> {
    if !package.is_active {
        return Err(AppError::bad_request("This package is no longer available"));
    }
    if req.booking_date < today {
        return Err(AppError::bad_request("Booking date cannot be in the past"));
    }
    if req.venue.trim().is_empty() {
        return Err(AppError::bad_request("Venue is required"));
    }
    Ok(())
}

impl Booking {
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        req: &CreateBookingRequest,
    ) -> AppResult<Self> {
        let package = Package::get(pool, req.package_id).await?;
        validate_new_booking(req, &package, Utc::now().date_naive())?;

        let booking = query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (id, user_id, package_id, booking_date, booking_time, venue, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(req.package_id)
        .bind(req.booking_date)
        .bind(req.booking_time)
        .bind(req.venue.trim())
        .bind(req.notes.as_deref())
        .fetch_one(pool)
        .await?;

        info!("Booking {} created for user {}", booking.id, user_id);
        Ok(booking)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> AppResult<Self> {
        query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("Booking not found"))
    }

    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<BookingDetail>> {
        let bookings = query_as::<_, BookingDetail>(&format!(
            "{} WHERE b.user_id = $1 ORDER BY b.booking_date DESC, b.booking_time DESC",
            DETAIL_SELECT
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(bookings)
    }

    pub async fn list(pool: &PgPool, query: &BookingQuery) -> AppResult<Vec<BookingDetail>> {
        let bookings = query_as::<_, BookingDetail>(&format!(
            r#"{}
            WHERE ($1::booking_status IS NULL OR b.status = $1)
              AND ($2::DATE IS NULL OR b.booking_date >= $2)
              AND ($3::DATE IS NULL OR b.booking_date <= $3)
            ORDER BY b.booking_date ASC, b.booking_time ASC"#,
            DETAIL_SELECT
        ))
        .bind(query.status)
        .bind(query.from)
        .bind(query.to)
        .fetch_all(pool)
        .await?;
        Ok(bookings)
    }

    /// Writes `next` only if the row still holds `expected`.
    async fn write_status(
        pool: &PgPool,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> AppResult<Self> {
        let booking = query_as::<_, Booking>(
            r#"
            UPDATE bookings SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status = $3
            RETURNING *
            "#,
        )
        .bind(next)
        .bind(id)
        .bind(expected)
        .fetch_optional(pool)
        .await
        .map_err(slot_taken)?;
        booking.ok_or_else(|| AppError::conflict("Booking was changed by another request"))
    }

    async fn ensure_staff_free(pool: &PgPool, staff_id: Uuid, booking: &Booking) -> AppResult<()> {
        let (clashes,): (i64,) = query_as(
            r#"
            SELECT COUNT(*) FROM bookings
            WHERE staff_id = $1 AND id <> $2 AND status = 'approved'
              AND booking_date = $3 AND booking_time = $4
            "#,
        )
        .bind(staff_id)
        .bind(booking.id)
        .bind(booking.booking_date)
        .bind(booking.booking_time)
        .fetch_one(pool)
        .await?;
        check_clashes(clashes)
    }

    pub async fn update_status(pool: &PgPool, id: Uuid, next: BookingStatus) -> AppResult<Self> {
        let booking = Self::get(pool, id).await?;
        if booking.status == next {
            return Ok(booking);
        }
        check_transition(booking.status, next)?;
        if next == BookingStatus::Approved {
            if let Some(staff_id) = booking.staff_id {
                Self::ensure_staff_free(pool, staff_id, &booking).await?;
            }
        }

        let booking = Self::write_status(pool, id, booking.status, next).await?;
        info!("Booking {} is now {}", id, next.as_str());
        Ok(booking)
    }

    /// Customer cancellation of their own booking.
    pub async fn cancel_for_user(pool: &PgPool, id: Uuid, user_id: Uuid) -> AppResult<Self> {
        let booking = Self::get(pool, id).await?;
        if booking.user_id != user_id {
            return Err(AppError::not_found("Booking not found"));
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(AppError::bad_request("Booking is already cancelled"));
        }

        let booking =
            Self::write_status(pool, id, booking.status, BookingStatus::Cancelled).await?;
        info!("Booking {} cancelled by its owner", id);
        Ok(booking)
    }

    pub async fn assign_staff(pool: &PgPool, id: Uuid, staff_id: Option<Uuid>) -> AppResult<Self> {
        let booking = Self::get(pool, id).await?;

        if let Some(staff_id) = staff_id {
            let staff = Staff::get(pool, staff_id).await?;
            if !staff.is_active {
                return Err(AppError::bad_request("Staff member is not active"));
            }
            Self::ensure_staff_free(pool, staff_id, &booking).await?;
        }

        let booking = query_as::<_, Booking>(
            "UPDATE bookings SET staff_id = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(staff_id)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(slot_taken)?;

        debug!("Booking {} assigned to {:?}", id, staff_id);
        Ok(booking)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Booking not found"));
        }
        debug!("Booking deleted: {:?}", id);
        Ok(())
    }

    /// Pending bookings whose day has passed without approval.
    pub async fn cancel_stale_pending(pool: &PgPool, today: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE bookings SET status = 'cancelled', updated_at = NOW()
            WHERE status = 'pending' AND booking_date < $1
            "#,
        )
        .bind(today)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn package(is_active: bool) -> Package {
        Package {
            id: Uuid::new_v4(),
            title: "Portrait Session".to_string(),
            description: String::new(),
            price_cents: 15_000,
            duration_minutes: 60,
            features: vec![],
            is_active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request(date: NaiveDate, venue: &str) -> CreateBookingRequest {
        CreateBookingRequest {
            package_id: Uuid::new_v4(),
            booking_date: date,
            booking_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            venue: venue.to_string(),
            notes: None,
        }
    }

    #[test]
    fn status_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Approved.can_transition_to(Cancelled));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Approved));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn approval_checks_transition_and_staff_slot() {
        use BookingStatus::*;
        assert!(check_transition(Pending, Approved).is_ok());
        assert!(matches!(
            check_transition(Cancelled, Approved),
            Err(AppError::BadRequest(_))
        ));
        assert!(check_clashes(0).is_ok());
        assert!(matches!(check_clashes(1), Err(AppError::Conflict(_))));
    }

    #[test]
    fn new_booking_rules() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        assert!(validate_new_booking(&request(today, "Studio A"), &package(true), today).is_ok());
        assert!(validate_new_booking(
            &request(today - Duration::days(1), "Studio A"),
            &package(true),
            today
        )
        .is_err());
        assert!(validate_new_booking(&request(today, "   "), &package(true), today).is_err());
        assert!(validate_new_booking(&request(today, "Studio A"), &package(false), today).is_err());
    }
}
