use chrono::Utc;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info};

use crate::models::booking::Booking;
use crate::models::notification::Notification;

/// sec min hour day month weekday
const HOUSEKEEPING_SCHEDULE: &str = "0 */15 * * * *";

async fn housekeeping(pool: &PgPool) {
    match Notification::deactivate_expired(pool).await {
        Ok(0) => {}
        Ok(count) => info!("Deactivated {} expired notifications", count),
        Err(e) => error!("Failed to deactivate expired notifications: {:?}", e),
    }

    match Booking::cancel_stale_pending(pool, Utc::now().date_naive()).await {
        Ok(0) => {}
        Ok(count) => info!("Cancelled {} pending bookings past their date", count),
        Err(e) => error!("Failed to cancel stale bookings: {:?}", e),
    }
}

pub async fn start(pool: PgPool) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(HOUSEKEEPING_SCHEDULE, move |_uuid, _lock| {
        let pool = pool.clone();
        Box::pin(async move {
            housekeeping(&pool).await;
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Housekeeping scheduled: {}", HOUSEKEEPING_SCHEDULE);
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn returned_scheduler_keeps_housekeeping_queued() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/studio")
            .unwrap();
        let mut scheduler = start(pool).await.unwrap();

        let next = scheduler.time_till_next_job().await.unwrap();
        assert!(next.is_some());

        scheduler.shutdown().await.unwrap();
    }
}
