//! Appointment queries

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{Appointment, AppointmentStatus};

/// List a staff member's non-cancelled appointments for one date, in
/// scheduled order (unscheduled ones last, then by booking time).
pub async fn list_for_staff_day(
    pool: &PgPool,
    staff_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<Appointment>> {
    let appointments = sqlx::query_as::<_, Appointment>(
        r#"
        SELECT id, staff_id, reference,
               address_line1, city, postcode,
               scheduled_date, scheduled_time_start, scheduled_time_end,
               status, created_at, updated_at
        FROM appointments
        WHERE staff_id = $1
          AND scheduled_date = $2
          AND status != $3
        ORDER BY scheduled_time_start ASC NULLS LAST, created_at ASC
        "#,
    )
    .bind(staff_id)
    .bind(date)
    .bind(AppointmentStatus::Cancelled.as_str())
    .fetch_all(pool)
    .await?;

    Ok(appointments)
}
