//! Staff-day stop loader
//!
//! Maps a staff member's appointments for one date onto a `Stop` list in
//! scheduled order, so the first entry is a sensible default starting
//! location for the optimizer. Pure data shaping, no optimization here.

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::types::{Appointment, Stop};

/// Load the stop list for one staff member on one date.
pub async fn load_staff_day(pool: &PgPool, staff_id: Uuid, date: NaiveDate) -> Result<Vec<Stop>> {
    let appointments = queries::appointment::list_for_staff_day(pool, staff_id, date).await?;
    Ok(appointments.iter().map(appointment_to_stop).collect())
}

/// One appointment becomes one stop, labelled by its booking reference.
pub fn appointment_to_stop(appointment: &Appointment) -> Stop {
    Stop {
        address_line1: appointment.address_line1.clone(),
        city: appointment.city.clone(),
        postcode: appointment.postcode.clone(),
        label: Some(format!("#{}", appointment.reference)),
    }
}
