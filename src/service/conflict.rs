use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::MAX_THEATER;
use crate::model::*;

use super::{BookingService, ServiceError};

/// First booking that occupies `slot` in `theater`, skipping Cancelled rows
/// and the optionally excluded id (an update checking against itself).
pub fn first_conflict<'a>(
    bookings: &'a [Booking],
    theater: u32,
    slot: &Slot,
    exclude: Option<Ulid>,
) -> Option<&'a Booking> {
    bookings
        .iter()
        .filter(|b| Some(b.id) != exclude)
        .find(|b| b.blocks(theater, slot))
}

pub(super) fn validate_theater(theater: u32) -> Result<(), ServiceError> {
    if theater == 0 || theater > MAX_THEATER {
        return Err(ServiceError::Validation("theater out of range"));
    }
    Ok(())
}

pub(super) fn validate_window(start: TimeOfDay, end: TimeOfDay) -> Result<(), ServiceError> {
    if end <= start {
        return Err(ServiceError::Validation("end time must be after start time"));
    }
    Ok(())
}

impl BookingService {
    /// Advisory pre-check against the store's server-side conflict
    /// procedure. A store failure propagates as a retryable error — the
    /// answer is never assumed to be "no conflict", so callers fail closed.
    pub async fn has_conflict(
        &self,
        theater: u32,
        date: NaiveDate,
        start: TimeOfDay,
        end: TimeOfDay,
        exclude: Option<Ulid>,
    ) -> Result<bool, ServiceError> {
        validate_theater(theater)?;
        validate_window(start, end)?;
        Ok(self
            .store
            .check_conflict(theater, date, start, end, exclude)
            .await?)
    }
}
