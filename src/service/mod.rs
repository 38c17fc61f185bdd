//! The booking service: conflict checking, lifecycle mutations, queries,
//! aggregation, and list shaping over a [`BookingStore`].
//!
//! One service instance fronts the whole store; per-theatre serialization
//! lives inside the store itself.

mod conflict;
mod error;
mod filter;
mod mutations;
mod queries;
mod stats;

pub use conflict::first_conflict;
pub use error::ServiceError;
pub use filter::{filter_and_sort, DateFilter, ListOptions, SortKey, SortOrder, StatusFilter};
pub use mutations::{NewBooking, NewDoctor, NewPatient};
pub use stats::{window_stats, Remaining, ViewStats, ViewWindow};

use std::sync::Arc;

use ulid::Ulid;

use crate::model::{BookingView, Doctor};
use crate::notify::NotifyHub;
use crate::store::BookingStore;

pub struct BookingService {
    store: Arc<dyn BookingStore>,
    notify: Arc<NotifyHub>,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, notify: Arc<NotifyHub>) -> Self {
        Self { store, notify }
    }

    pub fn notify(&self) -> &NotifyHub {
        &self.notify
    }

    /// Resolve a signed-in user to their doctor record. Fails when no
    /// doctor profile is linked to the account.
    pub async fn resolve_doctor(&self, user_id: Ulid) -> Result<Doctor, ServiceError> {
        self.store
            .doctor_for_user(user_id)
            .await?
            .ok_or(ServiceError::NotFound(user_id))
    }

    /// Join a booking to its patient and doctor summaries.
    async fn view_for(&self, booking: crate::model::Booking) -> Result<BookingView, ServiceError> {
        let patient = self
            .store
            .patient(booking.patient_id)
            .await?
            .ok_or(ServiceError::NotFound(booking.patient_id))?;
        let doctor = self
            .store
            .doctor(booking.doctor_id)
            .await?
            .ok_or(ServiceError::NotFound(booking.doctor_id))?;
        Ok(BookingView {
            booking,
            patient: patient.summary(),
            doctor: doctor.summary(),
        })
    }
}
