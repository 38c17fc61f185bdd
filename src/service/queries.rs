use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::limits::MAX_SEARCH_LEN;
use crate::model::*;

use super::conflict::validate_theater;
use super::filter::{filter_and_sort, ListOptions};
use super::stats::{window_stats, ViewStats, ViewWindow};
use super::{BookingService, ServiceError};

impl BookingService {
    pub async fn booking_details(&self, id: Ulid) -> Result<BookingView, ServiceError> {
        let booking = self
            .store
            .booking(id)
            .await?
            .ok_or(ServiceError::NotFound(id))?;
        self.view_for(booking).await
    }

    /// A doctor's own bookings, joined, filtered, and sorted. `today`
    /// anchors the relative date filters.
    pub async fn my_bookings(
        &self,
        doctor_id: Ulid,
        opts: &ListOptions,
        today: NaiveDate,
    ) -> Result<Vec<BookingView>, ServiceError> {
        let bookings = self.store.bookings_for_doctor(doctor_id).await?;
        let views = self.join_views(bookings).await?;
        Ok(filter_and_sort(&views, opts, today))
    }

    /// A theatre's schedule for a calendar window, date and start order.
    /// Cancelled bookings do not appear on the calendar.
    pub async fn calendar_bookings(
        &self,
        theater: u32,
        window: &ViewWindow,
    ) -> Result<Vec<BookingView>, ServiceError> {
        validate_theater(theater)?;
        let bookings = self
            .store
            .bookings_for_theater(theater)
            .await?
            .into_iter()
            .filter(|b| b.status != BookingStatus::Cancelled && window.contains(b.slot.date))
            .collect();
        self.join_views(bookings).await
    }

    /// Dashboard aggregation for one theatre and window. All statuses
    /// count; `now` drives the remaining-capacity figure.
    pub async fn theater_stats(
        &self,
        theater: u32,
        window: &ViewWindow,
        now: NaiveDateTime,
    ) -> Result<ViewStats, ServiceError> {
        validate_theater(theater)?;
        let bookings = self.store.bookings_for_theater(theater).await?;
        Ok(window_stats(&bookings, window, now))
    }

    pub async fn patients(&self) -> Result<Vec<Patient>, ServiceError> {
        Ok(self.store.patients().await?)
    }

    /// Case-insensitive patient lookup over name, business key, and
    /// condition, as the booking form's picker uses it.
    pub async fn find_patients(&self, search: &str) -> Result<Vec<Patient>, ServiceError> {
        if search.len() > MAX_SEARCH_LEN {
            return Err(ServiceError::Validation("search term too long"));
        }
        let needle = search.trim().to_lowercase();
        let mut patients = self.store.patients().await?;
        if !needle.is_empty() {
            patients.retain(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.patient_ref.to_lowercase().contains(&needle)
                    || p.condition.to_lowercase().contains(&needle)
            });
        }
        Ok(patients)
    }

    /// Join bookings to patient and doctor summaries, caching lookups so a
    /// list of n bookings does not make 2n store calls.
    async fn join_views(&self, bookings: Vec<Booking>) -> Result<Vec<BookingView>, ServiceError> {
        let mut patients: HashMap<Ulid, PatientSummary> = HashMap::new();
        let mut doctors: HashMap<Ulid, DoctorSummary> = HashMap::new();
        let mut views = Vec::with_capacity(bookings.len());

        for booking in bookings {
            let patient = match patients.get(&booking.patient_id) {
                Some(cached) => cached.clone(),
                None => {
                    let fetched = self
                        .store
                        .patient(booking.patient_id)
                        .await?
                        .ok_or(ServiceError::NotFound(booking.patient_id))?
                        .summary();
                    patients.insert(booking.patient_id, fetched.clone());
                    fetched
                }
            };
            let doctor = match doctors.get(&booking.doctor_id) {
                Some(cached) => cached.clone(),
                None => {
                    let fetched = self
                        .store
                        .doctor(booking.doctor_id)
                        .await?
                        .ok_or(ServiceError::NotFound(booking.doctor_id))?
                        .summary();
                    doctors.insert(booking.doctor_id, fetched.clone());
                    fetched
                }
            };
            views.push(BookingView {
                booking,
                patient,
                doctor,
            });
        }
        Ok(views)
    }
}
