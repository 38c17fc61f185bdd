use chrono::NaiveDate;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::{MAX_CONDITION_LEN, MAX_NAME_LEN, MAX_NOTES_LEN};
use crate::model::*;
use crate::notify::BookingEvent;
use crate::observability;

use super::conflict::{first_conflict, validate_theater, validate_window};
use super::{BookingService, ServiceError};

/// Request to create a booking. The id and status are assigned here.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub doctor_id: Ulid,
    pub patient_id: Ulid,
    pub date: NaiveDate,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub theater: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub patient_ref: String,
    pub name: String,
    pub age: u32,
    pub condition: String,
    pub gender: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_history: Option<String>,
    pub icu_days: Option<u32>,
    pub expected_stay_days: Option<u32>,
    pub insurance: Option<String>,
    pub instruments: Option<String>,
    pub admitted_on: Option<NaiveDate>,
    pub discharged_on: Option<NaiveDate>,
    pub sms_opt_in: bool,
}

#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub user_id: Option<Ulid>,
    pub employee_id: String,
    pub name: String,
    pub qualification: String,
    pub specialization: Specialization,
    pub contact: String,
    pub role: Role,
}

impl BookingService {
    /// Create a booking after an advisory conflict scan over the theatre's
    /// day. The store's exclusion rule remains the authority: a race that
    /// slips past the scan still fails there and surfaces as a conflict.
    pub async fn create_booking(&self, req: NewBooking) -> Result<Booking, ServiceError> {
        validate_theater(req.theater)?;
        validate_window(req.start, req.end)?;
        if let Some(notes) = &req.notes
            && notes.len() > MAX_NOTES_LEN
        {
            return Err(ServiceError::Validation("notes too long"));
        }
        self.store
            .patient(req.patient_id)
            .await?
            .ok_or(ServiceError::NotFound(req.patient_id))?;
        self.store
            .doctor(req.doctor_id)
            .await?
            .ok_or(ServiceError::NotFound(req.doctor_id))?;

        // Advisory scan. A store failure propagates here, so an unknown
        // answer blocks the write rather than letting it through.
        let slot = Slot::new(req.date, req.start, req.end);
        let day = self.store.bookings_on(req.theater, req.date).await?;
        if let Some(existing) = first_conflict(&day, req.theater, &slot, None) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            warn!(
                theater = req.theater,
                date = %req.date,
                conflicting = %existing.id,
                "booking rejected: slot taken"
            );
            return Err(ServiceError::Conflict(existing.id));
        }

        let booking = Booking {
            id: Ulid::new(),
            doctor_id: req.doctor_id,
            patient_id: req.patient_id,
            slot,
            theater: req.theater,
            status: BookingStatus::Booked,
            notes: req.notes,
        };
        self.store.insert_booking(booking.clone()).await?;

        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
        info!(
            id = %booking.id,
            theater = booking.theater,
            date = %booking.slot.date,
            "booking created"
        );
        self.notify.send(
            booking.theater,
            &BookingEvent::Created {
                id: booking.id,
                theater: booking.theater,
                date: booking.slot.date,
            },
        );
        Ok(booking)
    }

    pub async fn mark_completed(&self, id: Ulid) -> Result<Booking, ServiceError> {
        self.transition(id, BookingStatus::Completed).await
    }

    pub async fn mark_cancelled(&self, id: Ulid) -> Result<Booking, ServiceError> {
        self.transition(id, BookingStatus::Cancelled).await
    }

    /// Booked → terminal only. A booking already completed or cancelled is
    /// left untouched and the attempt reported.
    async fn transition(&self, id: Ulid, to: BookingStatus) -> Result<Booking, ServiceError> {
        debug_assert!(to.is_terminal());
        let current = self
            .store
            .booking(id)
            .await?
            .ok_or(ServiceError::NotFound(id))?;
        if current.status.is_terminal() {
            warn!(%id, from = %current.status, to = %to, "transition rejected");
            return Err(ServiceError::InvalidTransition {
                id,
                from: current.status,
            });
        }

        let updated = self.store.update_status(id, to).await?;
        metrics::counter!(observability::STATUS_TRANSITIONS_TOTAL, "status" => to.to_string())
            .increment(1);
        info!(%id, status = %to, "booking status changed");
        self.notify.send(
            updated.theater,
            &BookingEvent::StatusChanged {
                id,
                theater: updated.theater,
                status: to,
            },
        );
        Ok(updated)
    }

    /// Sweep every Booked booking dated strictly before `as_of` to
    /// Completed. Idempotent: a second sweep with the same date is a no-op.
    pub async fn auto_complete_past_bookings(
        &self,
        as_of: NaiveDate,
    ) -> Result<usize, ServiceError> {
        let completed = self.store.complete_past(as_of).await?;
        if !completed.is_empty() {
            metrics::counter!(observability::BOOKINGS_AUTOCOMPLETED_TOTAL)
                .increment(completed.len() as u64);
            info!(count = completed.len(), %as_of, "auto-completed past bookings");
        }
        Ok(completed.len())
    }

    /// Remove a booking outright, whatever its status.
    pub async fn delete_booking(&self, id: Ulid) -> Result<(), ServiceError> {
        let existing = self
            .store
            .booking(id)
            .await?
            .ok_or(ServiceError::NotFound(id))?;
        self.store.delete_booking(id).await?;

        metrics::counter!(observability::BOOKINGS_DELETED_TOTAL).increment(1);
        info!(%id, theater = existing.theater, "booking deleted");
        self.notify.send(
            existing.theater,
            &BookingEvent::Deleted {
                id,
                theater: existing.theater,
            },
        );
        Ok(())
    }

    pub async fn register_patient(&self, req: NewPatient) -> Result<Patient, ServiceError> {
        if req.name.trim().is_empty() || req.name.len() > MAX_NAME_LEN {
            return Err(ServiceError::Validation("patient name missing or too long"));
        }
        if req.patient_ref.trim().is_empty() {
            return Err(ServiceError::Validation("patient id required"));
        }
        if req.condition.len() > MAX_CONDITION_LEN {
            return Err(ServiceError::Validation("condition too long"));
        }
        if let (Some(admitted), Some(discharged)) = (req.admitted_on, req.discharged_on)
            && discharged < admitted
        {
            return Err(ServiceError::Validation("discharge before admission"));
        }

        let patient = Patient {
            id: Ulid::new(),
            patient_ref: req.patient_ref,
            name: req.name,
            age: req.age,
            condition: req.condition,
            gender: req.gender,
            emergency_contact: req.emergency_contact,
            medical_history: req.medical_history,
            icu_days: req.icu_days,
            expected_stay_days: req.expected_stay_days,
            insurance: req.insurance,
            instruments: req.instruments,
            admitted_on: req.admitted_on,
            discharged_on: req.discharged_on,
            sms_opt_in: req.sms_opt_in,
        };
        self.store.insert_patient(patient.clone()).await?;
        info!(id = %patient.id, patient_ref = %patient.patient_ref, "patient registered");
        Ok(patient)
    }

    pub async fn register_doctor(&self, req: NewDoctor) -> Result<Doctor, ServiceError> {
        if req.name.trim().is_empty() || req.name.len() > MAX_NAME_LEN {
            return Err(ServiceError::Validation("doctor name missing or too long"));
        }
        if req.employee_id.trim().is_empty() {
            return Err(ServiceError::Validation("employee id required"));
        }

        let doctor = Doctor {
            id: Ulid::new(),
            user_id: req.user_id,
            employee_id: req.employee_id,
            name: req.name,
            qualification: req.qualification,
            specialization: req.specialization,
            contact: req.contact,
            role: req.role,
        };
        self.store.insert_doctor(doctor.clone()).await?;
        info!(id = %doctor.id, employee_id = %doctor.employee_id, "doctor registered");
        Ok(doctor)
    }
}
