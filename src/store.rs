//! The persistence seam.
//!
//! The production deployment talks to a hosted relational store; this module
//! defines the trait the service core consumes plus an in-memory
//! implementation with the same guarantees. The critical one is the
//! exclusion rule: `insert_booking` re-checks for overlapping non-cancelled
//! bookings under the per-theatre write lock, so it stays safe even when two
//! callers pass the advisory pre-check concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Network/availability failure. Retryable; callers must fail closed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Exclusion constraint on `(theater, date, time range, status != cancelled)`.
    #[error("slot taken by booking {0}")]
    SlotTaken(Ulid),
    #[error("not found: {0}")]
    NotFound(Ulid),
    /// Unique business key (`patient_id`, `employee_id`) already present.
    #[error("duplicate {0}")]
    DuplicateKey(&'static str),
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a booking. The store is the authoritative conflict guard:
    /// a non-cancelled booking overlapping an existing non-cancelled one in
    /// the same theatre and date is rejected with [`StoreError::SlotTaken`].
    async fn insert_booking(&self, booking: Booking) -> Result<(), StoreError>;

    /// Unconditionally set a booking's status. Transition rules live in the
    /// service layer, not here.
    async fn update_status(&self, id: Ulid, status: BookingStatus) -> Result<Booking, StoreError>;

    async fn delete_booking(&self, id: Ulid) -> Result<(), StoreError>;

    async fn booking(&self, id: Ulid) -> Result<Option<Booking>, StoreError>;

    /// All bookings for a theatre on one date, ordered by start time.
    async fn bookings_on(&self, theater: u32, date: NaiveDate) -> Result<Vec<Booking>, StoreError>;

    /// All bookings for a theatre, ordered by date then start time.
    async fn bookings_for_theater(&self, theater: u32) -> Result<Vec<Booking>, StoreError>;

    /// All bookings held by a doctor across theatres, date then start order.
    async fn bookings_for_doctor(&self, doctor_id: Ulid) -> Result<Vec<Booking>, StoreError>;

    /// Transition every Booked booking dated strictly before `as_of` to
    /// Completed, in one pass. Returns the ids that changed; running it
    /// again with the same `as_of` returns nothing.
    async fn complete_past(&self, as_of: NaiveDate) -> Result<Vec<Ulid>, StoreError>;

    /// Server-side conflict pre-check mirroring the insert-time exclusion
    /// rule. Advisory only — a concurrent writer can still win the slot.
    async fn check_conflict(
        &self,
        theater: u32,
        date: NaiveDate,
        start: TimeOfDay,
        end: TimeOfDay,
        exclude: Option<Ulid>,
    ) -> Result<bool, StoreError>;

    async fn insert_patient(&self, patient: Patient) -> Result<(), StoreError>;
    async fn patient(&self, id: Ulid) -> Result<Option<Patient>, StoreError>;
    async fn patients(&self) -> Result<Vec<Patient>, StoreError>;

    async fn insert_doctor(&self, doctor: Doctor) -> Result<(), StoreError>;
    async fn doctor(&self, id: Ulid) -> Result<Option<Doctor>, StoreError>;
    async fn doctor_for_user(&self, user_id: Ulid) -> Result<Option<Doctor>, StoreError>;
}

// ── In-memory implementation ─────────────────────────────────────

/// One theatre's bookings, sorted by `(date, start)`.
pub struct TheaterState {
    pub theater: u32,
    pub bookings: Vec<Booking>,
}

impl TheaterState {
    fn new(theater: u32) -> Self {
        Self {
            theater,
            bookings: Vec::new(),
        }
    }

    /// Insert maintaining sort order by `(date, start)`.
    fn insert_sorted(&mut self, booking: Booking) {
        let key = (booking.slot.date, booking.slot.start);
        let pos = self
            .bookings
            .binary_search_by_key(&key, |b| (b.slot.date, b.slot.start))
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    fn remove(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    fn find_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// Bookings on `date`, found by binary search over the sorted list.
    fn on_date(&self, date: NaiveDate) -> &[Booking] {
        let lo = self.bookings.partition_point(|b| b.slot.date < date);
        let hi = self.bookings.partition_point(|b| b.slot.date <= date);
        &self.bookings[lo..hi]
    }

    /// First non-cancelled booking overlapping `slot`, skipping `exclude`.
    fn first_blocking(&self, slot: &Slot, exclude: Option<Ulid>) -> Option<&Booking> {
        self.on_date(slot.date)
            .iter()
            .filter(|b| Some(b.id) != exclude)
            .find(|b| b.blocks(self.theater, slot))
    }
}

type SharedTheaterState = Arc<RwLock<TheaterState>>;

pub struct InMemoryStore {
    theaters: DashMap<u32, SharedTheaterState>,
    /// Reverse lookup: booking id → theatre number.
    booking_theater: DashMap<Ulid, u32>,
    patients: DashMap<Ulid, Patient>,
    patient_refs: DashMap<String, Ulid>,
    doctors: DashMap<Ulid, Doctor>,
    employee_ids: DashMap<String, Ulid>,
    doctor_users: DashMap<Ulid, Ulid>,
    /// Test switch simulating an unreachable backend.
    offline: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            theaters: DashMap::new(),
            booking_theater: DashMap::new(),
            patients: DashMap::new(),
            patient_refs: DashMap::new(),
            doctors: DashMap::new(),
            employee_ids: DashMap::new(),
            doctor_users: DashMap::new(),
            offline: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("backend offline".into()));
        }
        Ok(())
    }

    fn theater_state(&self, theater: u32) -> SharedTheaterState {
        self.theaters
            .entry(theater)
            .or_insert_with(|| Arc::new(RwLock::new(TheaterState::new(theater))))
            .clone()
    }

    fn get_theater_state(&self, theater: u32) -> Option<SharedTheaterState> {
        self.theaters.get(&theater).map(|e| e.value().clone())
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn insert_booking(&self, booking: Booking) -> Result<(), StoreError> {
        self.guard()?;
        let state = self.theater_state(booking.theater);
        let mut guard = state.write().await;
        // Cancelled rows (historical imports) bypass the exclusion rule,
        // exactly as a partial constraint on status != cancelled would.
        if booking.status != BookingStatus::Cancelled
            && let Some(existing) = guard.first_blocking(&booking.slot, None)
        {
            return Err(StoreError::SlotTaken(existing.id));
        }
        self.booking_theater.insert(booking.id, booking.theater);
        guard.insert_sorted(booking);
        Ok(())
    }

    async fn update_status(&self, id: Ulid, status: BookingStatus) -> Result<Booking, StoreError> {
        self.guard()?;
        let theater = *self
            .booking_theater
            .get(&id)
            .ok_or(StoreError::NotFound(id))?;
        let state = self
            .get_theater_state(theater)
            .ok_or(StoreError::NotFound(id))?;
        let mut guard = state.write().await;
        let booking = guard.find_mut(id).ok_or(StoreError::NotFound(id))?;
        booking.status = status;
        Ok(booking.clone())
    }

    async fn delete_booking(&self, id: Ulid) -> Result<(), StoreError> {
        self.guard()?;
        let theater = *self
            .booking_theater
            .get(&id)
            .ok_or(StoreError::NotFound(id))?;
        let state = self
            .get_theater_state(theater)
            .ok_or(StoreError::NotFound(id))?;
        let mut guard = state.write().await;
        guard.remove(id).ok_or(StoreError::NotFound(id))?;
        self.booking_theater.remove(&id);
        Ok(())
    }

    async fn booking(&self, id: Ulid) -> Result<Option<Booking>, StoreError> {
        self.guard()?;
        let Some(theater) = self.booking_theater.get(&id).map(|e| *e.value()) else {
            return Ok(None);
        };
        let Some(state) = self.get_theater_state(theater) else {
            return Ok(None);
        };
        let guard = state.read().await;
        Ok(guard.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn bookings_on(&self, theater: u32, date: NaiveDate) -> Result<Vec<Booking>, StoreError> {
        self.guard()?;
        let Some(state) = self.get_theater_state(theater) else {
            return Ok(Vec::new());
        };
        let guard = state.read().await;
        Ok(guard.on_date(date).to_vec())
    }

    async fn bookings_for_theater(&self, theater: u32) -> Result<Vec<Booking>, StoreError> {
        self.guard()?;
        let Some(state) = self.get_theater_state(theater) else {
            return Ok(Vec::new());
        };
        let guard = state.read().await;
        Ok(guard.bookings.clone())
    }

    async fn bookings_for_doctor(&self, doctor_id: Ulid) -> Result<Vec<Booking>, StoreError> {
        self.guard()?;
        let states: Vec<SharedTheaterState> =
            self.theaters.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for state in states {
            let guard = state.read().await;
            out.extend(
                guard
                    .bookings
                    .iter()
                    .filter(|b| b.doctor_id == doctor_id)
                    .cloned(),
            );
        }
        out.sort_by_key(|b| (b.slot.date, b.slot.start));
        Ok(out)
    }

    async fn complete_past(&self, as_of: NaiveDate) -> Result<Vec<Ulid>, StoreError> {
        self.guard()?;
        let states: Vec<SharedTheaterState> =
            self.theaters.iter().map(|e| e.value().clone()).collect();
        let mut changed = Vec::new();
        for state in states {
            let mut guard = state.write().await;
            for booking in guard.bookings.iter_mut() {
                if booking.is_active() && booking.slot.date < as_of {
                    booking.status = BookingStatus::Completed;
                    changed.push(booking.id);
                }
            }
        }
        Ok(changed)
    }

    async fn check_conflict(
        &self,
        theater: u32,
        date: NaiveDate,
        start: TimeOfDay,
        end: TimeOfDay,
        exclude: Option<Ulid>,
    ) -> Result<bool, StoreError> {
        self.guard()?;
        let Some(state) = self.get_theater_state(theater) else {
            return Ok(false);
        };
        let guard = state.read().await;
        let slot = Slot::new(date, start, end);
        Ok(guard.first_blocking(&slot, exclude).is_some())
    }

    async fn insert_patient(&self, patient: Patient) -> Result<(), StoreError> {
        self.guard()?;
        match self.patient_refs.entry(patient.patient_ref.clone()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateKey("patient_id")),
            Entry::Vacant(slot) => {
                slot.insert(patient.id);
            }
        }
        self.patients.insert(patient.id, patient);
        Ok(())
    }

    async fn patient(&self, id: Ulid) -> Result<Option<Patient>, StoreError> {
        self.guard()?;
        Ok(self.patients.get(&id).map(|e| e.value().clone()))
    }

    async fn patients(&self) -> Result<Vec<Patient>, StoreError> {
        self.guard()?;
        let mut out: Vec<Patient> = self.patients.iter().map(|e| e.value().clone()).collect();
        out.sort_by(|a, b| a.patient_ref.cmp(&b.patient_ref));
        Ok(out)
    }

    async fn insert_doctor(&self, doctor: Doctor) -> Result<(), StoreError> {
        self.guard()?;
        match self.employee_ids.entry(doctor.employee_id.clone()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateKey("employee_id")),
            Entry::Vacant(slot) => {
                slot.insert(doctor.id);
            }
        }
        if let Some(user_id) = doctor.user_id {
            self.doctor_users.insert(user_id, doctor.id);
        }
        self.doctors.insert(doctor.id, doctor);
        Ok(())
    }

    async fn doctor(&self, id: Ulid) -> Result<Option<Doctor>, StoreError> {
        self.guard()?;
        Ok(self.doctors.get(&id).map(|e| e.value().clone()))
    }

    async fn doctor_for_user(&self, user_id: Ulid) -> Result<Option<Doctor>, StoreError> {
        self.guard()?;
        let Some(doctor_id) = self.doctor_users.get(&user_id).map(|e| *e.value()) else {
            return Ok(None);
        };
        self.doctor(doctor_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u16, m: u16) -> TimeOfDay {
        TimeOfDay::from_hm(h, m).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn booking(theater: u32, d: NaiveDate, start: TimeOfDay, end: TimeOfDay) -> Booking {
        Booking {
            id: Ulid::new(),
            doctor_id: Ulid::new(),
            patient_id: Ulid::new(),
            slot: Slot::new(d, start, end),
            theater,
            status: BookingStatus::Booked,
            notes: None,
        }
    }

    #[tokio::test]
    async fn insert_enforces_exclusion() {
        let store = InMemoryStore::new();
        let d = date(2024, 3, 5);
        let first = booking(1, d, t(9, 0), t(10, 0));
        let first_id = first.id;
        store.insert_booking(first).await.unwrap();

        let overlapping = booking(1, d, t(9, 30), t(10, 30));
        let err = store.insert_booking(overlapping).await.unwrap_err();
        assert!(matches!(err, StoreError::SlotTaken(id) if id == first_id));
    }

    #[tokio::test]
    async fn insert_allows_back_to_back_and_other_theaters() {
        let store = InMemoryStore::new();
        let d = date(2024, 3, 5);
        store.insert_booking(booking(1, d, t(9, 0), t(10, 0))).await.unwrap();
        store.insert_booking(booking(1, d, t(10, 0), t(11, 0))).await.unwrap();
        store.insert_booking(booking(2, d, t(9, 30), t(10, 30))).await.unwrap();
        assert_eq!(store.bookings_on(1, d).await.unwrap().len(), 2);
        assert_eq!(store.bookings_on(2, d).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_rows_bypass_exclusion() {
        let store = InMemoryStore::new();
        let d = date(2024, 3, 5);
        let mut cancelled = booking(1, d, t(10, 0), t(11, 0));
        cancelled.status = BookingStatus::Cancelled;
        store.insert_booking(cancelled).await.unwrap();

        // The identical range is free again
        store.insert_booking(booking(1, d, t(10, 0), t(11, 0))).await.unwrap();
    }

    #[tokio::test]
    async fn bookings_on_uses_date_partition() {
        let store = InMemoryStore::new();
        store
            .insert_booking(booking(1, date(2024, 3, 4), t(9, 0), t(10, 0)))
            .await
            .unwrap();
        store
            .insert_booking(booking(1, date(2024, 3, 5), t(11, 0), t(12, 0)))
            .await
            .unwrap();
        store
            .insert_booking(booking(1, date(2024, 3, 5), t(9, 0), t(10, 0)))
            .await
            .unwrap();
        store
            .insert_booking(booking(1, date(2024, 3, 6), t(9, 0), t(10, 0)))
            .await
            .unwrap();

        let day = store.bookings_on(1, date(2024, 3, 5)).await.unwrap();
        assert_eq!(day.len(), 2);
        // Sorted by start within the day
        assert_eq!(day[0].slot.start, t(9, 0));
        assert_eq!(day[1].slot.start, t(11, 0));
    }

    #[tokio::test]
    async fn check_conflict_honors_exclude_id() {
        let store = InMemoryStore::new();
        let d = date(2024, 3, 5);
        let existing = booking(1, d, t(9, 0), t(10, 0));
        let id = existing.id;
        store.insert_booking(existing).await.unwrap();

        assert!(store.check_conflict(1, d, t(9, 30), t(10, 30), None).await.unwrap());
        // An update re-checking against everything but itself
        assert!(!store.check_conflict(1, d, t(9, 30), t(10, 30), Some(id)).await.unwrap());
    }

    #[tokio::test]
    async fn complete_past_is_one_pass_and_idempotent() {
        let store = InMemoryStore::new();
        let past = booking(1, date(2024, 3, 1), t(9, 0), t(10, 0));
        let today = booking(1, date(2024, 3, 5), t(9, 0), t(10, 0));
        let mut cancelled = booking(2, date(2024, 3, 2), t(9, 0), t(10, 0));
        cancelled.status = BookingStatus::Cancelled;
        let past_id = past.id;
        let today_id = today.id;
        let cancelled_id = cancelled.id;
        store.insert_booking(past).await.unwrap();
        store.insert_booking(today).await.unwrap();
        store.insert_booking(cancelled).await.unwrap();

        let changed = store.complete_past(date(2024, 3, 5)).await.unwrap();
        assert_eq!(changed, vec![past_id]);

        let again = store.complete_past(date(2024, 3, 5)).await.unwrap();
        assert!(again.is_empty());

        assert_eq!(
            store.booking(past_id).await.unwrap().unwrap().status,
            BookingStatus::Completed
        );
        assert_eq!(
            store.booking(today_id).await.unwrap().unwrap().status,
            BookingStatus::Booked
        );
        assert_eq!(
            store.booking(cancelled_id).await.unwrap().unwrap().status,
            BookingStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = InMemoryStore::new();
        store.set_offline(true);
        let err = store
            .check_conflict(1, date(2024, 3, 5), t(9, 0), t(10, 0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn business_keys_are_unique() {
        let store = InMemoryStore::new();
        let patient = Patient {
            id: Ulid::new(),
            patient_ref: "P-001".into(),
            name: "Amy".into(),
            age: 54,
            condition: "appendicitis".into(),
            gender: None,
            emergency_contact: None,
            medical_history: None,
            icu_days: None,
            expected_stay_days: None,
            insurance: None,
            instruments: None,
            admitted_on: None,
            discharged_on: None,
            sms_opt_in: false,
        };
        let mut dup = patient.clone();
        dup.id = Ulid::new();
        store.insert_patient(patient).await.unwrap();
        let err = store.insert_patient(dup).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey("patient_id")));
    }

    #[tokio::test]
    async fn doctor_resolves_from_user_id() {
        let store = InMemoryStore::new();
        let user_id = Ulid::new();
        let doctor = Doctor {
            id: Ulid::new(),
            user_id: Some(user_id),
            employee_id: "E-100".into(),
            name: "Chen".into(),
            qualification: "MS".into(),
            specialization: Specialization::Cardiac,
            contact: "x1234".into(),
            role: Role::Doctor,
        };
        let doctor_id = doctor.id;
        store.insert_doctor(doctor).await.unwrap();

        let found = store.doctor_for_user(user_id).await.unwrap().unwrap();
        assert_eq!(found.id, doctor_id);
        assert!(store.doctor_for_user(Ulid::new()).await.unwrap().is_none());
    }
}
