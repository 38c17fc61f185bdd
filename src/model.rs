use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes since midnight — the only time-of-day representation.
///
/// Never a localized timestamp: comparisons and persistence must not be
/// subject to time-zone drift. `24:00` is permitted as an end bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TimeOfDay(u16);

pub const MINUTES_PER_DAY: u16 = 24 * 60;

impl TimeOfDay {
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes <= MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        Self::from_minutes(hour * 60 + minute)
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }

    pub fn hour(&self) -> u16 {
        self.0 / 60
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for TimeOfDay {
    type Err = &'static str;

    /// Accepts `"HH:MM"` and `"HH:MM:SS"` (the store emits seconds, forms don't).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let hour: u16 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or("malformed time of day")?;
        let minute: u16 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or("malformed time of day")?;
        if let Some(secs) = parts.next() {
            let secs: u16 = secs.parse().map_err(|_| "malformed time of day")?;
            if secs >= 60 {
                return Err("time of day out of range");
            }
        }
        if parts.next().is_some() {
            return Err("malformed time of day");
        }
        TimeOfDay::from_hm(hour, minute).ok_or("time of day out of range")
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> String {
        t.to_string()
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = &'static str;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A booking's calendar position: date + half-open `[start, end)` window.
///
/// The date is compared by calendar components only; formatting for
/// persistence uses `NaiveDate`'s `%Y-%m-%d` rendering, never a UTC
/// conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(rename = "booking_date")]
    pub date: NaiveDate,
    #[serde(rename = "start_time")]
    pub start: TimeOfDay,
    #[serde(rename = "end_time")]
    pub end: TimeOfDay,
}

impl Slot {
    pub fn new(date: NaiveDate, start: TimeOfDay, end: TimeOfDay) -> Self {
        debug_assert!(start < end, "Slot start must be before end");
        Self { date, start, end }
    }

    pub fn duration_minutes(&self) -> u16 {
        self.end.minutes() - self.start.minutes()
    }

    /// Half-open overlap: equal boundaries abut without overlapping, and
    /// slots on different dates never overlap.
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.date == other.date && self.start < other.end && other.start < self.end
    }

    pub fn contains_time(&self, t: TimeOfDay) -> bool {
        self.start <= t && t < self.end
    }
}

/// Booking lifecycle. Completed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Booked,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Booked => write!(f, "booked"),
            BookingStatus::Completed => write!(f, "completed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for BookingStatus {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booked" => Ok(BookingStatus::Booked),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            _ => Err("unknown booking status"),
        }
    }
}

/// A reserved operating-theatre slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub doctor_id: Ulid,
    pub patient_id: Ulid,
    #[serde(flatten)]
    pub slot: Slot,
    #[serde(rename = "operation_theater")]
    pub theater: u32,
    pub status: BookingStatus,
    pub notes: Option<String>,
}

impl Booking {
    /// Whether this booking occupies `slot` in `theater`. Cancelled bookings
    /// never block; Completed ones still do.
    pub fn blocks(&self, theater: u32, slot: &Slot) -> bool {
        self.status != BookingStatus::Cancelled
            && self.theater == theater
            && self.slot.overlaps(slot)
    }

    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Booked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Doctor,
    Admin,
}

/// Surgical specializations, mirroring the store's closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Specialization {
    Surgeon,
    Orthopedic,
    Neuro,
    Cardiac,
    General,
    Pediatric,
    Gynecology,
    Ent,
    Ophthalmology,
    Anesthesiology,
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Specialization::Surgeon => "surgeon",
            Specialization::Orthopedic => "orthopedic",
            Specialization::Neuro => "neuro",
            Specialization::Cardiac => "cardiac",
            Specialization::General => "general",
            Specialization::Pediatric => "pediatric",
            Specialization::Gynecology => "gynecology",
            Specialization::Ent => "ent",
            Specialization::Ophthalmology => "ophthalmology",
            Specialization::Anesthesiology => "anesthesiology",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Ulid,
    /// Identity-provider account this doctor record belongs to.
    pub user_id: Option<Ulid>,
    pub employee_id: String,
    pub name: String,
    pub qualification: String,
    pub specialization: Specialization,
    pub contact: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Ulid,
    /// Human-readable business key, unique across patients.
    #[serde(rename = "patient_id")]
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

impl Doctor {
    pub fn summary(&self) -> DoctorSummary {
        DoctorSummary {
            name: self.name.clone(),
            specialization: self.specialization,
            employee_id: self.employee_id.clone(),
        }
    }
}

impl Patient {
    pub fn summary(&self) -> PatientSummary {
        PatientSummary {
            name: self.name.clone(),
            patient_ref: self.patient_ref.clone(),
            condition: self.condition.clone(),
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientSummary {
    pub name: String,
    pub patient_ref: String,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorSummary {
    pub name: String,
    pub specialization: Specialization,
    pub employee_id: String,
}

/// A booking joined with the referenced patient and doctor, as list and
/// calendar views consume it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingView {
    pub booking: Booking,
    pub patient: PatientSummary,
    pub doctor: DoctorSummary,
}
