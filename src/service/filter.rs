//! List shaping: free-text search, status and date filters, and ordering.
//! Pure over a joined snapshot; the caller supplies "today".

use std::cmp::Ordering;

use chrono::{Days, NaiveDate};

use crate::model::{BookingStatus, BookingView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(BookingStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFilter {
    #[default]
    All,
    Today,
    /// The last seven days, today inclusive.
    LastWeek,
    /// The last thirty days, today inclusive.
    LastMonth,
    /// Today or later.
    Upcoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Date,
    Time,
    Patient,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One view's list configuration. Immutable; views build a fresh value per
/// interaction rather than mutating a shared one.
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub search: Option<String>,
    pub status: StatusFilter,
    pub date: DateFilter,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            search: None,
            status: StatusFilter::All,
            date: DateFilter::All,
            sort_key: SortKey::Date,
            sort_order: SortOrder::Desc,
        }
    }
}

fn matches_search(view: &BookingView, needle: &str) -> bool {
    let hit = |s: &str| s.to_lowercase().contains(needle);
    hit(&view.patient.name)
        || hit(&view.patient.patient_ref)
        || hit(&view.patient.condition)
        || hit(&view.doctor.name)
        || hit(&view.doctor.specialization.to_string())
        || view.booking.notes.as_deref().is_some_and(hit)
}

fn matches_date(date: NaiveDate, filter: DateFilter, today: NaiveDate) -> bool {
    match filter {
        DateFilter::All => true,
        DateFilter::Today => date == today,
        DateFilter::LastWeek => {
            let floor = today.checked_sub_days(Days::new(7)).unwrap_or(today);
            floor <= date && date <= today
        }
        DateFilter::LastMonth => {
            let floor = today.checked_sub_days(Days::new(30)).unwrap_or(today);
            floor <= date && date <= today
        }
        DateFilter::Upcoming => date >= today,
    }
}

fn status_rank(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Booked => "booked",
        BookingStatus::Cancelled => "cancelled",
        BookingStatus::Completed => "completed",
    }
}

fn compare(a: &BookingView, b: &BookingView, key: SortKey) -> Ordering {
    match key {
        SortKey::Date => a.booking.slot.date.cmp(&b.booking.slot.date),
        SortKey::Time => a.booking.slot.start.cmp(&b.booking.slot.start),
        SortKey::Patient => a.patient.name.cmp(&b.patient.name),
        SortKey::Status => status_rank(a.booking.status).cmp(status_rank(b.booking.status)),
    }
}

/// Apply search, filters, and sort to a snapshot, returning a new list.
/// The input is never reordered; equal keys keep their incoming order.
pub fn filter_and_sort(
    views: &[BookingView],
    opts: &ListOptions,
    today: NaiveDate,
) -> Vec<BookingView> {
    let needle = opts
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut out: Vec<BookingView> = views
        .iter()
        .filter(|v| match &needle {
            Some(n) => matches_search(v, n),
            None => true,
        })
        .filter(|v| match opts.status {
            StatusFilter::All => true,
            StatusFilter::Only(s) => v.booking.status == s,
        })
        .filter(|v| matches_date(v.booking.slot.date, opts.date, today))
        .cloned()
        .collect();

    out.sort_by(|a, b| {
        let ord = compare(a, b, opts.sort_key);
        match opts.sort_order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
    out
}
