//! Per-window aggregation for the day, week, and month dashboard views.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};

use crate::model::{Booking, BookingStatus};

/// Which calendar window a dashboard view is looking at, anchored by any
/// date inside it. Weeks run Sunday through Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewWindow {
    Day(NaiveDate),
    Week(NaiveDate),
    Month(NaiveDate),
}

impl ViewWindow {
    pub fn start(&self) -> NaiveDate {
        match self {
            ViewWindow::Day(d) => *d,
            ViewWindow::Week(d) => d.week(Weekday::Sun).first_day(),
            ViewWindow::Month(d) => first_of_month(*d),
        }
    }

    /// Last date inside the window, inclusive.
    pub fn end(&self) -> NaiveDate {
        match self {
            ViewWindow::Day(d) => *d,
            ViewWindow::Week(d) => d.week(Weekday::Sun).last_day(),
            ViewWindow::Month(d) => month_end(*d),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start() <= date && date <= self.end()
    }

    fn total_days(&self) -> u32 {
        (self.end() - self.start()).num_days() as u32 + 1
    }
}

fn first_of_month(d: NaiveDate) -> NaiveDate {
    // day 1 exists in every month
    d.with_day(1).unwrap_or(d)
}

fn month_end(d: NaiveDate) -> NaiveDate {
    let next = if d.month() == 12 {
        NaiveDate::from_ymd_opt(d.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(d.year(), d.month() + 1, 1)
    };
    match next.and_then(|n| n.pred_opt()) {
        Some(end) => end,
        None => d,
    }
}

/// How much of the window is still ahead of the clock: hours left in the
/// day for day views, whole days (including today) otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Hours(u32),
    Days(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub remaining: Remaining,
}

/// Count bookings falling inside `window` by status and compute the
/// remaining capacity relative to `now`. Bookings outside the window are
/// ignored entirely.
pub fn window_stats(bookings: &[Booking], window: &ViewWindow, now: NaiveDateTime) -> ViewStats {
    let mut total = 0;
    let mut active = 0;
    let mut completed = 0;
    let mut cancelled = 0;
    for booking in bookings {
        if !window.contains(booking.slot.date) {
            continue;
        }
        total += 1;
        match booking.status {
            BookingStatus::Booked => active += 1,
            BookingStatus::Completed => completed += 1,
            BookingStatus::Cancelled => cancelled += 1,
        }
    }

    let today = now.date();
    let remaining = match window {
        ViewWindow::Day(d) => {
            if *d == today {
                Remaining::Hours(24 - now.hour())
            } else if *d > today {
                Remaining::Hours(24)
            } else {
                Remaining::Hours(0)
            }
        }
        ViewWindow::Week(_) => {
            if window.contains(today) {
                // today still counts as available
                Remaining::Days(7 - today.weekday().num_days_from_sunday())
            } else if window.start() > today {
                Remaining::Days(7)
            } else {
                Remaining::Days(0)
            }
        }
        ViewWindow::Month(_) => {
            let days = window.total_days();
            if window.contains(today) {
                Remaining::Days(days - today.day())
            } else if window.start() > today {
                Remaining::Days(days)
            } else {
                Remaining::Days(0)
            }
        }
    };

    ViewStats {
        total,
        active,
        completed,
        cancelled,
        remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Slot, TimeOfDay};
    use ulid::Ulid;

    fn booking(date: NaiveDate, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            doctor_id: Ulid::new(),
            patient_id: Ulid::new(),
            slot: Slot::new(
                date,
                TimeOfDay::from_hm(9, 0).unwrap(),
                TimeOfDay::from_hm(10, 0).unwrap(),
            ),
            theater: 1,
            status,
            notes: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn counts_by_status_ignore_outside_window() {
        let day = date(2024, 3, 5);
        let mut bookings = Vec::new();
        for _ in 0..3 {
            bookings.push(booking(day, BookingStatus::Booked));
        }
        for _ in 0..2 {
            bookings.push(booking(day, BookingStatus::Completed));
        }
        bookings.push(booking(day, BookingStatus::Cancelled));
        // next week, must not count
        bookings.push(booking(date(2024, 3, 11), BookingStatus::Booked));

        let now = day.and_hms_opt(8, 30, 0).unwrap();
        let stats = window_stats(&bookings, &ViewWindow::Week(day), now);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.active, 3);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.cancelled, 1);
    }

    #[test]
    fn day_remaining_hours() {
        let day = date(2024, 3, 5);
        let now = day.and_hms_opt(14, 45, 0).unwrap();
        let stats = window_stats(&[], &ViewWindow::Day(day), now);
        assert_eq!(stats.remaining, Remaining::Hours(10));

        let future = window_stats(&[], &ViewWindow::Day(date(2024, 3, 9)), now);
        assert_eq!(future.remaining, Remaining::Hours(24));

        let past = window_stats(&[], &ViewWindow::Day(date(2024, 3, 1)), now);
        assert_eq!(past.remaining, Remaining::Hours(0));
    }

    #[test]
    fn week_runs_sunday_to_saturday() {
        // 2024-03-05 is a Tuesday
        let window = ViewWindow::Week(date(2024, 3, 5));
        assert_eq!(window.start(), date(2024, 3, 3));
        assert_eq!(window.end(), date(2024, 3, 9));
        assert!(window.contains(date(2024, 3, 3)));
        assert!(window.contains(date(2024, 3, 9)));
        assert!(!window.contains(date(2024, 3, 10)));
    }

    #[test]
    fn week_remaining_days() {
        // Tuesday: Tue through Sat left, today included
        let now = date(2024, 3, 5).and_hms_opt(10, 0, 0).unwrap();
        let current = window_stats(&[], &ViewWindow::Week(date(2024, 3, 5)), now);
        assert_eq!(current.remaining, Remaining::Days(5));

        let future = window_stats(&[], &ViewWindow::Week(date(2024, 3, 12)), now);
        assert_eq!(future.remaining, Remaining::Days(7));

        let past = window_stats(&[], &ViewWindow::Week(date(2024, 2, 20)), now);
        assert_eq!(past.remaining, Remaining::Days(0));
    }

    #[test]
    fn month_window_and_remaining() {
        let window = ViewWindow::Month(date(2024, 2, 15));
        assert_eq!(window.start(), date(2024, 2, 1));
        assert_eq!(window.end(), date(2024, 2, 29)); // leap year

        let now = date(2024, 2, 15).and_hms_opt(12, 0, 0).unwrap();
        let current = window_stats(&[], &window, now);
        assert_eq!(current.remaining, Remaining::Days(14));

        let future = window_stats(&[], &ViewWindow::Month(date(2024, 4, 1)), now);
        assert_eq!(future.remaining, Remaining::Days(30));

        let past = window_stats(&[], &ViewWindow::Month(date(2024, 1, 1)), now);
        assert_eq!(past.remaining, Remaining::Days(0));
    }
}
