//! Availability data: day/month results, the closed-dates cache, and the
//! sanitization applied to day payloads before they reach the engine.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{SeatingArea, Shift, ShiftKind};

/// Availability for one day: open shifts with their slots and the seating
/// areas offered.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DayAvailability {
    /// Shifts open for the requested date and party size, sanitized.
    pub shifts: Vec<Shift>,
    /// Seating areas offered for the day.
    pub areas: Vec<SeatingArea>,
    /// Optional service message (sold out, special notice).
    pub message: Option<String>,
}

impl DayAvailability {
    /// Whether the day has any bookable slot at all.
    #[must_use]
    pub fn has_slots(&self) -> bool {
        self.shifts.iter().any(|shift| !shift.times.is_empty())
    }
}

/// Availability for one month: the dates with no bookable capacity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonthAvailability {
    /// Dates in the month that are closed.
    pub closed_dates: Vec<NaiveDate>,
}

/// The `"YYYY-MM"` cache key for a date.
#[must_use]
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Month-keyed cache of closed days.
///
/// Additive for the life of a session: months are fetched lazily, at most
/// once, and never evicted. The in-flight set suppresses duplicate fetches
/// for a month whose request is still outstanding.
#[derive(Debug, Default)]
pub struct ClosedDatesCache {
    months: HashMap<String, Vec<NaiveDate>>,
    in_flight: HashSet<String>,
}

impl ClosedDatesCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a fetch for this month should be issued now. Marks the month
    /// in flight when it answers `true`.
    pub fn begin_fetch(&mut self, key: &str) -> bool {
        if self.months.contains_key(key) || self.in_flight.contains(key) {
            debug!(month = key, "month fetch suppressed");
            return false;
        }
        self.in_flight.insert(key.to_owned());
        true
    }

    /// Store a fetched month.
    pub fn insert(&mut self, key: String, closed: Vec<NaiveDate>) {
        self.in_flight.remove(&key);
        self.months.insert(key, closed);
    }

    /// Clear the in-flight mark after a failed fetch so it can be retried.
    pub fn abandon_fetch(&mut self, key: &str) {
        self.in_flight.remove(key);
    }

    /// Whether the month has been fetched.
    #[must_use]
    pub fn has_month(&self, key: &str) -> bool {
        self.months.contains_key(key)
    }

    /// Whether a date is known to be closed. Unfetched months answer
    /// `false`; callers consult [`ClosedDatesCache::has_month`] first when
    /// the distinction matters.
    #[must_use]
    pub fn is_closed(&self, date: NaiveDate) -> bool {
        self.months
            .get(&month_key(date))
            .is_some_and(|closed| closed.contains(&date))
    }
}

/// Sanitize a day payload: drop blocked (negative-time) slots, then restrict
/// event shifts to times the day's regular shifts actually offer.
#[must_use]
pub fn sanitize_shifts(mut shifts: Vec<Shift>) -> Vec<Shift> {
    for shift in &mut shifts {
        shift.times.retain(|slot| slot.time >= 0);
    }

    let regular_times: BTreeSet<i32> = shifts
        .iter()
        .filter(|shift| shift.kind != ShiftKind::Event)
        .flat_map(|shift| shift.times.iter().map(|slot| slot.time))
        .collect();

    for shift in &mut shifts {
        if shift.kind == ShiftKind::Event {
            shift.times.retain(|slot| regular_times.contains(&slot.time));
        }
    }
    shifts
}
