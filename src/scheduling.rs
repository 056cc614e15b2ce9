// src/scheduling.rs
//
// Pure calendar math for the booking workflow: parsing the wire-format
// date/time pair into a validated window exactly once, half-open overlap
// tests, and the 30-minute slot-label projection shared by the booking
// and un-booking paths.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

use crate::error::ApiError;
use crate::models::Slot;

/// Slot granularity. Also the implied duration of a booking request that
/// arrives without an explicit end time.
pub const SLOT_MINUTES: i64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("date must be yyyy-mm-dd, got {0:?}")]
    BadDate(String),
    #[error("time must be HH:MM, got {0:?}")]
    BadTime(String),
    #[error("end time must be after start time")]
    EmptyWindow,
}

impl From<ScheduleError> for ApiError {
    fn from(e: ScheduleError) -> Self {
        ApiError::validation(e.to_string())
    }
}

/// A validated `[start, end)` booking interval on one calendar day.
///
/// Constructed at the request boundary so every later consumer works with
/// instants instead of re-parsing the stored strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BookingWindow {
    pub fn new(date: &str, time: &str, end_time: Option<&str>) -> Result<Self, ScheduleError> {
        let date = parse_date(date)?;
        let start = parse_time_label(date, time)?;
        let end = match end_time {
            Some(label) => parse_time_label(date, label)?,
            None => start + Duration::minutes(SLOT_MINUTES),
        };
        if end <= start {
            return Err(ScheduleError::EmptyWindow);
        }
        Ok(Self { date, start, end })
    }

    /// Half-open interval test: touching endpoints do not overlap, so
    /// back-to-back appointments are allowed.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }

    pub fn slot_labels(&self) -> Vec<String> {
        slot_labels_between(self.start, self.end)
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| ScheduleError::BadDate(s.to_string()))
}

pub fn parse_time_label(date: NaiveDate, label: &str) -> Result<DateTime<Utc>, ScheduleError> {
    let t = NaiveTime::parse_from_str(label.trim(), "%H:%M")
        .map_err(|_| ScheduleError::BadTime(label.to_string()))?;
    Ok(date.and_time(t).and_utc())
}

/// True when the candidate window intersects any of the given intervals.
pub fn has_conflict<I>(window: &BookingWindow, existing: I) -> bool
where
    I: IntoIterator<Item = (DateTime<Utc>, DateTime<Utc>)>,
{
    existing.into_iter().any(|(s, e)| window.overlaps(s, e))
}

/// "HH:MM" labels stepping by `SLOT_MINUTES` from `start` (inclusive)
/// while strictly before `end`. Deterministic, so the booking and
/// un-booking paths walk identical label sets.
pub fn slot_labels_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<String> {
    let mut labels = Vec::new();
    let mut cursor = start;
    while cursor < end {
        labels.push(cursor.format("%H:%M").to_string());
        cursor += Duration::minutes(SLOT_MINUTES);
    }
    labels
}

/// Flip the `booked` flag on every slot whose label is in `labels`.
/// Slots outside the set are left untouched.
pub fn apply_booking(slots: &mut [Slot], labels: &[String], booked: bool) {
    for slot in slots.iter_mut() {
        if labels.iter().any(|l| l == &slot.time) {
            slot.booked = booked;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(time: &str, end_time: Option<&str>) -> BookingWindow {
        BookingWindow::new("2025-01-10", time, end_time).unwrap()
    }

    #[test]
    fn labels_for_one_hour() {
        let w = window("10:00", Some("11:00"));
        assert_eq!(w.slot_labels(), vec!["10:00", "10:30"]);
    }

    #[test]
    fn labels_for_empty_range() {
        let w = window("10:00", Some("11:00"));
        assert_eq!(slot_labels_between(w.start, w.start), Vec::<String>::new());
    }

    #[test]
    fn end_defaults_to_one_slot() {
        let w = window("16:30", None);
        assert_eq!(w.end - w.start, Duration::minutes(SLOT_MINUTES));
        assert_eq!(w.slot_labels(), vec!["16:30"]);
    }

    #[test]
    fn ninety_minutes_covers_three_slots() {
        let w = window("10:00", Some("11:30"));
        assert_eq!(w.slot_labels(), vec!["10:00", "10:30", "11:00"]);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(
            BookingWindow::new("10/01/2025", "10:00", None),
            Err(ScheduleError::BadDate("10/01/2025".into()))
        );
        assert_eq!(
            BookingWindow::new("2025-01-10", "quarter past", None),
            Err(ScheduleError::BadTime("quarter past".into()))
        );
        assert_eq!(
            BookingWindow::new("2025-01-10", "11:00", Some("10:00")),
            Err(ScheduleError::EmptyWindow)
        );
        assert_eq!(
            BookingWindow::new("2025-01-10", "11:00", Some("11:00")),
            Err(ScheduleError::EmptyWindow)
        );
    }

    #[test]
    fn overlap_is_half_open() {
        let existing = window("10:00", Some("11:00"));

        // 10:30-11:30 intersects 10:00-11:00.
        let candidate = window("10:30", Some("11:30"));
        assert!(candidate.overlaps(existing.start, existing.end));

        // 11:00-11:30 only touches the boundary.
        let back_to_back = window("11:00", Some("11:30"));
        assert!(!back_to_back.overlaps(existing.start, existing.end));

        // Containment counts as overlap.
        let inner = window("10:00", Some("10:30"));
        assert!(inner.overlaps(existing.start, existing.end));
    }

    #[test]
    fn conflict_scan_over_existing_windows() {
        let candidate = window("10:30", Some("11:30"));
        let taken = window("10:00", Some("11:00"));
        let free = window("12:00", Some("13:00"));

        assert!(has_conflict(&candidate, vec![(taken.start, taken.end)]));
        assert!(!has_conflict(&candidate, vec![(free.start, free.end)]));
        assert!(!has_conflict(&candidate, Vec::new()));
    }

    fn day_slots() -> Vec<Slot> {
        ["10:00", "10:30", "11:00", "11:30"]
            .iter()
            .map(|t| Slot {
                time: t.to_string(),
                available: true,
                booked: false,
            })
            .collect()
    }

    #[test]
    fn book_then_unbook_restores_flags() {
        let mut slots = day_slots();
        let before = slots.clone();
        let labels = window("10:00", Some("11:00")).slot_labels();

        apply_booking(&mut slots, &labels, true);
        assert!(slots[0].booked && slots[1].booked);
        assert!(!slots[2].booked && !slots[3].booked);

        apply_booking(&mut slots, &labels, false);
        assert_eq!(slots, before);
    }

    #[test]
    fn booking_ignores_labels_without_slots() {
        let mut slots = day_slots();
        let labels = window("14:00", Some("15:00")).slot_labels();
        apply_booking(&mut slots, &labels, true);
        assert!(slots.iter().all(|s| !s.booked));
    }
}
