//! Backward walk over the occurrences of a recurrence.
//!
//! The walk starts at an origin past the last occurrence and repeatedly
//! asks for the latest occurrence strictly before the previous one. It is
//! bounded by an iteration cap, so it terminates even for recurrences
//! that never end.

use std::iter::FusedIterator;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::recurrence::Recurrence;
use crate::time::{CalDateTime, Zone, dump_time};

/// Default number of steps a walk takes at most.
pub const DEFAULT_MAX_ITERATIONS: usize = 500;

/// Default distance past the recurrence end the walk starts from.
pub const DEFAULT_PROBE_YEARS: i32 = 2;

fn default_fallback() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2011, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 1))
        .unwrap_or_default()
}

/// Where a walk starts and how long it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkPolicy {
    /// Upper bound on the number of occurrences produced.
    pub max_iterations: usize,
    /// Years added to the recurrence end to get the origin.
    pub probe_years: i32,
    /// Wall-clock origin for recurrences without an end, read in the view
    /// zone.
    pub fallback: NaiveDateTime,
}

impl Default for WalkPolicy {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            probe_years: DEFAULT_PROBE_YEARS,
            fallback: default_fallback(),
        }
    }
}

impl WalkPolicy {
    /// Builder: set the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Builder: set the probe window.
    #[must_use]
    pub fn with_probe_years(mut self, years: i32) -> Self {
        self.probe_years = years;
        self
    }

    /// Builder: set the fallback origin.
    #[must_use]
    pub fn with_fallback(mut self, fallback: NaiveDateTime) -> Self {
        self.fallback = fallback;
        self
    }

    /// Returns the origin of a walk over `recurrence`.
    ///
    /// That is the recurrence end moved forward by the probe window, or
    /// the fallback in `view_zone` (process-local time when `None`) for
    /// recurrences that never end.
    pub fn origin(&self, recurrence: &Recurrence, view_zone: Option<Zone>) -> Option<CalDateTime> {
        match recurrence.end_date_time() {
            Some(end) => Some(end.add_years(self.probe_years)),
            None => CalDateTime::new(self.fallback, view_zone.unwrap_or(Zone::Local)),
        }
    }

    /// Starts a walk over `recurrence` from its origin.
    pub fn walk<'a>(
        &self,
        recurrence: &'a Recurrence,
        view_zone: Option<Zone>,
    ) -> PreviousOccurrences<'a> {
        let origin = self.origin(recurrence, view_zone);
        debug!(
            origin = %dump_time(origin.as_ref(), view_zone),
            max_iterations = self.max_iterations,
            "Starting backward walk"
        );
        PreviousOccurrences::new(recurrence, origin, self.max_iterations)
    }
}

/// Occurrences of a recurrence, latest first, strictly before a cursor.
#[derive(Debug, Clone)]
pub struct PreviousOccurrences<'a> {
    recurrence: &'a Recurrence,
    cursor: Option<CalDateTime>,
    remaining: usize,
}

impl<'a> PreviousOccurrences<'a> {
    /// Walks back from `origin`, producing at most `max_iterations` items.
    pub fn new(
        recurrence: &'a Recurrence,
        origin: Option<CalDateTime>,
        max_iterations: usize,
    ) -> Self {
        Self {
            recurrence,
            cursor: origin,
            remaining: max_iterations,
        }
    }
}

impl Iterator for PreviousOccurrences<'_> {
    type Item = CalDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor?;
        if self.remaining == 0 {
            self.cursor = None;
            return None;
        }
        self.remaining -= 1;
        self.cursor = self.recurrence.previous_date_time(&cursor);
        self.cursor
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.cursor.is_none() {
            (0, Some(0))
        } else {
            (0, Some(self.remaining))
        }
    }
}

impl FusedIterator for PreviousOccurrences<'_> {}
