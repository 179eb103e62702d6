//! Calendar events.
//!
//! An [`Event`] has a start, and either an explicit end or a duration. When
//! neither is set the event ends when it starts. All-day events store an
//! inclusive end date, so an all-day event with a one-day duration ends on
//! its start date.

use std::cell::Cell;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::duration::Duration;
use crate::incidence::{DateTimeRole, Field, Incidence, IncidenceBase, IncidenceKind};
use crate::recurrence::RecurrenceRule;
use crate::time::{CalDateTime, Zone};

const SECONDS_PER_DAY: i64 = 86_400;

/// Span given to an event moved by drag and drop when it has none.
const DEFAULT_DND_SECONDS: i64 = 3600;

/// Whether an event blocks time for scheduling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transparency {
    /// The event occupies its time.
    #[default]
    Opaque,
    /// Other events may be scheduled over it.
    Transparent,
}

/// A memoized multi-day answer, valid for the endpoints it was computed from.
#[derive(Debug, Clone, Copy)]
struct MultiDayCache {
    start: CalDateTime,
    end: CalDateTime,
    all_day: bool,
    value: bool,
}

/// A calendar event.
#[derive(Debug)]
pub struct Event {
    base: IncidenceBase,
    dt_end: Option<CalDateTime>,
    transparency: Transparency,
    multi_day: Cell<Option<MultiDayCache>>,
}

impl Event {
    /// Creates an event with the given UID and no start.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            base: IncidenceBase::new(uid),
            dt_end: None,
            transparency: Transparency::Opaque,
            multi_day: Cell::new(None),
        }
    }

    /// Builder: set the summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.base.set_summary(summary);
        self
    }

    /// Builder: set the start.
    #[must_use]
    pub fn with_dt_start(mut self, dt: CalDateTime) -> Self {
        self.set_dt_start(Some(dt));
        self
    }

    /// Builder: set an explicit end.
    #[must_use]
    pub fn with_dt_end(mut self, dt: CalDateTime) -> Self {
        self.set_dt_end(Some(dt));
        self
    }

    /// Builder: set the duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.set_duration(duration);
        self
    }

    /// Builder: mark the event all-day.
    #[must_use]
    pub fn with_all_day(mut self, all_day: bool) -> Self {
        self.set_all_day(all_day);
        self
    }

    /// Builder: make this a detached instance of a recurring event.
    #[must_use]
    pub fn with_recurrence_id(mut self, recurrence_id: CalDateTime) -> Self {
        self.base.set_recurrence_id(Some(recurrence_id));
        self
    }

    /// Builder: add a recurrence rule.
    #[must_use]
    pub fn with_rrule(mut self, rule: RecurrenceRule) -> Self {
        self.base.add_rrule(rule);
        self
    }

    fn invalidate(&self) {
        self.multi_day.set(None);
    }

    /// Sets the start.
    pub fn set_dt_start(&mut self, dt: Option<CalDateTime>) {
        self.invalidate();
        self.base.set_dt_start(dt);
    }

    /// Sets or clears the explicit end.
    ///
    /// An explicit end takes over from the duration; clearing it hands
    /// authority back to the duration.
    pub fn set_dt_end(&mut self, dt: Option<CalDateTime>) {
        if self.base.is_read_only() {
            return;
        }
        self.dt_end = dt;
        self.invalidate();
        self.base.set_has_duration(dt.is_none());
        self.base.mark_field(Field::DtEnd);
    }

    /// Clears any explicit end, then sets the duration.
    pub fn set_duration(&mut self, duration: Duration) {
        self.set_dt_end(None);
        self.invalidate();
        self.base.set_duration(duration);
    }

    /// Returns whether the event blocks time in free/busy lookups.
    pub fn transparency(&self) -> Transparency {
        self.transparency
    }

    /// Sets the free/busy transparency. Ignored when read-only.
    pub fn set_transparency(&mut self, transparency: Transparency) {
        if self.base.is_read_only() {
            return;
        }
        self.transparency = transparency;
        self.base.mark_field(Field::Transparency);
    }

    /// Switches between timed and date-only scheduling.
    ///
    /// The derived end is recomputed on the next read, so a duration-based
    /// end follows the new mode. No-op when read-only or unchanged.
    pub fn set_all_day(&mut self, all_day: bool) {
        if self.base.is_read_only() || self.base.all_day() == all_day {
            return;
        }
        self.invalidate();
        self.base.mark_field(Field::DtEnd);
        self.base.set_all_day(all_day);
    }

    /// Returns `true` when an explicit end is set.
    pub fn has_end_date(&self) -> bool {
        self.dt_end.is_some()
    }

    /// Returns the end.
    ///
    /// The explicit end wins. Otherwise a duration gives the end; all-day
    /// events end on the last day they cover, never before their start.
    /// Without either the event ends at its start.
    pub fn dt_end(&self) -> Option<CalDateTime> {
        if self.dt_end.is_some() {
            return self.dt_end;
        }
        let start = self.base.dt_start()?;
        if !self.base.has_duration() {
            return Some(start);
        }
        let end = self.base.duration().end(&start);
        if self.base.all_day() {
            let inclusive = end.add_days(-1);
            if inclusive.instant() >= start.instant() {
                Some(inclusive)
            } else {
                Some(start)
            }
        } else {
            Some(end)
        }
    }

    /// Returns the date of the end in the start's zone.
    ///
    /// The end of a timed event is exclusive, so an event ending at
    /// midnight ends on the previous date.
    pub fn date_end(&self) -> Option<NaiveDate> {
        let start = self.base.dt_start()?;
        let end = self.dt_end()?.to_zone(start.zone());
        if self.base.all_day() {
            Some(end.date())
        } else {
            Some(end.add_secs(-1).date())
        }
    }

    /// Returns `true` when the event covers more than one date.
    ///
    /// Both endpoints are projected into `zone`, or the start's zone when
    /// none is given. A timed event must also last longer than a day of
    /// wall-clock time in that zone, so one ending at the next local
    /// midnight is a single-day event even across a daylight-saving change.
    /// The result is cached for later zone-less calls.
    pub fn is_multi_day(&self, zone: Option<Zone>) -> bool {
        let (Some(start), Some(end)) = (self.base.dt_start(), self.dt_end()) else {
            self.invalidate();
            return false;
        };
        let all_day = self.base.all_day();

        if zone.is_none() {
            if let Some(cache) = self.multi_day.get() {
                if cache.start == start && cache.end == end && cache.all_day == all_day {
                    return cache.value;
                }
            }
        }

        let value = if all_day {
            start.date() != end.to_zone(start.zone()).date()
        } else {
            let zone = zone.unwrap_or(start.zone());
            let (start_in, end_in) = (start.to_zone(zone), end.to_zone(zone));
            let wall_span = (end_in.naive_local() - start_in.naive_local()).num_seconds();
            start_in.instant() < end_in.instant()
                && start_in.date() != end_in.date()
                && wall_span > SECONDS_PER_DAY
        };

        self.multi_day.set(Some(MultiDayCache {
            start,
            end,
            all_day,
            value,
        }));
        value
    }

    /// Keeps wall-clock times while moving them from `old` to `new`.
    pub fn shift_times(&mut self, old: Zone, new: Zone) {
        if self.base.is_read_only() {
            return;
        }
        self.invalidate();
        self.base.shift_times(old, new);
        if let Some(end) = self.dt_end {
            self.dt_end = Some(end.shift_zone(old, new));
            self.base.mark_field(Field::DtEnd);
        }
    }
}

impl Incidence for Event {
    fn base(&self) -> &IncidenceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut IncidenceBase {
        self.invalidate();
        &mut self.base
    }

    fn kind(&self) -> IncidenceKind {
        IncidenceKind::Event
    }

    fn date_time(&self, role: DateTimeRole) -> Option<CalDateTime> {
        match role {
            DateTimeRole::RecurrenceStart
            | DateTimeRole::AlarmStartOffset
            | DateTimeRole::StartTimeZone
            | DateTimeRole::Sort
            | DateTimeRole::DisplayStart => self.base.dt_start(),
            DateTimeRole::CalendarHashing => {
                if self.base.recurs() || self.is_multi_day(None) {
                    None
                } else {
                    self.base.dt_start()
                }
            }
            DateTimeRole::AlarmEndOffset
            | DateTimeRole::EndTimeZone
            | DateTimeRole::EndRecurrenceBase
            | DateTimeRole::End
            | DateTimeRole::DisplayEnd => self.dt_end(),
            DateTimeRole::Alarm => {
                let alarm = self.base.alarms().first()?;
                if alarm.has_start_offset() {
                    self.base.dt_start()
                } else {
                    self.dt_end()
                }
            }
            DateTimeRole::Dnd => None,
        }
    }

    fn set_date_time(&mut self, dt: CalDateTime, role: DateTimeRole) {
        match role {
            DateTimeRole::Dnd => {
                let span = match (self.base.dt_start(), self.dt_end()) {
                    (Some(start), Some(end)) => start.secs_to(&end),
                    _ => 0,
                };
                let span = if span <= 0 { DEFAULT_DND_SECONDS } else { span };
                self.set_dt_start(Some(dt));
                self.set_dt_end(Some(dt.add_secs(span)));
            }
            DateTimeRole::End => self.set_dt_end(Some(dt)),
            other => debug!(uid = %self.base.uid(), role = ?other, "Unhandled role"),
        }
    }
}

impl Clone for Event {
    /// Clones the event; the copy recomputes its multi-day answer.
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            dt_end: self.dt_end,
            transparency: self.transparency,
            multi_day: Cell::new(None),
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
            && self.dt_end() == other.dt_end()
            && self.transparency == other.transparency
    }
}
