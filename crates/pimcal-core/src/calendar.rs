//! In-memory calendar.
//!
//! [`MemoryCalendar`] keeps events, to-dos and journal entries in separate
//! maps keyed by UID and recurrence-id. The primary instance of an
//! incidence has no recurrence-id; detached instances of a recurring
//! incidence share its UID and carry the recurrence-id of the occurrence
//! they replace.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::event::Event;
use crate::incidence::{
    Alarm, AlarmAnchor, AnyIncidence, DateTimeRole, Incidence, IncidenceBase, IncidenceKind,
};
use crate::journal::Journal;
use crate::time::{CalDateTime, Zone};
use crate::todo::Todo;

/// Occurrences examined per recurring event when matching a date range.
const MAX_RANGE_STEPS: usize = 1000;

/// Map key: UID plus the instant of the recurrence-id, if any.
type Key = (String, Option<DateTime<Utc>>);

fn key_of(base: &IncidenceBase) -> Key {
    (
        base.uid().to_string(),
        base.recurrence_id().map(CalDateTime::instant),
    )
}

fn key_for(uid: &str, recurrence_id: Option<&CalDateTime>) -> Key {
    (uid.to_string(), recurrence_id.map(CalDateTime::instant))
}

/// One firing of an alarm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmTrigger<'a> {
    /// UID of the incidence owning the alarm.
    pub uid: &'a str,
    pub kind: IncidenceKind,
    pub alarm: &'a Alarm,
    /// When the alarm fires.
    pub time: CalDateTime,
}

/// Sort order of a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Sort key for event listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSortField {
    /// Map order: by UID, then recurrence-id.
    #[default]
    Unsorted,
    StartDate,
    EndDate,
    Summary,
}

/// Sort key for to-do listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoSortField {
    #[default]
    Unsorted,
    StartDate,
    DueDate,
    PercentComplete,
    Summary,
}

/// Sort key for journal listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalSortField {
    #[default]
    Unsorted,
    Date,
    Summary,
}

fn cmp_time(a: Option<CalDateTime>, b: Option<CalDateTime>) -> Ordering {
    a.map(|dt| dt.instant()).cmp(&b.map(|dt| dt.instant()))
}

fn apply_direction<T>(items: &mut [T], direction: SortDirection) {
    if direction == SortDirection::Descending {
        items.reverse();
    }
}

fn sort_events(events: &mut [&Event], field: EventSortField, direction: SortDirection) {
    match field {
        EventSortField::Unsorted => {}
        EventSortField::StartDate => events.sort_by(|a, b| cmp_time(a.dt_start(), b.dt_start())),
        EventSortField::EndDate => events.sort_by(|a, b| cmp_time(a.dt_end(), b.dt_end())),
        EventSortField::Summary => events.sort_by(|a, b| a.summary().cmp(b.summary())),
    }
    apply_direction(events, direction);
}

fn sort_todos(todos: &mut [&Todo], field: TodoSortField, direction: SortDirection) {
    match field {
        TodoSortField::Unsorted => {}
        TodoSortField::StartDate => todos.sort_by(|a, b| cmp_time(a.dt_start(), b.dt_start())),
        TodoSortField::DueDate => todos.sort_by(|a, b| cmp_time(a.dt_due(), b.dt_due())),
        TodoSortField::PercentComplete => {
            todos.sort_by_key(|todo| todo.percent_complete());
        }
        TodoSortField::Summary => todos.sort_by(|a, b| a.summary().cmp(b.summary())),
    }
    apply_direction(todos, direction);
}

fn sort_journals(journals: &mut [&Journal], field: JournalSortField, direction: SortDirection) {
    match field {
        JournalSortField::Unsorted => {}
        JournalSortField::Date => journals.sort_by(|a, b| cmp_time(a.dt_start(), b.dt_start())),
        JournalSortField::Summary => journals.sort_by(|a, b| a.summary().cmp(b.summary())),
    }
    apply_direction(journals, direction);
}

/// Returns the first and last dates an occurrence starting at `start`
/// covers, in `zone`.
fn covered_dates(event: &Event, start: CalDateTime, zone: Zone) -> (NaiveDate, NaiveDate) {
    let (Some(dt_start), Some(dt_end)) = (event.dt_start(), event.dt_end()) else {
        return (start.date(), start.date());
    };
    if event.all_day() {
        // All-day dates float: read them in the start's own zone
        let days = dt_start.days_to(&dt_end).max(0);
        return (start.date(), start.add_days(days).date());
    }
    let span = dt_start.secs_to(&dt_end).max(0);
    let first = start.to_zone(zone);
    let last = if span > 0 {
        first.add_secs(span - 1).date()
    } else {
        first.date()
    };
    (first.date(), last)
}

fn dates_match(
    first: NaiveDate,
    last: NaiveDate,
    from: NaiveDate,
    to: NaiveDate,
    inclusive: bool,
) -> bool {
    if inclusive {
        first >= from && last <= to
    } else {
        first <= to && last >= from
    }
}

/// A calendar held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryCalendar {
    zone: Zone,
    events: BTreeMap<Key, Event>,
    todos: BTreeMap<Key, Todo>,
    journals: BTreeMap<Key, Journal>,
    deleted_events: BTreeMap<Key, Event>,
    deleted_todos: BTreeMap<Key, Todo>,
    deleted_journals: BTreeMap<Key, Journal>,
    deletion_tracking: bool,
    custom_properties: BTreeMap<String, String>,
}

impl Default for MemoryCalendar {
    fn default() -> Self {
        Self::new(Zone::Utc)
    }
}

impl MemoryCalendar {
    /// Creates an empty calendar whose dates are read in `zone`.
    pub fn new(zone: Zone) -> Self {
        Self {
            zone,
            events: BTreeMap::new(),
            todos: BTreeMap::new(),
            journals: BTreeMap::new(),
            deleted_events: BTreeMap::new(),
            deleted_todos: BTreeMap::new(),
            deleted_journals: BTreeMap::new(),
            deletion_tracking: false,
            custom_properties: BTreeMap::new(),
        }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn set_zone(&mut self, zone: Zone) {
        self.zone = zone;
    }

    /// Keeps deleted incidences for later lookup when enabled.
    pub fn set_deletion_tracking(&mut self, enabled: bool) {
        self.deletion_tracking = enabled;
    }

    pub fn deletion_tracking(&self) -> bool {
        self.deletion_tracking
    }

    /// Removes every incidence and calendar property.
    pub fn close(&mut self) {
        self.events.clear();
        self.todos.clear();
        self.journals.clear();
        self.deleted_events.clear();
        self.deleted_todos.clear();
        self.deleted_journals.clear();
        self.custom_properties.clear();
        debug!("Calendar closed");
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.todos.is_empty() && self.journals.is_empty()
    }

    // Custom properties

    /// Returns a calendar-level property; names are case-insensitive.
    pub fn custom_property(&self, name: &str) -> Option<&str> {
        self.custom_properties
            .get(&name.to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn set_custom_property(&mut self, name: &str, value: impl Into<String>) {
        self.custom_properties
            .insert(name.to_ascii_uppercase(), value.into());
    }

    pub fn custom_properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.custom_properties
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    // Adding

    /// Adds an event; returns `false` when its UID and recurrence-id are
    /// already taken.
    pub fn add_event(&mut self, event: Event) -> bool {
        let key = key_of(event.base());
        if self.events.contains_key(&key) {
            debug!(uid = %key.0, "Event already in calendar");
            return false;
        }
        trace!(uid = %key.0, "Adding event");
        self.events.insert(key, event);
        true
    }

    pub fn add_todo(&mut self, todo: Todo) -> bool {
        let key = key_of(todo.base());
        if self.todos.contains_key(&key) {
            debug!(uid = %key.0, "To-do already in calendar");
            return false;
        }
        self.todos.insert(key, todo);
        true
    }

    pub fn add_journal(&mut self, journal: Journal) -> bool {
        let key = key_of(journal.base());
        if self.journals.contains_key(&key) {
            debug!(uid = %key.0, "Journal already in calendar");
            return false;
        }
        self.journals.insert(key, journal);
        true
    }

    /// Adds an incidence of any kind.
    pub fn add_incidence(&mut self, incidence: AnyIncidence) -> bool {
        match incidence {
            AnyIncidence::Event(event) => self.add_event(event),
            AnyIncidence::Todo(todo) => self.add_todo(todo),
            AnyIncidence::Journal(journal) => self.add_journal(journal),
        }
    }

    // Deleting

    /// Deletes exactly the event with this UID and recurrence-id.
    pub fn delete_event(&mut self, uid: &str, recurrence_id: Option<&CalDateTime>) -> bool {
        let key = key_for(uid, recurrence_id);
        match self.events.remove(&key) {
            Some(event) => {
                if self.deletion_tracking {
                    self.deleted_events.insert(key, event);
                }
                true
            }
            None => {
                debug!(uid, "No such event to delete");
                false
            }
        }
    }

    pub fn delete_todo(&mut self, uid: &str, recurrence_id: Option<&CalDateTime>) -> bool {
        let key = key_for(uid, recurrence_id);
        match self.todos.remove(&key) {
            Some(todo) => {
                if self.deletion_tracking {
                    self.deleted_todos.insert(key, todo);
                }
                true
            }
            None => false,
        }
    }

    pub fn delete_journal(&mut self, uid: &str, recurrence_id: Option<&CalDateTime>) -> bool {
        let key = key_for(uid, recurrence_id);
        match self.journals.remove(&key) {
            Some(journal) => {
                if self.deletion_tracking {
                    self.deleted_journals.insert(key, journal);
                }
                true
            }
            None => false,
        }
    }

    /// Deletes every detached instance of `uid`, keeping the primary.
    ///
    /// Returns `true` when anything was removed.
    pub fn delete_event_instances(&mut self, uid: &str) -> bool {
        let removed = drain_instances(&mut self.events, uid);
        let any = !removed.is_empty();
        if self.deletion_tracking {
            self.deleted_events.extend(removed);
        }
        any
    }

    pub fn delete_todo_instances(&mut self, uid: &str) -> bool {
        let removed = drain_instances(&mut self.todos, uid);
        let any = !removed.is_empty();
        if self.deletion_tracking {
            self.deleted_todos.extend(removed);
        }
        any
    }

    pub fn delete_journal_instances(&mut self, uid: &str) -> bool {
        let removed = drain_instances(&mut self.journals, uid);
        let any = !removed.is_empty();
        if self.deletion_tracking {
            self.deleted_journals.extend(removed);
        }
        any
    }

    /// Deletes the incidence of `kind` with this UID and recurrence-id.
    pub fn delete_incidence(
        &mut self,
        kind: IncidenceKind,
        uid: &str,
        recurrence_id: Option<&CalDateTime>,
    ) -> bool {
        match kind {
            IncidenceKind::Event => self.delete_event(uid, recurrence_id),
            IncidenceKind::Todo => self.delete_todo(uid, recurrence_id),
            IncidenceKind::Journal => self.delete_journal(uid, recurrence_id),
        }
    }

    /// Deletes every detached instance of `uid` among incidences of `kind`.
    pub fn delete_incidence_instances(&mut self, kind: IncidenceKind, uid: &str) -> bool {
        match kind {
            IncidenceKind::Event => self.delete_event_instances(uid),
            IncidenceKind::Todo => self.delete_todo_instances(uid),
            IncidenceKind::Journal => self.delete_journal_instances(uid),
        }
    }

    // Lookup

    pub fn event(&self, uid: &str, recurrence_id: Option<&CalDateTime>) -> Option<&Event> {
        self.events.get(&key_for(uid, recurrence_id))
    }

    pub fn todo(&self, uid: &str, recurrence_id: Option<&CalDateTime>) -> Option<&Todo> {
        self.todos.get(&key_for(uid, recurrence_id))
    }

    pub fn journal(&self, uid: &str, recurrence_id: Option<&CalDateTime>) -> Option<&Journal> {
        self.journals.get(&key_for(uid, recurrence_id))
    }

    /// Returns the detached instances of `uid`, ordered by recurrence-id.
    pub fn event_instances(&self, uid: &str) -> Vec<&Event> {
        instances(&self.events, uid)
    }

    pub fn todo_instances(&self, uid: &str) -> Vec<&Todo> {
        instances(&self.todos, uid)
    }

    pub fn journal_instances(&self, uid: &str) -> Vec<&Journal> {
        instances(&self.journals, uid)
    }

    pub fn deleted_event(&self, uid: &str, recurrence_id: Option<&CalDateTime>) -> Option<&Event> {
        self.deleted_events.get(&key_for(uid, recurrence_id))
    }

    pub fn deleted_events(&self, sort: EventSortField, direction: SortDirection) -> Vec<&Event> {
        let mut events: Vec<_> = self.deleted_events.values().collect();
        sort_events(&mut events, sort, direction);
        events
    }

    pub fn deleted_todo(&self, uid: &str, recurrence_id: Option<&CalDateTime>) -> Option<&Todo> {
        self.deleted_todos.get(&key_for(uid, recurrence_id))
    }

    pub fn deleted_todos(&self, sort: TodoSortField, direction: SortDirection) -> Vec<&Todo> {
        let mut todos: Vec<_> = self.deleted_todos.values().collect();
        sort_todos(&mut todos, sort, direction);
        todos
    }

    pub fn deleted_journal(
        &self,
        uid: &str,
        recurrence_id: Option<&CalDateTime>,
    ) -> Option<&Journal> {
        self.deleted_journals.get(&key_for(uid, recurrence_id))
    }

    pub fn deleted_journals(
        &self,
        sort: JournalSortField,
        direction: SortDirection,
    ) -> Vec<&Journal> {
        let mut journals: Vec<_> = self.deleted_journals.values().collect();
        sort_journals(&mut journals, sort, direction);
        journals
    }

    /// Applies `update` to an event and files it under its new key.
    ///
    /// Returns `false`, leaving the calendar unchanged, when the event is
    /// missing or the update would collide with another event.
    pub fn update_event(
        &mut self,
        uid: &str,
        recurrence_id: Option<&CalDateTime>,
        update: impl FnOnce(&mut Event),
    ) -> bool {
        let old_key = key_for(uid, recurrence_id);
        let Some(current) = self.events.get(&old_key) else {
            return false;
        };
        let mut updated = current.clone();
        update(&mut updated);
        let new_key = key_of(updated.base());
        if new_key != old_key && self.events.contains_key(&new_key) {
            debug!(uid, "Updated event would replace another event");
            return false;
        }
        self.events.remove(&old_key);
        self.events.insert(new_key, updated);
        true
    }

    /// Returns every incidence, events first.
    pub fn incidences(&self) -> Vec<&dyn Incidence> {
        self.events
            .values()
            .map(|e| e as &dyn Incidence)
            .chain(self.todos.values().map(|t| t as &dyn Incidence))
            .chain(self.journals.values().map(|j| j as &dyn Incidence))
            .collect()
    }

    // Alarms

    /// Returns every alarm firing within `[from, to]`, earliest first.
    ///
    /// Recurring incidences contribute one firing per occurrence, up to the
    /// occurrence limit of [`crate::Recurrence::times_in_interval`].
    pub fn alarms(&self, from: &CalDateTime, to: &CalDateTime) -> Vec<AlarmTrigger<'_>> {
        let mut triggers = Vec::new();
        if from > to {
            return triggers;
        }
        for incidence in self.incidences() {
            for alarm in incidence.base().alarms() {
                collect_triggers(incidence, alarm, from, to, &mut triggers);
            }
        }
        triggers.sort_by_key(|trigger| trigger.time);
        debug!(count = triggers.len(), "Collected alarms");
        triggers
    }

    /// Returns every alarm firing up to and including `to`.
    pub fn alarms_to(&self, to: &CalDateTime) -> Vec<AlarmTrigger<'_>> {
        let earliest = NaiveDate::from_ymd_opt(1900, 1, 1)
            .and_then(|date| CalDateTime::from_date(date, Zone::Utc))
            .map(|dt| dt.with_date_only(false));
        match earliest {
            Some(from) => self.alarms(&from, to),
            None => Vec::new(),
        }
    }

    // Listings

    pub fn raw_events(&self, sort: EventSortField, direction: SortDirection) -> Vec<&Event> {
        let mut events: Vec<_> = self.events.values().collect();
        sort_events(&mut events, sort, direction);
        events
    }

    /// Returns events occurring within the dates `from..=to`, read in
    /// `zone` (the calendar's zone when `None`).
    ///
    /// With `inclusive`, only events (or whole recurrences) lying entirely
    /// within the range qualify; otherwise any overlap does.
    pub fn raw_events_in(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        zone: Option<Zone>,
        inclusive: bool,
    ) -> Vec<&Event> {
        let zone = zone.unwrap_or(self.zone);
        self.events
            .values()
            .filter(|event| self.event_in_range(event, from, to, zone, inclusive))
            .collect()
    }

    fn event_in_range(
        &self,
        event: &Event,
        from: NaiveDate,
        to: NaiveDate,
        zone: Zone,
        inclusive: bool,
    ) -> bool {
        let Some(start) = event.dt_start() else {
            return false;
        };
        let recurrence = event.recurrence();
        if !recurrence.recurs() {
            let (first, last) = covered_dates(event, start, zone);
            return dates_match(first, last, from, to, inclusive);
        }

        if inclusive {
            let Some(last_start) = recurrence.end_date_time() else {
                return false;
            };
            let (first, _) = covered_dates(event, start, zone);
            let (_, last) = covered_dates(event, last_start, zone);
            return dates_match(first, last, from, to, inclusive);
        }

        // Find the first occurrence that could still reach into the range
        let zone = if event.all_day() { start.zone() } else { zone };
        let Some(range_start) = CalDateTime::from_date(from, zone) else {
            return false;
        };
        let span = event
            .dt_end()
            .map_or(0, |end| start.secs_to(&end).max(0));
        let mut cursor = CalDateTime::from_instant(
            range_start.instant() - chrono::Duration::seconds(span + 1),
            zone,
        );
        for _ in 0..MAX_RANGE_STEPS {
            let Some(occurrence) = recurrence.next_date_time(&cursor) else {
                return false;
            };
            let (first, last) = covered_dates(event, occurrence, zone);
            if first > to {
                return false;
            }
            if dates_match(first, last, from, to, false) {
                return true;
            }
            cursor = occurrence;
        }
        debug!(uid = %event.uid(), "Gave up looking for an occurrence in range");
        false
    }

    /// Returns events occurring on `date`.
    pub fn raw_events_for_date(
        &self,
        date: NaiveDate,
        zone: Option<Zone>,
        sort: EventSortField,
        direction: SortDirection,
    ) -> Vec<&Event> {
        let mut events = self.raw_events_in(date, date, zone, false);
        sort_events(&mut events, sort, direction);
        events
    }

    pub fn raw_todos(&self, sort: TodoSortField, direction: SortDirection) -> Vec<&Todo> {
        let mut todos: Vec<_> = self.todos.values().collect();
        sort_todos(&mut todos, sort, direction);
        todos
    }

    /// Returns to-dos due (or, without a due time, starting) on `date`,
    /// and recurring to-dos with an occurrence that day.
    pub fn raw_todos_for_date(&self, date: NaiveDate) -> Vec<&Todo> {
        self.todos
            .values()
            .filter(|todo| {
                if todo.recurs() {
                    todo.recurrence().recurs_on(date, self.zone)
                } else {
                    todo.dt_due()
                        .or(todo.dt_start())
                        .is_some_and(|dt| dt.to_zone(self.zone).date() == date)
                }
            })
            .collect()
    }

    pub fn raw_journals(&self, sort: JournalSortField, direction: SortDirection) -> Vec<&Journal> {
        let mut journals: Vec<_> = self.journals.values().collect();
        sort_journals(&mut journals, sort, direction);
        journals
    }

    pub fn raw_journals_for_date(&self, date: NaiveDate) -> Vec<&Journal> {
        self.journals
            .values()
            .filter(|journal| {
                if journal.recurs() {
                    journal.recurrence().recurs_on(date, self.zone)
                } else {
                    journal
                        .dt_start()
                        .is_some_and(|dt| dt.to_zone(self.zone).date() == date)
                }
            })
            .collect()
    }
}

/// Adds the firings of `alarm` within `[from, to]` to `out`.
fn collect_triggers<'a>(
    incidence: &'a dyn Incidence,
    alarm: &'a Alarm,
    from: &CalDateTime,
    to: &CalDateTime,
    out: &mut Vec<AlarmTrigger<'a>>,
) {
    let anchor = match alarm.anchor() {
        AlarmAnchor::Start => incidence.date_time(DateTimeRole::AlarmStartOffset),
        AlarmAnchor::End => incidence.date_time(DateTimeRole::AlarmEndOffset),
    };
    let Some(anchor) = anchor else {
        return;
    };
    let offset = alarm.offset();
    let mut push = |anchor: CalDateTime| {
        let time = offset.end(&anchor);
        if &time >= from && &time <= to {
            out.push(AlarmTrigger {
                uid: incidence.uid(),
                kind: incidence.kind(),
                alarm,
                time,
            });
        }
    };

    let recurrence = incidence.recurrence();
    let Some(start) = incidence.dt_start().filter(|_| recurrence.recurs()) else {
        push(anchor);
        return;
    };
    // Occurrence starts whose alarm can land in the window
    let lead = start.secs_to(&anchor).saturating_add(offset.as_seconds());
    let window_from = from.add_secs(lead.saturating_neg());
    let window_to = to.add_secs(lead.saturating_neg());
    let anchor_shift = start.secs_to(&anchor);
    // Day offsets keep wall-clock time, so widen by a day and filter
    let slack = if offset.is_daily() { 86_400 } else { 0 };
    for occurrence in
        recurrence.times_in_interval(&window_from.add_secs(-slack), &window_to.add_secs(slack))
    {
        push(occurrence.add_secs(anchor_shift));
    }
}

fn drain_instances<T>(map: &mut BTreeMap<Key, T>, uid: &str) -> Vec<(Key, T)> {
    let keys: Vec<Key> = map
        .keys()
        .filter(|(key_uid, rid)| key_uid == uid && rid.is_some())
        .cloned()
        .collect();
    keys.into_iter()
        .filter_map(|key| map.remove(&key).map(|value| (key, value)))
        .collect()
}

fn instances<'a, T>(map: &'a BTreeMap<Key, T>, uid: &str) -> Vec<&'a T> {
    map.iter()
        .filter(|((key_uid, rid), _)| key_uid == uid && rid.is_some())
        .map(|(_, value)| value)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::Duration;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> CalDateTime {
        CalDateTime::from_utc(Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn meeting(uid: &str, start: CalDateTime, minutes: i64) -> Event {
        Event::new(uid)
            .with_summary(uid)
            .with_dt_start(start)
            .with_dt_end(start.add_secs(minutes * 60))
    }

    fn uids(events: &[&Event]) -> Vec<String> {
        events.iter().map(|e| e.uid().to_string()).collect()
    }

    mod membership {
        use super::*;

        #[test]
        fn duplicate_add_fails() {
            let mut cal = MemoryCalendar::default();
            assert!(cal.add_event(meeting("a", utc(2025, 1, 1, 9, 0, 0), 30)));
            assert!(!cal.add_event(meeting("a", utc(2025, 2, 1, 9, 0, 0), 30)));
            let all = cal.raw_events(EventSortField::Unsorted, SortDirection::Ascending);
            assert_eq!(all.len(), 1);
        }

        #[test]
        fn same_uid_different_kinds_coexist() {
            let mut cal = MemoryCalendar::default();
            assert!(cal.add_incidence(Event::new("x").into()));
            assert!(cal.add_incidence(Todo::new("x").into()));
            assert!(cal.add_incidence(Journal::new("x").into()));
            assert_eq!(cal.incidences().len(), 3);
        }

        #[test]
        fn instance_deletion_keeps_primary() {
            let mut cal = MemoryCalendar::default();
            let primary = meeting("r", utc(2025, 1, 1, 9, 0, 0), 30)
                .with_rrule("FREQ=DAILY".parse().unwrap());
            let detached = meeting("r", utc(2025, 1, 2, 11, 0, 0), 30)
                .with_recurrence_id(utc(2025, 1, 2, 9, 0, 0));
            assert!(cal.add_event(primary));
            assert!(cal.add_event(detached));
            assert_eq!(cal.event_instances("r").len(), 1);

            assert!(cal.delete_event_instances("r"));
            assert!(cal.event("r", None).is_some());
            assert!(cal.event_instances("r").is_empty());
            assert!(!cal.delete_event_instances("r"));
        }

        #[test]
        fn deleting_primary_keeps_instances() {
            let mut cal = MemoryCalendar::default();
            let rid = utc(2025, 1, 2, 9, 0, 0);
            cal.add_event(meeting("r", utc(2025, 1, 1, 9, 0, 0), 30));
            cal.add_event(meeting("r", rid, 30).with_recurrence_id(rid));
            assert!(cal.delete_event("r", None));
            assert!(!cal.delete_event("r", None));
            assert!(cal.event("r", Some(&rid)).is_some());
        }

        #[test]
        fn deletion_tracking_keeps_removed() {
            let mut cal = MemoryCalendar::default();
            cal.set_deletion_tracking(true);
            cal.add_event(meeting("a", utc(2025, 1, 1, 9, 0, 0), 30));
            cal.delete_event("a", None);
            assert!(cal.deleted_event("a", None).is_some());
            assert_eq!(
                cal.deleted_events(EventSortField::Unsorted, SortDirection::Ascending)
                    .len(),
                1
            );
        }

        #[test]
        fn delete_incidence_dispatches_on_kind() {
            let mut cal = MemoryCalendar::default();
            cal.add_event(Event::new("x"));
            cal.add_todo(Todo::new("x"));
            assert!(cal.delete_incidence(IncidenceKind::Todo, "x", None));
            assert!(cal.todo("x", None).is_none());
            assert!(cal.event("x", None).is_some());
            assert!(!cal.delete_incidence(IncidenceKind::Journal, "x", None));
        }

        #[test]
        fn delete_incidence_instances_dispatches_on_kind() {
            let mut cal = MemoryCalendar::default();
            let rid = utc(2025, 1, 2, 9, 0, 0);
            cal.add_todo(Todo::new("t"));
            cal.add_todo(Todo::new("t").with_recurrence_id(rid));
            cal.add_event(meeting("t", rid, 30).with_recurrence_id(rid));

            assert!(cal.delete_incidence_instances(IncidenceKind::Todo, "t"));
            assert!(cal.todo_instances("t").is_empty());
            assert!(cal.todo("t", None).is_some());
            assert_eq!(cal.event_instances("t").len(), 1);
            assert!(!cal.delete_incidence_instances(IncidenceKind::Journal, "t"));
        }

        #[test]
        fn deleted_todos_and_journals_are_listed() {
            let mut cal = MemoryCalendar::default();
            cal.set_deletion_tracking(true);
            cal.add_todo(Todo::new("b").with_summary("b"));
            cal.add_todo(Todo::new("a").with_summary("a"));
            cal.add_journal(Journal::new("j"));
            cal.delete_todo("a", None);
            cal.delete_todo("b", None);
            cal.delete_journal("j", None);

            let todos = cal.deleted_todos(TodoSortField::Summary, SortDirection::Descending);
            let uids: Vec<_> = todos.iter().map(|t| t.uid()).collect();
            assert_eq!(uids, ["b", "a"]);
            assert_eq!(
                cal.deleted_journals(JournalSortField::Unsorted, SortDirection::Ascending)
                    .len(),
                1
            );
        }

        #[test]
        fn close_is_idempotent() {
            let mut cal = MemoryCalendar::default();
            cal.add_event(meeting("a", utc(2025, 1, 1, 9, 0, 0), 30));
            cal.add_todo(Todo::new("t"));
            cal.set_custom_property("X-TEST", "1");
            cal.close();
            assert!(cal.is_empty());
            assert_eq!(cal.custom_property("X-TEST"), None);
            cal.close();
            assert!(cal.is_empty());
        }

        #[test]
        fn custom_properties_ignore_case() {
            let mut cal = MemoryCalendar::default();
            cal.set_custom_property("X-LibKCal-Testsuite-OutTZ", "Europe/Berlin");
            assert_eq!(
                cal.custom_property("X-LIBKCAL-TESTSUITE-OUTTZ"),
                Some("Europe/Berlin")
            );
        }
    }

    mod alarms {
        use super::*;
        use crate::incidence::Alarm;

        fn with_alarm(mut event: Event, alarm: Alarm) -> Event {
            event.base_mut().add_alarm(alarm);
            event
        }

        #[test]
        fn single_event_alarm_in_window() {
            let mut cal = MemoryCalendar::default();
            let reminder = Alarm::start_offset(Duration::from_seconds(-900));
            cal.add_event(with_alarm(meeting("a", utc(2025, 1, 1, 9, 0, 0), 30), reminder));

            let found = cal.alarms(&utc(2025, 1, 1, 8, 0, 0), &utc(2025, 1, 1, 9, 0, 0));
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].uid, "a");
            assert_eq!(found[0].kind, IncidenceKind::Event);
            assert_eq!(found[0].time, utc(2025, 1, 1, 8, 45, 0));

            assert!(cal
                .alarms(&utc(2025, 1, 1, 8, 46, 0), &utc(2025, 1, 1, 12, 0, 0))
                .is_empty());
        }

        #[test]
        fn end_anchored_alarm() {
            let mut cal = MemoryCalendar::default();
            let wrap_up = Alarm::end_offset(Duration::from_seconds(-300));
            cal.add_event(with_alarm(meeting("a", utc(2025, 1, 1, 9, 0, 0), 60), wrap_up));
            let found = cal.alarms(&utc(2025, 1, 1, 0, 0, 0), &utc(2025, 1, 2, 0, 0, 0));
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].time, utc(2025, 1, 1, 9, 55, 0));
        }

        #[test]
        fn recurring_alarms_fire_per_occurrence() {
            let mut cal = MemoryCalendar::default();
            let reminder = Alarm::start_offset(Duration::from_seconds(-600));
            cal.add_event(with_alarm(
                meeting("daily", utc(2025, 1, 1, 9, 0, 0), 30)
                    .with_rrule("FREQ=DAILY;COUNT=10".parse().unwrap()),
                reminder,
            ));
            cal.add_todo(Todo::new("t").with_dt_due(utc(2025, 1, 3, 12, 0, 0)));

            let found = cal.alarms(&utc(2025, 1, 3, 0, 0, 0), &utc(2025, 1, 5, 8, 50, 0));
            let times: Vec<_> = found.iter().map(|t| t.time).collect();
            assert_eq!(
                times,
                vec![
                    utc(2025, 1, 3, 8, 50, 0),
                    utc(2025, 1, 4, 8, 50, 0),
                    utc(2025, 1, 5, 8, 50, 0),
                ]
            );
        }

        #[test]
        fn alarms_to_includes_everything_before() {
            let mut cal = MemoryCalendar::default();
            let reminder = Alarm::start_offset(Duration::ZERO);
            cal.add_event(with_alarm(meeting("old", utc(1999, 1, 1, 9, 0, 0), 30), reminder));
            cal.add_event(with_alarm(meeting("new", utc(2030, 1, 1, 9, 0, 0), 30), reminder));
            let found = cal.alarms_to(&utc(2025, 1, 1, 0, 0, 0));
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].uid, "old");
        }

        #[test]
        fn reversed_window_is_empty() {
            let mut cal = MemoryCalendar::default();
            let reminder = Alarm::start_offset(Duration::ZERO);
            cal.add_event(with_alarm(meeting("a", utc(2025, 1, 1, 9, 0, 0), 30), reminder));
            assert!(cal
                .alarms(&utc(2025, 1, 2, 0, 0, 0), &utc(2025, 1, 1, 0, 0, 0))
                .is_empty());
        }
    }

    mod updates {
        use super::*;

        #[test]
        fn update_rekeys() {
            let mut cal = MemoryCalendar::default();
            cal.add_event(meeting("a", utc(2025, 1, 1, 9, 0, 0), 30));
            assert!(cal.update_event("a", None, |e| e.base_mut().set_uid("b")));
            assert!(cal.event("a", None).is_none());
            assert!(cal.event("b", None).is_some());
        }

        #[test]
        fn update_refuses_collision() {
            let mut cal = MemoryCalendar::default();
            cal.add_event(meeting("a", utc(2025, 1, 1, 9, 0, 0), 30));
            cal.add_event(meeting("b", utc(2025, 1, 1, 9, 0, 0), 30));
            assert!(!cal.update_event("a", None, |e| e.base_mut().set_uid("b")));
            assert!(cal.event("a", None).is_some());
            assert!(!cal.update_event("missing", None, |_| {}));
        }
    }

    mod listings {
        use super::*;

        fn sample() -> MemoryCalendar {
            let mut cal = MemoryCalendar::default();
            cal.add_event(meeting("b-late", utc(2025, 1, 3, 15, 0, 0), 60));
            cal.add_event(meeting("a-early", utc(2025, 1, 1, 9, 0, 0), 30));
            cal.add_event(meeting("c-long", utc(2025, 1, 1, 8, 0, 0), 60 * 50));
            cal
        }

        #[test]
        fn sorted_by_start() {
            let cal = sample();
            let events = cal.raw_events(EventSortField::StartDate, SortDirection::Ascending);
            assert_eq!(uids(&events), vec!["c-long", "a-early", "b-late"]);
            let events = cal.raw_events(EventSortField::EndDate, SortDirection::Descending);
            assert_eq!(uids(&events), vec!["b-late", "c-long", "a-early"]);
        }

        #[test]
        fn range_overlap_and_containment() {
            let cal = sample();
            let overlapping = cal.raw_events_in(date(2025, 1, 2), date(2025, 1, 3), None, false);
            assert_eq!(uids(&overlapping), vec!["b-late", "c-long"]);
            let contained = cal.raw_events_in(date(2025, 1, 2), date(2025, 1, 3), None, true);
            assert_eq!(uids(&contained), vec!["b-late"]);
        }

        #[test]
        fn event_ending_at_midnight_stays_on_its_day() {
            let mut cal = MemoryCalendar::default();
            cal.add_event(meeting("evening", utc(2025, 1, 1, 22, 0, 0), 120));
            assert_eq!(
                cal.raw_events_for_date(
                    date(2025, 1, 2),
                    None,
                    EventSortField::Unsorted,
                    SortDirection::Ascending
                )
                .len(),
                0
            );
        }

        #[test]
        fn zone_shifts_dates() {
            let mut cal = MemoryCalendar::default();
            cal.add_event(meeting("late", utc(2025, 1, 1, 23, 0, 0), 30));
            let tokyo = Zone::Named(chrono_tz::Asia::Tokyo);
            let day = date(2025, 1, 2);
            assert_eq!(cal.raw_events_in(day, day, Some(tokyo), false).len(), 1);
            assert!(cal.raw_events_in(day, day, None, false).is_empty());
        }

        #[test]
        fn recurring_events_match_occurrences() {
            let mut cal = MemoryCalendar::default();
            cal.add_event(
                meeting("weekly", utc(2025, 1, 6, 9, 0, 0), 60)
                    .with_rrule("FREQ=WEEKLY;COUNT=4".parse().unwrap()),
            );
            // Occurrences: Jan 6, 13, 20, 27
            let count = |from, to, inclusive| cal.raw_events_in(from, to, None, inclusive).len();
            assert_eq!(count(date(2025, 1, 13), date(2025, 1, 13), false), 1);
            assert_eq!(count(date(2025, 1, 14), date(2025, 1, 19), false), 0);
            assert_eq!(count(date(2025, 2, 1), date(2025, 2, 28), false), 0);
            assert_eq!(count(date(2025, 1, 1), date(2025, 1, 31), true), 1);
            assert_eq!(count(date(2025, 1, 1), date(2025, 1, 20), true), 0);
        }

        #[test]
        fn occurrence_ending_at_range_start_does_not_hide_later_ones() {
            let mut cal = MemoryCalendar::default();
            cal.add_event(
                meeting("late", utc(2025, 1, 1, 23, 0, 0), 60)
                    .with_rrule("FREQ=DAILY".parse().unwrap()),
            );
            let day = date(2025, 1, 5);
            assert_eq!(cal.raw_events_in(day, day, None, false).len(), 1);
        }

        #[test]
        fn all_day_events_use_their_dates() {
            let mut cal = MemoryCalendar::default();
            let start = CalDateTime::from_date(date(2025, 1, 10), Zone::Utc).unwrap();
            cal.add_event(
                Event::new("holiday")
                    .with_all_day(true)
                    .with_dt_start(start)
                    .with_duration(Duration::from_days(3)),
            );
            let on = |day| cal.raw_events_in(day, day, None, false).len();
            assert_eq!(on(date(2025, 1, 12)), 1);
            assert_eq!(on(date(2025, 1, 13)), 0);
        }

        #[test]
        fn todos_and_journals_by_date() {
            let mut cal = MemoryCalendar::default();
            cal.add_todo(Todo::new("t").with_dt_due(utc(2025, 1, 5, 17, 0, 0)));
            cal.add_journal(Journal::new("j").with_dt_start(utc(2025, 1, 5, 20, 0, 0)));
            assert_eq!(cal.raw_todos_for_date(date(2025, 1, 5)).len(), 1);
            assert!(cal.raw_todos_for_date(date(2025, 1, 6)).is_empty());
            assert_eq!(cal.raw_journals_for_date(date(2025, 1, 5)).len(), 1);
        }
    }
}
