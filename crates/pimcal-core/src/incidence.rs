//! State shared by every incidence kind.
//!
//! [`IncidenceBase`] holds the identity, descriptive text, start time,
//! duration, alarms and [`Recurrence`] of an incidence, together with the
//! change-tracking set of dirty fields. The [`Incidence`] trait gives
//! events, to-dos and journal entries a common face, and [`AnyIncidence`]
//! lets a calendar hand out mixed lists of them.
//!
//! Every setter is a silent no-op while the incidence is read-only.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::duration::Duration;
use crate::event::Event;
use crate::journal::Journal;
use crate::recurrence::{Recurrence, RecurrenceRule};
use crate::time::{CalDateTime, Zone};
use crate::todo::Todo;

/// A field whose change is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Uid,
    RecurrenceId,
    Summary,
    Description,
    Location,
    Categories,
    DtStart,
    DtEnd,
    Duration,
    AllDay,
    Transparency,
    Recurrence,
    Alarms,
    Due,
    Completed,
    PercentComplete,
}

/// The kind of an incidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidenceKind {
    Event,
    Todo,
    Journal,
}

impl IncidenceKind {
    /// Returns the iCalendar component name.
    pub fn component_name(&self) -> &'static str {
        match self {
            Self::Event => "VEVENT",
            Self::Todo => "VTODO",
            Self::Journal => "VJOURNAL",
        }
    }
}

impl fmt::Display for IncidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Event => "event",
            Self::Todo => "todo",
            Self::Journal => "journal",
        };
        f.write_str(name)
    }
}

/// The semantic role a timestamp is requested for.
///
/// Each incidence kind maps every role to one of its timestamps, or to
/// `None` when the role has no meaning for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTimeRole {
    /// Anchor of the recurrence.
    RecurrenceStart,
    /// Base for alarms with a start offset.
    AlarmStartOffset,
    /// Base for alarms with an end offset.
    AlarmEndOffset,
    /// Sort key.
    Sort,
    /// Date under which a calendar files the incidence.
    CalendarHashing,
    /// Timestamp whose zone is the start zone.
    StartTimeZone,
    /// Timestamp whose zone is the end zone.
    EndTimeZone,
    /// Base for computing the end of a recurring instance.
    EndRecurrenceBase,
    /// The end.
    End,
    /// Start shown to the user.
    DisplayStart,
    /// End shown to the user.
    DisplayEnd,
    /// Anchor of the first alarm.
    Alarm,
    /// Drag and drop: moving keeps the span.
    Dnd,
}

/// Which end of an incidence an alarm offset is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmAnchor {
    Start,
    End,
}

/// A reminder at a fixed offset from the start or end of its incidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alarm {
    anchor: AlarmAnchor,
    offset: Duration,
}

impl Alarm {
    /// Creates an alarm `offset` from the start (negative is before).
    pub fn start_offset(offset: Duration) -> Self {
        Self {
            anchor: AlarmAnchor::Start,
            offset,
        }
    }

    /// Creates an alarm `offset` from the end.
    pub fn end_offset(offset: Duration) -> Self {
        Self {
            anchor: AlarmAnchor::End,
            offset,
        }
    }

    pub fn anchor(&self) -> AlarmAnchor {
        self.anchor
    }

    pub fn offset(&self) -> Duration {
        self.offset
    }

    pub fn has_start_offset(&self) -> bool {
        self.anchor == AlarmAnchor::Start
    }
}

/// Identity, text, timing and recurrence shared by all incidences.
#[derive(Debug, Clone, Default)]
pub struct IncidenceBase {
    uid: String,
    recurrence_id: Option<CalDateTime>,
    summary: String,
    description: String,
    location: String,
    categories: Vec<String>,
    dt_start: Option<CalDateTime>,
    all_day: bool,
    duration: Duration,
    has_duration: bool,
    read_only: bool,
    alarms: Vec<Alarm>,
    recurrence: Recurrence,
    dirty: BTreeSet<Field>,
}

impl IncidenceBase {
    /// Creates an empty incidence with the given UID.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            ..Self::default()
        }
    }

    pub(crate) fn mark_field(&mut self, field: Field) {
        trace!(uid = %self.uid, ?field, "Field changed");
        self.dirty.insert(field);
    }

    // Identity

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn set_uid(&mut self, uid: impl Into<String>) {
        if self.read_only {
            return;
        }
        self.uid = uid.into();
        self.mark_field(Field::Uid);
    }

    /// Returns the recurrence-id of a detached instance.
    pub fn recurrence_id(&self) -> Option<&CalDateTime> {
        self.recurrence_id.as_ref()
    }

    pub fn set_recurrence_id(&mut self, recurrence_id: Option<CalDateTime>) {
        if self.read_only {
            return;
        }
        self.recurrence_id = recurrence_id;
        self.mark_field(Field::RecurrenceId);
    }

    // Text

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        if self.read_only {
            return;
        }
        self.summary = summary.into();
        self.mark_field(Field::Summary);
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        if self.read_only {
            return;
        }
        self.description = description.into();
        self.mark_field(Field::Description);
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        if self.read_only {
            return;
        }
        self.location = location.into();
        self.mark_field(Field::Location);
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn set_categories(&mut self, categories: Vec<String>) {
        if self.read_only {
            return;
        }
        self.categories = categories;
        self.mark_field(Field::Categories);
    }

    // Timing

    pub fn dt_start(&self) -> Option<CalDateTime> {
        self.dt_start
    }

    /// Sets the start and moves the recurrence anchor with it.
    pub fn set_dt_start(&mut self, dt: Option<CalDateTime>) {
        if self.read_only {
            return;
        }
        self.dt_start = dt;
        self.recurrence.set_start(dt);
        self.mark_field(Field::DtStart);
    }

    pub fn all_day(&self) -> bool {
        self.all_day
    }

    pub fn set_all_day(&mut self, all_day: bool) {
        if self.read_only || self.all_day == all_day {
            return;
        }
        self.all_day = all_day;
        self.recurrence.set_all_day(all_day);
        self.mark_field(Field::AllDay);
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Sets the duration and makes it authoritative for the end.
    pub fn set_duration(&mut self, duration: Duration) {
        if self.read_only {
            return;
        }
        self.duration = duration;
        self.has_duration = true;
        self.mark_field(Field::Duration);
    }

    pub fn has_duration(&self) -> bool {
        self.has_duration
    }

    pub fn set_has_duration(&mut self, has_duration: bool) {
        if self.read_only {
            return;
        }
        self.has_duration = has_duration;
        self.mark_field(Field::Duration);
    }

    // State

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Sets the read-only flag; always applies.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn add_alarm(&mut self, alarm: Alarm) {
        if self.read_only {
            return;
        }
        self.alarms.push(alarm);
        self.mark_field(Field::Alarms);
    }

    pub fn clear_alarms(&mut self) {
        if self.read_only {
            return;
        }
        self.alarms.clear();
        self.mark_field(Field::Alarms);
    }

    /// Returns the fields changed since the last [`Self::reset_dirty_fields`].
    pub fn dirty_fields(&self) -> &BTreeSet<Field> {
        &self.dirty
    }

    pub fn is_field_dirty(&self, field: Field) -> bool {
        self.dirty.contains(&field)
    }

    pub fn reset_dirty_fields(&mut self) {
        self.dirty.clear();
    }

    // Recurrence

    pub fn recurrence(&self) -> &Recurrence {
        &self.recurrence
    }

    pub fn recurs(&self) -> bool {
        self.recurrence.recurs()
    }

    pub fn add_rrule(&mut self, rule: RecurrenceRule) {
        if self.read_only {
            return;
        }
        self.recurrence.add_rrule(rule);
        self.mark_field(Field::Recurrence);
    }

    pub fn add_exrule(&mut self, rule: RecurrenceRule) {
        if self.read_only {
            return;
        }
        self.recurrence.add_exrule(rule);
        self.mark_field(Field::Recurrence);
    }

    pub fn add_rdate(&mut self, dt: CalDateTime) {
        if self.read_only {
            return;
        }
        self.recurrence.add_rdate(dt);
        self.mark_field(Field::Recurrence);
    }

    pub fn add_exdate(&mut self, dt: CalDateTime) {
        if self.read_only {
            return;
        }
        self.recurrence.add_exdate(dt);
        self.mark_field(Field::Recurrence);
    }

    /// Removes every rule and date from the recurrence.
    pub fn clear_recurrence(&mut self) {
        if self.read_only {
            return;
        }
        self.recurrence.clear();
        self.mark_field(Field::Recurrence);
    }

    /// Keeps wall-clock times while moving them from `old` to `new`.
    pub fn shift_times(&mut self, old: Zone, new: Zone) {
        if self.read_only {
            return;
        }
        self.dt_start = self.dt_start.map(|dt| dt.shift_zone(old, new));
        self.recurrence_id = self.recurrence_id.map(|dt| dt.shift_zone(old, new));
        self.recurrence.shift_times(old, new);
        self.mark_field(Field::DtStart);
    }
}

impl PartialEq for IncidenceBase {
    /// Compares content; the read-only flag and dirty fields are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
            && self.recurrence_id == other.recurrence_id
            && self.summary == other.summary
            && self.description == other.description
            && self.location == other.location
            && self.categories == other.categories
            && self.dt_start == other.dt_start
            && self.all_day == other.all_day
            && self.has_duration == other.has_duration
            && (!self.has_duration || self.duration == other.duration)
            && self.alarms == other.alarms
            && self.recurrence == other.recurrence
    }
}

/// Common behaviour of events, to-dos and journal entries.
pub trait Incidence {
    fn base(&self) -> &IncidenceBase;

    fn base_mut(&mut self) -> &mut IncidenceBase;

    fn kind(&self) -> IncidenceKind;

    /// Returns the timestamp serving `role`, or `None` when the role does
    /// not apply.
    fn date_time(&self, role: DateTimeRole) -> Option<CalDateTime>;

    /// Sets the timestamp serving `role`; unsupported roles are ignored.
    fn set_date_time(&mut self, dt: CalDateTime, role: DateTimeRole);

    fn uid(&self) -> &str {
        self.base().uid()
    }

    fn recurrence_id(&self) -> Option<&CalDateTime> {
        self.base().recurrence_id()
    }

    fn summary(&self) -> &str {
        self.base().summary()
    }

    fn dt_start(&self) -> Option<CalDateTime> {
        self.base().dt_start()
    }

    fn all_day(&self) -> bool {
        self.base().all_day()
    }

    fn recurrence(&self) -> &Recurrence {
        self.base().recurrence()
    }

    fn recurs(&self) -> bool {
        self.base().recurs()
    }
}

/// An incidence of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyIncidence {
    Event(Event),
    Todo(Todo),
    Journal(Journal),
}

impl AnyIncidence {
    pub fn as_event(&self) -> Option<&Event> {
        match self {
            Self::Event(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_todo(&self) -> Option<&Todo> {
        match self {
            Self::Todo(todo) => Some(todo),
            _ => None,
        }
    }

    pub fn as_journal(&self) -> Option<&Journal> {
        match self {
            Self::Journal(journal) => Some(journal),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn Incidence {
        match self {
            Self::Event(event) => event,
            Self::Todo(todo) => todo,
            Self::Journal(journal) => journal,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Incidence {
        match self {
            Self::Event(event) => event,
            Self::Todo(todo) => todo,
            Self::Journal(journal) => journal,
        }
    }
}

impl Incidence for AnyIncidence {
    fn base(&self) -> &IncidenceBase {
        self.inner().base()
    }

    fn base_mut(&mut self) -> &mut IncidenceBase {
        self.inner_mut().base_mut()
    }

    fn kind(&self) -> IncidenceKind {
        self.inner().kind()
    }

    fn date_time(&self, role: DateTimeRole) -> Option<CalDateTime> {
        self.inner().date_time(role)
    }

    fn set_date_time(&mut self, dt: CalDateTime, role: DateTimeRole) {
        self.inner_mut().set_date_time(dt, role);
    }
}

impl From<Event> for AnyIncidence {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

impl From<Todo> for AnyIncidence {
    fn from(todo: Todo) -> Self {
        Self::Todo(todo)
    }
}

impl From<Journal> for AnyIncidence {
    fn from(journal: Journal) -> Self {
        Self::Journal(journal)
    }
}
