//! To-do items.

use chrono::NaiveDate;
use tracing::debug;

use crate::incidence::{DateTimeRole, Field, Incidence, IncidenceBase, IncidenceKind};
use crate::time::CalDateTime;

/// A to-do: an incidence with an optional due time and completion state.
#[derive(Debug, Clone, PartialEq)]
pub struct Todo {
    base: IncidenceBase,
    dt_due: Option<CalDateTime>,
    completed: Option<CalDateTime>,
    percent_complete: u8,
}

impl Todo {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            base: IncidenceBase::new(uid),
            dt_due: None,
            completed: None,
            percent_complete: 0,
        }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.base.set_summary(summary);
        self
    }

    /// Builder: make this a detached instance of a recurring to-do.
    #[must_use]
    pub fn with_recurrence_id(mut self, recurrence_id: CalDateTime) -> Self {
        self.base.set_recurrence_id(Some(recurrence_id));
        self
    }

    /// Builder: set the due time.
    #[must_use]
    pub fn with_dt_due(mut self, due: CalDateTime) -> Self {
        self.set_dt_due(Some(due));
        self
    }

    pub fn dt_due(&self) -> Option<CalDateTime> {
        self.dt_due
    }

    pub fn has_due_date(&self) -> bool {
        self.dt_due.is_some()
    }

    pub fn set_dt_due(&mut self, due: Option<CalDateTime>) {
        if self.base.is_read_only() {
            return;
        }
        self.dt_due = due;
        self.base.mark_field(Field::Due);
    }

    /// Returns the date the to-do is filed under: its due date, or its
    /// start date when it has no due time.
    pub fn date(&self) -> Option<NaiveDate> {
        self.dt_due.or(self.base.dt_start()).map(|dt| dt.date())
    }

    pub fn completed(&self) -> Option<CalDateTime> {
        self.completed
    }

    pub fn is_completed(&self) -> bool {
        self.completed.is_some() || self.percent_complete == 100
    }

    /// Marks the to-do completed at `when`, or reopens it with `None`.
    pub fn set_completed(&mut self, when: Option<CalDateTime>) {
        if self.base.is_read_only() {
            return;
        }
        self.completed = when;
        self.percent_complete = if when.is_some() { 100 } else { 0 };
        self.base.mark_field(Field::Completed);
        self.base.mark_field(Field::PercentComplete);
    }

    pub fn percent_complete(&self) -> u8 {
        self.percent_complete
    }

    /// Sets progress, capped at 100.
    pub fn set_percent_complete(&mut self, percent: u8) {
        if self.base.is_read_only() {
            return;
        }
        self.percent_complete = percent.min(100);
        self.base.mark_field(Field::PercentComplete);
    }

    fn start_or_due(&self) -> Option<CalDateTime> {
        self.base.dt_start().or(self.dt_due)
    }
}

impl Incidence for Todo {
    fn base(&self) -> &IncidenceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut IncidenceBase {
        &mut self.base
    }

    fn kind(&self) -> IncidenceKind {
        IncidenceKind::Todo
    }

    fn date_time(&self, role: DateTimeRole) -> Option<CalDateTime> {
        match role {
            DateTimeRole::RecurrenceStart
            | DateTimeRole::AlarmStartOffset
            | DateTimeRole::StartTimeZone
            | DateTimeRole::DisplayStart => self.start_or_due(),
            DateTimeRole::Sort => self.dt_due.or(self.base.dt_start()),
            DateTimeRole::CalendarHashing => {
                if self.base.recurs() {
                    None
                } else {
                    self.dt_due
                }
            }
            DateTimeRole::AlarmEndOffset
            | DateTimeRole::EndTimeZone
            | DateTimeRole::EndRecurrenceBase
            | DateTimeRole::End
            | DateTimeRole::DisplayEnd => self.dt_due.or(self.base.dt_start()),
            DateTimeRole::Alarm => {
                let alarm = self.base.alarms().first()?;
                if alarm.has_start_offset() {
                    self.base.dt_start()
                } else {
                    self.dt_due
                }
            }
            DateTimeRole::Dnd => None,
        }
    }

    fn set_date_time(&mut self, dt: CalDateTime, role: DateTimeRole) {
        match role {
            DateTimeRole::Dnd => {
                // Move the start along with the due time
                if let (Some(start), Some(due)) = (self.base.dt_start(), self.dt_due) {
                    let shift = due.secs_to(&dt);
                    self.base.set_dt_start(Some(start.add_secs(shift)));
                }
                self.set_dt_due(Some(dt));
            }
            DateTimeRole::End => self.set_dt_due(Some(dt)),
            other => debug!(uid = %self.base.uid(), role = ?other, "Unhandled role"),
        }
    }
}
