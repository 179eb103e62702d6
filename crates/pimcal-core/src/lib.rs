//! Core types: time, durations, recurrence, incidences, in-memory calendar

pub mod calendar;
pub mod duration;
pub mod error;
pub mod event;
pub mod incidence;
pub mod journal;
pub mod recurrence;
pub mod time;
pub mod todo;
pub mod tracing;
pub mod walk;

pub use calendar::{
    AlarmTrigger, EventSortField, JournalSortField, MemoryCalendar, SortDirection, TodoSortField,
};
pub use duration::{Duration, DurationKind};
pub use error::{ParseError, ParseResult};
pub use event::{Event, Transparency};
pub use incidence::{
    Alarm, AlarmAnchor, AnyIncidence, DateTimeRole, Field, Incidence, IncidenceBase, IncidenceKind,
};
pub use journal::Journal;
pub use recurrence::{Frequency, Recurrence, RecurrenceRule, WeekdayNum};
pub use time::{CalDateTime, Zone, dump_time};
pub use todo::Todo;
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
pub use walk::{PreviousOccurrences, WalkPolicy};
