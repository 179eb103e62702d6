//! Calendar storage backends.
//!
//! - [`CalendarStorage`] - load a [`MemoryCalendar`](pimcal_core::MemoryCalendar)
//!   from, and save it to, some backing store
//! - [`FileStorage`] - a single RFC 5545 file
//! - [`StorageError`] - what can go wrong doing so

pub mod error;
pub mod file;
pub mod ics;

pub use error::{StorageError, StorageErrorCode, StorageResult};
pub use file::{CalendarStorage, FileStorage};
pub use ics::{parse_calendar, write_calendar};
