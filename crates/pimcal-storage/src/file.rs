//! The [`CalendarStorage`] trait and the iCalendar file backend.

use std::fs;
use std::path::{Path, PathBuf};

use pimcal_core::MemoryCalendar;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::ics;

/// A place calendars are loaded from and saved to.
pub trait CalendarStorage {
    /// Adds the stored incidences to `calendar`.
    fn load(&self, calendar: &mut MemoryCalendar) -> StorageResult<()>;

    /// Replaces the stored content with `calendar`.
    fn save(&self, calendar: &MemoryCalendar) -> StorageResult<()>;
}

/// A calendar kept in a single iCalendar file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CalendarStorage for FileStorage {
    fn load(&self, calendar: &mut MemoryCalendar) -> StorageResult<()> {
        debug!(path = %self.path.display(), "Loading calendar");
        let text =
            fs::read_to_string(&self.path).map_err(|e| StorageError::from_io(e, &self.path))?;
        let added =
            ics::parse_calendar(&text, calendar).map_err(|e| e.with_path(self.path.clone()))?;
        info!(path = %self.path.display(), added, "Loaded calendar");
        Ok(())
    }

    fn save(&self, calendar: &MemoryCalendar) -> StorageResult<()> {
        let text = ics::write_calendar(calendar);
        fs::write(&self.path, text).map_err(|e| StorageError::from_io(e, &self.path))?;
        info!(path = %self.path.display(), "Saved calendar");
        Ok(())
    }
}
