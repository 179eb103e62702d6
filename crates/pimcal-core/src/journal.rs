//! Journal entries: dated notes without an end.

use tracing::debug;

use crate::incidence::{DateTimeRole, Incidence, IncidenceBase, IncidenceKind};
use crate::time::CalDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct Journal {
    base: IncidenceBase,
}

impl Journal {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            base: IncidenceBase::new(uid),
        }
    }

    /// Builder: set the entry's date.
    #[must_use]
    pub fn with_dt_start(mut self, dt: CalDateTime) -> Self {
        self.base.set_dt_start(Some(dt));
        self
    }
}

impl Incidence for Journal {
    fn base(&self) -> &IncidenceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut IncidenceBase {
        &mut self.base
    }

    fn kind(&self) -> IncidenceKind {
        IncidenceKind::Journal
    }

    fn date_time(&self, role: DateTimeRole) -> Option<CalDateTime> {
        match role {
            DateTimeRole::Alarm => {
                self.base.alarms().first()?;
                self.base.dt_start()
            }
            DateTimeRole::Dnd => None,
            _ => self.base.dt_start(),
        }
    }

    fn set_date_time(&mut self, dt: CalDateTime, role: DateTimeRole) {
        match role {
            DateTimeRole::Dnd => self.base.set_dt_start(Some(dt)),
            other => debug!(uid = %self.base.uid(), role = ?other, "Unhandled role"),
        }
    }
}
