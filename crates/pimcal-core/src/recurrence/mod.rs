//! Recurrence of an incidence.
//!
//! A [`Recurrence`] combines recurrence rules, exception rules, explicit
//! extra dates and excluded dates, all anchored at the start of the owning
//! incidence. The start is always the first occurrence unless it is
//! excluded.
//!
//! All searches are bounded: rule expansion gives up after a long run of
//! empty periods, and excluded occurrences are skipped at most
//! [`MAX_EXCLUDED_SKIPS`] times per query.

mod expand;
mod rule;

use std::cell::OnceCell;

use chrono::NaiveDate;
use tracing::debug;

pub use rule::{Frequency, RecurrenceRule, WeekdayNum, weekday_code};

use crate::time::{CalDateTime, Zone};
use expand::Expander;

/// Consecutive excluded occurrences skipped before a search gives up.
pub const MAX_EXCLUDED_SKIPS: usize = 1000;

/// Upper bound on the number of occurrences [`Recurrence::times_in_interval`]
/// returns.
pub const MAX_INTERVAL_TIMES: usize = 10_000;

fn one_second() -> chrono::Duration {
    chrono::Duration::seconds(1)
}

fn later(best: Option<CalDateTime>, candidate: CalDateTime) -> Option<CalDateTime> {
    match best {
        Some(current) if current.instant() >= candidate.instant() => Some(current),
        _ => Some(candidate),
    }
}

fn earlier(best: Option<CalDateTime>, candidate: CalDateTime) -> Option<CalDateTime> {
    match best {
        Some(current) if current.instant() <= candidate.instant() => Some(current),
        _ => Some(candidate),
    }
}

/// Last occurrences of the `COUNT` rules, index-aligned with the rule lists.
#[derive(Debug, Clone, Default)]
struct CountEnds {
    rrules: Vec<Option<CalDateTime>>,
    exrules: Vec<Option<CalDateTime>>,
}

/// The recurrence set of one incidence.
#[derive(Debug, Clone, Default)]
pub struct Recurrence {
    start: Option<CalDateTime>,
    all_day: bool,
    rrules: Vec<RecurrenceRule>,
    exrules: Vec<RecurrenceRule>,
    rdates: Vec<CalDateTime>,
    exdates: Vec<CalDateTime>,
    /// Filled on first use; cleared by every mutation.
    count_ends: OnceCell<CountEnds>,
}

impl PartialEq for Recurrence {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start
            && self.all_day == other.all_day
            && self.rrules == other.rrules
            && self.exrules == other.exrules
            && self.rdates == other.rdates
            && self.exdates == other.exdates
    }
}

impl Recurrence {
    /// Creates an empty recurrence anchored at `start`.
    pub fn new(start: Option<CalDateTime>) -> Self {
        Self {
            start,
            ..Self::default()
        }
    }

    pub fn start(&self) -> Option<CalDateTime> {
        self.start
    }

    pub fn all_day(&self) -> bool {
        self.all_day
    }

    pub fn rrules(&self) -> &[RecurrenceRule] {
        &self.rrules
    }

    pub fn exrules(&self) -> &[RecurrenceRule] {
        &self.exrules
    }

    pub fn rdates(&self) -> &[CalDateTime] {
        &self.rdates
    }

    pub fn exdates(&self) -> &[CalDateTime] {
        &self.exdates
    }

    pub(crate) fn set_start(&mut self, start: Option<CalDateTime>) {
        self.start = start;
        self.count_ends.take();
    }

    pub(crate) fn set_all_day(&mut self, all_day: bool) {
        self.all_day = all_day;
    }

    pub(crate) fn add_rrule(&mut self, rule: RecurrenceRule) {
        self.rrules.push(rule);
        self.count_ends.take();
    }

    pub(crate) fn add_exrule(&mut self, rule: RecurrenceRule) {
        self.exrules.push(rule);
        self.count_ends.take();
    }

    pub(crate) fn add_rdate(&mut self, dt: CalDateTime) {
        if !self.rdates.contains(&dt) {
            self.rdates.push(dt);
            self.rdates.sort();
        }
    }

    pub(crate) fn add_exdate(&mut self, dt: CalDateTime) {
        if !self.exdates.contains(&dt) {
            self.exdates.push(dt);
            self.exdates.sort();
        }
    }

    pub(crate) fn clear(&mut self) {
        self.rrules.clear();
        self.exrules.clear();
        self.rdates.clear();
        self.exdates.clear();
        self.count_ends.take();
    }

    /// Moves every stored timestamp from wall-clock time in `old` to the
    /// same wall-clock time in `new`.
    pub(crate) fn shift_times(&mut self, old: Zone, new: Zone) {
        self.start = self.start.map(|dt| dt.shift_zone(old, new));
        for dt in self.rdates.iter_mut().chain(self.exdates.iter_mut()) {
            *dt = dt.shift_zone(old, new);
        }
        for rule in self.rrules.iter_mut().chain(self.exrules.iter_mut()) {
            rule.until = rule.until.map(|dt| dt.shift_zone(old, new));
        }
        self.count_ends.take();
    }

    fn count_ends(&self, start: CalDateTime) -> &CountEnds {
        self.count_ends.get_or_init(|| {
            let ends = |rules: &[RecurrenceRule]| -> Vec<Option<CalDateTime>> {
                rules
                    .iter()
                    .map(|rule| Expander::new(rule, start).find_count_end())
                    .collect()
            };
            CountEnds {
                rrules: ends(&self.rrules),
                exrules: ends(&self.exrules),
            }
        })
    }

    /// Expanders for the recurrence rules, `COUNT` rules bounded by their
    /// last occurrence.
    fn rrule_expanders(&self, start: CalDateTime) -> impl Iterator<Item = Expander<'_>> {
        let ends = &self.count_ends(start).rrules;
        self.rrules
            .iter()
            .zip(ends)
            .map(move |(rule, end)| Expander::new(rule, start).with_count_end(*end))
    }

    fn exrule_expanders(&self, start: CalDateTime) -> impl Iterator<Item = Expander<'_>> {
        let ends = &self.count_ends(start).exrules;
        self.exrules
            .iter()
            .zip(ends)
            .map(move |(rule, end)| Expander::new(rule, start).with_count_end(*end))
    }

    /// Returns `true` when there is any occurrence besides the start.
    pub fn recurs(&self) -> bool {
        self.start.is_some() && (!self.rrules.is_empty() || !self.rdates.is_empty())
    }

    /// Returns `true` when some recurrence rule has no bound.
    pub fn is_infinite(&self) -> bool {
        self.rrules.iter().any(RecurrenceRule::is_infinite)
    }

    fn is_excluded(&self, start: CalDateTime, dt: &CalDateTime) -> bool {
        let by_date = self.exdates.iter().any(|ex| {
            if ex.is_date_only() {
                dt.to_zone(ex.zone()).date() == ex.date()
            } else {
                ex.instant() == dt.instant()
            }
        });
        if by_date {
            return true;
        }
        let probe = CalDateTime::from_instant(dt.instant() - one_second(), dt.zone());
        self.exrule_expanders(start).any(|expander| {
            if dt.instant() == start.instant() {
                // The start only counts when the rule's pattern produces it
                return expander.matches(dt);
            }
            expander
                .next(&probe)
                .is_some_and(|hit| hit.instant() == dt.instant())
        })
    }

    fn raw_previous(&self, start: CalDateTime, before: &CalDateTime) -> Option<CalDateTime> {
        let limit = before.instant();
        let mut best = (start.instant() < limit).then_some(start);
        for expander in self.rrule_expanders(start) {
            if let Some(dt) = expander.previous(before) {
                best = later(best, dt);
            }
        }
        for rdate in self.rdates.iter().filter(|dt| dt.instant() < limit) {
            best = later(best, *rdate);
        }
        best
    }

    fn raw_next(&self, start: CalDateTime, after: &CalDateTime) -> Option<CalDateTime> {
        let bound = after.instant();
        let mut best = (start.instant() > bound).then_some(start);
        for expander in self.rrule_expanders(start) {
            if let Some(dt) = expander.next(after) {
                best = earlier(best, dt);
            }
        }
        for rdate in self.rdates.iter().filter(|dt| dt.instant() > bound) {
            best = earlier(best, *rdate);
        }
        best
    }

    /// Returns the latest occurrence strictly before `before`.
    pub fn previous_date_time(&self, before: &CalDateTime) -> Option<CalDateTime> {
        let start = self.start?;
        let mut cursor = *before;
        for _ in 0..MAX_EXCLUDED_SKIPS {
            let candidate = self.raw_previous(start, &cursor)?;
            if !self.is_excluded(start, &candidate) {
                return Some(candidate);
            }
            cursor = candidate;
        }
        debug!(before = %before, "Too many excluded occurrences, giving up");
        None
    }

    /// Returns the earliest occurrence strictly after `after`.
    pub fn next_date_time(&self, after: &CalDateTime) -> Option<CalDateTime> {
        let start = self.start?;
        let mut cursor = *after;
        for _ in 0..MAX_EXCLUDED_SKIPS {
            let candidate = self.raw_next(start, &cursor)?;
            if !self.is_excluded(start, &candidate) {
                return Some(candidate);
            }
            cursor = candidate;
        }
        debug!(after = %after, "Too many excluded occurrences, giving up");
        None
    }

    /// Returns the last occurrence, or `None` when the recurrence never
    /// ends or has no start.
    ///
    /// Without any recurrence the start is the only, and therefore last,
    /// occurrence.
    pub fn end_date_time(&self) -> Option<CalDateTime> {
        let start = self.start?;
        if !self.recurs() {
            return Some(start);
        }
        if self.is_infinite() {
            return None;
        }
        let mut end = Some(start);
        for expander in self.rrule_expanders(start) {
            if let Some(last) = expander.last() {
                end = later(end, last);
            }
        }
        for rdate in &self.rdates {
            end = later(end, *rdate);
        }
        match end {
            Some(last) if self.is_excluded(start, &last) => self.previous_date_time(&last),
            other => other,
        }
    }

    /// Returns `true` when an occurrence falls on `date` in `zone`.
    ///
    /// Date-only recurrences are checked in the zone of their start.
    pub fn recurs_on(&self, date: NaiveDate, zone: Zone) -> bool {
        let Some(start) = self.start else {
            return false;
        };
        let zone = if start.is_date_only() { start.zone() } else { zone };
        let Some(begin) = CalDateTime::from_date(date, zone) else {
            return false;
        };
        let Some(end) = date.succ_opt().and_then(|d| CalDateTime::from_date(d, zone)) else {
            return false;
        };
        let probe = CalDateTime::from_instant(begin.instant() - one_second(), zone);
        self.next_date_time(&probe)
            .is_some_and(|dt| dt.instant() < end.instant())
    }

    /// Returns every occurrence in `[from, to]`, in ascending order.
    pub fn times_in_interval(&self, from: &CalDateTime, to: &CalDateTime) -> Vec<CalDateTime> {
        let mut times = Vec::new();
        if from.instant() > to.instant() {
            return times;
        }
        let mut cursor = CalDateTime::from_instant(from.instant() - one_second(), from.zone());
        while let Some(dt) = self.next_date_time(&cursor) {
            if dt.instant() > to.instant() {
                break;
            }
            times.push(dt);
            if times.len() >= MAX_INTERVAL_TIMES {
                debug!(from = %from, to = %to, "Occurrence list truncated");
                break;
            }
            cursor = dt;
        }
        times
    }

    /// Logs the recurrence at debug level.
    pub fn dump(&self) {
        debug!(
            start = %crate::time::dump_time(self.start.as_ref(), None),
            all_day = self.all_day,
            recurs = self.recurs(),
            "Recurrence"
        );
        for rule in &self.rrules {
            debug!(rule = %rule, "  RRULE");
        }
        for rule in &self.exrules {
            debug!(rule = %rule, "  EXRULE");
        }
        for dt in &self.rdates {
            debug!(date = %dt, "  RDATE");
        }
        for dt in &self.exdates {
            debug!(date = %dt, "  EXDATE");
        }
    }
}
