//! Period-by-period expansion of a single recurrence rule.
//!
//! A rule is evaluated in the wall-clock time of its start's zone. Periods
//! (years, months, weeks, days, hours, minutes or seconds, depending on the
//! frequency) are numbered from the period containing the start; each
//! period expands to a sorted candidate set following the RFC 5545 BYxxx
//! expand/limit rules, then BYSETPOS picks from that set. The start itself
//! is always the first occurrence and counts towards `COUNT`.

use std::collections::VecDeque;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc, Weekday};
use tracing::{debug, trace};

use super::rule::{Frequency, RecurrenceRule, WeekdayNum};
use crate::time::{CalDateTime, Zone};

/// Occurrences expanded at most to find the end of a `COUNT` rule; larger
/// counts are cut off there.
pub(crate) const MAX_COUNT_EXPANSION: usize = 1_000_000;

/// Upper bound on consecutive periods scanned without finding a candidate.
fn max_empty_periods(freq: Frequency) -> i64 {
    if freq.is_sub_daily() {
        500_000
    } else {
        20_000
    }
}

fn shift_date(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(chrono::Duration::try_days(days)?)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from((next - first).num_days()).ok()
}

fn days_in_year(year: i32) -> u32 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366
    } else {
        365
    }
}

fn week_start_of(date: NaiveDate, week_start: Weekday) -> NaiveDate {
    let back = (i64::from(date.weekday().num_days_from_monday())
        - i64::from(week_start.num_days_from_monday()))
    .rem_euclid(7);
    shift_date(date, -back).unwrap_or(date)
}

/// First day of week 1 of `year`: the week containing January 4th.
fn week_one_start(year: i32, week_start: Weekday) -> Option<NaiveDate> {
    Some(week_start_of(
        NaiveDate::from_ymd_opt(year, 1, 4)?,
        week_start,
    ))
}

/// Returns the week number of `date` and the number of weeks in its
/// week-numbering year.
fn week_number(date: NaiveDate, week_start: Weekday) -> Option<(i32, i32)> {
    let mut year = date.year();
    let mut first = week_one_start(year, week_start)?;
    if date < first {
        year -= 1;
        first = week_one_start(year, week_start)?;
    } else {
        let next = week_one_start(year + 1, week_start)?;
        if date >= next {
            year += 1;
            first = next;
        }
    }
    let next = week_one_start(year + 1, week_start)?;
    let number = i32::try_from((date - first).num_days() / 7 + 1).ok()?;
    let total = i32::try_from((next - first).num_days() / 7).ok()?;
    Some((number, total))
}

fn signed_matches(list: &[i32], value: i32, len: i32) -> bool {
    list.iter()
        .any(|&n| if n > 0 { n == value } else { len + n + 1 == value })
}

fn truncate(t: NaiveDateTime, freq: Frequency) -> NaiveDateTime {
    let date = t.date();
    let time = match freq {
        Frequency::Hourly => date.and_hms_opt(t.hour(), 0, 0),
        Frequency::Minutely => date.and_hms_opt(t.hour(), t.minute(), 0),
        _ => date.and_hms_opt(t.hour(), t.minute(), t.second()),
    };
    time.unwrap_or(t)
}

/// The dates a period covers, and for sub-daily rules the period's own
/// wall-clock time.
struct Period {
    first: NaiveDate,
    last: NaiveDate,
    at: Option<NaiveDateTime>,
}

/// Evaluates one rule against the start of its incidence.
pub(crate) struct Expander<'a> {
    rule: &'a RecurrenceRule,
    start: CalDateTime,
    start_local: NaiveDateTime,
    zone: Zone,
    interval: i64,
    by_month: Vec<u32>,
    by_month_day: Vec<i32>,
    by_day: Vec<WeekdayNum>,
    hours: Vec<u32>,
    minutes: Vec<u32>,
    seconds: Vec<u32>,
    week_origin: NaiveDate,
    until: Option<DateTime<Utc>>,
    /// Last occurrence of a `COUNT` rule, once known.
    count_end: Option<CalDateTime>,
}

impl<'a> Expander<'a> {
    pub(crate) fn new(rule: &'a RecurrenceRule, start: CalDateTime) -> Self {
        let zone = start.zone();
        let start_local = start.naive_local();
        let start_date = start_local.date();

        let mut by_month = rule.by_month.clone();
        let mut by_month_day = rule.by_month_day.clone();
        let mut by_day = rule.by_day.clone();
        let has_day_rules = !rule.by_month_day.is_empty()
            || !rule.by_year_day.is_empty()
            || !rule.by_week_no.is_empty()
            || !rule.by_day.is_empty();

        // Rule parts the frequency implies when the rule leaves them out
        match rule.freq {
            Frequency::Yearly if !has_day_rules => {
                if by_month.is_empty() {
                    by_month.push(start_date.month());
                }
                by_month_day.push(start_date.day() as i32);
            }
            Frequency::Yearly
                if !rule.by_week_no.is_empty()
                    && rule.by_day.is_empty()
                    && rule.by_month_day.is_empty()
                    && rule.by_year_day.is_empty() =>
            {
                by_day.push(WeekdayNum::every(start_date.weekday()));
            }
            Frequency::Monthly if !has_day_rules => {
                by_month_day.push(start_date.day() as i32);
            }
            Frequency::Weekly
                if rule.by_day.is_empty()
                    && rule.by_month_day.is_empty()
                    && rule.by_year_day.is_empty() =>
            {
                by_day.push(WeekdayNum::every(start_date.weekday()));
            }
            _ => {}
        }

        let pick = |list: &[u32], default: u32| -> Vec<u32> {
            if start.is_date_only() {
                return vec![0];
            }
            let mut values = if list.is_empty() {
                vec![default]
            } else {
                list.to_vec()
            };
            values.sort_unstable();
            values.dedup();
            values
        };

        let until = rule.until.as_ref().map(|until| {
            if until.is_date_only() {
                // A date bound includes the whole day
                until
                    .date()
                    .succ_opt()
                    .and_then(|next| CalDateTime::from_date(next, until.zone()))
                    .map_or(until.instant(), |next| {
                        next.instant() - chrono::Duration::seconds(1)
                    })
            } else {
                until.instant()
            }
        });

        Self {
            rule,
            start,
            start_local,
            zone,
            interval: i64::from(rule.interval.max(1)),
            by_month,
            by_month_day,
            by_day,
            hours: pick(&rule.by_hour, start_local.hour()),
            minutes: pick(&rule.by_minute, start_local.minute()),
            seconds: pick(&rule.by_second, start_local.second()),
            week_origin: week_start_of(start_date, rule.week_start),
            until,
            count_end: None,
        }
    }

    /// Bounds a `COUNT` rule by its last occurrence, as found by
    /// [`Expander::find_count_end`], so searches jump straight to the period
    /// they need instead of expanding from the start.
    pub(crate) fn with_count_end(mut self, last: Option<CalDateTime>) -> Self {
        if let (Some(_), Some(last)) = (self.rule.count, last) {
            self.until = Some(last.instant());
            self.count_end = Some(last);
        }
        self
    }

    /// Expands a `COUNT` rule to its last occurrence.
    ///
    /// Gives up after [`MAX_COUNT_EXPANSION`] occurrences and treats the
    /// last one reached as the end.
    pub(crate) fn find_count_end(&self) -> Option<CalDateTime> {
        let count = self.rule.count?;
        let mut seen = 0;
        let last = self
            .iter()
            .take(MAX_COUNT_EXPANSION)
            .inspect(|_| seen += 1)
            .last();
        if seen >= MAX_COUNT_EXPANSION && count as usize > MAX_COUNT_EXPANSION {
            debug!(rule = %self.rule, "Occurrence count cut off");
        }
        last
    }

    /// Returns `true` when `COUNT` still has to be enforced by counting.
    fn counts_from_start(&self) -> bool {
        self.rule.count.is_some() && self.count_end.is_none()
    }

    pub(crate) fn start(&self) -> CalDateTime {
        self.start
    }

    pub(crate) fn within_until(&self, dt: &CalDateTime) -> bool {
        self.until.is_none_or(|until| dt.instant() <= until)
    }

    /// Returns the index of the period containing wall-clock time `t`.
    fn period_of(&self, t: NaiveDateTime) -> i64 {
        let s = self.start_local;
        let elapsed = match self.rule.freq {
            Frequency::Yearly => i64::from(t.year() - s.year()),
            Frequency::Monthly => {
                i64::from(t.year() * 12 + t.month0() as i32)
                    - i64::from(s.year() * 12 + s.month0() as i32)
            }
            Frequency::Weekly => {
                (week_start_of(t.date(), self.rule.week_start) - self.week_origin).num_days() / 7
            }
            Frequency::Daily => (t.date() - s.date()).num_days(),
            Frequency::Hourly => {
                (truncate(t, Frequency::Hourly) - truncate(s, Frequency::Hourly)).num_hours()
            }
            Frequency::Minutely => {
                (truncate(t, Frequency::Minutely) - truncate(s, Frequency::Minutely))
                    .num_minutes()
            }
            Frequency::Secondly => (truncate(t, Frequency::Secondly) - s).num_seconds(),
        };
        elapsed.div_euclid(self.interval)
    }

    fn period(&self, k: i64) -> Option<Period> {
        let s = self.start_local;
        let step = k.checked_mul(self.interval)?;
        match self.rule.freq {
            Frequency::Yearly => {
                let year = i32::try_from(i64::from(s.year()) + step).ok()?;
                Some(Period {
                    first: NaiveDate::from_ymd_opt(year, 1, 1)?,
                    last: NaiveDate::from_ymd_opt(year, 12, 31)?,
                    at: None,
                })
            }
            Frequency::Monthly => {
                let index = i64::from(s.year()) * 12 + i64::from(s.month0()) + step;
                let year = i32::try_from(index.div_euclid(12)).ok()?;
                let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
                let first = NaiveDate::from_ymd_opt(year, month, 1)?;
                let last = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month)?)?;
                Some(Period {
                    first,
                    last,
                    at: None,
                })
            }
            Frequency::Weekly => {
                let first = shift_date(self.week_origin, step.checked_mul(7)?)?;
                Some(Period {
                    first,
                    last: shift_date(first, 6)?,
                    at: None,
                })
            }
            Frequency::Daily => {
                let day = shift_date(s.date(), step)?;
                Some(Period {
                    first: day,
                    last: day,
                    at: None,
                })
            }
            Frequency::Hourly | Frequency::Minutely | Frequency::Secondly => {
                let unit = match self.rule.freq {
                    Frequency::Hourly => chrono::Duration::try_hours(step)?,
                    Frequency::Minutely => chrono::Duration::try_minutes(step)?,
                    _ => chrono::Duration::try_seconds(step)?,
                };
                let at = truncate(s, self.rule.freq).checked_add_signed(unit)?;
                Some(Period {
                    first: at.date(),
                    last: at.date(),
                    at: Some(at),
                })
            }
        }
    }

    fn weekday_matches(&self, w: &WeekdayNum, date: NaiveDate) -> bool {
        if w.weekday != date.weekday() {
            return false;
        }
        let Some(n) = w.ordinal else {
            return true;
        };
        let n = i32::from(n);
        let (position, len) = match self.rule.freq {
            Frequency::Monthly => (date.day() as i32, days_in_month(date.year(), date.month())),
            Frequency::Yearly if !self.by_month.is_empty() => {
                (date.day() as i32, days_in_month(date.year(), date.month()))
            }
            Frequency::Yearly => (date.ordinal() as i32, Some(days_in_year(date.year()))),
            _ => return true,
        };
        let Some(len) = len.map(|l| l as i32) else {
            return false;
        };
        if n > 0 {
            (position - 1) / 7 + 1 == n
        } else {
            (len - position) / 7 + 1 == -n
        }
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        if !self.by_month.is_empty() && !self.by_month.contains(&date.month()) {
            return false;
        }
        if !self.rule.by_week_no.is_empty() {
            match week_number(date, self.rule.week_start) {
                Some((number, total)) if signed_matches(&self.rule.by_week_no, number, total) => {}
                _ => return false,
            }
        }
        if !self.rule.by_year_day.is_empty()
            && !signed_matches(
                &self.rule.by_year_day,
                date.ordinal() as i32,
                days_in_year(date.year()) as i32,
            )
        {
            return false;
        }
        if !self.by_month_day.is_empty() {
            let Some(len) = days_in_month(date.year(), date.month()) else {
                return false;
            };
            if !signed_matches(&self.by_month_day, date.day() as i32, len as i32) {
                return false;
            }
        }
        if !self.by_day.is_empty() && !self.by_day.iter().any(|w| self.weekday_matches(w, date)) {
            return false;
        }
        true
    }

    /// Returns the sorted wall-clock candidates of period `k`.
    fn candidates(&self, k: i64) -> Vec<NaiveDateTime> {
        let Some(period) = self.period(k) else {
            return Vec::new();
        };
        let rule = self.rule;
        let mut set = Vec::new();

        if let Some(at) = period.at {
            if !self.day_matches(at.date())
                || (!rule.by_hour.is_empty() && !rule.by_hour.contains(&at.hour()))
            {
                return Vec::new();
            }
            let minutes = match rule.freq {
                Frequency::Hourly => self.minutes.clone(),
                _ if !rule.by_minute.is_empty() && !rule.by_minute.contains(&at.minute()) => {
                    return Vec::new();
                }
                _ => vec![at.minute()],
            };
            let seconds = match rule.freq {
                Frequency::Secondly
                    if !rule.by_second.is_empty() && !rule.by_second.contains(&at.second()) =>
                {
                    return Vec::new();
                }
                Frequency::Secondly => vec![at.second()],
                _ => self.seconds.clone(),
            };
            for &minute in &minutes {
                for &second in &seconds {
                    if let Some(t) = at.date().and_hms_opt(at.hour(), minute, second) {
                        set.push(t);
                    }
                }
            }
        } else {
            let mut date = period.first;
            while date <= period.last {
                if !self.by_month.is_empty() && !self.by_month.contains(&date.month()) {
                    // Jump to the first day of the next month
                    let skip = days_in_month(date.year(), date.month())
                        .map_or(1, |len| i64::from(len - date.day() + 1));
                    match shift_date(date, skip) {
                        Some(next) => date = next,
                        None => break,
                    }
                    continue;
                }
                if self.day_matches(date) {
                    for &hour in &self.hours {
                        for &minute in &self.minutes {
                            for &second in &self.seconds {
                                if let Some(t) = date.and_hms_opt(hour, minute, second) {
                                    set.push(t);
                                }
                            }
                        }
                    }
                }
                match date.succ_opt() {
                    Some(next) => date = next,
                    None => break,
                }
            }
        }

        set.sort_unstable();
        set.dedup();

        if rule.by_set_pos.is_empty() {
            return set;
        }
        let len = set.len() as i64;
        let mut picked: Vec<NaiveDateTime> = rule
            .by_set_pos
            .iter()
            .filter_map(|&pos| {
                let index = if pos > 0 {
                    i64::from(pos) - 1
                } else {
                    len + i64::from(pos)
                };
                usize::try_from(index).ok().and_then(|i| set.get(i).copied())
            })
            .collect();
        picked.sort_unstable();
        picked.dedup();
        picked
    }

    fn to_cal(&self, naive: NaiveDateTime) -> Option<CalDateTime> {
        if self.start.is_date_only() {
            CalDateTime::from_date(naive.date(), self.zone)
        } else {
            CalDateTime::new(naive, self.zone)
        }
    }

    /// Occurrences of period `k` that lie after the start.
    fn occurrences_in(&self, k: i64) -> Vec<CalDateTime> {
        let start = self.start.instant();
        self.candidates(k)
            .into_iter()
            .filter_map(|naive| self.to_cal(naive))
            .filter(|dt| dt.instant() > start)
            .collect()
    }

    /// Returns `true` when period `k` begins after the `UNTIL` bound.
    fn past_until(&self, k: i64) -> bool {
        let Some(until) = self.until else {
            return false;
        };
        let Some(period) = self.period(k) else {
            return true;
        };
        let begin = period
            .at
            .or_else(|| period.first.and_hms_opt(0, 0, 0))
            .and_then(|naive| self.zone.resolve(naive));
        begin.is_none_or(|begin| begin > until)
    }

    /// Returns `true` when the rule's pattern produces `dt`, ignoring the
    /// implicit first occurrence at the start.
    pub(crate) fn matches(&self, dt: &CalDateTime) -> bool {
        if !self.within_until(dt) {
            return false;
        }
        let naive = self.zone.naive_from_utc(&dt.instant());
        let k = self.period_of(naive);
        k >= 0 && self.candidates(k).contains(&naive)
    }

    /// Iterates over all occurrences in ascending order.
    pub(crate) fn iter(&self) -> Occurrences<'_> {
        Occurrences {
            expander: self,
            period: 0,
            buffer: VecDeque::new(),
            emitted: 0,
            started: false,
            done: false,
        }
    }

    /// Returns the latest occurrence strictly before `before`.
    pub(crate) fn previous(&self, before: &CalDateTime) -> Option<CalDateTime> {
        let limit = before.instant();
        if limit <= self.start.instant() || !self.within_until(&self.start) {
            return None;
        }
        if self.counts_from_start() {
            return self
                .iter()
                .take(MAX_COUNT_EXPANSION)
                .take_while(|dt| dt.instant() < limit)
                .last();
        }

        let mut probe = limit;
        if let Some(until) = self.until {
            probe = probe.min(until + chrono::Duration::seconds(1));
        }
        let mut k = self.period_of(self.zone.naive_from_utc(&probe));
        let mut scanned = 0;
        while k >= 0 {
            let found = self
                .occurrences_in(k)
                .into_iter()
                .rev()
                .find(|dt| dt.instant() < limit && self.within_until(dt));
            if found.is_some() {
                return found;
            }
            k -= 1;
            scanned += 1;
            if scanned > max_empty_periods(self.rule.freq) {
                trace!(rule = %self.rule, "Gave up scanning backwards for an occurrence");
                break;
            }
        }
        Some(self.start)
    }

    /// Returns the earliest occurrence strictly after `after`.
    pub(crate) fn next(&self, after: &CalDateTime) -> Option<CalDateTime> {
        let bound = after.instant();
        if bound < self.start.instant() {
            return self.within_until(&self.start).then_some(self.start);
        }
        if self.counts_from_start() {
            return self
                .iter()
                .take(MAX_COUNT_EXPANSION)
                .find(|dt| dt.instant() > bound);
        }

        let mut k = self.period_of(self.zone.naive_from_utc(&bound)).max(0);
        let mut empty = 0;
        loop {
            if self.past_until(k) {
                return None;
            }
            let found = self
                .occurrences_in(k)
                .into_iter()
                .find(|dt| dt.instant() > bound);
            if let Some(dt) = found {
                return self.within_until(&dt).then_some(dt);
            }
            k += 1;
            empty += 1;
            if empty > max_empty_periods(self.rule.freq) {
                trace!(rule = %self.rule, "Gave up scanning forwards for an occurrence");
                return None;
            }
        }
    }

    /// Returns the last occurrence of a bounded rule.
    pub(crate) fn last(&self) -> Option<CalDateTime> {
        if self.rule.count.is_some() {
            return self.count_end.or_else(|| self.find_count_end());
        }
        let until = self.until?;
        let after_until = CalDateTime::from_instant(until + chrono::Duration::seconds(1), self.zone);
        self.previous(&after_until)
    }
}

/// Ascending iterator over the occurrences of one rule.
pub(crate) struct Occurrences<'a> {
    expander: &'a Expander<'a>,
    period: i64,
    buffer: VecDeque<CalDateTime>,
    emitted: u32,
    started: bool,
    done: bool,
}

impl Iterator for Occurrences<'_> {
    type Item = CalDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(count) = self.expander.rule.count {
            if self.emitted >= count {
                self.done = true;
                return None;
            }
        }
        if !self.started {
            self.started = true;
            let start = self.expander.start();
            if !self.expander.within_until(&start) {
                self.done = true;
                return None;
            }
            self.emitted += 1;
            return Some(start);
        }

        let mut empty = 0;
        while self.buffer.is_empty() {
            if self.expander.past_until(self.period) {
                self.done = true;
                return None;
            }
            self.buffer
                .extend(self.expander.occurrences_in(self.period));
            self.period += 1;
            empty += 1;
            if self.buffer.is_empty() && empty > max_empty_periods(self.expander.rule.freq) {
                self.done = true;
                return None;
            }
        }

        let next = self.buffer.pop_front()?;
        if !self.expander.within_until(&next) {
            self.done = true;
            return None;
        }
        self.emitted += 1;
        Some(next)
    }
}
