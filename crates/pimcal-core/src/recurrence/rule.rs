//! Recurrence rule values (RFC 5545 `RRULE` / `EXRULE`).

use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};
use crate::time::{CalDateTime, Zone};

/// Recurrence frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Returns the RFC 5545 keyword.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Secondly => "SECONDLY",
            Self::Minutely => "MINUTELY",
            Self::Hourly => "HOURLY",
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }

    /// Parses a keyword (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "SECONDLY" => Self::Secondly,
            "MINUTELY" => Self::Minutely,
            "HOURLY" => Self::Hourly,
            "DAILY" => Self::Daily,
            "WEEKLY" => Self::Weekly,
            "MONTHLY" => Self::Monthly,
            "YEARLY" => Self::Yearly,
            _ => return None,
        })
    }

    /// Returns `true` for frequencies shorter than a day.
    pub fn is_sub_daily(self) -> bool {
        self < Self::Daily
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `BYDAY` entry: a weekday with an optional ordinal.
///
/// `MO` is every Monday, `1MO` the first Monday and `-1FR` the last Friday
/// of the month or year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekdayNum {
    /// Position within the month or year (±1..=53), `None` for every one.
    pub ordinal: Option<i8>,
    /// The day of the week.
    pub weekday: Weekday,
}

impl WeekdayNum {
    /// Every occurrence of `weekday`.
    pub const fn every(weekday: Weekday) -> Self {
        Self {
            ordinal: None,
            weekday,
        }
    }

    /// The `ordinal`-th occurrence of `weekday`.
    pub const fn nth(ordinal: i8, weekday: Weekday) -> Self {
        Self {
            ordinal: Some(ordinal),
            weekday,
        }
    }
}

impl fmt::Display for WeekdayNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.ordinal {
            write!(f, "{n}")?;
        }
        f.write_str(weekday_code(self.weekday))
    }
}

/// Returns the two-letter RFC 5545 code for a weekday.
pub fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    Some(match s.to_ascii_uppercase().as_str() {
        "MO" => Weekday::Mon,
        "TU" => Weekday::Tue,
        "WE" => Weekday::Wed,
        "TH" => Weekday::Thu,
        "FR" => Weekday::Fri,
        "SA" => Weekday::Sat,
        "SU" => Weekday::Sun,
        _ => return None,
    })
}

/// A single recurrence rule.
///
/// The rule is anchored at the start of its owning incidence; evaluation
/// lives in the `expand` module and on [`super::Recurrence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub freq: Frequency,
    /// Number of periods between occurrences (at least 1).
    pub interval: u32,
    /// Total number of occurrences, the start included.
    pub count: Option<u32>,
    /// Last permitted occurrence (inclusive).
    pub until: Option<CalDateTime>,
    pub by_second: Vec<u32>,
    pub by_minute: Vec<u32>,
    pub by_hour: Vec<u32>,
    pub by_day: Vec<WeekdayNum>,
    pub by_month_day: Vec<i32>,
    pub by_year_day: Vec<i32>,
    pub by_week_no: Vec<i32>,
    pub by_month: Vec<u32>,
    pub by_set_pos: Vec<i32>,
    pub week_start: Weekday,
}

impl RecurrenceRule {
    /// Creates a rule repeating every period of `freq`, without bound.
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            count: None,
            until: None,
            by_second: Vec::new(),
            by_minute: Vec::new(),
            by_hour: Vec::new(),
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_year_day: Vec::new(),
            by_week_no: Vec::new(),
            by_month: Vec::new(),
            by_set_pos: Vec::new(),
            week_start: Weekday::Mon,
        }
    }

    /// Builder: set the interval.
    #[must_use]
    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Builder: bound the rule by an occurrence count.
    #[must_use]
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self.until = None;
        self
    }

    /// Builder: bound the rule by an end timestamp.
    #[must_use]
    pub fn with_until(mut self, until: CalDateTime) -> Self {
        self.until = Some(until);
        self.count = None;
        self
    }

    /// Builder: set the `BYDAY` list.
    #[must_use]
    pub fn with_by_day(mut self, days: impl IntoIterator<Item = WeekdayNum>) -> Self {
        self.by_day = days.into_iter().collect();
        self
    }

    /// Builder: set the `BYMONTHDAY` list.
    #[must_use]
    pub fn with_by_month_day(mut self, days: impl IntoIterator<Item = i32>) -> Self {
        self.by_month_day = days.into_iter().collect();
        self
    }

    /// Builder: set the `BYMONTH` list.
    #[must_use]
    pub fn with_by_month(mut self, months: impl IntoIterator<Item = u32>) -> Self {
        self.by_month = months.into_iter().collect();
        self
    }

    /// Builder: set the `BYSETPOS` list.
    #[must_use]
    pub fn with_by_set_pos(mut self, positions: impl IntoIterator<Item = i32>) -> Self {
        self.by_set_pos = positions.into_iter().collect();
        self
    }

    /// Returns `true` when neither `COUNT` nor `UNTIL` bounds the rule.
    pub fn is_infinite(&self) -> bool {
        self.count.is_none() && self.until.is_none()
    }

    /// Parses rule text, reading a floating `UNTIL` in `zone`.
    pub fn parse_in_zone(text: &str, zone: Zone) -> ParseResult<Self> {
        let text = text.trim();
        let text = text.strip_prefix("RRULE:").unwrap_or(text);
        let text = text.strip_prefix("EXRULE:").unwrap_or(text);

        let mut freq = None;
        let mut rule = RecurrenceRule::new(Frequency::Daily);

        for part in text.split(';').filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| ParseError::rule(format!("missing '=' in {part:?}")))?;
            match key.to_ascii_uppercase().as_str() {
                "FREQ" => {
                    freq = Some(
                        Frequency::parse(value)
                            .ok_or_else(|| ParseError::rule(format!("unknown FREQ {value:?}")))?,
                    );
                }
                "INTERVAL" => {
                    let interval: u32 = parse_number(key, value)?;
                    if interval == 0 {
                        return Err(ParseError::rule("INTERVAL must be positive"));
                    }
                    rule.interval = interval;
                }
                "COUNT" => rule.count = Some(parse_number(key, value)?),
                "UNTIL" => rule.until = Some(CalDateTime::parse_ical(value, None, zone)?),
                "BYSECOND" => rule.by_second = parse_list(key, value, 0..=60)?,
                "BYMINUTE" => rule.by_minute = parse_list(key, value, 0..=59)?,
                "BYHOUR" => rule.by_hour = parse_list(key, value, 0..=23)?,
                "BYDAY" => rule.by_day = parse_by_day(value)?,
                "BYMONTHDAY" => rule.by_month_day = parse_signed_list(key, value, 31)?,
                "BYYEARDAY" => rule.by_year_day = parse_signed_list(key, value, 366)?,
                "BYWEEKNO" => rule.by_week_no = parse_signed_list(key, value, 53)?,
                "BYMONTH" => rule.by_month = parse_list(key, value, 1..=12)?,
                "BYSETPOS" => rule.by_set_pos = parse_signed_list(key, value, 366)?,
                "WKST" => {
                    rule.week_start = parse_weekday(value)
                        .ok_or_else(|| ParseError::rule(format!("unknown WKST {value:?}")))?;
                }
                other => {
                    tracing::debug!(part = other, "Ignoring unknown recurrence rule part");
                }
            }
        }

        rule.freq = freq.ok_or_else(|| ParseError::rule("FREQ is required"))?;
        if rule.count.is_some() && rule.until.is_some() {
            return Err(ParseError::rule("COUNT and UNTIL are mutually exclusive"));
        }
        Ok(rule)
    }
}

impl FromStr for RecurrenceRule {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_in_zone(s, Zone::Utc)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.freq)?;
        if self.interval > 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={count}")?;
        }
        if let Some(until) = &self.until {
            let text = if until.is_date_only() {
                until.to_ical().0
            } else {
                until.instant().format("%Y%m%dT%H%M%SZ").to_string()
            };
            write!(f, ";UNTIL={text}")?;
        }
        write_list(f, "BYSECOND", &self.by_second)?;
        write_list(f, "BYMINUTE", &self.by_minute)?;
        write_list(f, "BYHOUR", &self.by_hour)?;
        write_list(f, "BYDAY", &self.by_day)?;
        write_list(f, "BYMONTHDAY", &self.by_month_day)?;
        write_list(f, "BYYEARDAY", &self.by_year_day)?;
        write_list(f, "BYWEEKNO", &self.by_week_no)?;
        write_list(f, "BYMONTH", &self.by_month)?;
        write_list(f, "BYSETPOS", &self.by_set_pos)?;
        if self.week_start != Weekday::Mon {
            write!(f, ";WKST={}", weekday_code(self.week_start))?;
        }
        Ok(())
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, key: &str, items: &[T]) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    write!(f, ";{key}=")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> ParseResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ParseError::rule(format!("invalid {key} value {value:?}")))
}

fn parse_list(
    key: &str,
    value: &str,
    range: std::ops::RangeInclusive<u32>,
) -> ParseResult<Vec<u32>> {
    value
        .split(',')
        .map(|item| {
            let n: u32 = parse_number(key, item)?;
            if range.contains(&n) {
                Ok(n)
            } else {
                Err(ParseError::rule(format!("{key} value {n} out of range")))
            }
        })
        .collect()
}

fn parse_signed_list(key: &str, value: &str, max: i32) -> ParseResult<Vec<i32>> {
    value
        .split(',')
        .map(|item| {
            let n: i32 = parse_number(key, item.trim_start_matches('+'))?;
            if n != 0 && n.abs() <= max {
                Ok(n)
            } else {
                Err(ParseError::rule(format!("{key} value {n} out of range")))
            }
        })
        .collect()
}

fn parse_by_day(value: &str) -> ParseResult<Vec<WeekdayNum>> {
    value
        .split(',')
        .map(|item| {
            let item = item.trim();
            let invalid = || ParseError::rule(format!("invalid BYDAY value {item:?}"));
            if item.len() < 2 || !item.is_char_boundary(item.len() - 2) {
                return Err(invalid());
            }
            let (ordinal, code) = item.split_at(item.len() - 2);
            let weekday = parse_weekday(code).ok_or_else(invalid)?;
            if ordinal.is_empty() {
                return Ok(WeekdayNum::every(weekday));
            }
            let n: i8 = ordinal
                .trim_start_matches('+')
                .parse()
                .map_err(|_| invalid())?;
            if n == 0 || !(-53..=53).contains(&n) {
                return Err(invalid());
            }
            Ok(WeekdayNum::nth(n, weekday))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn parse_weekly_with_days() {
        let rule: RecurrenceRule = "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE,-1FR;WKST=SU"
            .parse()
            .unwrap();
        assert_eq!(rule.freq, Frequency::Weekly);
        assert_eq!(rule.interval, 2);
        assert_eq!(
            rule.by_day,
            vec![
                WeekdayNum::every(Weekday::Mon),
                WeekdayNum::every(Weekday::Wed),
                WeekdayNum::nth(-1, Weekday::Fri),
            ]
        );
        assert_eq!(rule.week_start, Weekday::Sun);
        assert!(rule.is_infinite());
    }

    #[test]
    fn parse_until_utc() {
        let rule: RecurrenceRule = "RRULE:FREQ=DAILY;UNTIL=20050805T000000Z".parse().unwrap();
        assert_eq!(
            rule.until.unwrap().instant(),
            Utc.with_ymd_and_hms(2005, 8, 5, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!("INTERVAL=2".parse::<RecurrenceRule>().is_err());
        assert!("FREQ=FORTNIGHTLY".parse::<RecurrenceRule>().is_err());
        assert!("FREQ=DAILY;INTERVAL=0".parse::<RecurrenceRule>().is_err());
        assert!("FREQ=DAILY;COUNT=2;UNTIL=20050101".parse::<RecurrenceRule>().is_err());
        assert!("FREQ=MONTHLY;BYMONTHDAY=0".parse::<RecurrenceRule>().is_err());
        assert!("FREQ=MONTHLY;BYDAY=0MO".parse::<RecurrenceRule>().is_err());
        assert!("FREQ=YEARLY;BYMONTH=13".parse::<RecurrenceRule>().is_err());
        assert!("FREQ".parse::<RecurrenceRule>().is_err());
    }

    #[test]
    fn display_round_trips() {
        let text = "FREQ=MONTHLY;INTERVAL=3;COUNT=10;BYDAY=2TU,-1SU;BYSETPOS=1";
        let rule: RecurrenceRule = text.parse().unwrap();
        assert_eq!(rule.to_string(), text);
        assert_eq!(rule.to_string().parse::<RecurrenceRule>().unwrap(), rule);
    }

    #[test]
    fn builders() {
        let rule = RecurrenceRule::new(Frequency::Yearly)
            .with_interval(0)
            .with_count(4)
            .with_by_month([2])
            .with_by_month_day([-1]);
        assert_eq!(rule.interval, 1);
        assert_eq!(rule.count, Some(4));
        assert_eq!(rule.to_string(), "FREQ=YEARLY;COUNT=4;BYMONTHDAY=-1;BYMONTH=2");
    }
}
