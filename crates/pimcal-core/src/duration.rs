//! Signed elapsed time between two calendar timestamps.

use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::time::CalDateTime;

const SECONDS_PER_DAY: i64 = 86_400;

/// How a [`Duration`] advances a timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationKind {
    /// Elapsed seconds.
    #[default]
    Seconds,
    /// Whole calendar days, which keep the wall-clock time across
    /// daylight-saving changes.
    Days,
}

/// A signed span of time.
///
/// The value is positive when the end lies after the start. Equality only
/// compares [`Duration::as_seconds`], so one day equals 86 400 seconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Duration {
    value: i64,
    kind: DurationKind,
}

impl Duration {
    /// The empty duration.
    pub const ZERO: Duration = Duration {
        value: 0,
        kind: DurationKind::Seconds,
    };

    /// Creates a duration of `seconds`.
    pub fn from_seconds(seconds: i64) -> Self {
        Self {
            value: seconds,
            kind: DurationKind::Seconds,
        }
    }

    /// Creates a duration of whole calendar `days`.
    pub fn from_days(days: i64) -> Self {
        Self {
            value: days,
            kind: DurationKind::Days,
        }
    }

    /// Returns the duration from `start` to `end`.
    ///
    /// When both endpoints are date-only the result counts calendar days.
    pub fn between(start: &CalDateTime, end: &CalDateTime) -> Self {
        if start.is_date_only() && end.is_date_only() {
            Self::from_days(start.days_to(end))
        } else {
            Self::from_seconds(start.secs_to(end))
        }
    }

    /// Returns the kind of this duration.
    pub fn kind(&self) -> DurationKind {
        self.kind
    }

    /// Returns `true` for day-based durations.
    pub fn is_daily(&self) -> bool {
        self.kind == DurationKind::Days
    }

    /// Returns the length in seconds.
    pub fn as_seconds(&self) -> i64 {
        match self.kind {
            DurationKind::Seconds => self.value,
            DurationKind::Days => self.value.saturating_mul(SECONDS_PER_DAY),
        }
    }

    /// Returns the length in whole days, rounding toward zero.
    pub fn as_days(&self) -> i64 {
        match self.kind {
            DurationKind::Seconds => self.value / SECONDS_PER_DAY,
            DurationKind::Days => self.value,
        }
    }

    /// Returns `true` for the empty duration.
    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Returns the timestamp this duration after `start`.
    pub fn end(&self, start: &CalDateTime) -> CalDateTime {
        match self.kind {
            DurationKind::Seconds => start.add_secs(self.value),
            DurationKind::Days => start.add_days(self.value),
        }
    }
}

impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        self.as_seconds() == other.as_seconds()
    }
}

impl Eq for Duration {}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Self::Output {
        Self {
            value: self.value.saturating_neg(),
            kind: self.kind,
        }
    }
}

impl fmt::Display for Duration {
    /// Writes the RFC 5545 form, e.g. `P1W`, `P2D`, `-PT1H30M`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.value < 0 { "-" } else { "" };
        let abs = self.value.unsigned_abs();

        if self.kind == DurationKind::Days {
            return if abs != 0 && abs % 7 == 0 {
                write!(f, "{sign}P{}W", abs / 7)
            } else {
                write!(f, "{sign}P{abs}D")
            };
        }

        let days = abs / 86_400;
        let hours = (abs % 86_400) / 3600;
        let minutes = (abs % 3600) / 60;
        let seconds = abs % 60;

        write!(f, "{sign}P")?;
        if days > 0 {
            write!(f, "{days}D")?;
        }
        if hours > 0 || minutes > 0 || seconds > 0 || days == 0 {
            write!(f, "T")?;
            if hours > 0 {
                write!(f, "{hours}H")?;
            }
            if minutes > 0 {
                write!(f, "{minutes}M")?;
            }
            if seconds > 0 || (hours == 0 && minutes == 0) {
                write!(f, "{seconds}S")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Duration {
    type Err = ParseError;

    /// Parses `[+-]P[nW]` or `[+-]P[nD][T[nH][nM][nS]]`.
    ///
    /// A value made of weeks and days only is day-based; anything with a
    /// time part counts seconds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidDuration(s.to_string());
        let text = s.trim();

        let (negative, rest) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        let rest = rest.strip_prefix('P').ok_or_else(invalid)?;
        if rest.is_empty() {
            return Err(invalid());
        }

        let mut days: i64 = 0;
        let mut seconds: i64 = 0;
        let mut has_time = false;
        let mut in_time = false;
        let mut number = String::new();

        for c in rest.chars() {
            match c {
                '0'..='9' => number.push(c),
                'T' if !in_time && number.is_empty() => {
                    in_time = true;
                    has_time = true;
                }
                'W' | 'D' | 'H' | 'M' | 'S' => {
                    let n: i64 = number.parse().map_err(|_| invalid())?;
                    number.clear();
                    let (total, factor) = match (c, in_time) {
                        ('W', false) => (&mut days, 7),
                        ('D', false) => (&mut days, 1),
                        ('H', true) => (&mut seconds, 3600),
                        ('M', true) => (&mut seconds, 60),
                        ('S', true) => (&mut seconds, 1),
                        _ => return Err(invalid()),
                    };
                    *total = n
                        .checked_mul(factor)
                        .and_then(|v| total.checked_add(v))
                        .ok_or_else(invalid)?;
                }
                _ => return Err(invalid()),
            }
        }
        if !number.is_empty() {
            return Err(invalid());
        }

        let sign = if negative { -1 } else { 1 };
        if has_time {
            let total = days
                .checked_mul(SECONDS_PER_DAY)
                .and_then(|d| d.checked_add(seconds))
                .ok_or_else(invalid)?;
            Ok(Self::from_seconds(sign * total))
        } else {
            Ok(Self::from_days(sign * days))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Zone;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> CalDateTime {
        CalDateTime::from_utc(Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap())
    }

    #[test]
    fn between_is_signed() {
        let a = utc(2005, 7, 31, 0, 0, 0);
        let b = utc(2005, 7, 31, 1, 30, 0);
        assert_eq!(Duration::between(&a, &b).as_seconds(), 5400);
        assert_eq!(Duration::between(&b, &a).as_seconds(), -5400);
    }

    #[test]
    fn end_round_trips() {
        let pairs = [
            (utc(2005, 7, 31, 0, 0, 0), utc(2005, 8, 2, 13, 0, 5)),
            (utc(2025, 1, 1, 12, 0, 0), utc(2024, 12, 31, 23, 0, 0)),
            (utc(2025, 1, 1, 12, 0, 0), utc(2025, 1, 1, 12, 0, 0)),
        ];
        for (start, end) in pairs {
            assert_eq!(Duration::between(&start, &end).end(&start), end);
        }
    }

    #[test]
    fn date_only_between_counts_days() {
        let zone = Zone::Named(chrono_tz::Europe::Berlin);
        let start = CalDateTime::from_date(NaiveDate::from_ymd_opt(2025, 3, 28).unwrap(), zone)
            .unwrap();
        let end = CalDateTime::from_date(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(), zone)
            .unwrap();
        let d = Duration::between(&start, &end);
        assert!(d.is_daily());
        assert_eq!(d.as_days(), 4);
        // DST change in between: still lands on midnight
        assert_eq!(d.end(&start), end);
    }

    #[test]
    fn equality_compares_seconds() {
        assert_eq!(Duration::from_days(1), Duration::from_seconds(86_400));
        assert_ne!(Duration::from_days(1), Duration::from_seconds(86_399));
    }

    #[test]
    fn negation() {
        assert_eq!((-Duration::from_seconds(30)).as_seconds(), -30);
    }

    #[test]
    fn parse_forms() {
        assert_eq!("P1W".parse::<Duration>().unwrap(), Duration::from_days(7));
        assert!("P2D".parse::<Duration>().unwrap().is_daily());
        assert_eq!(
            "PT1H30M".parse::<Duration>().unwrap().as_seconds(),
            5400
        );
        assert_eq!(
            "-P1DT2H".parse::<Duration>().unwrap().as_seconds(),
            -(86_400 + 7200)
        );
        assert!("P".parse::<Duration>().is_err());
        assert!("PT5".parse::<Duration>().is_err());
        assert!("P1H".parse::<Duration>().is_err());
        assert!("1D".parse::<Duration>().is_err());
    }

    #[test]
    fn oversized_values_are_rejected() {
        assert!(matches!(
            "P2000000000000000000W".parse::<Duration>(),
            Err(ParseError::InvalidDuration(_))
        ));
        assert!("PT9223372036854775807H".parse::<Duration>().is_err());
        assert!("P106751991167301DT1S".parse::<Duration>().is_err());
        assert!("P99999999999999999999D".parse::<Duration>().is_err());
    }

    #[test]
    fn huge_day_counts_saturate_in_seconds() {
        let d = "P9223372036854775807D".parse::<Duration>().unwrap();
        assert_eq!(d.as_seconds(), i64::MAX);
        assert_eq!((-d).as_days(), -i64::MAX);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Duration::from_days(14).to_string(), "P2W");
        assert_eq!(Duration::from_days(3).to_string(), "P3D");
        assert_eq!(Duration::from_seconds(5400).to_string(), "PT1H30M");
        assert_eq!(Duration::from_seconds(-90_000).to_string(), "-P1DT1H");
        assert_eq!(Duration::ZERO.to_string(), "PT0S");
    }
}
