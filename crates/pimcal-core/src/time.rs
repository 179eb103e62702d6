//! Time types for calendar incidences.
//!
//! This module provides [`Zone`], the zone a timestamp is expressed in, and
//! [`CalDateTime`], an instant paired with its zone and a date-only flag.
//! All calendar arithmetic that depends on wall-clock time (adding days,
//! taking the date of a timestamp, recurrence expansion) goes through the
//! zone so daylight-saving transitions are honoured.

use std::cmp::Ordering;
use std::fmt;

use chrono::{
    DateTime, FixedOffset, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Utc,
};
use chrono_tz::Tz;

use crate::error::{ParseError, ParseResult};

/// The zone a [`CalDateTime`] is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    /// Coordinated Universal Time.
    Utc,
    /// The process-local zone.
    Local,
    /// An IANA zone such as `Europe/Berlin`.
    Named(Tz),
    /// A fixed offset from UTC.
    Offset(FixedOffset),
}

impl Zone {
    /// Parses a zone name.
    ///
    /// Accepts `UTC`/`Z`, `local`, IANA names and `+hh:mm` style offsets.
    pub fn parse(s: &str) -> ParseResult<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("utc") || s == "Z" {
            return Ok(Self::Utc);
        }
        if s.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        if let Ok(tz) = s.parse::<Tz>() {
            return Ok(Self::Named(tz));
        }
        if s.starts_with('+') || s.starts_with('-') {
            if let Ok(offset) = s.parse::<FixedOffset>() {
                return Ok(Self::Offset(offset));
            }
        }
        Err(ParseError::UnknownZone(s.to_string()))
    }

    /// Returns `true` for the process-local zone.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }

    /// Returns a display name for the zone.
    pub fn name(&self) -> String {
        match self {
            Self::Utc => "UTC".to_string(),
            Self::Local => "Local".to_string(),
            Self::Named(tz) => tz.name().to_string(),
            Self::Offset(offset) => offset.to_string(),
        }
    }

    /// Returns the wall-clock time of `instant` in this zone.
    pub fn naive_from_utc(&self, instant: &DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Utc => instant.naive_utc(),
            Self::Local => instant.with_timezone(&Local).naive_local(),
            Self::Named(tz) => instant.with_timezone(tz).naive_local(),
            Self::Offset(offset) => instant.with_timezone(offset).naive_local(),
        }
    }

    /// Returns the offset from UTC, in seconds, in effect at `instant`.
    pub fn offset_seconds(&self, instant: &DateTime<Utc>) -> i32 {
        match self {
            Self::Utc => 0,
            Self::Local => instant.with_timezone(&Local).offset().fix().local_minus_utc(),
            Self::Named(tz) => instant.with_timezone(tz).offset().fix().local_minus_utc(),
            Self::Offset(offset) => offset.local_minus_utc(),
        }
    }

    /// Maps a wall-clock time in this zone to an instant.
    ///
    /// Ambiguous times (the repeated hour when clocks go back) resolve to
    /// the earlier instant. Times inside a daylight-saving gap are read with
    /// the offset in effect before the gap, which moves them forward.
    pub fn resolve(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.resolve_exact(naive).or_else(|| {
            let shifted = naive + chrono::Duration::hours(1);
            self.resolve_exact(shifted)
        })
    }

    fn resolve_exact(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Self::Utc => Some(Utc.from_utc_datetime(&naive)),
            Self::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::Named(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::Offset(offset) => offset
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A calendar timestamp: an instant, the zone it is expressed in, and
/// whether only its date is significant.
///
/// Two timestamps are equal when they denote the same instant and agree on
/// the date-only flag; the zone does not take part in comparisons.
#[derive(Debug, Clone, Copy)]
pub struct CalDateTime {
    instant: DateTime<Utc>,
    zone: Zone,
    date_only: bool,
}

/// Returns the latest (`forward`) or earliest instant arithmetic may reach.
///
/// One day of slack is kept at each end so the wall-clock time stays
/// representable in every zone.
fn edge_instant(forward: bool) -> DateTime<Utc> {
    let date = if forward {
        NaiveDate::MAX.pred_opt().unwrap_or(NaiveDate::MAX)
    } else {
        NaiveDate::MIN.succ_opt().unwrap_or(NaiveDate::MIN)
    };
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

fn clamp_instant(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.clamp(edge_instant(false), edge_instant(true))
}

impl CalDateTime {
    /// Creates a UTC timestamp.
    pub fn from_utc(instant: DateTime<Utc>) -> Self {
        Self {
            instant,
            zone: Zone::Utc,
            date_only: false,
        }
    }

    /// Creates a timestamp for `instant`, expressed in `zone`.
    pub fn from_instant(instant: DateTime<Utc>, zone: Zone) -> Self {
        Self {
            instant,
            zone,
            date_only: false,
        }
    }

    /// Creates a timestamp from a wall-clock time in `zone`.
    pub fn new(naive: NaiveDateTime, zone: Zone) -> Option<Self> {
        zone.resolve(naive).map(|instant| Self {
            instant,
            zone,
            date_only: false,
        })
    }

    /// Creates a date-only timestamp (midnight of `date` in `zone`).
    pub fn from_date(date: NaiveDate, zone: Zone) -> Option<Self> {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        zone.resolve(midnight).map(|instant| Self {
            instant,
            zone,
            date_only: true,
        })
    }

    /// Parses an RFC 5545 `DATE` or `DATE-TIME` value.
    ///
    /// A trailing `Z` marks UTC; otherwise the value is read in the zone
    /// named by `tzid`, falling back to `default_zone` for floating times.
    pub fn parse_ical(value: &str, tzid: Option<&str>, default_zone: Zone) -> ParseResult<Self> {
        let value = value.trim();
        let invalid = || ParseError::InvalidDateTime(value.to_string());

        if value.len() == 8 && value.chars().all(|c| c.is_ascii_digit()) {
            let date = NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| invalid())?;
            let zone = match tzid {
                Some(id) => Zone::parse(id)?,
                None => default_zone,
            };
            return Self::from_date(date, zone).ok_or_else(invalid);
        }

        if let Some(utc) = value.strip_suffix('Z') {
            let naive =
                NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
            return Ok(Self::from_utc(Utc.from_utc_datetime(&naive)));
        }

        let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
        let zone = match tzid {
            Some(id) => Zone::parse(id)?,
            None => default_zone,
        };
        Self::new(naive, zone).ok_or_else(invalid)
    }

    /// Formats the value for an RFC 5545 property.
    ///
    /// Returns the text and, for named zones, the `TZID` parameter value.
    /// Local and fixed-offset timestamps are written in UTC.
    pub fn to_ical(&self) -> (String, Option<String>) {
        if self.date_only {
            return (self.date().format("%Y%m%d").to_string(), None);
        }
        match self.zone {
            Zone::Named(tz) => (
                self.naive_local().format("%Y%m%dT%H%M%S").to_string(),
                Some(tz.name().to_string()),
            ),
            Zone::Utc | Zone::Local | Zone::Offset(_) => {
                (self.instant.format("%Y%m%dT%H%M%SZ").to_string(), None)
            }
        }
    }

    /// Returns the underlying instant.
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    /// Returns the zone this timestamp is expressed in.
    pub fn zone(&self) -> Zone {
        self.zone
    }

    /// Returns `true` when only the date is significant.
    pub fn is_date_only(&self) -> bool {
        self.date_only
    }

    /// Returns the wall-clock time in this timestamp's zone.
    pub fn naive_local(&self) -> NaiveDateTime {
        self.zone.naive_from_utc(&self.instant)
    }

    /// Returns the calendar date in this timestamp's zone.
    pub fn date(&self) -> NaiveDate {
        self.naive_local().date()
    }

    /// Returns the wall-clock time of day in this timestamp's zone.
    pub fn time(&self) -> NaiveTime {
        self.naive_local().time()
    }

    /// Returns the same instant expressed in `zone`.
    pub fn to_zone(&self, zone: Zone) -> Self {
        Self {
            instant: self.instant,
            zone,
            date_only: self.date_only,
        }
    }

    /// Returns a copy with the date-only flag set or cleared.
    pub fn with_date_only(&self, date_only: bool) -> Self {
        Self {
            instant: self.instant,
            zone: self.zone,
            date_only,
        }
    }

    /// Adds a number of seconds.
    ///
    /// Date-only timestamps move by whole days. Results beyond the
    /// representable range stop at its edge.
    pub fn add_secs(&self, secs: i64) -> Self {
        if self.date_only {
            return self.add_days(secs.div_euclid(86_400));
        }
        let instant = chrono::Duration::try_seconds(secs)
            .and_then(|delta| self.instant.checked_add_signed(delta))
            .map_or_else(|| edge_instant(secs > 0), clamp_instant);
        Self {
            instant,
            zone: self.zone,
            date_only: false,
        }
    }

    /// Adds calendar days, keeping the wall-clock time in this zone.
    ///
    /// Like [`CalDateTime::add_secs`], this saturates at the edge of the
    /// representable range.
    pub fn add_days(&self, days: i64) -> Self {
        let delta = chrono::Duration::try_days(days);
        let instant = delta
            .and_then(|delta| self.naive_local().checked_add_signed(delta))
            .and_then(|naive| self.zone.resolve(naive))
            .or_else(|| delta.and_then(|delta| self.instant.checked_add_signed(delta)))
            .map_or_else(|| edge_instant(days > 0), clamp_instant);
        Self {
            instant,
            zone: self.zone,
            date_only: self.date_only,
        }
    }

    /// Adds calendar years, keeping the wall-clock time in this zone.
    ///
    /// February 29th moves to February 28th in non-leap years.
    pub fn add_years(&self, years: i32) -> Self {
        let naive = self.naive_local();
        let months = Months::new(years.unsigned_abs().saturating_mul(12));
        let shifted = if years >= 0 {
            naive.checked_add_months(months)
        } else {
            naive.checked_sub_months(months)
        };
        match shifted.and_then(|n| self.zone.resolve(n)) {
            Some(instant) => Self {
                instant,
                zone: self.zone,
                date_only: self.date_only,
            },
            None => *self,
        }
    }

    /// Returns the signed number of seconds from `self` to `other`.
    pub fn secs_to(&self, other: &CalDateTime) -> i64 {
        (other.instant - self.instant).num_seconds()
    }

    /// Returns the number of calendar days from `self` to `other`, both
    /// dates taken in this timestamp's zone.
    pub fn days_to(&self, other: &CalDateTime) -> i64 {
        (other.to_zone(self.zone).date() - self.date()).num_days()
    }

    /// Reinterprets the wall-clock time of this timestamp, as seen in `old`,
    /// as a wall-clock time in `new`.
    pub fn shift_zone(&self, old: Zone, new: Zone) -> Self {
        let naive = old.naive_from_utc(&self.instant);
        match new.resolve(naive) {
            Some(instant) => Self {
                instant,
                zone: new,
                date_only: self.date_only,
            },
            None => self.to_zone(new),
        }
    }

    /// Formats with a `chrono` format string in this timestamp's zone.
    pub fn format(&self, fmt: &str) -> String {
        let offset = FixedOffset::east_opt(self.zone.offset_seconds(&self.instant))
            .unwrap_or_else(|| Utc.fix());
        self.instant.with_timezone(&offset).format(fmt).to_string()
    }
}

impl PartialEq for CalDateTime {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant && self.date_only == other.date_only
    }
}

impl Eq for CalDateTime {}

impl PartialOrd for CalDateTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CalDateTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instant
            .cmp(&other.instant)
            .then(self.date_only.cmp(&other.date_only))
    }
}

impl fmt::Display for CalDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.date_only {
            write!(f, "{}", self.date().format("%Y-%m-%d"))
        } else {
            write!(f, "{}", self.format("%Y-%m-%dT%H:%M:%S %:z"))
        }
    }
}

/// Formats a timestamp for occurrence listings.
///
/// The timestamp is first projected into `view_zone` when one is given.
/// The output is `%Y-%m-%dT%H:%M:%S`, followed by ` %:z` unless the zone is
/// the process-local zone. An absent timestamp formats as an empty string.
pub fn dump_time(dt: Option<&CalDateTime>, view_zone: Option<Zone>) -> String {
    let Some(dt) = dt else {
        return String::new();
    };
    let viewed = match view_zone {
        Some(zone) => dt.to_zone(zone),
        None => *dt,
    };
    if viewed.zone().is_local() {
        viewed.format("%Y-%m-%dT%H:%M:%S")
    } else {
        viewed.format("%Y-%m-%dT%H:%M:%S %:z")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> CalDateTime {
        CalDateTime::from_utc(Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn berlin() -> Zone {
        Zone::Named(chrono_tz::Europe::Berlin)
    }

    mod zone {
        use super::*;

        #[test]
        fn parse_names() {
            assert_eq!(Zone::parse("UTC").unwrap(), Zone::Utc);
            assert_eq!(Zone::parse("Z").unwrap(), Zone::Utc);
            assert_eq!(Zone::parse("local").unwrap(), Zone::Local);
            assert_eq!(Zone::parse("Europe/Berlin").unwrap(), berlin());
            assert_eq!(
                Zone::parse("+02:00").unwrap(),
                Zone::Offset(FixedOffset::east_opt(7200).unwrap())
            );
            assert!(matches!(
                Zone::parse("Mars/Olympus"),
                Err(ParseError::UnknownZone(_))
            ));
        }

        #[test]
        fn offsets_follow_dst() {
            let winter = utc(2025, 1, 15, 12, 0, 0).instant();
            let summer = utc(2025, 7, 15, 12, 0, 0).instant();
            assert_eq!(berlin().offset_seconds(&winter), 3600);
            assert_eq!(berlin().offset_seconds(&summer), 7200);
        }

        #[test]
        fn gap_moves_forward() {
            // 2025-03-30 02:30 does not exist in Berlin
            let naive = date(2025, 3, 30).and_hms_opt(2, 30, 0).unwrap();
            let instant = berlin().resolve(naive).unwrap();
            assert_eq!(instant, utc(2025, 3, 30, 1, 30, 0).instant());
        }

        #[test]
        fn ambiguous_takes_earlier() {
            let naive = date(2025, 10, 26).and_hms_opt(2, 30, 0).unwrap();
            let instant = berlin().resolve(naive).unwrap();
            assert_eq!(instant, utc(2025, 10, 26, 0, 30, 0).instant());
        }
    }

    mod cal_date_time {
        use super::*;

        #[test]
        fn date_in_zone() {
            let dt = utc(2025, 2, 5, 23, 30, 0);
            assert_eq!(dt.date(), date(2025, 2, 5));
            assert_eq!(dt.to_zone(berlin()).date(), date(2025, 2, 6));
        }

        #[test]
        fn add_days_keeps_wall_clock_across_dst() {
            let start = CalDateTime::new(date(2025, 3, 29).and_hms_opt(9, 0, 0).unwrap(), berlin())
                .unwrap();
            let next = start.add_days(1);
            assert_eq!(next.time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
            assert_eq!(start.secs_to(&next), 23 * 3600);
        }

        #[test]
        fn add_years_clamps_leap_day() {
            let leap = utc(2024, 2, 29, 10, 0, 0);
            assert_eq!(leap.add_years(1).date(), date(2025, 2, 28));
            assert_eq!(leap.add_years(-4).date(), date(2020, 2, 29));
        }

        #[test]
        fn date_only_moves_by_days() {
            let d = CalDateTime::from_date(date(2025, 2, 5), Zone::Utc).unwrap();
            assert!(d.is_date_only());
            assert_eq!(d.add_secs(86_400 * 2).date(), date(2025, 2, 7));
        }

        #[test]
        fn arithmetic_saturates_instead_of_overflowing() {
            let dt = utc(2025, 2, 5, 10, 0, 0);
            let far = dt.add_days(99_999_999);
            assert!(far > dt);
            assert_eq!(far, dt.add_days(i64::MAX));
            assert_eq!(far.to_zone(berlin()).date(), far.date());

            assert!(dt.add_secs(i64::MAX) > dt);
            assert!(dt.add_secs(i64::MIN) < dt);
            assert_eq!(dt.add_secs(i64::MAX).add_secs(1), dt.add_secs(i64::MAX));

            let day = CalDateTime::from_date(date(2025, 2, 5), berlin()).unwrap();
            assert!(day.add_days(-99_999_999) < day);
        }

        #[test]
        fn days_to_uses_own_zone() {
            let a = utc(2025, 2, 5, 22, 0, 0).to_zone(berlin());
            let b = utc(2025, 2, 6, 22, 0, 0);
            // 23:00 Berlin on the 5th to 23:00 Berlin on the 6th
            assert_eq!(a.days_to(&b), 1);
        }

        #[test]
        fn equality_ignores_zone() {
            let a = utc(2025, 2, 5, 10, 0, 0);
            assert_eq!(a, a.to_zone(berlin()));
            assert_ne!(a, a.with_date_only(true));
        }

        #[test]
        fn shift_zone_keeps_wall_clock() {
            let dt = utc(2025, 1, 10, 9, 0, 0);
            let shifted = dt.shift_zone(Zone::Utc, berlin());
            assert_eq!(shifted.time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
            assert_eq!(shifted.instant(), utc(2025, 1, 10, 8, 0, 0).instant());
        }

        #[test]
        fn parse_ical_forms() {
            let z = CalDateTime::parse_ical("20050731T000000Z", None, Zone::Local).unwrap();
            assert_eq!(z, utc(2005, 7, 31, 0, 0, 0));

            let d = CalDateTime::parse_ical("20050731", None, Zone::Utc).unwrap();
            assert!(d.is_date_only());
            assert_eq!(d.date(), date(2005, 7, 31));

            let tz =
                CalDateTime::parse_ical("20050731T100000", Some("Europe/Berlin"), Zone::Utc)
                    .unwrap();
            assert_eq!(tz.instant(), utc(2005, 7, 31, 8, 0, 0).instant());

            assert!(CalDateTime::parse_ical("2005-07-31", None, Zone::Utc).is_err());
        }

        #[test]
        fn to_ical_forms() {
            assert_eq!(
                utc(2005, 7, 31, 8, 0, 0).to_ical(),
                ("20050731T080000Z".to_string(), None)
            );
            let tz = utc(2005, 7, 31, 8, 0, 0).to_zone(berlin());
            assert_eq!(
                tz.to_ical(),
                (
                    "20050731T100000".to_string(),
                    Some("Europe/Berlin".to_string())
                )
            );
        }
    }

    mod dump {
        use super::*;

        #[test]
        fn invalid_is_empty() {
            assert_eq!(dump_time(None, None), "");
        }

        #[test]
        fn utc_has_offset_suffix() {
            let dt = utc(2005, 7, 31, 23, 59, 59);
            assert_eq!(dump_time(Some(&dt), None), "2005-07-31T23:59:59 +00:00");
        }

        #[test]
        fn projects_into_view_zone() {
            let dt = utc(2005, 7, 31, 23, 59, 59);
            assert_eq!(
                dump_time(Some(&dt), Some(berlin())),
                "2005-08-01T01:59:59 +02:00"
            );
        }
    }
}
