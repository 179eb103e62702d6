//! iCalendar (RFC 5545) reading and writing.
//!
//! Reading goes through the `icalendar` parser and maps `VEVENT` and `VTODO`
//! components onto [`Event`] and [`Todo`]. A property that cannot be
//! understood is logged and skipped; the rest of the incidence still loads.
//! Writing builds an `icalendar::Calendar` from the same fields.

use icalendar::parser::{self, read_calendar, unfold};
use icalendar::{Calendar, Component, Property};
use pimcal_core::{
    AnyIncidence, CalDateTime, Duration, Event, EventSortField, Incidence, IncidenceBase,
    MemoryCalendar, RecurrenceRule, SortDirection, Todo, TodoSortField, Transparency, Zone,
};
use tracing::{debug, trace, warn};

use crate::error::{StorageError, StorageResult};

/// Parses `text` and adds its incidences to `calendar`.
///
/// Calendar-level `X-` properties become custom properties of `calendar`.
/// Floating times are read in the calendar's zone. Returns the number of
/// incidences added; duplicates are skipped.
///
/// # Errors
///
/// Returns an `InvalidData` error when `text` is not an iCalendar document.
pub fn parse_calendar(text: &str, calendar: &mut MemoryCalendar) -> StorageResult<usize> {
    if !text
        .trim_start()
        .to_ascii_uppercase()
        .starts_with("BEGIN:VCALENDAR")
    {
        return Err(StorageError::invalid_data("missing BEGIN:VCALENDAR"));
    }
    let unfolded = unfold(text);
    let parsed = read_calendar(&unfolded).map_err(|e| StorageError::invalid_data(e.to_string()))?;

    // The parser yields either the VCALENDAR contents or the component itself
    let mut properties: Vec<&parser::Property<'_>> = parsed.properties.iter().collect();
    let mut components: Vec<&parser::Component<'_>> = Vec::new();
    for component in &parsed.components {
        if component.name.as_str().eq_ignore_ascii_case("VCALENDAR") {
            properties.extend(&component.properties);
            components.extend(&component.components);
        } else {
            components.push(component);
        }
    }

    for property in properties {
        let name = property.name.as_str();
        if is_custom(name) {
            calendar.set_custom_property(name, property.val.as_str());
        }
    }

    let zone = calendar.zone();
    let mut added = 0;
    for component in components {
        let incidence = match component.name.as_str().to_ascii_uppercase().as_str() {
            "VEVENT" => parse_event(component, zone).map(AnyIncidence::from),
            "VTODO" => parse_todo(component, zone).map(AnyIncidence::from),
            "VTIMEZONE" => continue,
            other => {
                debug!(component = other, "Skipping unsupported component");
                continue;
            }
        };
        let Some(incidence) = incidence else {
            continue;
        };
        let uid = incidence.uid().to_string();
        if calendar.add_incidence(incidence) {
            added += 1;
        } else {
            warn!(uid = %uid, "Skipping duplicate incidence");
        }
    }

    debug!(added, "Parsed calendar");
    Ok(added)
}

/// Serializes the events and to-dos of `calendar`.
pub fn write_calendar(calendar: &MemoryCalendar) -> String {
    let mut ical = Calendar::new();
    for (name, value) in calendar.custom_properties() {
        ical.append_property(Property::new(name, value));
    }
    for event in calendar.raw_events(EventSortField::Unsorted, SortDirection::Ascending) {
        ical.push(event_component(event));
    }
    for todo in calendar.raw_todos(TodoSortField::Unsorted, SortDirection::Ascending) {
        ical.push(todo_component(todo));
    }
    ical.to_string()
}

fn is_custom(name: &str) -> bool {
    name.len() > 2 && name[..2].eq_ignore_ascii_case("X-")
}

// Reading

fn find<'c, 'a>(
    component: &'c parser::Component<'a>,
    name: &str,
) -> Option<&'c parser::Property<'a>> {
    component
        .properties
        .iter()
        .find(|p| p.name.as_str().eq_ignore_ascii_case(name))
}

fn param<'p>(property: &'p parser::Property<'_>, key: &str) -> Option<&'p str> {
    property
        .params
        .iter()
        .find(|p| p.key.as_str().eq_ignore_ascii_case(key))
        .and_then(|p| p.val.as_ref())
        .map(|v| v.as_str().trim_matches('"'))
}

fn parse_value(property: &parser::Property<'_>, value: &str, zone: Zone) -> Option<CalDateTime> {
    match CalDateTime::parse_ical(value, param(property, "TZID"), zone) {
        Ok(dt) => Some(dt),
        Err(err) => {
            warn!(
                property = property.name.as_str(),
                value,
                error = %err,
                "Skipping unreadable date-time"
            );
            None
        }
    }
}

fn date_time(property: &parser::Property<'_>, zone: Zone) -> Option<CalDateTime> {
    parse_value(property, property.val.as_str(), zone)
}

fn date_times(property: &parser::Property<'_>, zone: Zone) -> Vec<CalDateTime> {
    property
        .val
        .as_str()
        .split(',')
        .filter(|v| !v.trim().is_empty())
        .filter_map(|v| parse_value(property, v, zone))
        .collect()
}

fn parse_rule(property: &parser::Property<'_>, zone: Zone) -> Option<RecurrenceRule> {
    match RecurrenceRule::parse_in_zone(property.val.as_str(), zone) {
        Ok(rule) => Some(rule),
        Err(err) => {
            warn!(
                property = property.name.as_str(),
                value = property.val.as_str(),
                error = %err,
                "Skipping unreadable recurrence rule"
            );
            None
        }
    }
}

fn uid_of(component: &parser::Component<'_>) -> Option<String> {
    let uid = find(component, "UID").map(|p| p.val.as_str().to_string());
    if uid.is_none() {
        warn!(
            component = component.name.as_str(),
            "Skipping component without UID"
        );
    }
    uid
}

/// Applies a property shared by every incidence kind. Returns `false` when
/// `name` is not one of them.
fn apply_common(
    base: &mut IncidenceBase,
    name: &str,
    property: &parser::Property<'_>,
    zone: Zone,
) -> bool {
    let rule_zone = base.dt_start().map_or(zone, |start| start.zone());
    match name {
        "UID" | "DTSTART" => {}
        "SUMMARY" => base.set_summary(unescape_text(property.val.as_str())),
        "DESCRIPTION" => base.set_description(unescape_text(property.val.as_str())),
        "LOCATION" => base.set_location(unescape_text(property.val.as_str())),
        "CATEGORIES" => {
            let mut categories = base.categories().to_vec();
            categories.extend(split_text_list(property.val.as_str()));
            base.set_categories(categories);
        }
        "RECURRENCE-ID" => {
            if let Some(rid) = date_time(property, zone) {
                base.set_recurrence_id(Some(rid));
            }
        }
        "RRULE" => {
            if let Some(rule) = parse_rule(property, rule_zone) {
                base.add_rrule(rule);
            }
        }
        "EXRULE" => {
            if let Some(rule) = parse_rule(property, rule_zone) {
                base.add_exrule(rule);
            }
        }
        "RDATE" => date_times(property, zone)
            .into_iter()
            .for_each(|dt| base.add_rdate(dt)),
        "EXDATE" => date_times(property, zone)
            .into_iter()
            .for_each(|dt| base.add_exdate(dt)),
        _ => return false,
    }
    true
}

fn parse_duration(property: &parser::Property<'_>) -> Option<Duration> {
    match property.val.as_str().parse::<Duration>() {
        Ok(duration) => Some(duration),
        Err(err) => {
            warn!(value = property.val.as_str(), error = %err, "Skipping unreadable duration");
            None
        }
    }
}

fn parse_event(component: &parser::Component<'_>, zone: Zone) -> Option<Event> {
    let mut event = Event::new(uid_of(component)?);
    let start = find(component, "DTSTART").and_then(|p| date_time(p, zone));
    if let Some(start) = start {
        event.set_dt_start(Some(start));
        event.set_all_day(start.is_date_only());
    }

    for property in &component.properties {
        let name = property.name.as_str().to_ascii_uppercase();
        if apply_common(event.base_mut(), &name, property, zone) {
            continue;
        }
        match name.as_str() {
            "DTEND" => {
                if let Some(end) = date_time(property, zone) {
                    event.set_dt_end(Some(inclusive_end(start, end)));
                }
            }
            "DURATION" => {
                if let Some(duration) = parse_duration(property) {
                    event.set_duration(duration);
                }
            }
            "TRANSP" => match property.val.as_str().to_ascii_uppercase().as_str() {
                "TRANSPARENT" => event.set_transparency(Transparency::Transparent),
                "OPAQUE" => event.set_transparency(Transparency::Opaque),
                other => warn!(value = other, "Skipping unknown transparency"),
            },
            _ => trace!(uid = %event.uid(), property = %name, "Ignoring property"),
        }
    }

    event.base_mut().reset_dirty_fields();
    Some(event)
}

fn parse_todo(component: &parser::Component<'_>, zone: Zone) -> Option<Todo> {
    let mut todo = Todo::new(uid_of(component)?);
    if let Some(start) = find(component, "DTSTART").and_then(|p| date_time(p, zone)) {
        todo.base_mut().set_dt_start(Some(start));
        todo.base_mut().set_all_day(start.is_date_only());
    }

    for property in &component.properties {
        let name = property.name.as_str().to_ascii_uppercase();
        if apply_common(todo.base_mut(), &name, property, zone) {
            continue;
        }
        match name.as_str() {
            "DUE" => {
                if let Some(due) = date_time(property, zone) {
                    todo.set_dt_due(Some(due));
                }
            }
            "DURATION" => {
                if let Some(duration) = parse_duration(property) {
                    todo.base_mut().set_duration(duration);
                }
            }
            "COMPLETED" => {
                if let Some(completed) = date_time(property, zone) {
                    todo.set_completed(Some(completed));
                }
            }
            "PERCENT-COMPLETE" => match property.val.as_str().trim().parse::<u8>() {
                Ok(percent) => todo.set_percent_complete(percent),
                Err(err) => warn!(
                    value = property.val.as_str(),
                    error = %err,
                    "Skipping unreadable progress"
                ),
            },
            _ => trace!(uid = %todo.uid(), property = %name, "Ignoring property"),
        }
    }

    todo.base_mut().reset_dirty_fields();
    Some(todo)
}

/// All-day `DTEND` values are exclusive; events keep the last covered day.
fn inclusive_end(start: Option<CalDateTime>, end: CalDateTime) -> CalDateTime {
    if !end.is_date_only() {
        return end;
    }
    let last = end.add_days(-1);
    match start {
        Some(start) if last < start => start,
        _ => last,
    }
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn split_text_list(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            current.push('\\');
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ',' {
            items.push(unescape_text(&current));
            current.clear();
        } else {
            current.push(c);
        }
    }
    if escaped {
        current.push('\\');
    }
    items.push(unescape_text(&current));
    items.retain(|item| !item.is_empty());
    items
}

// Writing

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

fn date_time_property(name: &str, dt: &CalDateTime) -> Property {
    let (value, tzid) = dt.to_ical();
    let mut property = Property::new(name, value);
    if dt.is_date_only() {
        property.add_parameter("VALUE", "DATE");
    }
    if let Some(tzid) = tzid {
        property.add_parameter("TZID", &tzid);
    }
    property
}

fn write_common<C: Component>(component: &mut C, base: &IncidenceBase) {
    component.add_property("UID", base.uid());
    if let Some(start) = base.dt_start() {
        component.append_property(date_time_property("DTSTART", &start));
    }
    if let Some(rid) = base.recurrence_id() {
        component.append_property(date_time_property("RECURRENCE-ID", rid));
    }
    if !base.summary().is_empty() {
        component.add_property("SUMMARY", escape_text(base.summary()));
    }
    if !base.description().is_empty() {
        component.add_property("DESCRIPTION", escape_text(base.description()));
    }
    if !base.location().is_empty() {
        component.add_property("LOCATION", escape_text(base.location()));
    }
    if !base.categories().is_empty() {
        let categories: Vec<String> = base.categories().iter().map(|c| escape_text(c)).collect();
        component.add_property("CATEGORIES", categories.join(","));
    }

    let recurrence = base.recurrence();
    for rule in recurrence.rrules() {
        component.append_multi_property(Property::new("RRULE", rule.to_string()));
    }
    for rule in recurrence.exrules() {
        component.append_multi_property(Property::new("EXRULE", rule.to_string()));
    }
    for rdate in recurrence.rdates() {
        component.append_multi_property(date_time_property("RDATE", rdate));
    }
    for exdate in recurrence.exdates() {
        component.append_multi_property(date_time_property("EXDATE", exdate));
    }
}

fn event_component(event: &Event) -> icalendar::Event {
    let mut component = icalendar::Event::new();
    write_common(&mut component, event.base());
    if event.has_end_date() {
        if let Some(end) = event.dt_end() {
            let end = if end.is_date_only() {
                end.add_days(1)
            } else {
                end
            };
            component.append_property(date_time_property("DTEND", &end));
        }
    } else if event.base().has_duration() {
        component.add_property("DURATION", event.base().duration().to_string());
    }
    if event.transparency() == Transparency::Transparent {
        component.add_property("TRANSP", "TRANSPARENT");
    }
    component
}

fn todo_component(todo: &Todo) -> icalendar::Todo {
    let mut component = icalendar::Todo::new();
    write_common(&mut component, todo.base());
    if let Some(due) = todo.dt_due() {
        component.append_property(date_time_property("DUE", &due));
    }
    if todo.base().has_duration() {
        component.add_property("DURATION", todo.base().duration().to_string());
    }
    if let Some(completed) = todo.completed() {
        component.append_property(date_time_property("COMPLETED", &completed));
    }
    if todo.percent_complete() > 0 {
        component.add_property("PERCENT-COMPLETE", todo.percent_complete().to_string());
    }
    component
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> CalDateTime {
        CalDateTime::from_utc(Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn load(text: &str) -> (MemoryCalendar, usize) {
        let mut calendar = MemoryCalendar::default();
        let added = parse_calendar(text, &mut calendar).unwrap();
        (calendar, added)
    }

    fn recurring_ics() -> &'static str {
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//pimcal//tests//EN\r\n\
         X-LIBKCAL-TESTSUITE-OUTTZ:Europe/Berlin\r\n\
         BEGIN:VEVENT\r\n\
         UID:weekly-1\r\n\
         DTSTART;TZID=Europe/Berlin:20050703T110000\r\n\
         DTEND;TZID=Europe/Berlin:20050703T120000\r\n\
         RRULE:FREQ=WEEKLY;COUNT=5\r\n\
         EXDATE;TZID=Europe/Berlin:20050710T110000\r\n\
         SUMMARY:Team sync\\, weekly\r\n\
         CATEGORIES:Work,Meetings\r\n\
         TRANSP:TRANSPARENT\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    }

    mod reading {
        use super::*;

        #[test]
        fn reads_recurring_event_in_named_zone() {
            let (calendar, added) = load(recurring_ics());
            assert_eq!(added, 1);
            assert_eq!(
                calendar.custom_property("X-LIBKCAL-TESTSUITE-OUTTZ"),
                Some("Europe/Berlin")
            );

            let event = calendar.event("weekly-1", None).unwrap();
            let start = event.dt_start().unwrap();
            assert_eq!(start, utc(2005, 7, 3, 9, 0, 0));
            assert_eq!(start.zone(), Zone::parse("Europe/Berlin").unwrap());
            assert_eq!(event.dt_end(), Some(utc(2005, 7, 3, 10, 0, 0)));
            assert_eq!(event.summary(), "Team sync, weekly");
            assert_eq!(event.base().categories(), ["Work", "Meetings"]);
            assert_eq!(event.transparency(), Transparency::Transparent);
            assert!(event.base().dirty_fields().is_empty());

            let recurrence = event.recurrence();
            assert_eq!(recurrence.rrules().len(), 1);
            assert_eq!(recurrence.exdates(), [utc(2005, 7, 10, 9, 0, 0)]);
            assert_eq!(
                recurrence.next_date_time(&utc(2005, 7, 3, 9, 0, 0)),
                Some(utc(2005, 7, 17, 9, 0, 0))
            );
        }

        #[test]
        fn all_day_end_becomes_inclusive() {
            let text = "BEGIN:VCALENDAR\r\n\
                        VERSION:2.0\r\n\
                        BEGIN:VEVENT\r\n\
                        UID:holiday\r\n\
                        DTSTART;VALUE=DATE:20250210\r\n\
                        DTEND;VALUE=DATE:20250211\r\n\
                        END:VEVENT\r\n\
                        BEGIN:VEVENT\r\n\
                        UID:trip\r\n\
                        DTSTART;VALUE=DATE:20250210\r\n\
                        DTEND;VALUE=DATE:20250213\r\n\
                        END:VEVENT\r\n\
                        END:VCALENDAR\r\n";
            let (calendar, _) = load(text);

            let holiday = calendar.event("holiday", None).unwrap();
            assert!(holiday.all_day());
            assert_eq!(holiday.date_end(), Some(date(2025, 2, 10)));
            assert!(!holiday.is_multi_day(None));

            let trip = calendar.event("trip", None).unwrap();
            assert_eq!(trip.date_end(), Some(date(2025, 2, 12)));
            assert!(trip.is_multi_day(None));
        }

        #[test]
        fn bad_properties_are_skipped() {
            let text = "BEGIN:VCALENDAR\r\n\
                        VERSION:2.0\r\n\
                        BEGIN:VEVENT\r\n\
                        UID:broken\r\n\
                        DTSTART:20250301T090000Z\r\n\
                        RRULE:FREQ=SOMETIMES\r\n\
                        DURATION:soon\r\n\
                        SUMMARY:Still here\r\n\
                        END:VEVENT\r\n\
                        BEGIN:VEVENT\r\n\
                        SUMMARY:No identity\r\n\
                        END:VEVENT\r\n\
                        END:VCALENDAR\r\n";
            let (calendar, added) = load(text);
            assert_eq!(added, 1);
            let event = calendar.event("broken", None).unwrap();
            assert_eq!(event.summary(), "Still here");
            assert!(!event.recurs());
            assert!(!event.base().has_duration());
        }

        #[test]
        fn duplicates_and_detached_instances() {
            let text = "BEGIN:VCALENDAR\r\n\
                        VERSION:2.0\r\n\
                        BEGIN:VEVENT\r\n\
                        UID:daily\r\n\
                        DTSTART:20250301T090000Z\r\n\
                        RRULE:FREQ=DAILY\r\n\
                        END:VEVENT\r\n\
                        BEGIN:VEVENT\r\n\
                        UID:daily\r\n\
                        DTSTART:20250301T090000Z\r\n\
                        END:VEVENT\r\n\
                        BEGIN:VEVENT\r\n\
                        UID:daily\r\n\
                        RECURRENCE-ID:20250302T090000Z\r\n\
                        DTSTART:20250302T100000Z\r\n\
                        END:VEVENT\r\n\
                        END:VCALENDAR\r\n";
            let (calendar, added) = load(text);
            assert_eq!(added, 2);
            assert!(calendar.event("daily", None).unwrap().recurs());
            let detached = calendar
                .event("daily", Some(&utc(2025, 3, 2, 9, 0, 0)))
                .unwrap();
            assert_eq!(detached.dt_start(), Some(utc(2025, 3, 2, 10, 0, 0)));
        }

        #[test]
        fn reads_todos() {
            let text = "BEGIN:VCALENDAR\r\n\
                        VERSION:2.0\r\n\
                        BEGIN:VTODO\r\n\
                        UID:report\r\n\
                        DUE:20250305T170000Z\r\n\
                        PERCENT-COMPLETE:40\r\n\
                        SUMMARY:Write report\r\n\
                        END:VTODO\r\n\
                        BEGIN:VJOURNAL\r\n\
                        UID:note\r\n\
                        END:VJOURNAL\r\n\
                        END:VCALENDAR\r\n";
            let (calendar, added) = load(text);
            assert_eq!(added, 1);
            let todo = calendar.todo("report", None).unwrap();
            assert_eq!(todo.dt_due(), Some(utc(2025, 3, 5, 17, 0, 0)));
            assert_eq!(todo.percent_complete(), 40);
            assert!(!todo.is_completed());
        }

        #[test]
        fn floating_times_use_calendar_zone() {
            let text = "BEGIN:VCALENDAR\r\n\
                        VERSION:2.0\r\n\
                        BEGIN:VEVENT\r\n\
                        UID:floating\r\n\
                        DTSTART:20250301T090000\r\n\
                        END:VEVENT\r\n\
                        END:VCALENDAR\r\n";
            let mut calendar = MemoryCalendar::new(Zone::parse("Asia/Tokyo").unwrap());
            parse_calendar(text, &mut calendar).unwrap();
            let event = calendar.event("floating", None).unwrap();
            assert_eq!(event.dt_start(), Some(utc(2025, 3, 1, 0, 0, 0)));
        }

        #[test]
        fn rejects_non_calendar_text() {
            let mut calendar = MemoryCalendar::default();
            let err = parse_calendar("hello world", &mut calendar).unwrap_err();
            assert_eq!(err.code(), crate::error::StorageErrorCode::InvalidData);
            assert!(calendar.is_empty());
        }
    }

    mod text {
        use super::*;

        #[test]
        fn escapes() {
            assert_eq!(escape_text("a,b;c\\d\ne"), "a\\,b\\;c\\\\d\\ne");
            assert_eq!(unescape_text("a\\,b\\;c\\\\d\\ne"), "a,b;c\\d\ne");
        }

        #[test]
        fn list_split_respects_escapes() {
            assert_eq!(
                split_text_list("one,two\\,three,,four"),
                vec!["one", "two,three", "four"]
            );
        }
    }

    mod writing {
        use super::*;

        #[test]
        fn round_trips_through_text() {
            let berlin = Zone::parse("Europe/Berlin").unwrap();
            let start = CalDateTime::new(
                date(2005, 7, 3).and_hms_opt(11, 0, 0).unwrap(),
                berlin,
            )
            .unwrap();

            let mut original = MemoryCalendar::default();
            original.set_custom_property("X-LIBKCAL-TESTSUITE-OUTTZ", "Europe/Berlin");
            let mut weekly = Event::new("weekly")
                .with_summary("Weekly sync")
                .with_dt_start(start)
                .with_dt_end(start.add_secs(3600))
                .with_rrule("FREQ=WEEKLY;COUNT=5".parse().unwrap());
            weekly.base_mut().add_exdate(start.add_days(7));
            weekly.set_transparency(Transparency::Transparent);
            original.add_event(weekly);

            let holiday = Event::new("holiday")
                .with_dt_start(CalDateTime::from_date(date(2025, 2, 10), Zone::Utc).unwrap())
                .with_all_day(true)
                .with_duration(Duration::from_days(2));
            original.add_event(holiday);

            let todo = Todo::new("report").with_dt_due(utc(2025, 3, 5, 17, 0, 0));
            original.add_todo(todo);

            let text = write_calendar(&original);
            assert!(text.contains("X-LIBKCAL-TESTSUITE-OUTTZ:Europe/Berlin"));
            assert!(text.contains("TZID=Europe/Berlin"));

            let (reloaded, added) = load(&text);
            assert_eq!(added, 3);
            assert_eq!(
                reloaded.custom_property("X-LIBKCAL-TESTSUITE-OUTTZ"),
                Some("Europe/Berlin")
            );
            assert_eq!(
                reloaded.event("weekly", None),
                original.event("weekly", None)
            );
            assert_eq!(
                reloaded.event("holiday", None),
                original.event("holiday", None)
            );
            assert_eq!(reloaded.todo("report", None), original.todo("report", None));
        }

        #[test]
        fn all_day_end_is_written_exclusive() {
            let mut calendar = MemoryCalendar::default();
            let day = CalDateTime::from_date(date(2025, 2, 10), Zone::Utc).unwrap();
            calendar.add_event(
                Event::new("holiday")
                    .with_dt_start(day)
                    .with_dt_end(day)
                    .with_all_day(true),
            );
            let text = write_calendar(&calendar);
            assert!(text.contains("DTEND;VALUE=DATE:20250211"));
        }
    }
}
