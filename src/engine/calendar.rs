use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{CalendarDay, ScheduleEntry};

use super::format::calendar_item;
use super::EngineError;

/// One aggregation input: an entry, the day it lives on, and its resolved
/// room-type name (None if the room type is gone — the formatter refuses it).
pub type CalendarRow = (NaiveDate, ScheduleEntry, Option<String>);

/// Merge bookings and events into day-bucketed calendar items.
///
/// Pure and deterministic: identical input always yields identical output.
/// Ordering is by date ascending, then start time ascending compared as
/// minutes-of-day (never as strings — `"9:00"` sorts before `"10:00"`),
/// with the entry id as a stable tie-break for identical start times.
/// `search`, when present, matches case-insensitively against the item
/// title and room-type name; non-matching items are dropped before
/// grouping. Only days left with at least one item are emitted.
pub fn aggregate(
    rows: Vec<CalendarRow>,
    search: Option<&str>,
) -> Result<Vec<CalendarDay>, EngineError> {
    struct Keyed {
        date: NaiveDate,
        start_minutes: u16,
        id: Ulid,
        item: crate::model::CalendarItem,
    }

    let needle = search.map(str::to_lowercase).filter(|s| !s.is_empty());

    let mut keyed = Vec::with_capacity(rows.len());
    for (date, entry, room_type_name) in rows {
        let item = calendar_item(date, &entry, room_type_name.as_deref())?;

        if let Some(needle) = &needle {
            let matches = item.title.to_lowercase().contains(needle)
                || item.room_type_name.to_lowercase().contains(needle);
            if !matches {
                continue;
            }
        }

        keyed.push(Keyed {
            date,
            start_minutes: entry.slot.start.minutes(),
            id: entry.id,
            item,
        });
    }

    keyed.sort_by_key(|k| (k.date, k.start_minutes, k.id));

    let mut days: Vec<CalendarDay> = Vec::new();
    for k in keyed {
        let date = k.date.format("%Y-%m-%d").to_string();
        match days.last_mut() {
            Some(day) if day.date == date => day.items.push(k.item),
            _ => days.push(CalendarDay {
                date,
                items: vec![k.item],
            }),
        }
    }

    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClockTime, EntryKind, TimeSlot};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn slot(start: &str, end: &str) -> TimeSlot {
        TimeSlot::new(
            start.parse::<ClockTime>().unwrap(),
            end.parse::<ClockTime>().unwrap(),
        )
    }

    fn booking_row(date: &str, start: &str, end: &str, room: &str) -> CalendarRow {
        (
            d(date),
            ScheduleEntry {
                id: Ulid::new(),
                slot: slot(start, end),
                kind: EntryKind::Booking {
                    name: "Dana".into(),
                    contact_number: "555-0100".into(),
                },
            },
            Some(room.into()),
        )
    }

    fn event_row(date: &str, start: &str, end: &str, title: &str, room: &str) -> CalendarRow {
        (
            d(date),
            ScheduleEntry {
                id: Ulid::new(),
                slot: slot(start, end),
                kind: EntryKind::Event {
                    title: title.into(),
                    description: String::new(),
                },
            },
            Some(room.into()),
        )
    }

    #[test]
    fn sorts_numerically_not_lexicographically() {
        let rows = vec![
            booking_row("2024-06-01", "10:30", "11:00", "Hall"),
            booking_row("2024-06-01", "9:30", "10:00", "Hall"),
            booking_row("2024-06-01", "09:00", "09:30", "Hall"),
        ];
        let days = aggregate(rows, None).unwrap();
        assert_eq!(days.len(), 1);
        let starts: Vec<_> = days[0].items.iter().map(|i| i.start_time.as_str()).collect();
        assert_eq!(starts, ["09:00", "09:30", "10:30"]);
    }

    #[test]
    fn groups_by_day_ascending_skipping_empty() {
        let rows = vec![
            event_row("2024-06-03", "09:00", "10:00", "Later", "Hall"),
            booking_row("2024-06-01", "09:00", "10:00", "Hall"),
        ];
        let days = aggregate(rows, None).unwrap();
        let dates: Vec<_> = days.iter().map(|day| day.date.as_str()).collect();
        assert_eq!(dates, ["2024-06-01", "2024-06-03"]); // no empty 06-02 bucket
    }

    #[test]
    fn merges_both_kinds_into_one_stream() {
        let rows = vec![
            event_row("2024-06-01", "11:00", "12:00", "Maintenance", "Hall"),
            booking_row("2024-06-01", "09:00", "10:00", "Hall"),
        ];
        let days = aggregate(rows, None).unwrap();
        let kinds: Vec<_> = days[0].items.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, ["booking", "event"]);
    }

    #[test]
    fn search_matches_title_and_room_name_case_insensitively() {
        let rows = vec![
            event_row("2024-06-01", "09:00", "10:00", "Quarterly Review", "Hall"),
            event_row("2024-06-01", "11:00", "12:00", "Standup", "Garden Suite"),
            event_row("2024-06-01", "13:00", "14:00", "Standup", "Hall"),
        ];

        let by_title = aggregate(rows.clone(), Some("qUaRtErLy")).unwrap();
        assert_eq!(by_title[0].items.len(), 1);
        assert_eq!(by_title[0].items[0].title, "Quarterly Review");

        let by_room = aggregate(rows.clone(), Some("garden")).unwrap();
        assert_eq!(by_room[0].items.len(), 1);
        assert_eq!(by_room[0].items[0].room_type_name, "Garden Suite");

        let nothing = aggregate(rows, Some("penthouse")).unwrap();
        assert!(nothing.is_empty());
    }

    #[test]
    fn blank_search_is_no_filter() {
        let rows = vec![booking_row("2024-06-01", "09:00", "10:00", "Hall")];
        let days = aggregate(rows, Some("")).unwrap();
        assert_eq!(days[0].items.len(), 1);
    }

    #[test]
    fn deterministic_and_idempotent() {
        let rows = vec![
            booking_row("2024-06-02", "10:00", "11:00", "Hall"),
            event_row("2024-06-01", "09:00", "10:00", "Setup", "Hall"),
            booking_row("2024-06-01", "14:00", "15:00", "Hall"),
        ];
        let first = aggregate(rows.clone(), None).unwrap();
        let second = aggregate(rows, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn identical_start_times_tie_break_stably() {
        // Two rooms, same slot — order must be the same on every call.
        let a = booking_row("2024-06-01", "09:00", "10:00", "Hall");
        let b = event_row("2024-06-01", "09:00", "10:00", "Setup", "Suite");
        let once = aggregate(vec![a.clone(), b.clone()], None).unwrap();
        let swapped = aggregate(vec![b, a], None).unwrap();
        assert_eq!(once, swapped);
    }

    #[test]
    fn dangling_room_type_fails_aggregation() {
        let mut row = booking_row("2024-06-01", "09:00", "10:00", "Hall");
        row.2 = None;
        assert!(matches!(
            aggregate(vec![row], None),
            Err(EngineError::MissingRoomType(_))
        ));
    }
}
