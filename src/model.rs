use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Wall-clock time of day as minutes since midnight. Single timezone,
/// no DST reasoning — `"09:30"` is minute 570 everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClockTime(u16);

pub const MINUTES_PER_DAY: u16 = 24 * 60;

impl ClockTime {
    pub const MIDNIGHT: ClockTime = ClockTime(0);
    /// Exclusive end of the day: `24:00`.
    pub const END_OF_DAY: ClockTime = ClockTime(MINUTES_PER_DAY);

    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes <= MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseClockTimeError(pub String);

impl fmt::Display for ParseClockTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid HH:MM time: {:?}", self.0)
    }
}

impl std::error::Error for ParseClockTimeError {}

impl FromStr for ClockTime {
    type Err = ParseClockTimeError;

    /// Accepts 24-hour `HH:MM` (`"9:30"` and `"09:30"` both parse), plus the
    /// exclusive day boundary `"24:00"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseClockTimeError(s.to_string());
        let (h, m) = s.split_once(':').ok_or_else(err)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(err());
        }
        let h: u16 = h.parse().map_err(|_| err())?;
        let m: u16 = m.parse().map_err(|_| err())?;
        match (h, m) {
            (24, 0) => Ok(Self::END_OF_DAY),
            (0..=23, 0..=59) => Ok(Self(h * 60 + m)),
            _ => Err(err()),
        }
    }
}

/// Half-open interval `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeSlot {
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        debug_assert!(start < end, "TimeSlot start must be before end");
        Self { start, end }
    }

    pub fn duration_minutes(&self) -> u16 {
        self.end.minutes() - self.start.minutes()
    }

    /// Half-open intersection: touching endpoints do not overlap, so
    /// back-to-back reservations are allowed.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// What occupies a slot. A booking and an event contend for the same
/// room time — the kinds differ only in payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Booking { name: String, contact_number: String },
    Event { title: String, description: String },
}

/// Kind discriminant, used where only the flavor matters (deletes, wire rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Booking,
    Event,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Booking => "booking",
            Kind::Event => "event",
        }
    }
}

impl EntryKind {
    pub fn kind(&self) -> Kind {
        match self {
            EntryKind::Booking { .. } => Kind::Booking,
            EntryKind::Event { .. } => Kind::Event,
        }
    }
}

/// One reservation on a room/day — bookings and events are both just entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: Ulid,
    pub slot: TimeSlot,
    pub kind: EntryKind,
}

/// A bookable room type. `name` is unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomType {
    pub id: Ulid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image: String,
}

/// The conflict domain key: overlap is enforced exclusively within one
/// `(room type, date)` pair and nowhere across them.
pub type DomainKey = (Ulid, NaiveDate);

/// All entries for one conflict domain, sorted by `slot.start`.
#[derive(Debug, Clone)]
pub struct DayState {
    pub room_type_id: Ulid,
    pub date: NaiveDate,
    pub entries: Vec<ScheduleEntry>,
}

impl DayState {
    pub fn new(room_type_id: Ulid, date: NaiveDate) -> Self {
        Self {
            room_type_id,
            date,
            entries: Vec::new(),
        }
    }

    /// Insert entry maintaining sort order by slot.start.
    pub fn insert_entry(&mut self, entry: ScheduleEntry) {
        let pos = self
            .entries
            .binary_search_by_key(&entry.slot.start, |e| e.slot.start)
            .unwrap_or_else(|e| e);
        self.entries.insert(pos, entry);
    }

    /// Remove entry by id.
    pub fn remove_entry(&mut self, id: Ulid) -> Option<ScheduleEntry> {
        if let Some(pos) = self.entries.iter().position(|e| e.id == id) {
            Some(self.entries.remove(pos))
        } else {
            None
        }
    }

    pub fn find_entry(&self, id: Ulid) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Return only entries whose slot overlaps the query window.
    /// Uses binary search to skip entries starting at or after `query.end`.
    pub fn overlapping(&self, query: &TimeSlot) -> impl Iterator<Item = &ScheduleEntry> {
        // Everything at index >= right_bound starts at or after query.end → can't overlap.
        let right_bound = self
            .entries
            .partition_point(|e| e.slot.start < query.end);
        self.entries[..right_bound]
            .iter()
            .filter(move |e| e.slot.end > query.start)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    RoomTypeCreated {
        id: Ulid,
        name: String,
        description: String,
        price: f64,
        image: String,
    },
    RoomTypeUpdated {
        id: Ulid,
        name: String,
        description: String,
        price: f64,
        image: String,
    },
    RoomTypeDeleted {
        id: Ulid,
    },
    BookingPlaced {
        id: Ulid,
        room_type_id: Ulid,
        date: NaiveDate,
        slot: TimeSlot,
        name: String,
        contact_number: String,
    },
    EventScheduled {
        id: Ulid,
        room_type_id: Ulid,
        date: NaiveDate,
        slot: TimeSlot,
        title: String,
        description: String,
    },
    /// Full replacement; `room_type_id`/`date` may differ from where the
    /// entry currently lives (a move between conflict domains).
    EventUpdated {
        id: Ulid,
        room_type_id: Ulid,
        date: NaiveDate,
        slot: TimeSlot,
        title: String,
        description: String,
    },
    EntryRemoved {
        id: Ulid,
        room_type_id: Ulid,
        date: NaiveDate,
    },
}

impl Event {
    /// The room whose watchers should hear about this event.
    pub fn room_type_id(&self) -> Ulid {
        match self {
            Event::RoomTypeCreated { id, .. }
            | Event::RoomTypeUpdated { id, .. }
            | Event::RoomTypeDeleted { id } => *id,
            Event::BookingPlaced { room_type_id, .. }
            | Event::EventScheduled { room_type_id, .. }
            | Event::EventUpdated { room_type_id, .. }
            | Event::EntryRemoved { room_type_id, .. } => *room_type_id,
        }
    }
}

// ── Calendar projection ──────────────────────────────────────────

/// Display-oriented projection of a ScheduleEntry, shaped for the calendar
/// consumers: ISO day string, `HH:MM` times, synthesized booking titles.
/// Derived fresh on every aggregation; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarItem {
    pub id: String,
    pub title: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub kind: &'static str,
    pub room_type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One calendar day with at least one item, items ordered by start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: String,
    pub items: Vec<CalendarItem>,
}
