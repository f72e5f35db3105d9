use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

pub type SharedDayState = Arc<RwLock<DayState>>;

/// The schedule store: room-type table, one `DayState` per `(room type, date)`
/// conflict domain, and the entry → domain index used for deletes and updates.
///
/// Each domain's `RwLock` is the serialization point the conflict check relies
/// on: check-then-insert runs under that domain's write lock, so two
/// overlapping submissions on the same room/day cannot both pass, while
/// submissions on disjoint domains never contend.
pub struct ScheduleStore {
    room_types: DashMap<Ulid, RoomType>,
    days: DashMap<DomainKey, SharedDayState>,
    entry_domains: DashMap<Ulid, DomainKey>,
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self {
            room_types: DashMap::new(),
            days: DashMap::new(),
            entry_domains: DashMap::new(),
        }
    }

    // ── Room types ───────────────────────────────────────────

    pub fn room_type_count(&self) -> usize {
        self.room_types.len()
    }

    pub fn contains_room_type(&self, id: &Ulid) -> bool {
        self.room_types.contains_key(id)
    }

    pub fn find_room_type(&self, id: &Ulid) -> Option<RoomType> {
        self.room_types.get(id).map(|e| e.value().clone())
    }

    pub fn room_type_name(&self, id: &Ulid) -> Option<String> {
        self.room_types.get(id).map(|e| e.value().name.clone())
    }

    /// True if another room type (different id) already uses this name.
    pub fn name_taken(&self, name: &str, excluding: Option<Ulid>) -> bool {
        self.room_types
            .iter()
            .any(|e| e.value().name == name && excluding != Some(*e.key()))
    }

    pub fn insert_room_type(&self, room_type: RoomType) {
        self.room_types.insert(room_type.id, room_type);
    }

    pub fn remove_room_type(&self, id: &Ulid) {
        self.room_types.remove(id);
        self.days.retain(|(room, _), _| room != id);
    }

    pub fn list_room_types(&self) -> Vec<RoomType> {
        let mut all: Vec<RoomType> = self.room_types.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|rt| rt.id);
        all
    }

    /// True if any conflict domain of this room type still holds entries.
    pub fn room_type_referenced(&self, id: &Ulid) -> bool {
        self.entry_domains.iter().any(|e| e.value().0 == *id)
    }

    // ── Conflict domains ─────────────────────────────────────

    pub fn day_state(&self, key: &DomainKey) -> Option<SharedDayState> {
        self.days.get(key).map(|e| e.value().clone())
    }

    /// Get or lazily create the day state for a conflict domain.
    pub fn day_state_or_create(&self, key: DomainKey) -> SharedDayState {
        self.days
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(DayState::new(key.0, key.1))))
            .value()
            .clone()
    }

    // ── Entry index ──────────────────────────────────────────

    pub fn domain_for_entry(&self, entry_id: &Ulid) -> Option<DomainKey> {
        self.entry_domains.get(entry_id).map(|e| *e.value())
    }

    pub fn contains_entry(&self, entry_id: &Ulid) -> bool {
        self.entry_domains.contains_key(entry_id)
    }

    pub fn map_entry(&self, entry_id: Ulid, key: DomainKey) {
        self.entry_domains.insert(entry_id, key);
    }

    pub fn unmap_entry(&self, entry_id: &Ulid) {
        self.entry_domains.remove(entry_id);
    }

    // ── Reads ────────────────────────────────────────────────

    /// All entries for one room/day, sorted by start time. Always a fresh
    /// read — nothing is cached across calls.
    pub async fn find_entries_for_room_and_day(
        &self,
        room_type_id: Ulid,
        date: NaiveDate,
    ) -> Vec<ScheduleEntry> {
        match self.day_state(&(room_type_id, date)) {
            Some(day) => day.read().await.entries.clone(),
            None => Vec::new(),
        }
    }

    /// All entries of every room whose date falls in `[from, to]`, tagged
    /// with their domain key. Order is unspecified; the aggregator sorts.
    pub async fn find_entries_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<(DomainKey, ScheduleEntry)> {
        let keys: Vec<DomainKey> = self
            .days
            .iter()
            .map(|e| *e.key())
            .filter(|(_, date)| *date >= from && *date <= to)
            .collect();

        let mut out = Vec::new();
        for key in keys {
            if let Some(day) = self.day_state(&key) {
                let guard = day.read().await;
                out.extend(guard.entries.iter().cloned().map(|entry| (key, entry)));
            }
        }
        out
    }

    // ── Event application ────────────────────────────────────

    /// Apply an entry-level event to a day state the caller has locked.
    /// Room-type events and cross-domain moves are handled at the engine
    /// level, not here.
    pub fn apply(&self, day: &mut DayState, event: &Event) {
        match event {
            Event::BookingPlaced {
                id,
                room_type_id,
                date,
                slot,
                name,
                contact_number,
            } => {
                day.insert_entry(ScheduleEntry {
                    id: *id,
                    slot: *slot,
                    kind: EntryKind::Booking {
                        name: name.clone(),
                        contact_number: contact_number.clone(),
                    },
                });
                self.map_entry(*id, (*room_type_id, *date));
            }
            Event::EventScheduled {
                id,
                room_type_id,
                date,
                slot,
                title,
                description,
            }
            | Event::EventUpdated {
                id,
                room_type_id,
                date,
                slot,
                title,
                description,
            } => {
                day.remove_entry(*id); // no-op for a fresh schedule, replace for an update
                day.insert_entry(ScheduleEntry {
                    id: *id,
                    slot: *slot,
                    kind: EntryKind::Event {
                        title: title.clone(),
                        description: description.clone(),
                    },
                });
                self.map_entry(*id, (*room_type_id, *date));
            }
            Event::EntryRemoved { id, .. } => {
                day.remove_entry(*id);
                self.unmap_entry(id);
            }
            Event::RoomTypeCreated { .. }
            | Event::RoomTypeUpdated { .. }
            | Event::RoomTypeDeleted { .. } => {}
        }
    }
}
