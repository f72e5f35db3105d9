use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::MAX_QUERY_DAYS;
use crate::model::*;

use super::calendar::{aggregate, CalendarRow};
use super::slots::free_slots_of_day;
use super::{Engine, EngineError};

impl Engine {
    pub fn list_room_types(&self) -> Vec<RoomType> {
        self.store.list_room_types()
    }

    pub fn get_room_type(&self, id: Ulid) -> Result<RoomType, EngineError> {
        self.store
            .find_room_type(&id)
            .ok_or(EngineError::NotFound(id))
    }

    /// All entries for one room/day, sorted by start time.
    pub async fn entries_for_day(
        &self,
        room_type_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleEntry>, EngineError> {
        if !self.store.contains_room_type(&room_type_id) {
            return Err(EngineError::NotFound(room_type_id));
        }
        Ok(self
            .store
            .find_entries_for_room_and_day(room_type_id, date)
            .await)
    }

    /// The merged calendar view: bookings and events across all rooms in
    /// `[from, to]` inclusive, day-grouped and ordered. Each call reads the
    /// live store — nothing is cached between requests.
    pub async fn calendar(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        search: Option<&str>,
    ) -> Result<Vec<CalendarDay>, EngineError> {
        if from > to {
            return Err(EngineError::InvalidRange("dateFrom must not be after dateTo"));
        }
        if (to - from).num_days() >= MAX_QUERY_DAYS {
            return Err(EngineError::LimitExceeded("calendar window too wide"));
        }

        let rows: Vec<CalendarRow> = self
            .store
            .find_entries_in_range(from, to)
            .await
            .into_iter()
            .map(|((room_type_id, date), entry)| {
                let name = self.store.room_type_name(&room_type_id);
                (date, entry, name)
            })
            .collect();

        aggregate(rows, search)
    }

    /// Unreserved windows of one room/day, optionally floored to a minimum
    /// duration in minutes.
    pub async fn free_slots(
        &self,
        room_type_id: Ulid,
        date: NaiveDate,
        min_minutes: Option<u16>,
    ) -> Result<Vec<TimeSlot>, EngineError> {
        if !self.store.contains_room_type(&room_type_id) {
            return Err(EngineError::NotFound(room_type_id));
        }
        let occupied: Vec<TimeSlot> = self
            .store
            .find_entries_for_room_and_day(room_type_id, date)
            .await
            .iter()
            .map(|e| e.slot)
            .collect();
        Ok(free_slots_of_day(&occupied, min_minutes))
    }
}
