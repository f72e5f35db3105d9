use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, validate_slot};
use super::{Engine, EngineError};

impl Engine {
    // ── Room types ───────────────────────────────────────────

    pub async fn create_room_type(
        &self,
        id: Ulid,
        name: String,
        description: String,
        price: f64,
        image: String,
    ) -> Result<RoomType, EngineError> {
        if self.store.room_type_count() >= MAX_ROOM_TYPES {
            return Err(EngineError::LimitExceeded("too many room types"));
        }
        validate_room_type_fields(&name, &description, &image)?;
        if self.store.contains_room_type(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if self.store.name_taken(&name, None) {
            return Err(EngineError::DuplicateName(name));
        }

        let event = Event::RoomTypeCreated {
            id,
            name: name.clone(),
            description: description.clone(),
            price,
            image: image.clone(),
        };
        self.wal_append(&event).await?;
        let room_type = RoomType { id, name, description, price, image };
        self.store.insert_room_type(room_type.clone());
        self.notify.send(id, &event);
        Ok(room_type)
    }

    pub async fn update_room_type(
        &self,
        id: Ulid,
        name: String,
        description: String,
        price: f64,
        image: String,
    ) -> Result<RoomType, EngineError> {
        validate_room_type_fields(&name, &description, &image)?;
        if !self.store.contains_room_type(&id) {
            return Err(EngineError::NotFound(id));
        }
        if self.store.name_taken(&name, Some(id)) {
            return Err(EngineError::DuplicateName(name));
        }

        let event = Event::RoomTypeUpdated {
            id,
            name: name.clone(),
            description: description.clone(),
            price,
            image: image.clone(),
        };
        self.wal_append(&event).await?;
        let room_type = RoomType { id, name, description, price, image };
        self.store.insert_room_type(room_type.clone());
        self.notify.send(id, &event);
        Ok(room_type)
    }

    /// Deleting a room type that bookings or events still reference is
    /// forbidden; callers must clear the schedule first.
    pub async fn delete_room_type(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.store.contains_room_type(&id) {
            return Err(EngineError::NotFound(id));
        }
        if self.store.room_type_referenced(&id) {
            return Err(EngineError::RoomTypeInUse(id));
        }

        let event = Event::RoomTypeDeleted { id };
        self.wal_append(&event).await?;
        self.store.remove_room_type(&id);
        self.notify.send(id, &event);
        Ok(())
    }

    // ── Submissions (check-and-reserve) ──────────────────────

    /// Reserve a slot for a named requester. Validation happens before any
    /// lock or WAL access; the conflict check and insert run under the
    /// `(room type, date)` domain's write lock, so overlapping concurrent
    /// submissions serialize and exactly one wins.
    pub async fn place_booking(
        &self,
        id: Ulid,
        room_type_id: Ulid,
        date: NaiveDate,
        slot: TimeSlot,
        name: String,
        contact_number: String,
    ) -> Result<ScheduleEntry, EngineError> {
        validate_slot(&slot)?;
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("booking name length"));
        }
        if contact_number.is_empty() || contact_number.len() > MAX_CONTACT_LEN {
            return Err(EngineError::LimitExceeded("contact number length"));
        }
        if !self.store.contains_room_type(&room_type_id) {
            return Err(EngineError::NotFound(room_type_id));
        }
        if self.store.contains_entry(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let day = self.store.day_state_or_create((room_type_id, date));
        let mut guard = day.write().await;
        if guard.entries.len() >= MAX_ENTRIES_PER_DAY {
            return Err(EngineError::LimitExceeded("too many entries on this day"));
        }

        check_no_conflict(&guard, &slot, None)?;

        let event = Event::BookingPlaced {
            id,
            room_type_id,
            date,
            slot,
            name,
            contact_number,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(guard.find_entry(id).cloned().expect("entry just inserted"))
    }

    /// Place a fixed event. Events and bookings share one conflict domain —
    /// an event blocks bookings on the same room/day window and vice versa.
    pub async fn schedule_event(
        &self,
        id: Ulid,
        room_type_id: Ulid,
        date: NaiveDate,
        slot: TimeSlot,
        title: String,
        description: String,
    ) -> Result<ScheduleEntry, EngineError> {
        validate_slot(&slot)?;
        validate_event_fields(&title, &description)?;
        if !self.store.contains_room_type(&room_type_id) {
            return Err(EngineError::NotFound(room_type_id));
        }
        if self.store.contains_entry(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let day = self.store.day_state_or_create((room_type_id, date));
        let mut guard = day.write().await;
        if guard.entries.len() >= MAX_ENTRIES_PER_DAY {
            return Err(EngineError::LimitExceeded("too many entries on this day"));
        }

        check_no_conflict(&guard, &slot, None)?;

        let event = Event::EventScheduled {
            id,
            room_type_id,
            date,
            slot,
            title,
            description,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(guard.find_entry(id).cloned().expect("entry just inserted"))
    }

    /// Replace an event's fields, re-running the conflict check with the
    /// entry itself excluded. A changed room/date moves the entry between
    /// conflict domains; both domains are locked in sorted key order.
    pub async fn update_event(
        &self,
        id: Ulid,
        room_type_id: Ulid,
        date: NaiveDate,
        slot: TimeSlot,
        title: String,
        description: String,
    ) -> Result<ScheduleEntry, EngineError> {
        validate_slot(&slot)?;
        validate_event_fields(&title, &description)?;
        if !self.store.contains_room_type(&room_type_id) {
            return Err(EngineError::NotFound(room_type_id));
        }

        let old_key = self
            .store
            .domain_for_entry(&id)
            .ok_or(EngineError::NotFound(id))?;
        let new_key = (room_type_id, date);

        let event = Event::EventUpdated {
            id,
            room_type_id,
            date,
            slot,
            title,
            description,
        };

        if old_key == new_key {
            let day = self
                .store
                .day_state(&old_key)
                .ok_or(EngineError::NotFound(id))?;
            let mut guard = day.write().await;
            match guard.find_entry(id) {
                Some(entry) if entry.kind.kind() == Kind::Event => {}
                _ => return Err(EngineError::NotFound(id)),
            }
            check_no_conflict(&guard, &slot, Some(id))?;
            self.persist_and_apply(&mut guard, &event).await?;
            return Ok(guard.find_entry(id).cloned().expect("entry just updated"));
        }

        // Cross-domain move: acquire both write locks in sorted key order
        // so two concurrent movers cannot deadlock.
        let old_day = self
            .store
            .day_state(&old_key)
            .ok_or(EngineError::NotFound(id))?;
        let new_day = self.store.day_state_or_create(new_key);

        let (mut old_guard, mut new_guard) = if old_key < new_key {
            let a = old_day.write_owned().await;
            let b = new_day.write_owned().await;
            (a, b)
        } else {
            let b = new_day.write_owned().await;
            let a = old_day.write_owned().await;
            (a, b)
        };

        match old_guard.find_entry(id) {
            Some(entry) if entry.kind.kind() == Kind::Event => {}
            _ => return Err(EngineError::NotFound(id)),
        }
        if new_guard.entries.len() >= MAX_ENTRIES_PER_DAY {
            return Err(EngineError::LimitExceeded("too many entries on this day"));
        }
        check_no_conflict(&new_guard, &slot, None)?;

        self.wal_append(&event).await?;
        old_guard.remove_entry(id);
        self.store.apply(&mut new_guard, &event);
        self.notify.send(old_key.0, &event);
        self.notify.send(new_key.0, &event);
        Ok(new_guard.find_entry(id).cloned().expect("entry just moved"))
    }

    /// Delete a booking or event by id. The kind must match: deleting an
    /// event id through the booking surface is NotFound.
    pub async fn remove_entry(&self, kind: Kind, id: Ulid) -> Result<(), EngineError> {
        let (key, mut guard) = self.resolve_entry_write(&id).await?;
        match guard.find_entry(id) {
            Some(entry) if entry.kind.kind() == kind => {}
            _ => return Err(EngineError::NotFound(id)),
        }

        let event = Event::EntryRemoved {
            id,
            room_type_id: key.0,
            date: key.1,
        };
        self.persist_and_apply(&mut guard, &event).await
    }
}

fn validate_room_type_fields(
    name: &str,
    description: &str,
    image: &str,
) -> Result<(), EngineError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("room type name length"));
    }
    if description.len() > MAX_TEXT_LEN {
        return Err(EngineError::LimitExceeded("room type description length"));
    }
    if image.len() > MAX_IMAGE_URL_LEN {
        return Err(EngineError::LimitExceeded("image URL length"));
    }
    Ok(())
}

fn validate_event_fields(title: &str, description: &str) -> Result<(), EngineError> {
    if title.is_empty() || title.len() > MAX_TITLE_LEN {
        return Err(EngineError::LimitExceeded("event title length"));
    }
    if description.len() > MAX_TEXT_LEN {
        return Err(EngineError::LimitExceeded("event description length"));
    }
    Ok(())
}
