use chrono::NaiveDate;

use crate::model::{CalendarItem, EntryKind, ScheduleEntry};

use super::EngineError;

/// Project one schedule entry into its display shape. Pure — no storage or
/// clock access; the caller supplies the resolved room-type name.
///
/// A booking's title is synthesized as `Booking by {name}`; an event keeps
/// its own title verbatim. An absent or empty room name means the entry
/// dangles (room type deleted out from under it) and is refused rather than
/// rendered blank.
pub fn calendar_item(
    date: NaiveDate,
    entry: &ScheduleEntry,
    room_type_name: Option<&str>,
) -> Result<CalendarItem, EngineError> {
    let room_type_name = match room_type_name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Err(EngineError::MissingRoomType(entry.id)),
    };

    let base = |title: String, contact: Option<String>, description: Option<String>| CalendarItem {
        id: entry.id.to_string(),
        title,
        date: date.format("%Y-%m-%d").to_string(),
        start_time: entry.slot.start.to_string(),
        end_time: entry.slot.end.to_string(),
        kind: entry.kind.kind().as_str(),
        room_type_name,
        contact,
        description,
    };

    Ok(match &entry.kind {
        EntryKind::Booking { name, contact_number } => {
            base(format!("Booking by {name}"), Some(contact_number.clone()), None)
        }
        EntryKind::Event { title, description } => base(
            title.clone(),
            None,
            (!description.is_empty()).then(|| description.clone()),
        ),
    })
}
