use ulid::Ulid;

use crate::model::{DayState, TimeSlot};

use super::EngineError;

pub(crate) fn validate_slot(slot: &TimeSlot) -> Result<(), EngineError> {
    if slot.start >= slot.end {
        return Err(EngineError::InvalidRange("start time must be before end time"));
    }
    Ok(())
}

/// The conflict predicate: a candidate slot is rejected iff some existing
/// entry in the same `(room type, date)` domain satisfies
/// `existing.start < candidate.end && existing.end > candidate.start`.
/// Bookings and events share one domain — either kind blocks the other.
/// Fails fast on the first overlap found.
pub(crate) fn check_no_conflict(
    day: &DayState,
    slot: &TimeSlot,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    for entry in day.overlapping(slot) {
        if exclude == Some(entry.id) {
            continue; // updating an entry never conflicts with itself
        }
        return Err(EngineError::SlotTaken(entry.id));
    }
    Ok(())
}
