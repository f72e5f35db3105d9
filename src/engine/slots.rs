use crate::model::{ClockTime, TimeSlot};

// ── Free-slot algebra ─────────────────────────────────────────────
//
// Pure interval arithmetic over one day's slots. Inputs sorted by start;
// all intervals half-open.

/// Merge sorted overlapping/adjacent slots into disjoint slots.
pub fn merge_slots(sorted: &[TimeSlot]) -> Vec<TimeSlot> {
    let mut merged: Vec<TimeSlot> = Vec::new();
    for &slot in sorted {
        if let Some(last) = merged.last_mut()
            && slot.start <= last.end {
                last.end = last.end.max(slot.end);
                continue;
            }
        merged.push(slot);
    }
    merged
}

/// Subtract `to_remove` (sorted, disjoint) from `base` (sorted, disjoint).
pub fn subtract_slots(base: &[TimeSlot], to_remove: &[TimeSlot]) -> Vec<TimeSlot> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(TimeSlot::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(TimeSlot::new(current_start, current_end));
        }
    }

    result
}

/// The free portions of one day given its occupied slots (sorted by start).
pub fn free_slots_of_day(occupied: &[TimeSlot], min_minutes: Option<u16>) -> Vec<TimeSlot> {
    let day = [TimeSlot::new(ClockTime::MIDNIGHT, ClockTime::END_OF_DAY)];
    let merged = merge_slots(occupied);
    let mut free = subtract_slots(&day, &merged);
    if let Some(min) = min_minutes {
        free.retain(|slot| slot.duration_minutes() >= min);
    }
    free
}
