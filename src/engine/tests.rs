use super::*;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::notify::NotifyHub;

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("roomcal_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn new_engine(name: &str) -> Engine {
    let notify = Arc::new(NotifyHub::new());
    Engine::new(test_wal_path(name), notify).unwrap()
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn slot(start: &str, end: &str) -> TimeSlot {
    TimeSlot::new(start.parse().unwrap(), end.parse().unwrap())
}

async fn make_room(engine: &Engine, name: &str) -> Ulid {
    let id = Ulid::new();
    engine
        .create_room_type(
            id,
            name.into(),
            "a room".into(),
            50.0,
            "/img/room.jpg".into(),
        )
        .await
        .unwrap();
    id
}

async fn book(
    engine: &Engine,
    room: Ulid,
    date: &str,
    start: &str,
    end: &str,
) -> Result<ScheduleEntry, EngineError> {
    engine
        .place_booking(
            Ulid::new(),
            room,
            d(date),
            slot(start, end),
            "Dana".into(),
            "555-0100".into(),
        )
        .await
}

async fn event(
    engine: &Engine,
    room: Ulid,
    date: &str,
    start: &str,
    end: &str,
    title: &str,
) -> Result<ScheduleEntry, EngineError> {
    engine
        .schedule_event(
            Ulid::new(),
            room,
            d(date),
            slot(start, end),
            title.into(),
            String::new(),
        )
        .await
}

// ── Room types ───────────────────────────────────────────

#[tokio::test]
async fn room_type_create_and_get() {
    let engine = new_engine("rt_create.wal");
    let id = make_room(&engine, "Standard").await;

    let rt = engine.get_room_type(id).unwrap();
    assert_eq!(rt.name, "Standard");
    assert_eq!(rt.price, 50.0);
}

#[tokio::test]
async fn room_type_duplicate_id_rejected() {
    let engine = new_engine("rt_dup_id.wal");
    let id = make_room(&engine, "Standard").await;
    let result = engine
        .create_room_type(id, "Other".into(), String::new(), 10.0, String::new())
        .await;
    assert!(matches!(result, Err(EngineError::AlreadyExists(_))));
}

#[tokio::test]
async fn room_type_duplicate_name_rejected() {
    let engine = new_engine("rt_dup_name.wal");
    make_room(&engine, "Standard").await;
    let result = engine
        .create_room_type(Ulid::new(), "Standard".into(), String::new(), 10.0, String::new())
        .await;
    assert!(matches!(result, Err(EngineError::DuplicateName(_))));
}

#[tokio::test]
async fn room_type_update() {
    let engine = new_engine("rt_update.wal");
    let id = make_room(&engine, "Standard").await;

    engine
        .update_room_type(id, "Deluxe".into(), "renovated".into(), 80.0, "/img/deluxe.jpg".into())
        .await
        .unwrap();

    let rt = engine.get_room_type(id).unwrap();
    assert_eq!(rt.name, "Deluxe");
    assert_eq!(rt.price, 80.0);
}

#[tokio::test]
async fn room_type_update_keeps_own_name() {
    let engine = new_engine("rt_update_own_name.wal");
    let id = make_room(&engine, "Standard").await;
    // Re-using its own name is not a duplicate
    engine
        .update_room_type(id, "Standard".into(), "new text".into(), 55.0, String::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn room_type_update_to_taken_name_rejected() {
    let engine = new_engine("rt_update_taken.wal");
    make_room(&engine, "Standard").await;
    let other = make_room(&engine, "Deluxe").await;
    let result = engine
        .update_room_type(other, "Standard".into(), String::new(), 80.0, String::new())
        .await;
    assert!(matches!(result, Err(EngineError::DuplicateName(_))));
}

#[tokio::test]
async fn room_type_delete() {
    let engine = new_engine("rt_delete.wal");
    let id = make_room(&engine, "Standard").await;
    engine.delete_room_type(id).await.unwrap();
    assert!(matches!(
        engine.get_room_type(id),
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        engine.delete_room_type(id).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn room_type_delete_while_referenced_fails() {
    let engine = new_engine("rt_delete_ref.wal");
    let room = make_room(&engine, "Standard").await;
    let entry = book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();

    assert!(matches!(
        engine.delete_room_type(room).await,
        Err(EngineError::RoomTypeInUse(_))
    ));

    // Clearing the schedule unblocks deletion
    engine.remove_entry(Kind::Booking, entry.id).await.unwrap();
    engine.delete_room_type(room).await.unwrap();
}

#[tokio::test]
async fn list_room_types_is_stable() {
    let engine = new_engine("rt_list.wal");
    make_room(&engine, "A").await;
    make_room(&engine, "B").await;
    make_room(&engine, "C").await;
    let first = engine.list_room_types();
    let second = engine.list_room_types();
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

// ── Bookings & conflicts ─────────────────────────────────

#[tokio::test]
async fn booking_for_unknown_room_fails() {
    let engine = new_engine("bk_unknown_room.wal");
    let result = book(&engine, Ulid::new(), "2024-06-01", "09:00", "10:00").await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn booking_invalid_range_rejected_before_store() {
    let engine = new_engine("bk_invalid_range.wal");
    // Room doesn't even exist — the range check must fire first
    let result = engine
        .place_booking(
            Ulid::new(),
            Ulid::new(),
            d("2024-06-01"),
            TimeSlot {
                start: "10:00".parse().unwrap(),
                end: "09:00".parse().unwrap(),
            },
            "Dana".into(),
            "555-0100".into(),
        )
        .await;
    assert!(matches!(result, Err(EngineError::InvalidRange(_))));
}

#[tokio::test]
async fn non_overlapping_bookings_coexist() {
    let engine = new_engine("bk_coexist.wal");
    let room = make_room(&engine, "Standard").await;

    let first = book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();
    book(&engine, room, "2024-06-01", "11:00", "12:00").await.unwrap();

    // The second submission never deletes or mutates the first
    let entries = engine.entries_for_day(room, d("2024-06-01")).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], first);
}

#[tokio::test]
async fn overlapping_booking_rejected() {
    let engine = new_engine("bk_overlap.wal");
    let room = make_room(&engine, "Standard").await;

    let first = book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();
    let result = book(&engine, room, "2024-06-01", "09:30", "10:30").await;
    match result {
        Err(EngineError::SlotTaken(blocker)) => assert_eq!(blocker, first.id),
        other => panic!("expected SlotTaken, got {other:?}"),
    }

    // Failure leaves no partial entry behind
    let entries = engine.entries_for_day(room, d("2024-06-01")).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn touching_boundary_is_allowed() {
    let engine = new_engine("bk_boundary.wal");
    let room = make_room(&engine, "Standard").await;

    book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();
    book(&engine, room, "2024-06-01", "10:00", "11:00").await.unwrap();

    let entries = engine.entries_for_day(room, d("2024-06-01")).await.unwrap();
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn overlap_rejected_then_back_to_back_accepted() {
    let engine = new_engine("bk_scenario.wal");
    let room = make_room(&engine, "r1").await;

    book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();
    assert!(matches!(
        book(&engine, room, "2024-06-01", "09:30", "10:30").await,
        Err(EngineError::SlotTaken(_))
    ));
    book(&engine, room, "2024-06-01", "10:00", "11:00").await.unwrap();
}

#[tokio::test]
async fn cross_kind_conflicts_both_directions() {
    let engine = new_engine("cross_kind.wal");
    let room = make_room(&engine, "Standard").await;

    event(&engine, room, "2024-06-01", "14:00", "15:00", "Maintenance").await.unwrap();
    assert!(matches!(
        book(&engine, room, "2024-06-01", "14:30", "15:30").await,
        Err(EngineError::SlotTaken(_))
    ));

    book(&engine, room, "2024-06-02", "14:00", "15:00").await.unwrap();
    assert!(matches!(
        event(&engine, room, "2024-06-02", "14:30", "15:30", "Maintenance").await,
        Err(EngineError::SlotTaken(_))
    ));
}

#[tokio::test]
async fn disjoint_domains_do_not_conflict() {
    let engine = new_engine("disjoint_domains.wal");
    let room_a = make_room(&engine, "A").await;
    let room_b = make_room(&engine, "B").await;

    // Same slot, different room
    book(&engine, room_a, "2024-06-01", "09:00", "10:00").await.unwrap();
    book(&engine, room_b, "2024-06-01", "09:00", "10:00").await.unwrap();

    // Same slot, same room, different date
    book(&engine, room_a, "2024-06-02", "09:00", "10:00").await.unwrap();
}

#[tokio::test]
async fn duplicate_entry_id_rejected() {
    let engine = new_engine("dup_entry_id.wal");
    let room = make_room(&engine, "Standard").await;
    let id = Ulid::new();
    engine
        .place_booking(id, room, d("2024-06-01"), slot("09:00", "10:00"), "Dana".into(), "555".into())
        .await
        .unwrap();
    let result = engine
        .place_booking(id, room, d("2024-06-02"), slot("09:00", "10:00"), "Dana".into(), "555".into())
        .await;
    assert!(matches!(result, Err(EngineError::AlreadyExists(_))));
}

// ── Event updates ────────────────────────────────────────

#[tokio::test]
async fn event_update_in_place() {
    let engine = new_engine("ev_update.wal");
    let room = make_room(&engine, "Standard").await;
    let e = event(&engine, room, "2024-06-01", "09:00", "10:00", "Setup").await.unwrap();

    let updated = engine
        .update_event(e.id, room, d("2024-06-01"), slot("09:30", "10:30"), "Teardown".into(), "moved".into())
        .await
        .unwrap();
    assert_eq!(updated.slot, slot("09:30", "10:30"));

    let entries = engine.entries_for_day(room, d("2024-06-01")).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(matches!(&entries[0].kind, EntryKind::Event { title, .. } if title == "Teardown"));
}

#[tokio::test]
async fn event_update_does_not_conflict_with_itself() {
    let engine = new_engine("ev_update_self.wal");
    let room = make_room(&engine, "Standard").await;
    let e = event(&engine, room, "2024-06-01", "09:00", "10:00", "Setup").await.unwrap();

    // Same slot it already occupies
    engine
        .update_event(e.id, room, d("2024-06-01"), slot("09:00", "10:00"), "Setup".into(), String::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn event_update_into_conflict_rejected() {
    let engine = new_engine("ev_update_conflict.wal");
    let room = make_room(&engine, "Standard").await;
    let e = event(&engine, room, "2024-06-01", "09:00", "10:00", "Setup").await.unwrap();
    book(&engine, room, "2024-06-01", "11:00", "12:00").await.unwrap();

    let result = engine
        .update_event(e.id, room, d("2024-06-01"), slot("11:30", "12:30"), "Setup".into(), String::new())
        .await;
    assert!(matches!(result, Err(EngineError::SlotTaken(_))));

    // Original placement untouched
    let entries = engine.entries_for_day(room, d("2024-06-01")).await.unwrap();
    assert_eq!(entries[0].slot, slot("09:00", "10:00"));
}

#[tokio::test]
async fn event_update_moves_across_dates() {
    let engine = new_engine("ev_move_date.wal");
    let room = make_room(&engine, "Standard").await;
    let e = event(&engine, room, "2024-06-01", "09:00", "10:00", "Setup").await.unwrap();

    engine
        .update_event(e.id, room, d("2024-06-05"), slot("09:00", "10:00"), "Setup".into(), String::new())
        .await
        .unwrap();

    assert!(engine.entries_for_day(room, d("2024-06-01")).await.unwrap().is_empty());
    let moved = engine.entries_for_day(room, d("2024-06-05")).await.unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].id, e.id);
}

#[tokio::test]
async fn event_update_moves_across_rooms_and_respects_target_conflicts() {
    let engine = new_engine("ev_move_room.wal");
    let room_a = make_room(&engine, "A").await;
    let room_b = make_room(&engine, "B").await;
    let e = event(&engine, room_a, "2024-06-01", "09:00", "10:00", "Setup").await.unwrap();
    book(&engine, room_b, "2024-06-01", "09:00", "10:00").await.unwrap();

    // Target domain occupied → move refused, entry stays put
    let result = engine
        .update_event(e.id, room_b, d("2024-06-01"), slot("09:00", "10:00"), "Setup".into(), String::new())
        .await;
    assert!(matches!(result, Err(EngineError::SlotTaken(_))));
    assert_eq!(engine.entries_for_day(room_a, d("2024-06-01")).await.unwrap().len(), 1);

    // A free window in the target succeeds
    engine
        .update_event(e.id, room_b, d("2024-06-01"), slot("10:00", "11:00"), "Setup".into(), String::new())
        .await
        .unwrap();
    assert!(engine.entries_for_day(room_a, d("2024-06-01")).await.unwrap().is_empty());
    assert_eq!(engine.entries_for_day(room_b, d("2024-06-01")).await.unwrap().len(), 2);
}

#[tokio::test]
async fn update_booking_id_as_event_fails() {
    let engine = new_engine("ev_update_booking.wal");
    let room = make_room(&engine, "Standard").await;
    let b = book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();

    let result = engine
        .update_event(b.id, room, d("2024-06-01"), slot("09:00", "10:00"), "X".into(), String::new())
        .await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

// ── Deletes ──────────────────────────────────────────────

#[tokio::test]
async fn remove_entry_frees_the_slot() {
    let engine = new_engine("rm_frees.wal");
    let room = make_room(&engine, "Standard").await;
    let b = book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();

    engine.remove_entry(Kind::Booking, b.id).await.unwrap();
    book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();
}

#[tokio::test]
async fn remove_entry_wrong_kind_is_not_found() {
    let engine = new_engine("rm_wrong_kind.wal");
    let room = make_room(&engine, "Standard").await;
    let e = event(&engine, room, "2024-06-01", "09:00", "10:00", "Setup").await.unwrap();

    assert!(matches!(
        engine.remove_entry(Kind::Booking, e.id).await,
        Err(EngineError::NotFound(_))
    ));
    engine.remove_entry(Kind::Event, e.id).await.unwrap();
}

#[tokio::test]
async fn remove_unknown_entry_is_not_found() {
    let engine = new_engine("rm_unknown.wal");
    assert!(matches!(
        engine.remove_entry(Kind::Booking, Ulid::new()).await,
        Err(EngineError::NotFound(_))
    ));
}

// ── Calendar ─────────────────────────────────────────────

#[tokio::test]
async fn calendar_merges_sorts_and_groups() {
    let engine = new_engine("cal_basic.wal");
    let room = make_room(&engine, "Hall").await;

    book(&engine, room, "2024-06-02", "10:30", "11:00").await.unwrap();
    event(&engine, room, "2024-06-01", "14:00", "15:00", "Maintenance").await.unwrap();
    book(&engine, room, "2024-06-02", "9:30", "10:00").await.unwrap();
    book(&engine, room, "2024-06-02", "09:00", "09:30").await.unwrap();

    let days = engine
        .calendar(d("2024-06-01"), d("2024-06-07"), None)
        .await
        .unwrap();

    assert_eq!(days.len(), 2);
    assert_eq!(days[0].date, "2024-06-01");
    assert_eq!(days[0].items[0].title, "Maintenance");
    assert_eq!(days[1].date, "2024-06-02");
    let starts: Vec<_> = days[1].items.iter().map(|i| i.start_time.as_str()).collect();
    assert_eq!(starts, ["09:00", "09:30", "10:30"]);
}

#[tokio::test]
async fn calendar_range_is_inclusive() {
    let engine = new_engine("cal_inclusive.wal");
    let room = make_room(&engine, "Hall").await;
    book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();
    book(&engine, room, "2024-06-03", "09:00", "10:00").await.unwrap();

    let days = engine
        .calendar(d("2024-06-01"), d("2024-06-03"), None)
        .await
        .unwrap();
    assert_eq!(days.len(), 2);

    let narrowed = engine
        .calendar(d("2024-06-02"), d("2024-06-02"), None)
        .await
        .unwrap();
    assert!(narrowed.is_empty());
}

#[tokio::test]
async fn calendar_search_filters() {
    let engine = new_engine("cal_search.wal");
    let hall = make_room(&engine, "Grand Hall").await;
    let suite = make_room(&engine, "Suite").await;
    event(&engine, hall, "2024-06-01", "09:00", "10:00", "Tasting").await.unwrap();
    event(&engine, suite, "2024-06-01", "11:00", "12:00", "Briefing").await.unwrap();

    let days = engine
        .calendar(d("2024-06-01"), d("2024-06-01"), Some("grand"))
        .await
        .unwrap();
    assert_eq!(days[0].items.len(), 1);
    assert_eq!(days[0].items[0].title, "Tasting");
}

#[tokio::test]
async fn calendar_is_idempotent() {
    let engine = new_engine("cal_idempotent.wal");
    let room = make_room(&engine, "Hall").await;
    book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();
    event(&engine, room, "2024-06-01", "11:00", "12:00", "Setup").await.unwrap();

    let first = engine.calendar(d("2024-06-01"), d("2024-06-02"), None).await.unwrap();
    let second = engine.calendar(d("2024-06-01"), d("2024-06-02"), None).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn calendar_inverted_range_rejected() {
    let engine = new_engine("cal_inverted.wal");
    let result = engine.calendar(d("2024-06-02"), d("2024-06-01"), None).await;
    assert!(matches!(result, Err(EngineError::InvalidRange(_))));
}

#[tokio::test]
async fn calendar_window_limit() {
    let engine = new_engine("cal_window.wal");
    let result = engine.calendar(d("2024-01-01"), d("2026-01-01"), None).await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
}

// ── Free slots ───────────────────────────────────────────

#[tokio::test]
async fn free_slots_subtract_entries() {
    let engine = new_engine("free_slots.wal");
    let room = make_room(&engine, "Hall").await;
    book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();
    event(&engine, room, "2024-06-01", "10:00", "11:30", "Setup").await.unwrap();

    let free = engine.free_slots(room, d("2024-06-01"), None).await.unwrap();
    assert_eq!(free, vec![slot("00:00", "09:00"), slot("11:30", "24:00")]);

    let floored = engine
        .free_slots(room, d("2024-06-01"), Some(10 * 60))
        .await
        .unwrap();
    assert_eq!(floored, vec![slot("11:30", "24:00")]);
}

#[tokio::test]
async fn free_slots_unknown_room_fails() {
    let engine = new_engine("free_slots_unknown.wal");
    let result = engine.free_slots(Ulid::new(), d("2024-06-01"), None).await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

// ── Concurrency ──────────────────────────────────────────

#[tokio::test]
async fn concurrent_overlapping_submissions_exactly_one_wins() {
    let engine = Arc::new(new_engine("concurrent_one_wins.wal"));
    let room = make_room(&engine, "Hall").await;

    const N: usize = 16;
    let mut handles = Vec::with_capacity(N);
    for i in 0..N {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            // Mutually overlapping windows: all share minute 09:45–10:00
            let start = ClockTime::from_minutes(9 * 60 + (i as u16)).unwrap();
            let end = ClockTime::from_minutes(10 * 60 + (i as u16)).unwrap();
            engine
                .place_booking(
                    Ulid::new(),
                    room,
                    d("2024-06-01"),
                    TimeSlot::new(start, end),
                    format!("Caller {i}"),
                    "555-0100".into(),
                )
                .await
        }));
    }

    let mut successes = 0;
    let mut slot_taken = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(EngineError::SlotTaken(_)) => slot_taken += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(slot_taken, N - 1);

    let entries = engine.entries_for_day(room, d("2024-06-01")).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn concurrent_disjoint_domains_all_win() {
    let engine = Arc::new(new_engine("concurrent_disjoint.wal"));
    let room = make_room(&engine, "Hall").await;

    const N: u32 = 8;
    let mut handles = Vec::new();
    for i in 0..N {
        let engine = engine.clone();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1 + i).unwrap();
        handles.push(tokio::spawn(async move {
            engine
                .place_booking(
                    Ulid::new(),
                    room,
                    date,
                    slot("09:00", "10:00"),
                    "Dana".into(),
                    "555-0100".into(),
                )
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

// ── Durability ───────────────────────────────────────────

#[tokio::test]
async fn replay_rebuilds_state() {
    let path = test_wal_path("replay_rebuild.wal");
    let room;
    let event_id;
    {
        let engine = Engine::new(path.clone(), Arc::new(NotifyHub::new())).unwrap();
        room = make_room(&engine, "Hall").await;
        book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();
        let e = event(&engine, room, "2024-06-01", "11:00", "12:00", "Setup").await.unwrap();
        event_id = e.id;
    }

    let engine = Engine::new(path, Arc::new(NotifyHub::new())).unwrap();
    let rt = engine.get_room_type(room).unwrap();
    assert_eq!(rt.name, "Hall");

    let entries = engine.entries_for_day(room, d("2024-06-01")).await.unwrap();
    assert_eq!(entries.len(), 2);

    // Replayed state still enforces conflicts
    assert!(matches!(
        book(&engine, room, "2024-06-01", "09:30", "10:30").await,
        Err(EngineError::SlotTaken(_))
    ));

    // And still resolves the entry index for deletes
    engine.remove_entry(Kind::Event, event_id).await.unwrap();
}

#[tokio::test]
async fn replay_honors_removals_and_moves() {
    let path = test_wal_path("replay_moves.wal");
    let room;
    let moved_id;
    {
        let engine = Engine::new(path.clone(), Arc::new(NotifyHub::new())).unwrap();
        room = make_room(&engine, "Hall").await;
        let b = book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();
        engine.remove_entry(Kind::Booking, b.id).await.unwrap();
        let e = event(&engine, room, "2024-06-01", "14:00", "15:00", "Setup").await.unwrap();
        engine
            .update_event(e.id, room, d("2024-06-03"), slot("14:00", "15:00"), "Setup".into(), String::new())
            .await
            .unwrap();
        moved_id = e.id;
    }

    let engine = Engine::new(path, Arc::new(NotifyHub::new())).unwrap();
    assert!(engine.entries_for_day(room, d("2024-06-01")).await.unwrap().is_empty());
    let moved = engine.entries_for_day(room, d("2024-06-03")).await.unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].id, moved_id);
}

#[tokio::test]
async fn compaction_preserves_state() {
    let path = test_wal_path("compact_state.wal");
    let engine = Engine::new(path.clone(), Arc::new(NotifyHub::new())).unwrap();
    let room = make_room(&engine, "Hall").await;

    // Churn so compaction has something to shed
    for i in 0..20 {
        let b = book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();
        if i < 19 {
            engine.remove_entry(Kind::Booking, b.id).await.unwrap();
        }
    }
    assert!(engine.wal_appends_since_compact().await > 20);

    engine.compact_wal().await.unwrap();
    assert_eq!(engine.wal_appends_since_compact().await, 0);

    // A fresh engine from the compacted WAL sees the same state
    let reopened = Engine::new(path, Arc::new(NotifyHub::new())).unwrap();
    let entries = reopened.entries_for_day(room, d("2024-06-01")).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(matches!(
        book(&reopened, room, "2024-06-01", "09:00", "10:00").await,
        Err(EngineError::SlotTaken(_))
    ));
}

// ── Notifications ────────────────────────────────────────

#[tokio::test]
async fn mutations_notify_room_watchers() {
    let engine = new_engine("notify_watchers.wal");
    let room = make_room(&engine, "Hall").await;
    let mut rx = engine.notify.subscribe(room);

    book(&engine, room, "2024-06-01", "09:00", "10:00").await.unwrap();
    let received = rx.recv().await.unwrap();
    assert!(matches!(received, Event::BookingPlaced { room_type_id, .. } if room_type_id == room));
}
