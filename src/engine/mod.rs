mod calendar;
mod conflict;
mod error;
mod format;
mod mutations;
mod queries;
mod slots;
mod store;
#[cfg(test)]
mod tests;

pub use calendar::{aggregate, CalendarRow};
pub use error::EngineError;
pub use format::calendar_item;
pub use slots::{merge_slots, subtract_slots};
pub use store::{ScheduleStore, SharedDayState};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
}

fn flush_batch(wal: &mut Wal, batch: &mut [(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

// ── Engine ───────────────────────────────────────────────

pub struct Engine {
    pub store: ScheduleStore,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            store: ScheduleStore::new(),
            wal_tx,
            notify,
        };

        // Replay events — we're the sole owner of every day-state Arc here, so
        // try_write always succeeds instantly (no contention). Never use
        // blocking_write here because this may run inside an async context.
        for event in &events {
            match event {
                Event::RoomTypeCreated { id, name, description, price, image }
                | Event::RoomTypeUpdated { id, name, description, price, image } => {
                    engine.store.insert_room_type(RoomType {
                        id: *id,
                        name: name.clone(),
                        description: description.clone(),
                        price: *price,
                        image: image.clone(),
                    });
                }
                Event::RoomTypeDeleted { id } => {
                    engine.store.remove_room_type(id);
                }
                Event::EventUpdated { id, room_type_id, date, .. } => {
                    // May have moved between conflict domains since it was scheduled.
                    let new_key = (*room_type_id, *date);
                    if let Some(old_key) = engine.store.domain_for_entry(id)
                        && old_key != new_key
                        && let Some(old_day) = engine.store.day_state(&old_key) {
                            old_day
                                .try_write()
                                .expect("replay: uncontended write")
                                .remove_entry(*id);
                        }
                    let day = engine.store.day_state_or_create(new_key);
                    let mut guard = day.try_write().expect("replay: uncontended write");
                    engine.store.apply(&mut guard, event);
                }
                other => {
                    let key = match other {
                        Event::BookingPlaced { room_type_id, date, .. }
                        | Event::EventScheduled { room_type_id, date, .. }
                        | Event::EntryRemoved { room_type_id, date, .. } => {
                            (*room_type_id, *date)
                        }
                        _ => unreachable!("room-type events handled above"),
                    };
                    let day = engine.store.day_state_or_create(key);
                    let mut guard = day.try_write().expect("replay: uncontended write");
                    engine.store.apply(&mut guard, other);
                }
            }
        }

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append + apply + notify in one call, under the caller-held domain
    /// write lock. If the append fails, in-memory state is untouched.
    pub(super) async fn persist_and_apply(
        &self,
        day: &mut DayState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply(day, event);
        self.notify.send(event.room_type_id(), event);
        Ok(())
    }

    /// Lookup entry → conflict domain, get its day state, acquire write lock.
    pub(super) async fn resolve_entry_write(
        &self,
        entry_id: &Ulid,
    ) -> Result<(DomainKey, tokio::sync::OwnedRwLockWriteGuard<DayState>), EngineError> {
        let key = self
            .store
            .domain_for_entry(entry_id)
            .ok_or(EngineError::NotFound(*entry_id))?;
        let day = self
            .store
            .day_state(&key)
            .ok_or(EngineError::NotFound(*entry_id))?;
        let guard = day.write_owned().await;
        Ok((key, guard))
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        for room_type in self.store.list_room_types() {
            events.push(Event::RoomTypeCreated {
                id: room_type.id,
                name: room_type.name,
                description: room_type.description,
                price: room_type.price,
                image: room_type.image,
            });
        }

        for (key, entry) in self
            .store
            .find_entries_in_range(NaiveDate::MIN, NaiveDate::MAX)
            .await
        {
            let (room_type_id, date) = key;
            match entry.kind {
                EntryKind::Booking { name, contact_number } => {
                    events.push(Event::BookingPlaced {
                        id: entry.id,
                        room_type_id,
                        date,
                        slot: entry.slot,
                        name,
                        contact_number,
                    });
                }
                EntryKind::Event { title, description } => {
                    events.push(Event::EventScheduled {
                        id: entry.id,
                        room_type_id,
                        date,
                        slot: entry.slot,
                        title,
                        description,
                    });
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
