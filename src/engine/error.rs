use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    /// Referenced room type or entry id does not exist.
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Room-type names are unique.
    DuplicateName(String),
    /// The requested slot overlaps an existing entry (id of the blocker).
    SlotTaken(Ulid),
    /// start >= end, or otherwise malformed date/time input.
    InvalidRange(&'static str),
    /// A calendar item was requested for an entry whose room type is gone.
    MissingRoomType(Ulid),
    /// Room type still referenced by bookings or events.
    RoomTypeInUse(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::DuplicateName(name) => {
                write!(f, "room type name already taken: {name}")
            }
            EngineError::SlotTaken(id) => {
                write!(f, "time slot already reserved by entry: {id}")
            }
            EngineError::InvalidRange(msg) => write!(f, "invalid range: {msg}"),
            EngineError::MissingRoomType(id) => {
                write!(f, "entry {id} references a missing room type")
            }
            EngineError::RoomTypeInUse(id) => {
                write!(f, "cannot delete room type {id}: entries still reference it")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
