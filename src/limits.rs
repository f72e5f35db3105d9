//! Hard input bounds. Everything user-supplied is checked against these
//! before it reaches the WAL.

pub const MAX_ROOM_TYPES: usize = 10_000;

/// Room-type names, booking requester names.
pub const MAX_NAME_LEN: usize = 256;

/// Event titles.
pub const MAX_TITLE_LEN: usize = 512;

/// Free-text descriptions (room types and events).
pub const MAX_TEXT_LEN: usize = 4_096;

pub const MAX_CONTACT_LEN: usize = 64;

pub const MAX_IMAGE_URL_LEN: usize = 2_048;

/// Entries (bookings + events) in one `(room type, date)` conflict domain.
pub const MAX_ENTRIES_PER_DAY: usize = 1_024;

/// Widest calendar query window, inclusive day count.
pub const MAX_QUERY_DAYS: i64 = 366;

/// Largest WAL record accepted on replay; anything bigger is treated as a
/// corrupt tail.
pub const MAX_WAL_RECORD_LEN: usize = 1 << 20;
