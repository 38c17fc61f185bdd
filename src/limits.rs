//! Input ceilings, enforced before anything reaches the store.

pub const MAX_NAME_LEN: usize = 120;
pub const MAX_NOTES_LEN: usize = 2000;
pub const MAX_CONDITION_LEN: usize = 500;
pub const MAX_SEARCH_LEN: usize = 200;

/// Theatres are numbered 1..=MAX_THEATER.
pub const MAX_THEATER: u32 = 64;
