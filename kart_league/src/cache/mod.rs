//! Caching of computed standings.

pub mod standings;
pub mod store;

pub use standings::{CacheStats, DEFAULT_TTL, StandingsCache};
pub use store::{CacheStore, MemoryStore};
