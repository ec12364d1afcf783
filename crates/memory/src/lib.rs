//! Store implementations for Recollect.
//!
//! Each backend implements all three tier traits from `recollect-core`, so a
//! single value can serve facts, messages and topics.

pub mod in_memory;
pub mod noop;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use noop::NoopStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
