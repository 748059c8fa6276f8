//! Thread store adapters
//!
//! | Backend | Type | Durable |
//! |---------|------|---------|
//! | `memory` | [`MemoryThreadStore`] | no |
//! | `sqlite` | [`SqliteThreadStore`] | yes (WAL) |
//!
//! Both implement [`suna_domain::ThreadRepository`] with identical ordering,
//! archive and cascade semantics.

mod memory;
mod sqlite;

#[cfg(test)]
mod conformance;

pub use memory::MemoryThreadStore;
pub use sqlite::SqliteThreadStore;
