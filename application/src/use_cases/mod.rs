//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod chat;
pub mod session_cache;
pub mod thread_manager;

#[cfg(test)]
pub(crate) mod test_support;
