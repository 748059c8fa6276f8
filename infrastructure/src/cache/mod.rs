//! Cache adapters

mod memory;

pub use memory::MemoryCache;
