mod admin;
mod config;
mod context;
mod store;

// Re-export the public API so callers use `crate::memory::*` unchanged
pub(crate) use admin::{memory_clear_reply, memory_show_reply, memory_stats_reply};
pub(crate) use config::MemoryConfig;
pub(crate) use store::{MemoryStore, Role};
