//! Disk Tier Module
//!
//! Persists encoded values one file per key. Every filesystem operation of
//! an instance runs on its [`DiskQueue`], so a write followed by a read or
//! removal of the same key always observes the write.

mod queue;
mod store;

pub use queue::{DiskQueue, QueueHandle};
pub use store::DiskStore;
