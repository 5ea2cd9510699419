//! Playback engine
//!
//! **Module Structure:**
//! - `core.rs`: engine struct, construction, initialization, snapshots
//! - `playback.rs`: the advance loop (dequeue, resolve, launch) and transport controls
//! - `queue.rs`: queue commands (request, remove, clear, shuffle, catalog refill)
//! - `recovery.rs`: transport event loop, retry/backoff, rejoin and
//!   restart after a catalog refresh
//! - `favorites.rs`: per-user favorites

mod core;
mod favorites;
mod playback;
mod queue;
mod recovery;

pub use core::{EngineConfig, EngineDeps, PlayStats, PlaybackEngine, QueueView};
