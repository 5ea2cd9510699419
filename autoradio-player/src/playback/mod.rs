//! Playback subsystem
//!
//! **Module Structure:**
//! - `progress`: elapsed-time accounting across pause gaps
//! - `queue`: track queue with manual-request prefix, shuffle and history
//! - `equalizer`: EQ presets and their transcode filter graphs
//! - `pipeline`: two-stage external decode pipeline
//! - `engine`: playback state machine and controls
//! - `now_playing`: periodic read-only status refresh

pub mod engine;
pub mod equalizer;
pub mod now_playing;
pub mod pipeline;
pub mod progress;
pub mod queue;

pub use engine::{EngineConfig, EngineDeps, PlayStats, PlaybackEngine, QueueView};
pub use equalizer::EqualizerMode;
pub use queue::Queue;
