//! # Autoradio Common Library
//!
//! Shared code for the autoradio player and its front-ends:
//! - Event types (RadioEvent enum) and the EventBus
//! - Wire types for tracks and now-playing snapshots
//! - Configuration file discovery
//! - Time and progress formatting helpers

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;

pub use error::{Error, Result};
