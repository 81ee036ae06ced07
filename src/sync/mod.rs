//! Sync Controller
//!
//! Keeps one bounded value consistent across the slider, the text entry, the
//! settings store and the attached displays.
//!
//! - [`core`]: pure state machine deciding renders, writes and pushes
//! - [`actor`]: tokio task executing those decisions in order
//! - [`handle`]: cloneable public API
//! - [`commands`]: messages between the two

pub mod actor;
pub mod commands;
pub mod core;
pub mod handle;

pub use self::actor::{SyncActor, SyncOptions};
pub use self::commands::{SyncCommand, SyncSnapshot};
pub use self::core::{Outcome, Render, ScrollDirection, SyncCore, SyncPolicy, UpdateSource};
pub use self::handle::SyncHandle;
