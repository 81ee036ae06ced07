//! Text Scaler - bounded value synchronization core
//!
//! Keeps a desktop setting (text scaling factor or monitor brightness) in
//! sync between a slider, a text entry, the settings store and DDC/CI
//! displays. Device pushes are debounced; store writes are not.

pub mod config;
pub mod debounce;
pub mod devices;
pub mod error;
pub mod mapper;
pub mod paths;
pub mod runner;
pub mod settings;
pub mod sync;
pub mod view;

pub use error::{Result, SyncError};
pub use mapper::ValueRange;
pub use sync::{ScrollDirection, SyncHandle, SyncOptions, SyncSnapshot};
