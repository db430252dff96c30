#![forbid(unsafe_code)]

//! Core: loading-indicator visibility relay and the CSV download contract.
//!
//! - [`watcher`]: observes the indicator's `style` attribute and posts
//!   `{"isLoading": ..}` to the parent browsing context.
//! - [`csv_export`]: byte-order-mark prefixed CSV payloads and save-path
//!   selection.
//! - [`headless`]: in-memory document, channel and saver implementing the
//!   host traits, for native use and tests.

pub mod config;
pub mod csv_export;
pub mod error;
pub mod headless;
pub mod mutation;
pub mod state;
pub mod watcher;

pub use config::WatcherConfig;
pub use csv_export::{CsvExport, FileSaver, SaveStrategy, save_csv};
pub use error::{RelayError, Result};
pub use mutation::{MutationKind, MutationRecord};
pub use state::LoadingState;
pub use watcher::{
    DeferredWatch, DocumentHost, MutationCallback, ParentChannel, Relay, StyleTarget,
    VisibilityWatcher, WatchHandle, WatchStatus,
};
