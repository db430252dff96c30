#![forbid(unsafe_code)]

//! WASM frontend for dashrelay.
//!
//! Binds [`dashrelay_core`] to the browser DOM through `web-sys` and exports
//! the page-facing API via `wasm-bindgen`:
//!
//! | export | effect |
//! |---|---|
//! | `start()` / `start_with_config(json)` | relay `#loadingSpinnerInvoker` visibility to `parent` after `DOMContentLoaded` |
//! | `stop()` | disconnect the observer |
//! | `watcher_status()` | `idle`, `pending`, `active`, `failed` or `stopped` |
//! | `set_loading(enabled)` | show or hide the indicator |
//! | `download_csv(filename, text)` | save text as a BOM-prefixed CSV file |
//! | `init_logging(max_level)` | forward `tracing` events to the browser console; later calls change the level |

pub mod console_layer;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::{
    download_csv, init_logging, set_loading, start, start_with_config, stop, watcher_status,
};

use dashrelay_core::WatchStatus;

/// Status label reported to the page; `idle` before any `start`.
#[must_use]
pub fn status_label(status: Option<WatchStatus>) -> &'static str {
    status.map_or("idle", WatchStatus::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashrelay_core::headless::{HeadlessDocument, RecordingChannel};
    use dashrelay_core::VisibilityWatcher;

    #[test]
    fn idle_before_start() {
        assert_eq!(status_label(None), "idle");
    }

    #[test]
    fn labels_follow_watch_lifecycle() {
        let doc = HeadlessDocument::new();
        doc.create_element("loadingSpinnerInvoker");
        let watch = VisibilityWatcher::default().start(doc.clone(), RecordingChannel::new());
        assert_eq!(status_label(Some(watch.status())), "pending");
        doc.finish_parsing();
        assert_eq!(status_label(Some(watch.status())), "active");
        watch.stop();
        assert_eq!(status_label(Some(watch.status())), "stopped");
    }

    #[test]
    fn missing_indicator_reports_failed() {
        let doc = HeadlessDocument::new();
        doc.finish_parsing();
        let watch = VisibilityWatcher::default().start(doc, RecordingChannel::new());
        assert_eq!(status_label(Some(watch.status())), "failed");
    }
}
