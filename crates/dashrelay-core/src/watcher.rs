#![forbid(unsafe_code)]

//! Visibility watcher: relays the loading indicator's state to the parent
//! browsing context.
//!
//! # Pipeline
//!
//! document ready → look up the indicator by id → observe its attribute
//! mutations → for every `style` record, derive [`LoadingState`] from the
//! current inline `visibility` → post `{"isLoading": ..}` to the parent.
//!
//! The watcher never touches the DOM directly. A [`DocumentHost`] supplies
//! element lookup, the ready signal and attribute observation; a
//! [`ParentChannel`] delivers messages. The browser frontend implements both
//! over `web-sys`; [`crate::headless`] implements them in memory.
//!
//! # Invariants
//!
//! 1. Every qualifying record produces exactly one post attempt, even when the
//!    derived state is unchanged (no de-duplication, no coalescing).
//! 2. The posted state depends only on the target's inline `visibility` at the
//!    time the record is processed.
//! 3. A missing target is an error, never a silent no-op: [`VisibilityWatcher::attach`]
//!    returns [`RelayError::TargetNotFound`] and [`DeferredWatch`] records it.
//! 4. After [`WatchHandle::stop`] (or drop) no further messages are posted.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error, info, warn};

use crate::config::WatcherConfig;
use crate::error::{RelayError, Result};
use crate::mutation::MutationRecord;
use crate::state::LoadingState;

/// Read access to an element's inline style.
pub trait StyleTarget {
    /// Inline `visibility` value; `None` when the property is not set.
    fn inline_visibility(&self) -> Option<String>;
}

/// Outbound cross-context message channel.
pub trait ParentChannel {
    fn post_message(&self, message: &str, target_origin: &str) -> Result<()>;
}

impl<C: ParentChannel + ?Sized> ParentChannel for Rc<C> {
    fn post_message(&self, message: &str, target_origin: &str) -> Result<()> {
        (**self).post_message(message, target_origin)
    }
}

/// Callback invoked with one batch of mutation records.
pub type MutationCallback = Box<dyn FnMut(&[MutationRecord])>;

/// The document the watcher attaches to.
pub trait DocumentHost {
    type Element: StyleTarget + Clone + 'static;

    /// Look up an element by id.
    fn element_by_id(&self, id: &str) -> Option<Self::Element>;

    /// Whether structural parsing has completed (ready state is past `loading`).
    fn is_ready(&self) -> bool;

    /// Run `task` once when parsing completes.
    fn on_ready(&self, task: Box<dyn FnOnce()>);

    /// Observe attribute mutations (attributes only, no child list or
    /// character data) on `element`.
    fn observe_attributes(
        &self,
        element: &Self::Element,
        callback: MutationCallback,
    ) -> Result<WatchHandle>;
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// Scoped observation handle. Stopping (or dropping) disconnects the
/// underlying observer.
pub struct WatchHandle {
    disconnect: Option<Box<dyn FnOnce()>>,
}

impl WatchHandle {
    pub fn new(disconnect: impl FnOnce() + 'static) -> Self {
        Self {
            disconnect: Some(Box::new(disconnect)),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.disconnect.is_some()
    }

    /// Disconnect the observer. Idempotent.
    pub fn stop(&mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
            info!("visibility relay stopped");
        }
    }

    /// Raise `stopped` before the host disconnect runs.
    fn raising(mut self, stopped: Rc<Cell<bool>>) -> Self {
        let disconnect = self.disconnect.take();
        Self::new(move || {
            stopped.set(true);
            if let Some(disconnect) = disconnect {
                disconnect();
            }
        })
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

// ─── Relay ───────────────────────────────────────────────────────────────────

/// Mutation callback body: filters records and posts derived states.
pub struct Relay<T, C> {
    target: T,
    channel: C,
    target_origin: String,
    stopped: Rc<Cell<bool>>,
}

impl<T: StyleTarget, C: ParentChannel> Relay<T, C> {
    pub fn new(target: T, channel: C, target_origin: impl Into<String>) -> Self {
        Self {
            target,
            channel,
            target_origin: target_origin.into(),
            stopped: Rc::new(Cell::new(false)),
        }
    }

    /// Shared flag that ends delivery. Once set, the rest of the current batch
    /// and every later batch post nothing.
    #[must_use]
    pub fn stop_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.stopped)
    }

    /// Handle one batch. Returns the number of messages posted.
    ///
    /// A failed post is logged and the batch continues.
    pub fn on_mutations(&mut self, records: &[MutationRecord]) -> usize {
        let mut posted = 0;
        for _record in records.iter().filter(|r| r.is_style_change()) {
            if self.stopped.get() {
                debug!("relay stopped mid-batch, dropping remaining records");
                break;
            }
            let visibility = self.target.inline_visibility();
            let state = LoadingState::from_visibility(visibility.as_deref());
            match self
                .channel
                .post_message(&state.to_message(), &self.target_origin)
            {
                Ok(()) => {
                    posted += 1;
                    debug!(
                        is_loading = state.is_loading,
                        visibility = visibility.as_deref().unwrap_or(""),
                        target_origin = %self.target_origin,
                        "posted loading state"
                    );
                }
                Err(err) => warn!(error = %err, "loading state not delivered"),
            }
        }
        posted
    }
}

// ─── Watcher ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct VisibilityWatcher {
    config: WatcherConfig,
}

impl VisibilityWatcher {
    #[must_use]
    pub fn new(config: WatcherConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Look up the target and start observing it now.
    pub fn attach<H, C>(&self, host: &H, channel: C) -> Result<WatchHandle>
    where
        H: DocumentHost,
        C: ParentChannel + 'static,
    {
        self.config.validate()?;
        let id = self.config.target_element_id.as_str();
        let element = host
            .element_by_id(id)
            .ok_or_else(|| RelayError::target_not_found(id))?;

        let mut relay = Relay::new(element.clone(), channel, self.config.target_origin.clone());
        let stopped = relay.stop_flag();
        let handle = host.observe_attributes(
            &element,
            Box::new(move |records: &[MutationRecord]| {
                relay.on_mutations(records);
            }),
        )?;
        info!(
            target_element_id = id,
            target_origin = %self.config.target_origin,
            wildcard_origin = self.config.is_wildcard_origin(),
            "visibility relay attached"
        );
        Ok(handle.raising(stopped))
    }

    /// Attach once the document is ready. Attaches immediately when the host
    /// is already past the loading phase.
    pub fn start<H, C>(self, host: H, channel: C) -> DeferredWatch
    where
        H: DocumentHost + Clone + 'static,
        C: ParentChannel + 'static,
    {
        let watch = DeferredWatch::pending();
        let slot = watch.clone();
        let ready_host = host.clone();
        let task = move || {
            if slot.status() != WatchStatus::Pending {
                debug!("visibility relay stopped before document ready");
                return;
            }
            slot.resolve(self.attach(&ready_host, channel));
        };

        if host.is_ready() {
            task();
        } else {
            debug!("deferring visibility relay until document ready");
            host.on_ready(Box::new(task));
        }
        watch
    }
}

// ─── Deferred attachment ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStatus {
    /// Waiting for the document-ready signal.
    Pending,
    /// Observing the target.
    Active,
    /// Attachment failed; see [`DeferredWatch::failure`].
    Failed,
    /// Stopped explicitly.
    Stopped,
}

impl WatchStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

enum Slot {
    Pending,
    Active(WatchHandle),
    Failed(RelayError),
    Stopped,
}

/// Shared view of a watcher started with [`VisibilityWatcher::start`].
///
/// Cloning creates another handle to the same state.
#[derive(Clone)]
pub struct DeferredWatch {
    inner: Rc<RefCell<Slot>>,
}

impl DeferredWatch {
    fn pending() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Slot::Pending)),
        }
    }

    fn resolve(&self, outcome: Result<WatchHandle>) {
        *self.inner.borrow_mut() = match outcome {
            Ok(handle) => Slot::Active(handle),
            Err(err) => {
                if err.is_configuration() {
                    error!(
                        error = %err,
                        kind = err.kind(),
                        "visibility relay not attached: indicator missing or misconfigured"
                    );
                } else {
                    warn!(error = %err, kind = err.kind(), "visibility relay not attached");
                }
                Slot::Failed(err)
            }
        };
    }

    #[must_use]
    pub fn status(&self) -> WatchStatus {
        match &*self.inner.borrow() {
            Slot::Pending => WatchStatus::Pending,
            Slot::Active(_) => WatchStatus::Active,
            Slot::Failed(_) => WatchStatus::Failed,
            Slot::Stopped => WatchStatus::Stopped,
        }
    }

    /// Rendered attachment error, if attachment failed.
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        match &*self.inner.borrow() {
            Slot::Failed(err) => Some(err.to_string()),
            _ => None,
        }
    }

    /// Label of the attachment error, if attachment failed.
    #[must_use]
    pub fn failure_kind(&self) -> Option<&'static str> {
        match &*self.inner.borrow() {
            Slot::Failed(err) => Some(err.kind()),
            _ => None,
        }
    }

    /// Stop observing, or cancel a pending attachment. A failed watch keeps
    /// its failure.
    pub fn stop(&self) {
        let previous = {
            let mut slot = self.inner.borrow_mut();
            if matches!(*slot, Slot::Failed(_)) {
                return;
            }
            std::mem::replace(&mut *slot, Slot::Stopped)
        };
        // Disconnect outside the borrow; the observer may call back into us.
        drop(previous);
    }
}

impl fmt::Debug for DeferredWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredWatch")
            .field("status", &self.status())
            .field("failure", &self.failure())
            .finish()
    }
}
