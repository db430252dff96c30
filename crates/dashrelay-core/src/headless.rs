//! In-memory document host.
//!
//! A small single-threaded model of the parts of a browser document the
//! watcher depends on: elements with ids and inline styles, a ready state with
//! one-shot ready callbacks, and attribute observers whose records are queued
//! and delivered in batches at an explicit checkpoint ([`HeadlessDocument::flush_mutations`]).
//!
//! Used for native tests and fuzzing, and as a non-browser host for the relay.
//!
//! ```
//! use dashrelay_core::headless::{HeadlessDocument, RecordingChannel};
//! use dashrelay_core::{VisibilityWatcher, WatcherConfig};
//!
//! let doc = HeadlessDocument::new();
//! let spinner = doc.create_element("loadingSpinnerInvoker");
//! spinner.set_style_property("visibility", "hidden");
//!
//! let channel = RecordingChannel::new();
//! let watch = VisibilityWatcher::new(WatcherConfig::default()).start(doc.clone(), channel.clone());
//! doc.finish_parsing();
//!
//! spinner.set_style_property("visibility", "");
//! doc.flush_mutations();
//! assert_eq!(channel.messages(), vec![r#"{"isLoading":true}"#.to_string()]);
//! # drop(watch);
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::{Rc, Weak};

use crate::csv_export::{CSV_MIME_TYPE, CsvExport, FileSaver, SaveStrategy};
use crate::error::{RelayError, Result};
use crate::mutation::{MutationRecord, STYLE_ATTRIBUTE};
use crate::state::LoadingState;
use crate::watcher::{DocumentHost, MutationCallback, ParentChannel, StyleTarget, WatchHandle};

/// Document parsing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
}

#[derive(Default)]
struct ElementData {
    id: String,
    style: BTreeMap<String, String>,
    attributes: BTreeMap<String, String>,
}

struct ObserverSlot {
    id: u64,
    element: usize,
    callback: Rc<RefCell<MutationCallback>>,
}

struct DocumentInner {
    ready_state: ReadyState,
    elements: Vec<ElementData>,
    ready_tasks: Vec<Box<dyn FnOnce()>>,
    observers: Vec<ObserverSlot>,
    next_observer_id: u64,
    pending: VecDeque<(u64, MutationRecord)>,
}

impl Default for DocumentInner {
    fn default() -> Self {
        Self {
            ready_state: ReadyState::Loading,
            elements: Vec::new(),
            ready_tasks: Vec::new(),
            observers: Vec::new(),
            next_observer_id: 1,
            pending: VecDeque::new(),
        }
    }
}

impl DocumentInner {
    fn queue_attribute_record(&mut self, element: usize, name: &str) {
        for observer in self.observers.iter().filter(|o| o.element == element) {
            self.pending
                .push_back((observer.id, MutationRecord::attribute(name)));
        }
    }
}

/// Shared handle to an in-memory document. Clones refer to the same document.
#[derive(Clone, Default)]
pub struct HeadlessDocument {
    inner: Rc<RefCell<DocumentInner>>,
}

impl HeadlessDocument {
    /// A new document in the `Loading` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.inner.borrow().ready_state
    }

    /// Append an element with the given id.
    pub fn create_element(&self, id: impl Into<String>) -> HeadlessElement {
        let mut inner = self.inner.borrow_mut();
        inner.elements.push(ElementData {
            id: id.into(),
            ..ElementData::default()
        });
        HeadlessElement {
            doc: Rc::downgrade(&self.inner),
            index: inner.elements.len() - 1,
        }
    }

    /// Complete parsing: switch to `Interactive` and run ready callbacks in
    /// registration order. Later calls are no-ops.
    pub fn finish_parsing(&self) {
        let tasks = {
            let mut inner = self.inner.borrow_mut();
            if inner.ready_state != ReadyState::Loading {
                return;
            }
            inner.ready_state = ReadyState::Interactive;
            std::mem::take(&mut inner.ready_tasks)
        };
        for task in tasks {
            task();
        }
    }

    /// Deliver queued mutation records, one batch per observer, in
    /// registration order. Records queued by callbacks are delivered in a
    /// following round of the same checkpoint. Returns the number of batches
    /// delivered.
    pub fn flush_mutations(&self) -> usize {
        let mut batches = 0;
        loop {
            let (pending, observers) = {
                let mut inner = self.inner.borrow_mut();
                if inner.pending.is_empty() {
                    break;
                }
                let pending = std::mem::take(&mut inner.pending);
                let observers: Vec<(u64, Rc<RefCell<MutationCallback>>)> = inner
                    .observers
                    .iter()
                    .map(|o| (o.id, Rc::clone(&o.callback)))
                    .collect();
                (pending, observers)
            };

            for (observer_id, callback) in observers {
                let records: Vec<MutationRecord> = pending
                    .iter()
                    .filter(|(id, _)| *id == observer_id)
                    .map(|(_, record)| record.clone())
                    .collect();
                // Disconnected earlier in this round: nothing to deliver.
                if records.is_empty() || !self.has_observer(observer_id) {
                    continue;
                }
                let mut callback = callback.borrow_mut();
                (*callback)(&records);
                batches += 1;
            }
        }
        batches
    }

    /// Number of live attribute observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.borrow().observers.len()
    }

    /// Number of records waiting for the next checkpoint.
    #[must_use]
    pub fn pending_records(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    fn has_observer(&self, id: u64) -> bool {
        self.inner.borrow().observers.iter().any(|o| o.id == id)
    }
}

impl DocumentHost for HeadlessDocument {
    type Element = HeadlessElement;

    fn element_by_id(&self, id: &str) -> Option<HeadlessElement> {
        let inner = self.inner.borrow();
        inner
            .elements
            .iter()
            .position(|e| e.id == id)
            .map(|index| HeadlessElement {
                doc: Rc::downgrade(&self.inner),
                index,
            })
    }

    fn is_ready(&self) -> bool {
        self.ready_state() != ReadyState::Loading
    }

    fn on_ready(&self, task: Box<dyn FnOnce()>) {
        self.inner.borrow_mut().ready_tasks.push(task);
    }

    fn observe_attributes(
        &self,
        element: &HeadlessElement,
        callback: MutationCallback,
    ) -> Result<WatchHandle> {
        if !Weak::ptr_eq(&element.doc, &Rc::downgrade(&self.inner)) {
            return Err(RelayError::ObserveFailed {
                reason: "element belongs to another document".into(),
            });
        }
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_observer_id;
            inner.next_observer_id += 1;
            inner.observers.push(ObserverSlot {
                id,
                element: element.index,
                callback: Rc::new(RefCell::new(callback)),
            });
            id
        };

        let doc = Rc::downgrade(&self.inner);
        Ok(WatchHandle::new(move || {
            if let Some(inner) = doc.upgrade() {
                let mut inner = inner.borrow_mut();
                inner.observers.retain(|o| o.id != id);
                inner.pending.retain(|(observer, _)| *observer != id);
            }
        }))
    }
}

/// Non-owning reference to an element of a [`HeadlessDocument`].
///
/// Operations on an element whose document has been dropped are no-ops.
#[derive(Clone)]
pub struct HeadlessElement {
    doc: Weak<RefCell<DocumentInner>>,
    index: usize,
}

impl HeadlessElement {
    /// Set an inline style property. An empty value removes the property, as
    /// CSSOM does. Every call queues a `style` attribute record, even when the
    /// value is unchanged.
    pub fn set_style_property(&self, name: &str, value: &str) {
        self.with_document(|inner| {
            let style = &mut inner.elements[self.index].style;
            if value.is_empty() {
                style.remove(name);
            } else {
                style.insert(name.to_string(), value.to_string());
            }
            inner.queue_attribute_record(self.index, STYLE_ATTRIBUTE);
        });
    }

    #[must_use]
    pub fn style_property(&self, name: &str) -> Option<String> {
        self.with_document(|inner| inner.elements[self.index].style.get(name).cloned())
            .flatten()
    }

    /// Set a plain (non-style) attribute and queue a record for it.
    pub fn set_attribute(&self, name: &str, value: &str) {
        self.with_document(|inner| {
            inner.elements[self.index]
                .attributes
                .insert(name.to_string(), value.to_string());
            inner.queue_attribute_record(self.index, name);
        });
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.with_document(|inner| inner.elements[self.index].attributes.get(name).cloned())
            .flatten()
    }

    /// Write the `visibility` that displays `state`, the way the dashboards
    /// toggle their loading indicator.
    pub fn set_loading(&self, state: LoadingState) {
        self.set_style_property("visibility", state.visibility_value());
    }

    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.with_document(|inner| inner.elements[self.index].id.clone())
    }

    fn with_document<R>(&self, f: impl FnOnce(&mut DocumentInner) -> R) -> Option<R> {
        let inner = self.doc.upgrade()?;
        let mut inner = inner.borrow_mut();
        Some(f(&mut inner))
    }
}

impl StyleTarget for HeadlessElement {
    fn inline_visibility(&self) -> Option<String> {
        self.style_property("visibility")
    }
}

// ─── Parent channel ──────────────────────────────────────────────────────────

/// A message posted through a [`RecordingChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub message: String,
    pub target_origin: String,
}

#[derive(Default)]
struct ChannelInner {
    posted: Vec<PostedMessage>,
    detached: bool,
}

/// Parent channel that records every post in order.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    inner: Rc<RefCell<ChannelInner>>,
}

impl RecordingChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a missing parent: subsequent posts fail.
    pub fn set_detached(&self, detached: bool) {
        self.inner.borrow_mut().detached = detached;
    }

    #[must_use]
    pub fn posted(&self) -> Vec<PostedMessage> {
        self.inner.borrow().posted.clone()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.inner
            .borrow()
            .posted
            .iter()
            .map(|p| p.message.clone())
            .collect()
    }

    /// Decoded loading states, in post order.
    pub fn states(&self) -> Result<Vec<LoadingState>> {
        self.inner
            .borrow()
            .posted
            .iter()
            .map(|p| LoadingState::from_message(&p.message))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().posted.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain recorded messages.
    pub fn take(&self) -> Vec<PostedMessage> {
        std::mem::take(&mut self.inner.borrow_mut().posted)
    }
}

impl ParentChannel for RecordingChannel {
    fn post_message(&self, message: &str, target_origin: &str) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.detached {
            return Err(RelayError::NoParentContext);
        }
        inner.posted.push(PostedMessage {
            message: message.to_string(),
            target_origin: target_origin.to_string(),
        });
        Ok(())
    }
}

// ─── File saver ──────────────────────────────────────────────────────────────

/// A file handed to a [`RecordingSaver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub strategy: SaveStrategy,
    pub filename: String,
    pub mime_type: &'static str,
    pub payload: String,
}

/// File saver that records downloads instead of performing them.
#[derive(Clone, Default)]
pub struct RecordingSaver {
    legacy: bool,
    saved: Rc<RefCell<Vec<SavedFile>>>,
}

impl RecordingSaver {
    /// Saver without the legacy explicit-save API.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saver exposing the legacy explicit-save API.
    #[must_use]
    pub fn with_legacy_save() -> Self {
        Self {
            legacy: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn saved(&self) -> Vec<SavedFile> {
        self.saved.borrow().clone()
    }

    fn record(&self, strategy: SaveStrategy, export: &CsvExport) {
        self.saved.borrow_mut().push(SavedFile {
            strategy,
            filename: export.filename().to_string(),
            mime_type: CSV_MIME_TYPE,
            payload: export.payload(),
        });
    }
}

impl FileSaver for RecordingSaver {
    fn supports_legacy_save(&self) -> bool {
        self.legacy
    }

    fn legacy_save(&self, export: &CsvExport) -> Result<()> {
        self.record(SaveStrategy::LegacySave, export);
        Ok(())
    }

    fn anchor_download(&self, export: &CsvExport) -> Result<()> {
        self.record(SaveStrategy::AnchorClick, export);
        Ok(())
    }
}
