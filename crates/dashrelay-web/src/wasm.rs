//! `web-sys` bindings and `wasm-bindgen` exports.

use std::cell::RefCell;

use dashrelay_core::csv_export::CSV_MIME_TYPE;
use dashrelay_core::{
    CsvExport, DeferredWatch, DocumentHost, FileSaver, LoadingState, MutationCallback,
    MutationKind, MutationRecord, ParentChannel, RelayError, Result, StyleTarget,
    VisibilityWatcher, WatchHandle, WatchStatus, WatcherConfig, save_csv,
};
use js_sys::{Array, Function, Reflect};
use tracing::{Level, error, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Registry, reload};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Blob, BlobPropertyBag, CssStyleDeclaration, Document, Element, HtmlAnchorElement,
    MouseEvent, MutationObserver, MutationObserverInit, Navigator, Url, Window,
};

use crate::console_layer::ConsoleLayer;
use crate::status_label;

const READY_EVENT: &str = "DOMContentLoaded";
const LOADING_READY_STATE: &str = "loading";

struct Session {
    config: WatcherConfig,
    watch: DeferredWatch,
}

thread_local! {
    static SESSION: RefCell<Option<Session>> = const { RefCell::new(None) };
    static LOG_FILTER: RefCell<Option<reload::Handle<LevelFilter, Registry>>> =
        const { RefCell::new(None) };
}

fn js_reason(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|err| String::from(err.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

fn to_js(err: RelayError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

// ─── Document host ───────────────────────────────────────────────────────────

#[derive(Clone)]
struct BrowserHost {
    window: Window,
    document: Document,
}

impl BrowserHost {
    fn from_global() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| RelayError::ObserveFailed {
            reason: "no global window".into(),
        })?;
        let document = window.document().ok_or_else(|| RelayError::ObserveFailed {
            reason: "window has no document".into(),
        })?;
        Ok(Self { window, document })
    }
}

/// Any element carrying an inline `style` declaration (HTML, SVG, MathML).
#[derive(Clone)]
struct BrowserElement(Element);

impl BrowserElement {
    fn style(&self) -> Option<CssStyleDeclaration> {
        Reflect::get(&self.0, &JsValue::from_str("style"))
            .ok()?
            .dyn_into::<CssStyleDeclaration>()
            .ok()
    }
}

impl StyleTarget for BrowserElement {
    fn inline_visibility(&self) -> Option<String> {
        let value = self.style()?.get_property_value("visibility").ok()?;
        (!value.is_empty()).then_some(value)
    }
}

fn convert_record(value: &JsValue) -> Option<MutationRecord> {
    let record = value.dyn_ref::<web_sys::MutationRecord>()?;
    match record.type_().parse::<MutationKind>() {
        Ok(kind) => Some(MutationRecord {
            kind,
            attribute_name: record.attribute_name(),
        }),
        Err(err) => {
            warn!(error = %err, "skipping mutation record");
            None
        }
    }
}

impl DocumentHost for BrowserHost {
    type Element = BrowserElement;

    fn element_by_id(&self, id: &str) -> Option<BrowserElement> {
        self.document.get_element_by_id(id).map(BrowserElement)
    }

    fn is_ready(&self) -> bool {
        self.document.ready_state() != LOADING_READY_STATE
    }

    fn on_ready(&self, task: Box<dyn FnOnce()>) {
        let listener = Closure::once_into_js(move || task());
        if let Err(err) = self
            .document
            .add_event_listener_with_callback(READY_EVENT, listener.unchecked_ref())
        {
            error!(reason = %js_reason(&err), "failed to register document-ready listener");
        }
    }

    fn observe_attributes(
        &self,
        element: &BrowserElement,
        mut callback: MutationCallback,
    ) -> Result<WatchHandle> {
        let observe_failed = |err: JsValue| RelayError::ObserveFailed {
            reason: js_reason(&err),
        };

        let closure = Closure::<dyn FnMut(Array, MutationObserver)>::new(
            move |records: Array, _observer: MutationObserver| {
                let batch: Vec<MutationRecord> =
                    records.iter().filter_map(|r| convert_record(&r)).collect();
                callback(&batch);
            },
        );
        let observer =
            MutationObserver::new(closure.as_ref().unchecked_ref()).map_err(observe_failed)?;
        let options = MutationObserverInit::new();
        options.set_attributes(true);
        observer
            .observe_with_options(&element.0, &options)
            .map_err(observe_failed)?;

        Ok(WatchHandle::new(move || {
            observer.disconnect();
            drop(closure);
        }))
    }
}

// ─── Parent channel ──────────────────────────────────────────────────────────

struct ParentWindow {
    window: Window,
}

impl ParentChannel for ParentWindow {
    fn post_message(&self, message: &str, target_origin: &str) -> Result<()> {
        let post_failed = |err: JsValue| RelayError::PostFailed {
            reason: js_reason(&err),
        };
        let parent = self
            .window
            .parent()
            .map_err(post_failed)?
            .ok_or(RelayError::NoParentContext)?;
        parent
            .post_message(&JsValue::from_str(message), target_origin)
            .map_err(post_failed)
    }
}

// ─── File saver ──────────────────────────────────────────────────────────────

struct BrowserSaver {
    window: Window,
    document: Document,
}

fn save_failed(err: JsValue) -> RelayError {
    RelayError::SaveFailed {
        reason: js_reason(&err),
    }
}

fn legacy_save_fn(navigator: &Navigator) -> Option<Function> {
    Reflect::get(navigator, &JsValue::from_str("msSaveBlob"))
        .ok()?
        .dyn_into::<Function>()
        .ok()
}

fn csv_blob(export: &CsvExport) -> Result<Blob> {
    let parts = Array::new();
    for part in export.blob_parts() {
        parts.push(&JsValue::from_str(part));
    }
    let options = BlobPropertyBag::new();
    options.set_type(CSV_MIME_TYPE);
    Blob::new_with_str_sequence_and_options(&parts, &options).map_err(save_failed)
}

impl FileSaver for BrowserSaver {
    fn supports_legacy_save(&self) -> bool {
        legacy_save_fn(&self.window.navigator()).is_some()
    }

    fn legacy_save(&self, export: &CsvExport) -> Result<()> {
        let navigator = self.window.navigator();
        let save = legacy_save_fn(&navigator).ok_or_else(|| RelayError::SaveFailed {
            reason: "navigator.msSaveBlob unavailable".into(),
        })?;
        let blob = csv_blob(export)?;
        save.call2(&navigator, &blob, &JsValue::from_str(export.filename()))
            .map_err(save_failed)?;
        Ok(())
    }

    fn anchor_download(&self, export: &CsvExport) -> Result<()> {
        let blob = csv_blob(export)?;
        let url = Url::create_object_url_with_blob(&blob).map_err(save_failed)?;
        let anchor = self
            .document
            .create_element("a")
            .map_err(save_failed)?
            .dyn_into::<HtmlAnchorElement>()
            .map_err(|_| RelayError::SaveFailed {
                reason: "created element is not an anchor".into(),
            })?;
        anchor.set_href(&url);
        anchor.set_download(export.filename());
        anchor.set_target("_blank");
        anchor
            .style()
            .set_property("visibility", "hidden")
            .map_err(save_failed)?;
        let click = MouseEvent::new("click").map_err(save_failed)?;
        anchor.dispatch_event(&click).map_err(save_failed)?;
        Ok(())
    }
}

// ─── Logging ─────────────────────────────────────────────────────────────────

fn write_console(level: Level, line: &str) {
    let value = JsValue::from_str(line);
    if level == Level::ERROR {
        web_sys::console::error_1(&value);
    } else if level == Level::WARN {
        web_sys::console::warn_1(&value);
    } else if level == Level::INFO {
        web_sys::console::info_1(&value);
    } else {
        web_sys::console::debug_1(&value);
    }
}

/// Install the console subscriber, or move the level of the installed one.
fn set_log_level(max_level: Level) -> Result<()> {
    let filter = LevelFilter::from_level(max_level);
    let installed = LOG_FILTER.with(|slot| slot.borrow().clone());
    if let Some(handle) = installed {
        return handle
            .reload(filter)
            .map_err(|err| RelayError::LoggingSetup {
                reason: err.to_string(),
            });
    }

    let (filter, handle) = reload::Layer::new(filter);
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(ConsoleLayer::new(Level::TRACE, write_console));
    tracing::subscriber::set_global_default(subscriber).map_err(|err| {
        RelayError::LoggingSetup {
            reason: err.to_string(),
        }
    })?;
    LOG_FILTER.with(|slot| *slot.borrow_mut() = Some(handle));
    Ok(())
}

fn ensure_logging() {
    if LOG_FILTER.with(|slot| slot.borrow().is_none()) {
        // A host-installed subscriber keeps the global slot.
        let _ = set_log_level(Level::INFO);
    }
}

// ─── Exports ─────────────────────────────────────────────────────────────────

/// Forward `tracing` events at `max_level` (`error`..`trace`) or above to the
/// console. Later calls change the level.
#[wasm_bindgen]
pub fn init_logging(max_level: &str) -> std::result::Result<(), JsValue> {
    let level = max_level
        .parse::<Level>()
        .map_err(|err| to_js(RelayError::invalid_config(err.to_string())))?;
    set_log_level(level).map_err(to_js)
}

/// Start relaying with the default configuration.
#[wasm_bindgen]
pub fn start() -> std::result::Result<(), JsValue> {
    start_session(WatcherConfig::default())
}

/// Start relaying with a JSON configuration
/// (`{"targetElementId": "...", "targetOrigin": "..."}`).
#[wasm_bindgen]
pub fn start_with_config(json: &str) -> std::result::Result<(), JsValue> {
    let config = WatcherConfig::from_json(json).map_err(to_js)?;
    start_session(config)
}

fn start_session(config: WatcherConfig) -> std::result::Result<(), JsValue> {
    ensure_logging();
    stop();

    let host = BrowserHost::from_global().map_err(to_js)?;
    let channel = ParentWindow {
        window: host.window.clone(),
    };
    let watch = VisibilityWatcher::new(config.clone()).start(host, channel);
    let failure = (watch.status() == WatchStatus::Failed).then(|| watch.failure());
    SESSION.with(|session| *session.borrow_mut() = Some(Session { config, watch }));

    match failure {
        Some(reason) => Err(js_sys::Error::new(&reason.unwrap_or_default()).into()),
        None => Ok(()),
    }
}

/// Disconnect the observer, if any.
#[wasm_bindgen]
pub fn stop() {
    let previous = SESSION.with(|session| session.borrow_mut().take());
    if let Some(previous) = previous {
        previous.watch.stop();
    }
}

#[wasm_bindgen]
pub fn watcher_status() -> String {
    SESSION.with(|session| {
        let status = session.borrow().as_ref().map(|s| s.watch.status());
        status_label(status).to_string()
    })
}

/// Show (`true`) or hide (`false`) the loading indicator.
#[wasm_bindgen]
pub fn set_loading(enabled: bool) -> std::result::Result<(), JsValue> {
    let id = SESSION.with(|session| {
        session
            .borrow()
            .as_ref()
            .map(|s| s.config.target_element_id.clone())
            .unwrap_or_else(|| WatcherConfig::default().target_element_id)
    });
    let host = BrowserHost::from_global().map_err(to_js)?;
    let element = host
        .element_by_id(&id)
        .ok_or_else(|| to_js(RelayError::target_not_found(&id)))?;
    let style = element.style().ok_or_else(|| {
        to_js(RelayError::invalid_config(format!(
            "#{id} has no inline style declaration"
        )))
    })?;
    style.set_property("visibility", LoadingState::from(enabled).visibility_value())
}

/// Trigger a browser download of `text` as a BOM-prefixed CSV file.
#[wasm_bindgen]
pub fn download_csv(filename: &str, text: &str) -> std::result::Result<(), JsValue> {
    let export = CsvExport::new(filename, text).map_err(to_js)?;
    let host = BrowserHost::from_global().map_err(to_js)?;
    let saver = BrowserSaver {
        window: host.window,
        document: host.document,
    };
    save_csv(&saver, &export).map_err(to_js)?;
    Ok(())
}
