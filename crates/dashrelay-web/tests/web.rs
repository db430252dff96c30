#![cfg(target_arch = "wasm32")]
#![forbid(unsafe_code)]

//! Browser tests for the wasm exports (`wasm-pack test --headless --firefox`).

use std::cell::RefCell;
use std::rc::Rc;

use tracing::Level;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::{Element, HtmlElement, MessageEvent};

wasm_bindgen_test_configure!(run_in_browser);

fn mount_indicator(id: &str, visibility: &str) -> HtmlElement {
    let document = web_sys::window().unwrap().document().unwrap();
    let element = document
        .create_element("div")
        .unwrap()
        .dyn_into::<HtmlElement>()
        .unwrap();
    element.set_id(id);
    element.style().set_property("visibility", visibility).unwrap();
    document.body().unwrap().append_child(&element).unwrap();
    element
}

/// Let queued tasks (mutation delivery, `message` events) run.
async fn settle() {
    let promise = js_sys::Promise::new(&mut |resolve: js_sys::Function, _reject: js_sys::Function| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, 20)
            .unwrap();
    });
    JsFuture::from(promise).await.unwrap();
}

/// Collects loading-state messages posted to this window. A top-level test
/// page is its own `parent`.
struct MessageLog {
    messages: Rc<RefCell<Vec<String>>>,
    listener: Closure<dyn FnMut(MessageEvent)>,
}

impl MessageLog {
    fn listen() -> Self {
        let messages = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&messages);
        let listener = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if let Some(text) = event.data().as_string() {
                if text.starts_with(r#"{"isLoading""#) {
                    sink.borrow_mut().push(text);
                }
            }
        });
        web_sys::window()
            .unwrap()
            .add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())
            .unwrap();
        Self { messages, listener }
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.borrow_mut())
    }
}

impl Drop for MessageLog {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            let _ = window.remove_event_listener_with_callback(
                "message",
                self.listener.as_ref().unchecked_ref(),
            );
        }
    }
}

#[wasm_bindgen_test]
fn attaches_immediately_on_loaded_document() {
    let element = mount_indicator("spinnerAttach", "hidden");
    dashrelay_web::start_with_config(r#"{"targetElementId":"spinnerAttach"}"#).unwrap();
    assert_eq!(dashrelay_web::watcher_status(), "active");
    dashrelay_web::stop();
    assert_eq!(dashrelay_web::watcher_status(), "idle");
    element.remove();
}

#[wasm_bindgen_test]
fn missing_indicator_is_an_error() {
    let err = dashrelay_web::start_with_config(r#"{"targetElementId":"noSuchSpinner"}"#);
    assert!(err.is_err());
    assert_eq!(dashrelay_web::watcher_status(), "failed");
    dashrelay_web::stop();
}

#[wasm_bindgen_test]
fn invalid_config_is_rejected() {
    assert!(dashrelay_web::start_with_config(r#"{"targetOrigin":""}"#).is_err());
    assert!(dashrelay_web::start_with_config("[]").is_err());
}

#[wasm_bindgen_test]
fn set_loading_toggles_visibility() {
    let element = mount_indicator("spinnerToggle", "hidden");
    dashrelay_web::start_with_config(r#"{"targetElementId":"spinnerToggle"}"#).unwrap();

    dashrelay_web::set_loading(true).unwrap();
    assert_eq!(
        element.style().get_property_value("visibility").unwrap(),
        "visible"
    );
    dashrelay_web::set_loading(false).unwrap();
    assert_eq!(
        element.style().get_property_value("visibility").unwrap(),
        "hidden"
    );

    dashrelay_web::stop();
    element.remove();
}

#[wasm_bindgen_test]
async fn style_changes_reach_the_parent_window() {
    let element = mount_indicator("spinnerRelay", "hidden");
    let log = MessageLog::listen();
    dashrelay_web::start_with_config(r#"{"targetElementId":"spinnerRelay"}"#).unwrap();

    element.style().set_property("visibility", "").unwrap();
    settle().await;
    element.style().set_property("visibility", "hidden").unwrap();
    settle().await;
    assert_eq!(
        log.take(),
        vec![r#"{"isLoading":true}"#, r#"{"isLoading":false}"#]
    );

    element.set_attribute("class", "busy").unwrap();
    settle().await;
    assert!(log.take().is_empty());

    dashrelay_web::stop();
    element.style().set_property("visibility", "visible").unwrap();
    settle().await;
    assert!(log.take().is_empty());
    element.remove();
}

#[wasm_bindgen_test]
async fn svg_indicator_is_observed() {
    let document = web_sys::window().unwrap().document().unwrap();
    let svg: Element = document
        .create_element_ns(Some("http://www.w3.org/2000/svg"), "svg")
        .unwrap();
    svg.set_id("spinnerSvg");
    svg.set_attribute("style", "visibility: hidden").unwrap();
    document.body().unwrap().append_child(&svg).unwrap();

    let log = MessageLog::listen();
    dashrelay_web::start_with_config(r#"{"targetElementId":"spinnerSvg"}"#).unwrap();
    assert_eq!(dashrelay_web::watcher_status(), "active");

    dashrelay_web::set_loading(true).unwrap();
    settle().await;
    assert_eq!(log.take(), vec![r#"{"isLoading":true}"#]);

    dashrelay_web::stop();
    svg.remove();
}

#[wasm_bindgen_test]
fn blank_download_filename_is_rejected() {
    assert!(dashrelay_web::download_csv(" ", "a,b\n").is_err());
}

#[wasm_bindgen_test]
fn csv_download_completes() {
    assert!(dashrelay_web::download_csv("report.csv", "Ref_ID,Cell_area\n1,0.09\n").is_ok());
}

#[wasm_bindgen_test]
fn log_level_can_be_changed_after_start() {
    assert!(dashrelay_web::init_logging("loud").is_err());

    dashrelay_web::init_logging("warn").unwrap();
    assert!(!tracing::enabled!(Level::INFO));

    dashrelay_web::init_logging("debug").unwrap();
    assert!(tracing::enabled!(Level::DEBUG));
    assert!(!tracing::enabled!(Level::TRACE));

    // Starting a session keeps the chosen level.
    let element = mount_indicator("spinnerLogLevel", "hidden");
    dashrelay_web::start_with_config(r#"{"targetElementId":"spinnerLogLevel"}"#).unwrap();
    assert!(tracing::enabled!(Level::DEBUG));
    dashrelay_web::stop();
    element.remove();
}
