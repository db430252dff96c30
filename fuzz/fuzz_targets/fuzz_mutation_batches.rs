#![no_main]

use arbitrary::Arbitrary;
use dashrelay_core::headless::{HeadlessDocument, RecordingChannel};
use dashrelay_core::{LoadingState, StyleTarget, VisibilityWatcher};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Step {
    Visibility(String),
    OtherStyle(String),
    Attribute(String),
    Flush,
    Detach(bool),
    Stop,
}

fuzz_target!(|steps: Vec<Step>| {
    let doc = HeadlessDocument::new();
    let spinner = doc.create_element("loadingSpinnerInvoker");
    let channel = RecordingChannel::new();
    let watch = VisibilityWatcher::default().start(doc.clone(), channel.clone());
    doc.finish_parsing();

    let mut stopped = false;
    let mut detached = false;
    let mut queued_style_writes = 0usize;
    for step in steps.into_iter().take(256) {
        match step {
            Step::Visibility(value) => {
                spinner.set_style_property("visibility", &value);
                queued_style_writes += 1;
            }
            Step::OtherStyle(value) => {
                spinner.set_style_property("color", &value);
                queued_style_writes += 1;
            }
            Step::Attribute(name) => {
                // `style` writes go through the style API.
                if name != "style" {
                    spinner.set_attribute(&name, "1");
                }
            }
            Step::Flush => {
                let before = channel.len();
                doc.flush_mutations();
                let expected = if stopped || detached { 0 } else { queued_style_writes };
                assert_eq!(channel.len() - before, expected);
                queued_style_writes = 0;

                let current = LoadingState::from_visibility(spinner.inline_visibility().as_deref());
                let states = channel.states().expect("posted messages decode");
                assert!(states[before..].iter().all(|state| *state == current));
            }
            Step::Detach(value) => {
                detached = value;
                channel.set_detached(value);
            }
            Step::Stop => {
                watch.stop();
                stopped = true;
                queued_style_writes = 0;
            }
        }
    }
});
