//! `tracing` layer that forwards events to a console-like sink.
//!
//! In the browser the sink is `console.{error,warn,info,debug}`; natively any
//! `Fn(Level, &str)` works, which is how the formatting is tested.

use std::fmt::{self, Write as _};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub struct ConsoleLayer<W> {
    max_level: Level,
    write: W,
}

impl<W> ConsoleLayer<W>
where
    W: Fn(Level, &str) + Send + Sync + 'static,
{
    /// Forward events at `max_level` or more severe to `write`.
    pub fn new(max_level: Level, write: W) -> Self {
        Self { max_level, write }
    }
}

impl<S, W> Layer<S> for ConsoleLayer<W>
where
    S: Subscriber,
    W: Fn(Level, &str) + Send + Sync + 'static,
{
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        *metadata.level() <= self.max_level
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        (self.write)(*event.metadata().level(), &format_event(event));
    }
}

/// `target: message key=value ...`
pub fn format_event(event: &Event<'_>) -> String {
    let mut visitor = LineVisitor::default();
    event.record(&mut visitor);
    let mut line = format!("{}: {}", event.metadata().target(), visitor.message);
    line.push_str(&visitor.fields);
    line
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
