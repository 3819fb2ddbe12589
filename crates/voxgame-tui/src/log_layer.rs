use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::field::{Field, Visit};
use tracing::Subscriber;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Lines shown in the game's log panel, oldest first.
pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

pub fn log_buffer() -> LogBuffer {
    Arc::new(Mutex::new(VecDeque::new()))
}

/// Copy the newest `n` lines out of `buffer`, oldest first.
pub fn recent_lines(buffer: &LogBuffer, n: usize) -> Vec<String> {
    let buf = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    let skip = buf.len().saturating_sub(n);
    buf.iter().skip(skip).cloned().collect()
}

/// Tracing layer feeding the in-game log panel. Keeps the message plus any
/// structured fields, dropping the oldest line past `capacity`.
pub struct GameLogLayer {
    buffer: LogBuffer,
    capacity: usize,
}

impl GameLogLayer {
    pub fn new(buffer: LogBuffer, capacity: usize) -> Self {
        Self { buffer, capacity }
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        let _ = write!(self.fields, " {name}={value}");
    }
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for GameLogLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let line = format!(
            "{} {:>5} {}: {}{}",
            chrono::Local::now().format("%H:%M:%S"),
            metadata.level(),
            metadata.target(),
            visitor.message,
            visitor.fields,
        );

        let mut buf = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        while buf.len() >= self.capacity.max(1) {
            buf.pop_front();
        }
        buf.push_back(line);
    }
}
