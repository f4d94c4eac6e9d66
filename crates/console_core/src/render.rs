//! Display regions and the adapters that write to them.
//!
//! Formatting lives in pure functions (`reply_html`, `event_html`,
//! `question_text`); a [`ConsoleView`] only decides where the result goes.

use std::sync::Mutex;

use serde_json::Value;
use shared::protocol::{BinderEvent, Reply, VerbPath};

use crate::highlight::{highlight_text, highlight_value, to_json_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    /// Text of the connection indicator.
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Open => "Binder WS Active",
            ConnectionState::Closed => "Connected Closed",
        }
    }

    /// Background colour of the connection indicator.
    pub fn color(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "lightgray",
            ConnectionState::Open => "lightgreen",
            ConnectionState::Closed => "red",
        }
    }
}

pub trait ConsoleView: Send + Sync {
    fn show_status(&self, state: ConnectionState);
    /// The request about to be sent, see [`question_text`].
    fn show_question(&self, question: &str);
    fn show_reply(&self, reply: &Reply);
    fn show_event(&self, index: u64, event: &BinderEvent);
}

pub fn reply_html(reply: &Reply) -> String {
    format!("{}: {}", reply.label(), highlight_value(reply.payload()))
}

pub fn reply_text(reply: &Reply) -> String {
    format!("{}: {}", reply.label(), to_json_text(reply.payload()))
}

pub fn event_html(index: u64, event: &BinderEvent) -> String {
    format!("{index}: {}", highlight_value(&event.payload))
}

/// One-line description of an outgoing call, as a URL with the query inline.
pub fn question_text(binder_url: &str, path: &VerbPath, argument: &Value) -> String {
    format!(
        "{}/{}?query={}",
        binder_url.trim_end_matches('/'),
        path,
        argument
    )
}

/// Question line of a free-form [`send`](crate::ConsoleController::send),
/// showing the message before it is wrapped.
pub fn send_question_text(path: &VerbPath, message: &Value) -> String {
    format!("subscribe: {path} ({message})")
}

/// Keeps the markup of every region in memory, the way a page's DOM would.
///
/// Replies and events are kept as full histories; the last entry is what the
/// page would currently show.
#[derive(Default)]
pub struct MemoryView {
    regions: Mutex<Regions>,
}

#[derive(Default)]
struct Regions {
    status: Option<ConnectionState>,
    question: Vec<String>,
    output: Vec<String>,
    events: Vec<String>,
}

impl MemoryView {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_regions<T>(&self, read: impl FnOnce(&mut Regions) -> T) -> T {
        let mut guard = self
            .regions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        read(&mut guard)
    }

    pub fn status(&self) -> Option<ConnectionState> {
        self.with_regions(|regions| regions.status)
    }

    pub fn questions(&self) -> Vec<String> {
        self.with_regions(|regions| regions.question.clone())
    }

    pub fn outputs(&self) -> Vec<String> {
        self.with_regions(|regions| regions.output.clone())
    }

    pub fn last_output(&self) -> Option<String> {
        self.with_regions(|regions| regions.output.last().cloned())
    }

    pub fn events(&self) -> Vec<String> {
        self.with_regions(|regions| regions.events.clone())
    }
}

impl ConsoleView for MemoryView {
    fn show_status(&self, state: ConnectionState) {
        self.with_regions(|regions| regions.status = Some(state));
    }

    fn show_question(&self, question: &str) {
        let html = highlight_text(question);
        self.with_regions(|regions| regions.question.push(html));
    }

    fn show_reply(&self, reply: &Reply) {
        let html = reply_html(reply);
        self.with_regions(|regions| regions.output.push(html));
    }

    fn show_event(&self, index: u64, event: &BinderEvent) {
        let html = event_html(index, event);
        self.with_regions(|regions| regions.events.push(html));
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
