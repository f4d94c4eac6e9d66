//! Line-oriented view for terminals and pipes.

use std::{
    fmt::Write as _,
    io::{self, Write},
    sync::Mutex,
};

use crossterm::style::{Color, Stylize};
use shared::protocol::{BinderEvent, Reply};

use crate::{
    highlight::{highlight_text, to_json_text, tokenize, TokenClass},
    render::{event_html, reply_html, reply_text, ConnectionState, ConsoleView},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    /// ANSI colours per token class.
    Ansi,
    /// Unstyled JSON text.
    Plain,
    /// The same span markup a browser page would receive.
    Html,
}

pub struct TerminalView<W: Write + Send> {
    style: OutputStyle,
    out: Mutex<W>,
}

impl TerminalView<io::Stdout> {
    pub fn stdout(style: OutputStyle) -> Self {
        Self::new(io::stdout(), style)
    }
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W, style: OutputStyle) -> Self {
        Self {
            style,
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_line(&self, region: &str, line: &str) {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = writeln!(out, "[{region}] {line}").and_then(|()| out.flush()) {
            tracing::warn!(region, error = %err, "failed to write console output");
        }
    }

    fn styled_json(&self, text: &str) -> String {
        match self.style {
            OutputStyle::Plain => text.to_string(),
            OutputStyle::Html => highlight_text(text),
            OutputStyle::Ansi => ansi_highlight(text),
        }
    }
}

fn token_color(class: TokenClass) -> Color {
    match class {
        TokenClass::Key => Color::Red,
        TokenClass::String => Color::Green,
        TokenClass::Number => Color::DarkYellow,
        TokenClass::Boolean => Color::Blue,
        TokenClass::Null => Color::Magenta,
    }
}

pub fn ansi_highlight(text: &str) -> String {
    let mut rendered = String::with_capacity(text.len() * 2);
    for fragment in tokenize(text) {
        let _ = match fragment.class {
            Some(class) => write!(rendered, "{}", fragment.text.with(token_color(class))),
            None => write!(rendered, "{}", fragment.text),
        };
    }
    rendered
}

impl<W: Write + Send> ConsoleView for TerminalView<W> {
    fn show_status(&self, state: ConnectionState) {
        let line = match (self.style, state) {
            (OutputStyle::Ansi, ConnectionState::Open) => {
                state.label().with(Color::Green).to_string()
            }
            (OutputStyle::Ansi, ConnectionState::Closed) => {
                state.label().with(Color::Red).to_string()
            }
            _ => state.label().to_string(),
        };
        self.write_line("status", &line);
    }

    fn show_question(&self, question: &str) {
        let line = self.styled_json(question);
        self.write_line("question", &line);
    }

    fn show_reply(&self, reply: &Reply) {
        let line = match self.style {
            OutputStyle::Html => reply_html(reply),
            OutputStyle::Plain => reply_text(reply),
            OutputStyle::Ansi => format!(
                "{}: {}",
                reply.label(),
                ansi_highlight(&to_json_text(reply.payload()))
            ),
        };
        self.write_line("output", &line);
    }

    fn show_event(&self, index: u64, event: &BinderEvent) {
        let line = match self.style {
            OutputStyle::Html => event_html(index, event),
            _ => format!(
                "{index}: {} {}",
                event.topic,
                self.styled_json(&to_json_text(&event.payload))
            ),
        };
        self.write_line("event", &line);
    }
}
