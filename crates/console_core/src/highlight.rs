//! Lexical JSON highlighting.
//!
//! Tokens are classified with a single regular expression rather than a JSON
//! parser, so any text can be fed through; non-JSON input simply yields fewer
//! tokens. Output comes in two shapes: a list of [`Fragment`]s for terminal
//! styling and HTML with `<span class="...">` wrappers.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"("(\\u[a-zA-Z0-9]{4}|\\[^u]|[^\\"])*"(\s*:)?|\b(true|false|null)\b|-?[0-9]+(?:\.[0-9]*)?(?:[eE][+\-]?[0-9]+)?)"#,
    )
    .expect("token pattern compiles")
});

static SPAN_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"</?span[^>]*>"#).expect("span pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Key,
    String,
    Number,
    Boolean,
    Null,
}

impl TokenClass {
    /// CSS class name used in HTML output.
    pub fn css_class(self) -> &'static str {
        match self {
            TokenClass::Key => "key",
            TokenClass::String => "string",
            TokenClass::Number => "number",
            TokenClass::Boolean => "boolean",
            TokenClass::Null => "null",
        }
    }

    fn classify(token: &str) -> Self {
        if token.starts_with('"') {
            if token.ends_with(':') {
                TokenClass::Key
            } else {
                TokenClass::String
            }
        } else if token == "true" || token == "false" {
            TokenClass::Boolean
        } else if token == "null" {
            TokenClass::Null
        } else {
            TokenClass::Number
        }
    }
}

/// A slice of the input text, classified when it matched a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub class: Option<TokenClass>,
    pub text: &'a str,
}

/// Splits `text` into plain and classified fragments covering it exactly.
pub fn tokenize(text: &str) -> Vec<Fragment<'_>> {
    let mut fragments = Vec::new();
    let mut cursor = 0;
    for found in TOKEN_RE.find_iter(text) {
        if found.start() > cursor {
            fragments.push(Fragment {
                class: None,
                text: &text[cursor..found.start()],
            });
        }
        fragments.push(Fragment {
            class: Some(TokenClass::classify(found.as_str())),
            text: found.as_str(),
        });
        cursor = found.end();
    }
    if cursor < text.len() {
        fragments.push(Fragment {
            class: None,
            text: &text[cursor..],
        });
    }
    fragments
}

/// Serializes a payload the way the console displays it: two-space indented.
pub fn to_json_text(value: &Value) -> String {
    // Serializing a `Value` cannot fail; fall back to the compact form anyway.
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Wraps every token of `text` in a class-tagged span, escaping markup.
pub fn highlight_text(text: &str) -> String {
    let mut html = String::with_capacity(text.len() * 2);
    for fragment in tokenize(text) {
        match fragment.class {
            Some(class) => {
                html.push_str("<span class=\"");
                html.push_str(class.css_class());
                html.push_str("\">");
                escape_into(&mut html, fragment.text);
                html.push_str("</span>");
            }
            None => escape_into(&mut html, fragment.text),
        }
    }
    html
}

pub fn highlight_value(value: &Value) -> String {
    highlight_text(&to_json_text(value))
}

/// Removes span markup and entity escapes, recovering the plain text.
pub fn strip_markup(html: &str) -> String {
    SPAN_TAG_RE
        .replace_all(html, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
#[path = "tests/highlight_tests.rs"]
mod tests;
