//! Conversion of Rolldown errors into pipeline [`Message`]s.
//!
//! Rolldown's diagnostic types change between releases, so errors are read
//! through their `Debug` rendering and locations are recovered from the
//! `file:line:column` references in the text.

use kiln_js::Message;
use once_cell::sync::Lazy;
use regex::Regex;

static DIAGNOSTIC_START: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\bBuildDiagnostic \{").ok());

static LOCATION: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r#"(?P<file>(?:ns-kiln:)?(?:<stdin>|[^\s"'`()\[\]{},]+?\.(?:[cm]?[jt]sx?|css|json))):(?P<line>\d+):(?P<col>\d+)"#,
    )
    .ok()
});

static MESSAGE_FIELD: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"message: "(?P<text>(?:[^"\\]|\\.)*)""#).ok());

/// Extracts one message per diagnostic in a Rolldown error.
pub fn messages_from_error(error: &dyn std::fmt::Debug) -> Vec<Message> {
    let text = format!("{error:?}");

    let parts: Vec<&str> = match DIAGNOSTIC_START.as_ref() {
        Some(re) => re.split(&text).skip(1).filter(|p| !p.trim().is_empty()).collect(),
        None => Vec::new(),
    };

    if parts.is_empty() {
        return vec![message_from_text(&text)];
    }
    parts.into_iter().map(message_from_text).collect()
}

/// Builds a message from the text of a single diagnostic.
pub fn message_from_text(text: &str) -> Message {
    let body = MESSAGE_FIELD
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.name("text"))
        .map(|m| unescape(m.as_str()))
        .unwrap_or_else(|| text.trim().trim_end_matches([',', ')', ']', '}']).trim().to_string());

    let location = LOCATION.as_ref().and_then(|re| {
        let caps = re.captures(text)?;
        let line = caps.name("line")?.as_str().parse().ok()?;
        let col = caps.name("col")?.as_str().parse().ok()?;
        Some((caps.name("file")?.as_str().to_string(), line, col))
    });

    match location {
        Some((file, line, col)) => Message::new(body).at(file, line, col),
        None => Message::new(body),
    }
}

fn unescape(s: &str) -> String {
    s.replace("\\n", "\n").replace("\\\"", "\"").replace("\\\\", "\\")
}
