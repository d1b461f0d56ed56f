//! Translation of bundler diagnostics into source-located errors.
//!
//! Each bundler [`Message`] becomes a [`SourceError`]. When the message points
//! at a file we can open, the error carries the file's contents and a span so
//! miette can render the offending line; otherwise it degrades to plain text.

use std::fmt;

use miette::{LabeledSpan, NamedSource, SourceSpan};

use crate::assets::AssetFs;
use crate::bundler::{Message, NS_IMPORT, STDIN_MARKER};
use crate::Error;

/// A bundler diagnostic, optionally tied to a position in a source file.
#[derive(Debug)]
pub struct SourceError {
    message: String,
    position: Option<Position>,
}

#[derive(Debug)]
struct Position {
    file: String,
    line: u32,
    column: u32,
    source: NamedSource<String>,
    span: SourceSpan,
}

impl SourceError {
    /// A diagnostic with no usable location.
    pub fn plain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }

    /// A diagnostic located in `file`, whose full text is `content`.
    pub fn located(
        message: impl Into<String>,
        file: impl Into<String>,
        line: u32,
        column: u32,
        content: String,
    ) -> Self {
        let file = file.into();
        let offset = line_col_to_offset(&content, line, column).unwrap_or(content.len());
        let len = content[offset..].chars().next().map_or(0, char::len_utf8);
        Self {
            message: message.into(),
            position: Some(Position {
                source: NamedSource::new(file.clone(), content),
                span: SourceSpan::new(offset.into(), len),
                file,
                line,
                column,
            }),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file(&self) -> Option<&str> {
        self.position.as_ref().map(|p| p.file.as_str())
    }

    /// 1-based line, if located.
    pub fn line(&self) -> Option<u32> {
        self.position.as_ref().map(|p| p.line)
    }

    /// 1-based column, if located.
    pub fn column(&self) -> Option<u32> {
        self.position.as_ref().map(|p| p.column)
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            Some(p) => write!(f, "{}:{}:{}: {}", p.file, p.line, p.column, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for SourceError {}

impl miette::Diagnostic for SourceError {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.position
            .as_ref()
            .map(|p| &p.source as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let p = self.position.as_ref()?;
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(self.message.clone()),
            p.span,
        ))))
    }
}

/// Byte offset of a 1-based line and column (columns count characters).
pub fn line_col_to_offset(source: &str, line: u32, column: u32) -> Option<usize> {
    let line_idx = usize::try_from(line).ok()?.checked_sub(1)?;
    let mut offset = 0;
    for (idx, text) in source.split('\n').enumerate() {
        if idx == line_idx {
            let col_idx = usize::try_from(column).ok()?.saturating_sub(1);
            let in_line = text
                .char_indices()
                .nth(col_idx)
                .map_or(text.len(), |(pos, _)| pos);
            return Some(offset + in_line);
        }
        offset += text.len() + 1;
    }
    None
}

/// Turns bundler messages into errors, opening sources for context.
#[derive(Debug, Clone, Copy)]
pub struct ErrorTranslator<'a> {
    assets: &'a dyn AssetFs,
    stdin: Option<(&'a str, &'a str)>,
}

impl<'a> ErrorTranslator<'a> {
    pub fn new(assets: &'a dyn AssetFs) -> Self {
        Self {
            assets,
            stdin: None,
        }
    }

    /// Names the resource bundled from memory and its contents, used for
    /// diagnostics located in the standard-input entry.
    pub fn with_stdin(mut self, source_path: &'a str, contents: &'a str) -> Self {
        self.stdin = Some((source_path, contents));
        self
    }

    /// Opens the file a diagnostic refers to: `(display name, contents)`.
    fn open(&self, file: &str) -> Option<(String, String)> {
        let ns_prefix = format!("{NS_IMPORT}:");
        if let Some(real) = file.strip_prefix(&ns_prefix) {
            // Namespaced imports are real files outside the asset tree's view.
            let content = std::fs::read_to_string(real).ok()?;
            return Some((real.to_string(), content));
        }

        if file == STDIN_MARKER {
            let (source_path, contents) = self.stdin?;
            return Some((source_path.to_string(), contents.to_string()));
        }

        let meta = self.assets.stat(file).filter(|m| !m.is_dir)?;
        let bytes = self.assets.read(&meta).ok()?;
        Some((
            meta.filename.to_string_lossy().into_owned(),
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    }

    pub fn translate(&self, message: &Message) -> SourceError {
        let text = message.text.replace(&format!("{NS_IMPORT}:"), "");
        let Some(location) = &message.location else {
            return SourceError::plain(text);
        };

        match self.open(&location.file) {
            Some((file, content)) => {
                SourceError::located(text, file, location.line, location.column, content)
            }
            None => {
                tracing::debug!(file = %location.file, "could not open diagnostic source");
                SourceError::plain(text)
            }
        }
    }

    /// The build error for a non-empty set of messages: the first message is
    /// the error, the rest are carried as secondary diagnostics.
    pub fn to_error(&self, messages: &[Message]) -> Option<Error> {
        let (first, rest) = messages.split_first()?;
        Some(Error::Bundler {
            primary: Box::new(self.translate(first)),
            secondary: rest.iter().map(|m| self.translate(m)).collect(),
        })
    }
}
