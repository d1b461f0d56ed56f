//! The contract between the build orchestrator and an external bundler.
//!
//! A [`Bundler`] receives a fully-assembled [`BundlerOptions`], writes nothing
//! the orchestrator relies on, and returns every output file in memory together
//! with any diagnostics it reported.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::options::{Format, JsxMode, SourceMapMode, Target};
use crate::resource::MediaType;

/// Namespace prefix for imports the bundler loaded from the asset tree.
pub const NS_IMPORT: &str = "ns-kiln";

/// Module id of the in-memory entry.
pub const STDIN_MARKER: &str = "<stdin>";

/// How the bundler parses in-memory contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Loader {
    #[default]
    Js,
    Ts,
    Jsx,
    Tsx,
}

impl Loader {
    pub fn for_media_type(media_type: &MediaType) -> Self {
        match media_type {
            MediaType::TypeScript => Loader::Ts,
            MediaType::Tsx => Loader::Tsx,
            MediaType::Jsx => Loader::Jsx,
            _ => Loader::Js,
        }
    }
}

/// An entry whose source is held in memory rather than read from disk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stdin {
    pub contents: String,
    /// Directory bare imports are resolved from.
    pub resolve_dir: PathBuf,
    /// Name reported for the entry in diagnostics.
    pub sourcefile: String,
    /// Logical asset-tree directory relative imports are resolved against.
    pub source_dir: String,
    pub loader: Loader,
}

/// Options handed to the bundler for one build.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BundlerOptions {
    pub bundle: bool,
    /// Absolute paths of the entry files.
    pub entry_points: Vec<PathBuf>,
    pub stdin: Option<Stdin>,
    /// Private directory output paths are rooted in.
    pub outdir: PathBuf,
    /// Working directory for resolving bare module imports.
    pub resolve_dir: PathBuf,
    pub tsconfig: Option<PathBuf>,
    pub target: Target,
    pub format: Format,
    pub minify_whitespace: bool,
    pub minify_identifiers: bool,
    pub minify_syntax: bool,
    pub source_map: SourceMapMode,
    pub jsx: JsxMode,
    pub jsx_import_source: Option<String>,
    /// Absolute paths of injected files.
    pub inject: Vec<PathBuf>,
    pub external: Vec<String>,
    pub define: BTreeMap<String, String>,
    pub avoid_tdz: bool,
    /// Module source keyed by import specifier.
    pub virtual_modules: BTreeMap<String, String>,
}

/// A file the bundler produced, at an absolute path under `outdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

/// Source position of a diagnostic. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

/// A diagnostic reported by the bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub location: Option<Location>,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            location: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.location = Some(Location {
            file: file.into(),
            line,
            column,
        });
        self
    }
}

/// Everything a bundler invocation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleResult {
    pub output_files: Vec<OutputFile>,
    /// Any diagnostic fails the build.
    pub errors: Vec<Message>,
}

/// An external JavaScript bundler.
#[async_trait]
pub trait Bundler: Send + Sync + Debug {
    async fn build(&self, options: BundlerOptions) -> BundleResult;
}
