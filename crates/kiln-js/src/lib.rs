//! # kiln-js
//!
//! The JavaScript build step of the kiln asset pipeline.
//!
//! This crate sits between the site's asset tree and an external bundler. It
//! resolves entry points, translates options, invokes a [`Bundler`], classifies
//! the bundler's raw output back into site artifacts, rewrites source-map
//! references, translates bundler diagnostics into source-located errors, and
//! caches whole builds so a given request is bundled at most once.
//!
//! The bundler, the asset tree and the publish target are collaborators behind
//! traits ([`Bundler`], [`AssetFs`], [`Publisher`]); `kiln-rolldown` provides
//! a Rolldown-backed bundler.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use kiln_js::{BuildInput, Client, ClientConfig, MemoryAssetFs, MemoryPublisher, OptionsMap, Resource};
//!
//! # async fn run(bundler: Arc<dyn kiln_js::Bundler>) -> kiln_js::Result<()> {
//! let assets = Arc::new(MemoryAssetFs::new("/site/assets").with_file("js/main.js", "console.log(1)"));
//! let client = Client::new(assets.clone(), bundler, Arc::new(MemoryPublisher::new()), ClientConfig::default());
//!
//! let main = Resource::from_asset(assets.as_ref(), "js/main.js")?;
//! let mut options = OptionsMap::new();
//! options.insert("minify".into(), true.into());
//!
//! let built = client.process(BuildInput::single(main), options).await?;
//! for artifact in built.artifacts() {
//!     println!("{} ({})", artifact.target_path(), artifact.media_type());
//! }
//! # Ok(()) }
//! ```

use std::fmt;
use std::sync::Arc;

use miette::Diagnostic as _;

pub mod assets;
pub mod build;
pub mod bundler;
pub mod cache;
pub mod classify;
pub mod client;
pub mod diagnostics;
pub mod lca;
pub mod options;
pub mod publish;
pub mod resolve;
pub mod resource;
pub mod sourcemap;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use assets::{AssetFs, FileMeta, MemoryAssetFs, OsAssetFs};
pub use build::{Builder, BuildRequest, Bundle};
pub use bundler::{
    BundleResult, Bundler, BundlerOptions, Loader, Location, Message, NS_IMPORT, OutputFile,
    STDIN_MARKER, Stdin,
};
pub use cache::{CacheKey, ResultCache};
pub use classify::{AdditionalFile, EntryOutput, ResolvedEntry};
pub use client::{BuildInput, Client, ClientConfig, Processed};
pub use diagnostics::SourceError;
pub use lca::lowest_common_ancestor_directory;
pub use options::{Format, JsxMode, Options, OptionsMap, SourceMapMode, Target};
pub use publish::{FsPublisher, MemoryPublisher, Publisher};
pub use resolve::resolve_component;
pub use resource::{MediaType, Resource};

/// Which caller-supplied path list an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryContext {
    Inject,
    EntryPoints,
}

impl fmt::Display for EntryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryContext::Inject => write!(f, "inject"),
            EntryContext::EntryPoints => write!(f, "entryPoints"),
        }
    }
}

/// Error types for kiln-js operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An option value could not be decoded.
    #[error("invalid option {option:?}: {reason}")]
    InvalidOption { option: String, reason: String },

    /// An inject or entry point was given as an absolute path.
    #[error("{context}: absolute paths not supported, must be relative to the asset root")]
    AbsolutePath { context: EntryContext, path: String },

    /// An inject or entry point does not exist in the asset tree.
    #[error("{context}: file {path:?} not found")]
    UnresolvedEntry { context: EntryContext, path: String },

    /// An input resource could not be read from the asset tree.
    #[error("resource {0:?} not found in the asset tree")]
    ResourceNotFound(String),

    /// A build was requested without any input resources.
    #[error("no resources to build")]
    NoResources,

    /// The bundler reported diagnostics. Only the first is the error proper.
    #[error("{primary}")]
    Bundler {
        primary: Box<SourceError>,
        secondary: Vec<SourceError>,
    },

    /// The bundler did not write the output expected for an entry.
    #[error("bundler produced no output for entry {entry:?}")]
    MissingOutput { entry: String },

    /// An entry output carried an extension other than `.js` or `.css`.
    #[error("unexpected entry output type: {0}")]
    UnexpectedOutput(String),

    /// Publishing a side file failed.
    #[error("failed to publish {path}: {source}")]
    Publish {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure shared by every caller waiting on the same cached build.
    #[error(transparent)]
    Shared(Arc<Error>),
}

/// Result type alias for kiln-js operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_option(option: &str, reason: impl Into<String>) -> Self {
        Error::InvalidOption {
            option: option.to_string(),
            reason: reason.into(),
        }
    }

    /// The underlying error, looking through [`Error::Shared`].
    pub fn root(&self) -> &Error {
        match self {
            Error::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Diagnostics reported after the first one, if this is a bundler failure.
    pub fn secondary(&self) -> &[SourceError] {
        match self.root() {
            Error::Bundler { secondary, .. } => secondary,
            _ => &[],
        }
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::InvalidOption { .. } => "INVALID_OPTION",
            Error::AbsolutePath { .. } => "ABSOLUTE_PATH",
            Error::UnresolvedEntry { .. } => "UNRESOLVED_ENTRY",
            Error::ResourceNotFound(_) => "RESOURCE_NOT_FOUND",
            Error::NoResources => "NO_RESOURCES",
            Error::Bundler { .. } => "BUNDLER_ERROR",
            Error::MissingOutput { .. } => "MISSING_OUTPUT",
            Error::UnexpectedOutput(_) => "UNEXPECTED_OUTPUT",
            Error::Publish { .. } => "PUBLISH_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Shared(inner) => return inner.code(),
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn fmt::Display + '_>> {
        match self {
            Error::InvalidOption { .. } => Some(Box::new(
                "Check the js options: target, format, sourceMap and jsx only accept known tokens.",
            )),
            Error::AbsolutePath { path, .. } => Some(Box::new(format!(
                "Use a path relative to the asset root instead of '{path}'."
            ))),
            Error::UnresolvedEntry { path, .. } => Some(Box::new(format!(
                "'{path}' was looked up with the extensions .js, .ts, .tsx and .jsx and as a directory index."
            ))),
            Error::Bundler { secondary, .. } if !secondary.is_empty() => Some(Box::new(format!(
                "{} more bundler error(s) reported.",
                secondary.len()
            ))),
            Error::Shared(inner) => inner.help(),
            _ => None,
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Error::Bundler { primary, .. } => primary.source_code(),
            Error::Shared(inner) => inner.source_code(),
            _ => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        match self {
            Error::Bundler { primary, .. } => primary.labels(),
            Error::Shared(inner) => inner.labels(),
            _ => None,
        }
    }

    fn related(&self) -> Option<Box<dyn Iterator<Item = &dyn miette::Diagnostic> + '_>> {
        match self {
            Error::Bundler { secondary, .. } if !secondary.is_empty() => Some(Box::new(
                secondary.iter().map(|e| e as &dyn miette::Diagnostic),
            )),
            Error::Shared(inner) => inner.related(),
            _ => None,
        }
    }
}
