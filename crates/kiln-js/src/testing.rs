//! Test utilities: a scripted [`Bundler`] that records its invocations.
//!
//! Enabled for this crate's own tests and, through the `test-utils` feature,
//! for integration tests and downstream crates.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::assets::AssetFs;
use crate::bundler::{BundleResult, Bundler, BundlerOptions, OutputFile};
use crate::lca::lowest_common_ancestor_directory;

type Script = dyn Fn(&BundlerOptions) -> BundleResult + Send + Sync;

/// A [`Bundler`] whose output is produced by a closure.
pub struct ScriptedBundler {
    script: Box<Script>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last: Mutex<Option<BundlerOptions>>,
}

impl fmt::Debug for ScriptedBundler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedBundler")
            .field("delay", &self.delay)
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl ScriptedBundler {
    pub fn new(script: impl Fn(&BundlerOptions) -> BundleResult + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            delay: None,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    /// A bundler that writes every entry's source unchanged, named the way a
    /// real bundler names entry outputs. File entries are read through
    /// `assets`, falling back to disk.
    pub fn echo(assets: Arc<dyn AssetFs>) -> Self {
        Self::new(move |options| BundleResult {
            output_files: echo_outputs(assets.as_ref(), options),
            errors: Vec::new(),
        })
    }

    /// Sleeps for `delay` before producing output, keeping builds in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times [`Bundler::build`] ran.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Options of the most recent invocation.
    pub fn last_options(&self) -> Option<BundlerOptions> {
        self.last.lock().clone()
    }
}

fn echo_outputs(assets: &dyn AssetFs, options: &BundlerOptions) -> Vec<OutputFile> {
    if let Some(stdin) = &options.stdin {
        return vec![OutputFile {
            path: options.outdir.join("stdin.js"),
            contents: stdin.contents.clone().into_bytes(),
        }];
    }

    let files: Vec<String> = options
        .entry_points
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let base = lowest_common_ancestor_directory(&files);

    files
        .iter()
        .map(|file| {
            let contents = assets
                .stat(file)
                .and_then(|meta| assets.read(&meta).ok())
                .or_else(|| std::fs::read(file).ok())
                .unwrap_or_default();
            let relative = file
                .strip_prefix(base.as_str())
                .unwrap_or(file)
                .trim_start_matches(['/', '\\']);
            OutputFile {
                path: options.outdir.join(Path::new(relative).with_extension("js")),
                contents,
            }
        })
        .collect()
}

#[async_trait]
impl Bundler for ScriptedBundler {
    async fn build(&self, options: BundlerOptions) -> BundleResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = (self.script)(&options);
        *self.last.lock() = Some(options);
        result
    }
}
