//! The build orchestrator.
//!
//! One [`Builder::build`] call decodes options, resolves entries and injects,
//! runs the bundler against a private temporary directory, and turns the
//! bundler's output into a [`Bundle`]: entry outputs, additional files and the
//! primary output's source map.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::assets::AssetFs;
use crate::bundler::{Bundler, BundlerOptions, Loader, Stdin};
use crate::classify::{self, AdditionalFile, EntryOutput, OutputLayout, ResolvedEntry};
use crate::client::ClientConfig;
use crate::diagnostics::ErrorTranslator;
use crate::options::{Options, OptionsMap};
use crate::resolve::resolve_component;
use crate::resource::Resource;
use crate::sourcemap::{self, SourceMapFile};
use crate::{EntryContext, Error, Result};

/// Prefix of the per-build temporary output directory.
const OUT_DIR_PREFIX: &str = "kiln-js";

/// Input resources plus the raw options map for one build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub resources: Vec<Resource>,
    pub options: OptionsMap,
}

impl BuildRequest {
    pub fn new(resources: Vec<Resource>, options: OptionsMap) -> Self {
        Self { resources, options }
    }

    /// Logical names of the input resources, in order.
    pub fn names(&self) -> Vec<&str> {
        self.resources.iter().map(Resource::name).collect()
    }
}

/// Everything a successful build produced, ready to publish.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    /// Entry outputs ordered by entry, the primary output first.
    pub entries: Vec<EntryOutput>,
    pub additional: Vec<AdditionalFile>,
    /// External map of the primary output, in external and linked modes.
    pub source_map: Option<SourceMapFile>,
}

/// Environment derived for one build from the options and the input.
#[derive(Debug, Clone)]
struct BuildEnv {
    /// Directory bare module imports are resolved from.
    working_dir: PathBuf,
    tsconfig: Option<PathBuf>,
    /// Publish path of the primary output.
    out_path: String,
    /// Logical directory of the primary output.
    publish_dir: String,
}

/// Runs builds against an asset tree and a bundler.
#[derive(Debug, Clone)]
pub struct Builder {
    assets: Arc<dyn AssetFs>,
    bundler: Arc<dyn Bundler>,
    config: ClientConfig,
}

impl Builder {
    pub fn new(assets: Arc<dyn AssetFs>, bundler: Arc<dyn Bundler>, config: ClientConfig) -> Self {
        Self {
            assets,
            bundler,
            config,
        }
    }

    pub fn assets(&self) -> &Arc<dyn AssetFs> {
        &self.assets
    }

    /// Builds `request` into a [`Bundle`].
    pub async fn build(&self, request: &BuildRequest) -> Result<Bundle> {
        let options = Options::decode(&request.options)?;
        let first = request.resources.first().ok_or(Error::NoResources)?;
        let env = self.build_env(&options, first);

        let inject = self
            .resolve_paths(&options.inject, EntryContext::Inject)?
            .into_iter()
            .map(|(_, filename)| filename)
            .collect();

        let mut bundler_options = options.to_bundler_options();
        bundler_options.inject = inject;
        bundler_options.resolve_dir = env.working_dir.clone();
        bundler_options.tsconfig = env.tsconfig.clone();

        let entries = if !options.entry_points.is_empty() {
            let resolved = self.resolve_paths(&options.entry_points, EntryContext::EntryPoints)?;
            file_entries(&mut bundler_options, resolved)
        } else if let [resource] = request.resources.as_slice() {
            bundler_options.stdin = Some(Stdin {
                contents: resource.content_str().into_owned(),
                resolve_dir: env.working_dir.clone(),
                sourcefile: resource.name().to_string(),
                source_dir: resource.dir().to_string(),
                loader: Loader::for_media_type(resource.media_type()),
            });
            vec![ResolvedEntry::Stdin {
                name: resource.name().to_string(),
            }]
        } else {
            let resolved = request
                .resources
                .iter()
                .map(|r| {
                    resolve_component(self.assets.as_ref(), r.name())
                        .filter(|meta| !meta.is_dir)
                        .map(|meta| (r.name().to_string(), meta.filename))
                        .ok_or_else(|| Error::ResourceNotFound(r.name().to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            file_entries(&mut bundler_options, resolved)
        };

        let multiple = request.resources.len() > 1;
        let out_dir = tempfile::Builder::new().prefix(OUT_DIR_PREFIX).tempdir()?;
        let out_dir_path = out_dir.path().to_path_buf();
        bundler_options.outdir = out_dir_path.clone();

        tracing::debug!(
            entries = entries.len(),
            out_path = %env.out_path,
            outdir = %out_dir_path.display(),
            "invoking bundler"
        );
        let result = self.bundler.build(bundler_options).await;
        drop(out_dir);

        if !result.errors.is_empty() {
            let mut translator = ErrorTranslator::new(self.assets.as_ref());
            let stdin_contents = first.content_str();
            if matches!(entries.first(), Some(ResolvedEntry::Stdin { .. })) {
                translator = translator.with_stdin(first.name(), &stdin_contents);
            }
            if let Some(err) = translator.to_error(&result.errors) {
                return Err(err);
            }
        }

        let layout = OutputLayout {
            out_dir: &out_dir_path,
            publish_dir: &env.publish_dir,
            primary_path: &env.out_path,
            multiple,
            source_map: options.source_map,
        };
        let mut classified = classify::classify(&entries, result.output_files, &layout)?;

        let mut source_map = None;
        if let Some(primary) = classified.entries.first_mut() {
            let contents = std::mem::take(&mut primary.contents);
            let (rewritten, map) = sourcemap::rewrite(
                options.source_map,
                contents,
                &env.out_path,
                classified.primary_map.take(),
            );
            primary.contents = rewritten;
            source_map = map;
        }

        Ok(Bundle {
            entries: classified.entries,
            additional: classified.additional,
            source_map,
        })
    }

    fn build_env(&self, options: &Options, first: &Resource) -> BuildEnv {
        let out_path = options
            .target_path
            .clone()
            .unwrap_or_else(|| replace_extension(first.target_path(), "js"));
        let publish_dir = out_path
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();

        let tsconfig = self.config.tsconfig.clone().or_else(|| {
            self.assets
                .stat("tsconfig.json")
                .filter(|meta| !meta.is_dir)
                .map(|meta| meta.filename)
        });

        BuildEnv {
            working_dir: self.config.working_dir.clone(),
            tsconfig,
            out_path,
            publish_dir,
        }
    }

    /// Resolves caller-supplied relative paths to files in the asset tree.
    fn resolve_paths(
        &self,
        paths: &[String],
        context: EntryContext,
    ) -> Result<Vec<(String, PathBuf)>> {
        paths
            .iter()
            .map(|path| {
                if is_absolute(path) {
                    return Err(Error::AbsolutePath {
                        context,
                        path: path.clone(),
                    });
                }
                let meta = resolve_component(self.assets.as_ref(), path)
                    .filter(|meta| !meta.is_dir)
                    .ok_or_else(|| Error::UnresolvedEntry {
                        context,
                        path: path.clone(),
                    })?;
                tracing::debug!(%context, path, file = %meta.filename.display(), "resolved");
                Ok((path.clone(), meta.filename))
            })
            .collect()
    }
}

fn file_entries(
    bundler_options: &mut BundlerOptions,
    resolved: Vec<(String, PathBuf)>,
) -> Vec<ResolvedEntry> {
    bundler_options.entry_points = resolved.iter().map(|(_, f)| f.clone()).collect();
    resolved
        .into_iter()
        .map(|(import, filename)| ResolvedEntry::File { import, filename })
        .collect()
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\') || Path::new(path).is_absolute()
}

/// Replaces the extension of the last path segment, adding one if missing.
fn replace_extension(path: &str, ext: &str) -> String {
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    match dir {
        Some(dir) => format!("{dir}/{stem}.{ext}"),
        None => format!("{stem}.{ext}"),
    }
}
