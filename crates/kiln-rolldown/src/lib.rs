//! # kiln-rolldown
//!
//! A [`kiln_js::Bundler`] backed by Rolldown.
//!
//! [`RolldownBundler`] maps the pipeline's [`BundlerOptions`] onto Rolldown,
//! serves the in-memory entry and asset-tree imports through
//! [`AssetTreePlugin`], and returns every chunk and asset in memory, named the
//! way `kiln_js::classify` expects.
//!
//! ```no_run
//! use std::sync::Arc;
//! use kiln_js::{Client, ClientConfig, FsPublisher, OsAssetFs};
//! use kiln_rolldown::RolldownBundler;
//!
//! let assets = Arc::new(OsAssetFs::new("assets"));
//! let bundler = Arc::new(RolldownBundler::new(assets.clone()));
//! let client = Client::new(assets, bundler, Arc::new(FsPublisher::new("public")), ClientConfig::default());
//! ```

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use kiln_js::options::{Format, JsxMode, Target};
use kiln_js::{
    AssetFs, BundleResult, Bundler, BundlerOptions, OutputFile, STDIN_MARKER,
    lowest_common_ancestor_directory,
};
use path_clean::PathClean;
use rolldown::{
    BundlerBuilder as RolldownBundlerBuilder, BundlerOptions as RolldownOptions, InputItem,
    IsExternal, OutputFormat, Platform, RawMinifyOptions, SourceMapType,
};
use rolldown_common::Output;
use rolldown_plugin::__inner::SharedPluginable;

pub mod diagnostics;
mod plugin;

pub use plugin::AssetTreePlugin;

/// Name of the in-memory entry's output chunk.
const STDIN_CHUNK: &str = "stdin";

/// Bundles with Rolldown, resolving site imports through an asset tree.
#[derive(Debug, Clone)]
pub struct RolldownBundler {
    assets: Arc<dyn AssetFs>,
}

impl RolldownBundler {
    pub fn new(assets: Arc<dyn AssetFs>) -> Self {
        Self { assets }
    }
}

#[async_trait]
impl Bundler for RolldownBundler {
    async fn build(&self, options: BundlerOptions) -> BundleResult {
        warn_unsupported(&options);

        let plugin = AssetTreePlugin::new(
            Arc::clone(&self.assets),
            options.stdin.clone(),
            options.virtual_modules.clone(),
        );
        let rolldown_options = rolldown_options(&options);

        tracing::debug!(
            inputs = rolldown_options.input.as_ref().map_or(0, Vec::len),
            cwd = %options.resolve_dir.display(),
            "running rolldown"
        );

        let mut bundler = match RolldownBundlerBuilder::default()
            .with_options(rolldown_options)
            .with_plugins(vec![Arc::new(plugin) as SharedPluginable])
            .build()
        {
            Ok(bundler) => bundler,
            Err(e) => return failed(&e),
        };

        let bundle = match bundler.generate().await {
            Ok(bundle) => bundle,
            Err(e) => return failed(&e),
        };

        BundleResult {
            output_files: collect_outputs(&options.outdir, bundle.assets, options.source_map),
            errors: Vec::new(),
        }
    }
}

fn failed(error: &dyn std::fmt::Debug) -> BundleResult {
    let errors = diagnostics::messages_from_error(error);
    tracing::debug!(count = errors.len(), "rolldown reported errors");
    BundleResult {
        output_files: Vec::new(),
        errors,
    }
}

/// Rolldown input items, named after the output stem each entry must get.
pub fn input_items(options: &BundlerOptions) -> Vec<InputItem> {
    if options.stdin.is_some() {
        return vec![InputItem {
            name: Some(STDIN_CHUNK.to_string()),
            import: STDIN_MARKER.to_string(),
        }];
    }

    let files: Vec<String> = options
        .entry_points
        .iter()
        .map(|p| p.clean().to_string_lossy().into_owned())
        .collect();
    let base = lowest_common_ancestor_directory(&files);

    files
        .iter()
        .map(|file| {
            let relative = file
                .strip_prefix(base.as_str())
                .unwrap_or(file)
                .trim_start_matches(['/', '\\']);
            let stem = Path::new(relative).with_extension("");
            InputItem {
                name: Some(stem.to_string_lossy().replace('\\', "/")),
                import: file.clone(),
            }
        })
        .collect()
}

/// Maps pipeline options onto Rolldown's.
pub fn rolldown_options(options: &BundlerOptions) -> RolldownOptions {
    let minify = options.minify_whitespace || options.minify_identifiers || options.minify_syntax;

    RolldownOptions {
        input: Some(input_items(options)),
        cwd: Some(options.resolve_dir.clone()),
        dir: Some(options.outdir.to_string_lossy().into_owned()),
        format: Some(match options.format {
            Format::Iife => OutputFormat::Iife,
            Format::Cjs => OutputFormat::Cjs,
            Format::Esm => OutputFormat::Esm,
        }),
        sourcemap: match options.source_map {
            kiln_js::SourceMapMode::None => None,
            kiln_js::SourceMapMode::Inline => Some(SourceMapType::Inline),
            kiln_js::SourceMapMode::External => Some(SourceMapType::Hidden),
            kiln_js::SourceMapMode::Linked => Some(SourceMapType::File),
        },
        minify: minify.then(|| RawMinifyOptions::from(true)),
        external: (!options.external.is_empty())
            .then(|| IsExternal::from(options.external.clone())),
        platform: Some(Platform::Browser),
        ..Default::default()
    }
}

/// Logs options Rolldown cannot honour.
fn warn_unsupported(options: &BundlerOptions) {
    if options.target != Target::EsNext {
        tracing::warn!(es_target = %options.target, "syntax lowering is not supported, emitting esnext");
    }
    if !options.define.is_empty() {
        tracing::warn!(count = options.define.len(), "defines are ignored by the rolldown backend");
    }
    if !options.inject.is_empty() {
        tracing::warn!(count = options.inject.len(), "injects are ignored by the rolldown backend");
    }
    if options.jsx != JsxMode::Transform || options.jsx_import_source.is_some() {
        tracing::warn!(jsx = ?options.jsx, "jsx options are ignored by the rolldown backend");
    }
    if let Some(tsconfig) = &options.tsconfig {
        tracing::warn!(tsconfig = %tsconfig.display(), "tsconfig is ignored by the rolldown backend");
    }
    if options.avoid_tdz {
        tracing::warn!("avoidTDZ is ignored by the rolldown backend");
    }
}

/// Turns Rolldown's in-memory output into files under `outdir`.
///
/// Chunk source maps become `<chunk>.map` files in external and linked modes.
fn collect_outputs(
    outdir: &Path,
    outputs: Vec<Output>,
    source_map: kiln_js::SourceMapMode,
) -> Vec<OutputFile> {
    let asset_names: Vec<String> = outputs
        .iter()
        .filter_map(|o| match o {
            Output::Asset(asset) => Some(asset.filename.to_string()),
            Output::Chunk(_) => None,
        })
        .collect();

    let mut files = Vec::with_capacity(outputs.len());
    for output in outputs {
        match output {
            Output::Chunk(chunk) => {
                let filename = chunk.filename.to_string();
                files.push(OutputFile {
                    path: outdir.join(&filename),
                    contents: chunk.code.clone().into_bytes(),
                });

                let map_name = format!("{filename}.map");
                if source_map.publishes_map_file() && !asset_names.contains(&map_name) {
                    if let Some(map) = &chunk.map {
                        files.push(OutputFile {
                            path: outdir.join(map_name),
                            contents: map.to_json_string().into_bytes(),
                        });
                    }
                }
            }
            Output::Asset(asset) => files.push(OutputFile {
                path: outdir.join(asset.filename.as_str()),
                contents: asset.source.as_bytes().to_vec(),
            }),
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_js::{SourceMapMode, Stdin};
    use std::path::PathBuf;

    fn names(items: &[InputItem]) -> Vec<(Option<&str>, &str)> {
        items
            .iter()
            .map(|i| (i.name.as_deref(), i.import.as_str()))
            .collect()
    }

    #[test]
    fn test_stdin_input_item() {
        let options = BundlerOptions {
            stdin: Some(Stdin::default()),
            ..Default::default()
        };
        let items = input_items(&options);
        assert_eq!(names(&items), vec![(Some("stdin"), "<stdin>")]);
    }

    #[test]
    fn test_file_inputs_are_named_relative_to_common_ancestor() {
        let options = BundlerOptions {
            entry_points: vec![
                PathBuf::from("/site/assets/js/main.js"),
                PathBuf::from("/site/assets/js/admin/app.ts"),
            ],
            ..Default::default()
        };
        let items = input_items(&options);
        assert_eq!(
            names(&items),
            vec![
                (Some("main"), "/site/assets/js/main.js"),
                (Some("admin/app"), "/site/assets/js/admin/app.ts"),
            ]
        );
    }

    #[test]
    fn test_option_mapping() {
        let options = BundlerOptions {
            stdin: Some(Stdin::default()),
            outdir: PathBuf::from("/tmp/out"),
            resolve_dir: PathBuf::from("/site"),
            format: Format::Esm,
            minify_whitespace: true,
            source_map: SourceMapMode::External,
            external: vec!["react".to_string()],
            ..Default::default()
        };
        let mapped = rolldown_options(&options);
        assert!(matches!(mapped.format, Some(OutputFormat::Esm)));
        assert!(matches!(mapped.sourcemap, Some(SourceMapType::Hidden)));
        assert!(matches!(mapped.platform, Some(Platform::Browser)));
        assert!(mapped.minify.is_some());
        assert!(mapped.external.is_some());
        assert_eq!(mapped.cwd, Some(PathBuf::from("/site")));
        assert_eq!(mapped.dir.as_deref(), Some("/tmp/out"));
    }

    #[test]
    fn test_source_map_modes_map() {
        let map = |mode| {
            rolldown_options(&BundlerOptions {
                source_map: mode,
                ..Default::default()
            })
            .sourcemap
        };
        assert!(map(SourceMapMode::None).is_none());
        assert!(matches!(map(SourceMapMode::Inline), Some(SourceMapType::Inline)));
        assert!(matches!(map(SourceMapMode::Linked), Some(SourceMapType::File)));
    }

    #[test]
    fn test_defaults_leave_minify_and_externals_unset() {
        let mapped = rolldown_options(&BundlerOptions::default());
        assert!(mapped.minify.is_none());
        assert!(mapped.external.is_none());
        assert!(matches!(mapped.format, Some(OutputFormat::Iife)));
    }
}
