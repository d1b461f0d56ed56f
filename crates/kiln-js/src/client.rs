//! The cached entry point of the JS pipeline.
//!
//! [`Client::process`] keys a build by its input names and options, runs it at
//! most once per key, publishes the build's side files and hands back the
//! entry outputs as [`Resource`]s.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use path_clean::PathClean;

use crate::assets::AssetFs;
use crate::build::{BuildRequest, Builder, Bundle};
use crate::bundler::Bundler;
use crate::cache::{CacheKey, ResultCache};
use crate::classify::EntryOutput;
use crate::options::OptionsMap;
use crate::publish::Publisher;
use crate::resource::Resource;
use crate::{Error, Result};

/// Library configuration for a [`Client`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Directory bare module imports (`node_modules`) are resolved from.
    pub working_dir: PathBuf,
    /// TypeScript config handed to the bundler. When unset, a
    /// `tsconfig.json` at the asset root is used if present.
    pub tsconfig: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            tsconfig: None,
        }
    }
}

/// What to build: one resource, or several bundled together.
#[derive(Debug, Clone)]
pub enum BuildInput {
    Single(Resource),
    Multiple(Vec<Resource>),
}

impl BuildInput {
    pub fn single(resource: Resource) -> Self {
        BuildInput::Single(resource)
    }

    pub fn multiple(resources: impl IntoIterator<Item = Resource>) -> Self {
        BuildInput::Multiple(resources.into_iter().collect())
    }

    pub fn resources(&self) -> &[Resource] {
        match self {
            BuildInput::Single(resource) => std::slice::from_ref(resource),
            BuildInput::Multiple(resources) => resources,
        }
    }
}

/// The artifacts of a processed [`BuildInput`].
#[derive(Debug, Clone)]
pub enum Processed {
    /// The primary output of a single-resource build.
    Single(Resource),
    /// Every entry output, in input order.
    Multiple(Vec<Resource>),
}

impl Processed {
    pub fn artifacts(&self) -> &[Resource] {
        match self {
            Processed::Single(resource) => std::slice::from_ref(resource),
            Processed::Multiple(resources) => resources,
        }
    }

    pub fn into_artifacts(self) -> Vec<Resource> {
        match self {
            Processed::Single(resource) => vec![resource],
            Processed::Multiple(resources) => resources,
        }
    }
}

/// Builds JS resources with result caching.
///
/// Cheap to share behind an `Arc`; `process` may be called concurrently.
#[derive(Debug)]
pub struct Client {
    builder: Builder,
    publisher: Arc<dyn Publisher>,
    results: ResultCache<Vec<Resource>>,
    resources: ResultCache<Resource>,
}

impl Client {
    pub fn new(
        assets: Arc<dyn AssetFs>,
        bundler: Arc<dyn Bundler>,
        publisher: Arc<dyn Publisher>,
        config: ClientConfig,
    ) -> Self {
        Self {
            builder: Builder::new(assets, bundler, config),
            publisher,
            results: ResultCache::new(),
            resources: ResultCache::new(),
        }
    }

    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    /// Number of builds held in the result cache.
    pub fn cached_builds(&self) -> usize {
        self.results.len()
    }

    /// Builds `input` with `options`, or returns the cached artifacts of an
    /// identical earlier or in-flight build.
    pub async fn process(&self, input: BuildInput, options: OptionsMap) -> Result<Processed> {
        let names: Vec<&str> = input.resources().iter().map(Resource::name).collect();
        let key = CacheKey::compute(&names, &options);

        let artifacts = self
            .results
            .get_or_create(key.as_str(), || async {
                let request = BuildRequest::new(input.resources().to_vec(), options);
                let bundle = self.builder.build(&request).await?;
                let artifacts = self.publish(bundle).await?;
                if let BuildInput::Single(_) = &input {
                    // Only the primary output is returned; the other entry
                    // outputs still have to reach the site.
                    for extra in artifacts.iter().skip(1) {
                        self.publish_file(extra.target_path(), extra.content())?;
                    }
                }
                Ok(artifacts)
            })
            .await?;

        match input {
            BuildInput::Single(_) => artifacts
                .into_iter()
                .next()
                .map(Processed::Single)
                .ok_or(Error::NoResources),
            BuildInput::Multiple(_) => Ok(Processed::Multiple(artifacts)),
        }
    }

    /// Publishes the side files of `bundle` and turns its entry outputs into
    /// resources.
    async fn publish(&self, bundle: Bundle) -> Result<Vec<Resource>> {
        for file in &bundle.additional {
            self.publish_file(&file.path, &file.contents)?;
        }
        if let Some(map) = &bundle.source_map {
            self.publish_file(&map.path, &map.contents)?;
        }

        let mut artifacts = Vec::with_capacity(bundle.entries.len());
        for output in bundle.entries {
            artifacts.push(self.artifact(output).await?);
        }
        Ok(artifacts)
    }

    fn publish_file(&self, path: &str, contents: &[u8]) -> Result<()> {
        self.publisher
            .publish(path, contents)
            .map_err(|source| Error::Publish {
                path: path.to_string(),
                source,
            })
    }

    async fn artifact(&self, output: EntryOutput) -> Result<Resource> {
        let key = content_key(&output.path, &output.contents);
        self.resources
            .get_or_create(&key, || async move {
                Ok(Resource::with_media_type(
                    output.path,
                    output.contents,
                    output.media_type,
                ))
            })
            .await
    }
}

/// Content address of an entry output: its cleaned path and a BLAKE3 hash of
/// its bytes.
fn content_key(path: &str, contents: &[u8]) -> String {
    let cleaned = Path::new(path).clean();
    format!(
        "{}#{}",
        cleaned.to_string_lossy(),
        blake3::hash(contents).to_hex()
    )
}
