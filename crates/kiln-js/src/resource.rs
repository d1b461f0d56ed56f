//! Site resources: the values flowing into and out of a JS build.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::assets::AssetFs;
use crate::{Error, Result};

/// Media type of a resource, inferred from its file extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaType {
    JavaScript,
    TypeScript,
    Jsx,
    Tsx,
    Css,
    Json,
    SourceMap,
    Other(String),
}

impl MediaType {
    /// Infers the media type from a path's extension.
    pub fn from_path(path: &str) -> Self {
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some("js" | "mjs" | "cjs") => MediaType::JavaScript,
            Some("ts" | "mts" | "cts") => MediaType::TypeScript,
            Some("jsx") => MediaType::Jsx,
            Some("tsx") => MediaType::Tsx,
            Some("css") => MediaType::Css,
            Some("json") => MediaType::Json,
            Some("map") => MediaType::SourceMap,
            Some(other) => MediaType::Other(other.to_string()),
            None => MediaType::Other(String::new()),
        }
    }

    /// The media type of an entry output, which can only be a script or a
    /// stylesheet.
    pub fn for_entry_output(path: &str) -> Option<Self> {
        match path.rsplit_once('.').map(|(_, ext)| ext) {
            Some("js") => Some(MediaType::JavaScript),
            Some("css") => Some(MediaType::Css),
            _ => None,
        }
    }

    pub fn mime(&self) -> &str {
        match self {
            MediaType::JavaScript => "text/javascript",
            MediaType::TypeScript => "text/typescript",
            MediaType::Jsx => "text/jsx",
            MediaType::Tsx => "text/tsx",
            MediaType::Css => "text/css",
            MediaType::Json => "application/json",
            MediaType::SourceMap => "application/json",
            MediaType::Other(_) => "application/octet-stream",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

#[derive(Debug)]
struct ResourceInner {
    name: String,
    target_path: String,
    media_type: MediaType,
    content: Vec<u8>,
}

/// An addressable piece of site content.
///
/// `name` is the logical, slash-separated path the resource is known by in the
/// asset tree. `target_path` is where it is published. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

impl Resource {
    /// Creates a resource whose target path equals its name and whose media
    /// type is inferred from the name.
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let media_type = MediaType::from_path(&name);
        Self::with_media_type(name, content, media_type)
    }

    pub fn with_media_type(
        name: impl Into<String>,
        content: impl Into<Vec<u8>>,
        media_type: MediaType,
    ) -> Self {
        let name = name.into();
        Self {
            inner: Arc::new(ResourceInner {
                target_path: name.clone(),
                name,
                media_type,
                content: content.into(),
            }),
        }
    }

    /// Reads a resource from the asset tree by its logical name.
    pub fn from_asset(fs: &dyn AssetFs, name: &str) -> Result<Self> {
        let meta = fs
            .stat(name)
            .filter(|meta| !meta.is_dir)
            .ok_or_else(|| Error::ResourceNotFound(name.to_string()))?;
        let content = fs.read(&meta)?;
        Ok(Self::new(meta.name, content))
    }

    /// Returns a copy published at a different path.
    pub fn with_target_path(&self, target_path: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                name: self.inner.name.clone(),
                target_path: target_path.into(),
                media_type: self.inner.media_type.clone(),
                content: self.inner.content.clone(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn target_path(&self) -> &str {
        &self.inner.target_path
    }

    pub fn media_type(&self) -> &MediaType {
        &self.inner.media_type
    }

    pub fn content(&self) -> &[u8] {
        &self.inner.content
    }

    pub fn content_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.inner.content)
    }

    /// Logical directory of the resource, `""` at the asset root.
    pub fn dir(&self) -> &str {
        self.inner
            .name
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }
}
