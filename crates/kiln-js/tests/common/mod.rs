//! Shared helpers for kiln-js integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use kiln_js::testing::ScriptedBundler;
use kiln_js::{AssetFs, Client, ClientConfig, MemoryPublisher, OptionsMap, OsAssetFs};
use serde_json::Value;
use tempfile::TempDir;

/// A site with an on-disk asset tree and an in-memory publish target.
pub struct TestSite {
    pub dir: TempDir,
    pub assets: Arc<OsAssetFs>,
    pub publisher: Arc<MemoryPublisher>,
}

impl TestSite {
    /// Creates a site whose asset tree holds `files` (logical name, contents).
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("assets");
        for (name, contents) in files {
            let path = root.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        }
        Self {
            assets: Arc::new(OsAssetFs::new(root)),
            publisher: Arc::new(MemoryPublisher::new()),
            dir,
        }
    }

    pub fn root(&self) -> &Path {
        &self.assets.roots()[0]
    }

    pub fn client(&self, bundler: Arc<ScriptedBundler>) -> Client {
        Client::new(
            self.assets.clone(),
            bundler,
            self.publisher.clone(),
            ClientConfig {
                working_dir: self.dir.path().to_path_buf(),
                tsconfig: None,
            },
        )
    }

    pub fn echo_bundler(&self) -> Arc<ScriptedBundler> {
        let assets: Arc<dyn AssetFs> = self.assets.clone();
        Arc::new(ScriptedBundler::echo(assets))
    }
}

/// Builds an options map from a JSON object literal.
pub fn options(value: Value) -> OptionsMap {
    match value {
        Value::Object(map) => map,
        other => panic!("options must be an object, got {other}"),
    }
}
