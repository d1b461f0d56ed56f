//! Layered configuration for `kiln build`.
//!
//! Priority, lowest to highest: defaults, `kiln.toml` (or `--config`),
//! `KILN_`-prefixed environment variables, command-line flags. Nested keys in
//! the environment use a double underscore, e.g. `KILN_JS__MINIFY=true`.
//! Config files may spell keys in camelCase (`targetPath`); they are read as
//! snake_case.

mod loading;

use std::collections::BTreeMap;
use std::path::PathBuf;

use kiln_js::{ClientConfig, OptionsMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = "kiln.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    /// Asset roots; earlier roots shadow later ones.
    pub assets: Vec<PathBuf>,
    pub out_dir: PathBuf,
    pub working_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tsconfig: Option<PathBuf>,
    pub js: JsConfig,
}

impl Default for KilnConfig {
    fn default() -> Self {
        Self {
            assets: vec![PathBuf::from("assets")],
            out_dir: PathBuf::from("public"),
            working_dir: PathBuf::from("."),
            tsconfig: None,
            js: JsConfig::default(),
        }
    }
}

impl KilnConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            working_dir: self.working_dir.clone(),
            tsconfig: self.tsconfig.clone(),
        }
    }
}

/// The `[js]` table: build options applied to every resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_map: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsx_import_source: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inject: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entry_points: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub externals: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub defines: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avoid_tdz: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsConfig {
    /// The options map handed to [`kiln_js::Client::process`]. Only set
    /// options are included, so unset ones keep the pipeline defaults.
    pub fn to_options_map(&self) -> OptionsMap {
        let mut map = OptionsMap::new();
        let mut set = |key: &str, value: Value| {
            map.insert(key.to_string(), value);
        };

        if let Some(v) = &self.target_path {
            set("targetPath", v.as_str().into());
        }
        if let Some(v) = &self.target {
            set("target", v.as_str().into());
        }
        if let Some(v) = &self.format {
            set("format", v.as_str().into());
        }
        if let Some(v) = self.minify {
            set("minify", v.into());
        }
        if let Some(v) = &self.source_map {
            set("sourceMap", v.as_str().into());
        }
        if let Some(v) = &self.jsx {
            set("jsx", v.as_str().into());
        }
        if let Some(v) = &self.jsx_import_source {
            set("jsxImportSource", v.as_str().into());
        }
        if !self.inject.is_empty() {
            set("inject", self.inject.clone().into());
        }
        if !self.entry_points.is_empty() {
            set("entryPoints", self.entry_points.clone().into());
        }
        if !self.externals.is_empty() {
            set("externals", self.externals.clone().into());
        }
        if !self.defines.is_empty() {
            let defines: serde_json::Map<String, Value> = self
                .defines
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            set("defines", Value::Object(defines));
        }
        if let Some(v) = self.avoid_tdz {
            set("avoidTDZ", v.into());
        }
        if let Some(v) = &self.params {
            set("params", v.clone());
        }
        map
    }
}
