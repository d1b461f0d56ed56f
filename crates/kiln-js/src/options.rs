//! Decoding of the loosely-typed build options map.
//!
//! Keys are matched case-insensitively. Decoding is pure: the same map always
//! yields the same [`Options`], which keeps cache keys stable.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::bundler::BundlerOptions;
use crate::{Error, Result};

/// The options map as supplied by callers.
pub type OptionsMap = serde_json::Map<String, Value>;

/// Name of the virtual module exposing `params` to scripts.
pub const PARAMS_MODULE: &str = "@params";

/// ECMAScript version the bundler lowers syntax to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Target {
    Es2015,
    Es2016,
    Es2017,
    Es2018,
    Es2019,
    Es2020,
    Es2021,
    Es2022,
    Es2023,
    Es2024,
    #[default]
    EsNext,
}

impl Target {
    pub fn as_str(self) -> &'static str {
        match self {
            Target::Es2015 => "es2015",
            Target::Es2016 => "es2016",
            Target::Es2017 => "es2017",
            Target::Es2018 => "es2018",
            Target::Es2019 => "es2019",
            Target::Es2020 => "es2020",
            Target::Es2021 => "es2021",
            Target::Es2022 => "es2022",
            Target::Es2023 => "es2023",
            Target::Es2024 => "es2024",
            Target::EsNext => "esnext",
        }
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "" | "esnext" => Ok(Target::EsNext),
            "es6" | "es2015" => Ok(Target::Es2015),
            "es2016" => Ok(Target::Es2016),
            "es2017" => Ok(Target::Es2017),
            "es2018" => Ok(Target::Es2018),
            "es2019" => Ok(Target::Es2019),
            "es2020" => Ok(Target::Es2020),
            "es2021" => Ok(Target::Es2021),
            "es2022" => Ok(Target::Es2022),
            "es2023" => Ok(Target::Es2023),
            "es2024" => Ok(Target::Es2024),
            other => Err(Error::invalid_option(
                "target",
                format!("unsupported target '{other}'. Expected: es2015..es2024 or esnext"),
            )),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Module format of the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Iife,
    Cjs,
    Esm,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "" | "iife" => Ok(Format::Iife),
            "cjs" => Ok(Format::Cjs),
            "esm" => Ok(Format::Esm),
            other => Err(Error::invalid_option(
                "format",
                format!("unsupported format '{other}'. Expected: iife, cjs, esm"),
            )),
        }
    }
}

/// How source maps are produced and referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceMapMode {
    #[default]
    None,
    Inline,
    External,
    Linked,
}

impl SourceMapMode {
    /// Whether a separate `.map` file is published next to the output.
    pub fn publishes_map_file(self) -> bool {
        matches!(self, SourceMapMode::External | SourceMapMode::Linked)
    }
}

impl FromStr for SourceMapMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "" | "none" => Ok(SourceMapMode::None),
            "inline" => Ok(SourceMapMode::Inline),
            "external" => Ok(SourceMapMode::External),
            "linked" => Ok(SourceMapMode::Linked),
            other => Err(Error::invalid_option(
                "sourceMap",
                format!("unsupported source map mode '{other}'. Expected: inline, external, linked, none"),
            )),
        }
    }
}

/// How JSX syntax is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JsxMode {
    #[default]
    Transform,
    Preserve,
    Automatic,
}

impl FromStr for JsxMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "" | "transform" => Ok(JsxMode::Transform),
            "preserve" => Ok(JsxMode::Preserve),
            "automatic" => Ok(JsxMode::Automatic),
            other => Err(Error::invalid_option(
                "jsx",
                format!("unsupported jsx mode '{other}'. Expected: transform, preserve, automatic"),
            )),
        }
    }
}

/// Options decoded from an [`OptionsMap`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    /// Where the primary output is published, overriding the resource path.
    pub target_path: Option<String>,
    pub target: Target,
    pub format: Format,
    pub minify: bool,
    pub source_map: SourceMapMode,
    pub jsx: JsxMode,
    pub jsx_import_source: Option<String>,
    /// Files, relative to the asset root, injected into every entry.
    pub inject: Vec<String>,
    /// Explicit entry points, relative to the asset root.
    pub entry_points: Vec<String>,
    pub externals: Vec<String>,
    pub defines: BTreeMap<String, String>,
    pub avoid_tdz: bool,
    /// Exposed to scripts as the default export of `@params`.
    pub params: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOptions {
    #[serde(rename = "targetpath")]
    target_path: Option<String>,
    target: Option<String>,
    format: Option<String>,
    minify: Option<bool>,
    #[serde(rename = "sourcemap")]
    source_map: Option<String>,
    jsx: Option<String>,
    #[serde(rename = "jsximportsource")]
    jsx_import_source: Option<String>,
    #[serde(deserialize_with = "one_or_many")]
    inject: Vec<String>,
    #[serde(rename = "entrypoints", deserialize_with = "one_or_many")]
    entry_points: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    externals: Vec<String>,
    defines: Option<BTreeMap<String, Value>>,
    #[serde(rename = "avoidtdz")]
    avoid_tdz: Option<bool>,
    params: Option<Value>,
}

/// Copy of the map with top-level keys lowercased.
pub(crate) fn lowercase_keys(map: &OptionsMap) -> OptionsMap {
    map.iter()
        .map(|(k, v)| (k.to_lowercase(), v.clone()))
        .collect()
}

fn define_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl Options {
    /// Decodes an options map. Unknown keys are ignored.
    pub fn decode(map: &OptionsMap) -> Result<Self> {
        let raw: RawOptions = serde_json::from_value(Value::Object(lowercase_keys(map)))
            .map_err(|e| Error::invalid_option("options", e.to_string()))?;

        Ok(Self {
            target_path: raw
                .target_path
                .map(|p| p.trim_start_matches('/').to_string())
                .filter(|p| !p.is_empty()),
            target: raw.target.as_deref().unwrap_or_default().parse()?,
            format: raw.format.as_deref().unwrap_or_default().parse()?,
            minify: raw.minify.unwrap_or(false),
            source_map: raw.source_map.as_deref().unwrap_or_default().parse()?,
            jsx: raw.jsx.as_deref().unwrap_or_default().parse()?,
            jsx_import_source: raw.jsx_import_source.filter(|s| !s.is_empty()),
            inject: raw.inject,
            entry_points: raw.entry_points,
            externals: raw.externals,
            defines: raw
                .defines
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, define_value(v)))
                .collect(),
            avoid_tdz: raw.avoid_tdz.unwrap_or(false),
            params: raw.params.filter(|p| !p.is_null()),
        })
    }

    /// Translates the options into bundler options. Entry points, injects and
    /// directories are filled in by the orchestrator.
    pub fn to_bundler_options(&self) -> BundlerOptions {
        let mut virtual_modules = BTreeMap::new();
        if let Some(params) = &self.params {
            virtual_modules.insert(
                PARAMS_MODULE.to_string(),
                format!("export default {params};\n"),
            );
        }

        BundlerOptions {
            bundle: true,
            target: self.target,
            format: self.format,
            minify_whitespace: self.minify,
            minify_identifiers: self.minify,
            minify_syntax: self.minify,
            source_map: self.source_map,
            jsx: self.jsx,
            jsx_import_source: self.jsx_import_source.clone(),
            external: self.externals.clone(),
            define: self.defines.clone(),
            avoid_tdz: self.avoid_tdz,
            virtual_modules,
            ..Default::default()
        }
    }
}
