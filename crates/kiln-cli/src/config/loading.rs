use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
    value::{Dict, Value},
};
use serde::Serialize;

use crate::cli::BuildArgs;
use crate::config::{CONFIG_FILE, KilnConfig};
use crate::error::{ConfigError, Result};

/// Flags given on the command line; unset ones leave lower layers alone.
#[derive(Debug, Default, Serialize)]
struct CliOverrides {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    assets: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    out_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    working_dir: Option<PathBuf>,
    js: JsOverrides,
}

#[derive(Debug, Default, Serialize)]
struct JsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    target_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    minify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_map: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    inject: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    entry_points: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    externals: Vec<String>,
}

impl From<&BuildArgs> for CliOverrides {
    fn from(args: &BuildArgs) -> Self {
        Self {
            assets: args.assets.clone(),
            out_dir: args.out_dir.clone(),
            working_dir: args.working_dir.clone(),
            js: JsOverrides {
                target_path: args.target_path.clone(),
                target: args.target.clone(),
                format: args.format.map(|f| f.as_str()),
                minify: args.minify.then_some(true),
                source_map: args.source_map.map(|m| m.as_str()),
                inject: args.inject.clone(),
                entry_points: args.entry_points.clone(),
                externals: args.external.clone(),
            },
        }
    }
}

impl KilnConfig {
    /// Loads configuration for `args`, looking for `kiln.toml` in the current
    /// directory unless `--config` names a file.
    pub fn load(args: &BuildArgs) -> Result<Self> {
        Self::load_from(args, Path::new("."))
    }

    /// Like [`KilnConfig::load`], with `base` standing in for the current
    /// directory when looking up the default config file.
    pub fn load_from(args: &BuildArgs, base: &Path) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(KilnConfig::default()));

        let config_file = match &args.config {
            Some(path) if path.exists() => Some(path.clone()),
            Some(path) => return Err(ConfigError::NotFound(path.clone()).into()),
            None => {
                let default_path = base.join(CONFIG_FILE);
                default_path.exists().then_some(default_path)
            }
        };

        if let Some(path) = config_file {
            tracing::debug!(config = %path.display(), "loading config file");
            figment = figment.merge(Serialized::defaults(file_layer(&path)?));
        }

        figment = figment
            .merge(Env::prefixed("KILN_").split("__"))
            .merge(Serialized::defaults(CliOverrides::from(args)));

        let config: KilnConfig = figment.extract().map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.assets.is_empty() {
            return Err(ConfigError::NoAssetRoots.into());
        }
        Ok(())
    }
}

/// Reads a config file with its keys in snake_case, so camelCase spellings
/// (`targetPath`, `avoidTDZ`) land on the same keys the other layers use.
fn file_layer(path: &Path) -> Result<Dict> {
    let dict: Dict = Figment::from(Toml::file(path))
        .extract()
        .map_err(ConfigError::from)?;

    Ok(dict
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Dict(tag, table) if key == "js" => Value::Dict(
                    tag,
                    table
                        .into_iter()
                        .map(|(k, v)| (snake_case(&k), v))
                        .collect(),
                ),
                other => other,
            };
            (snake_case(&key), value)
        })
        .collect())
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}
