//! Error types for the kiln CLI.
//!
//! Pipeline failures keep their [`kiln_js::Error`] so they render with source
//! snippets; everything else carries a hint for the user.

mod miette;

use std::path::PathBuf;

use thiserror::Error;

pub use self::miette::cli_error_to_miette;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The build itself failed.
    #[error(transparent)]
    Build(#[from] kiln_js::Error),

    /// An artifact could not be written to the output directory.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {}\n\nHint: Create kiln.toml or pass an existing file to --config", .0.display())]
    NotFound(PathBuf),

    /// The merged configuration does not deserialize.
    #[error("Invalid configuration: {0}\n\nHint: Check kiln.toml syntax and KILN_* environment variables")]
    Invalid(String),

    #[error("No asset roots configured\n\nHint: Set `assets = [\"assets\"]` in kiln.toml or pass --assets <DIR>")]
    NoAssetRoots,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Invalid(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_carry_hints() {
        let err = CliError::from(ConfigError::NotFound(PathBuf::from("site.toml")));
        let text = err.to_string();
        assert!(text.contains("site.toml"), "{text}");
        assert!(text.contains("Hint:"), "{text}");
    }

    #[test]
    fn test_build_errors_are_transparent() {
        let err = CliError::from(kiln_js::Error::NoResources);
        assert_eq!(err.to_string(), "no resources to build");
    }
}
