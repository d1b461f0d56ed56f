//! Conversion of CLI errors into miette reports.

use miette::Report;

use crate::error::CliError;

/// Converts a [`CliError`] into a report for `main` to render.
///
/// Build errors keep their diagnostic data: source snippets, help text and the
/// secondary bundler errors as related diagnostics.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(e) => Report::new(e),
        other => miette::miette!("{}", other),
    }
}
