//! `kiln build`: bundle resources and write the artifacts to the site output.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use console::style;
use kiln_js::{BuildInput, Client, FsPublisher, OsAssetFs, Publisher, Resource};
use kiln_rolldown::RolldownBundler;

use crate::cli::BuildArgs;
use crate::config::KilnConfig;
use crate::error::{CliError, Result};

/// Runs the build command.
///
/// 1. Load configuration (flags > env > file > defaults)
/// 2. Read each resource from the layered asset tree
/// 3. Process them through the client: one resource builds alone, several
///    build together
/// 4. Write every artifact under the output directory
pub async fn execute(args: BuildArgs, quiet: bool) -> Result<()> {
    let start = Instant::now();

    let config = KilnConfig::load(&args)?;
    tracing::debug!(
        assets = ?config.assets,
        out_dir = %config.out_dir.display(),
        "configuration loaded"
    );

    let artifacts = build(&config, &args.resources).await?;
    let out = FsPublisher::new(&config.out_dir);
    write_artifacts(&out, &artifacts)?;

    if !quiet {
        print_summary(out.root(), &artifacts, start.elapsed());
    }
    Ok(())
}

/// Builds `resources` with the given configuration and returns the artifacts.
///
/// Side files (chunks, source maps, CSS) are published under the output
/// directory as part of processing.
pub async fn build(config: &KilnConfig, resources: &[String]) -> Result<Vec<Resource>> {
    let assets = Arc::new(OsAssetFs::layered(config.assets.clone()));
    let bundler = Arc::new(RolldownBundler::new(assets.clone()));
    let publisher = Arc::new(FsPublisher::new(&config.out_dir));
    let client = Client::new(assets.clone(), bundler, publisher, config.client_config());

    let resources = resources
        .iter()
        .map(|name| Resource::from_asset(assets.as_ref(), name))
        .collect::<kiln_js::Result<Vec<_>>>()?;

    let input = match <[Resource; 1]>::try_from(resources) {
        Ok([resource]) => BuildInput::single(resource),
        Err(resources) => BuildInput::multiple(resources),
    };

    tracing::info!(count = input.resources().len(), "building");
    let processed = client.process(input, config.js.to_options_map()).await?;
    Ok(processed.into_artifacts())
}

fn write_artifacts(out: &FsPublisher, artifacts: &[Resource]) -> Result<()> {
    for artifact in artifacts {
        out.publish(artifact.target_path(), artifact.content())
            .map_err(|source| CliError::Write {
                path: out.root().join(artifact.target_path()),
                source,
            })?;
        tracing::debug!(path = artifact.target_path(), "artifact written");
    }
    Ok(())
}

fn print_summary(root: &Path, artifacts: &[Resource], elapsed: Duration) {
    eprintln!(
        "{} Built {} artifact(s) into {} in {}ms",
        style("✓").green().bold(),
        artifacts.len(),
        style(root.display()).cyan(),
        elapsed.as_millis()
    );
    for artifact in artifacts {
        eprintln!(
            "  {} {} {}",
            style(artifact.target_path()).bold(),
            style(artifact.media_type()).dim(),
            style(format_size(artifact.content().len())).dim()
        );
    }
}

fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let bytes = bytes as f64;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < KB * KB {
        format!("{:.2} KB", bytes / KB)
    } else {
        format!("{:.2} MB", bytes / (KB * KB))
    }
}
