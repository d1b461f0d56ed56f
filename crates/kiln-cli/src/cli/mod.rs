//! Command-line interface definition for kiln.
//!
//! - `kiln build` bundles one or more resources from the asset tree

mod enums;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub use enums::{Format, SourceMapMode};

/// kiln - the JavaScript step of a static-site asset pipeline
#[derive(Parser, Debug)]
#[command(
    name = "kiln",
    version,
    about = "Bundles a site's JavaScript and TypeScript resources",
    long_about = "kiln resolves resources from a layered asset tree, bundles them with Rolldown\n\
                  and publishes the results, with source maps, under the site output directory."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bundle resources from the asset tree
    ///
    /// A single resource yields one artifact at the resource's path (or
    /// --target-path). Several resources are built together and yield one
    /// artifact per entry.
    Build(BuildArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Resources to bundle, relative to the asset root
    ///
    /// Examples:
    ///   kiln build js/main.js
    ///   kiln build js/main.ts js/admin/app.tsx
    #[arg(required = true, value_name = "RESOURCE")]
    pub resources: Vec<String>,

    /// Config file (defaults to kiln.toml in the current directory)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Asset roots, first match wins
    #[arg(short, long = "assets", value_name = "DIR")]
    pub assets: Vec<PathBuf>,

    /// Site output directory
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Directory used to resolve node_modules and tsconfig.json
    #[arg(long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// ECMAScript target (es2015..es2024, esnext)
    #[arg(long, value_name = "TOKEN")]
    pub target: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<Format>,

    /// Minify whitespace, identifiers and syntax
    #[arg(short, long)]
    pub minify: bool,

    /// Source map mode
    #[arg(long, value_enum, value_name = "MODE")]
    pub source_map: Option<SourceMapMode>,

    /// Publish the primary output here instead of at the resource path
    #[arg(long, value_name = "PATH")]
    pub target_path: Option<String>,

    /// Explicit entry points, relative to the asset root
    #[arg(long = "entry-point", value_name = "PATH")]
    pub entry_points: Vec<String>,

    /// Files injected into every entry, relative to the asset root
    #[arg(long, value_name = "PATH")]
    pub inject: Vec<String>,

    /// Packages left as imports in the output
    #[arg(short = 'e', long, value_name = "NAME")]
    pub external: Vec<String>,
}
