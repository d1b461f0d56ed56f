//! # kiln-cli
//!
//! Command-line front end for the kiln JavaScript pipeline.
//!
//! `kiln build` reads resources from a layered asset tree, bundles them with
//! Rolldown through [`kiln_js::Client`] and writes the artifacts under the
//! site output directory.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
