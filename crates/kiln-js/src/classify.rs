//! Output classification.
//!
//! Splits the bundler's flat output list into entry outputs, which map back to
//! one input entry each, and additional files (chunks, maps), and moves every
//! path from the private bundler directory to its publish location.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::bundler::OutputFile;
use crate::lca::lowest_common_ancestor_directory;
use crate::options::SourceMapMode;
use crate::resource::MediaType;
use crate::{Error, Result};

/// An entry point as handed to the bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedEntry {
    /// A file in the asset tree.
    File { import: String, filename: PathBuf },
    /// The in-memory contents of a single input resource.
    Stdin { name: String },
}

impl ResolvedEntry {
    /// The logical path the entry was requested as.
    pub fn import(&self) -> &str {
        match self {
            ResolvedEntry::File { import, .. } => import,
            ResolvedEntry::Stdin { name } => name,
        }
    }
}

/// A bundler output matched to an input entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutput {
    /// Index of the entry in the build's entry list.
    pub entry: usize,
    pub path: String,
    pub media_type: MediaType,
    pub contents: Vec<u8>,
}

/// A bundler output not tied to an entry, published as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalFile {
    pub path: String,
    pub contents: Vec<u8>,
}

/// Where a build's outputs come from and where they go.
#[derive(Debug, Clone)]
pub struct OutputLayout<'a> {
    /// The bundler's private output directory.
    pub out_dir: &'a Path,
    /// Logical directory outputs are published under.
    pub publish_dir: &'a str,
    /// Publish path of the first entry's script.
    pub primary_path: &'a str,
    /// Whether several resources were bundled together.
    pub multiple: bool,
    pub source_map: SourceMapMode,
}

/// Result of classifying one build's outputs.
#[derive(Debug, Default)]
pub struct Classified {
    /// Entry outputs ordered by entry, scripts before stylesheets.
    pub entries: Vec<EntryOutput>,
    pub additional: Vec<AdditionalFile>,
    /// Contents of the primary output's external source map.
    pub primary_map: Option<Vec<u8>>,
}

/// Path, without extension, the bundler writes an entry's output to.
///
/// This is the one place that encodes the bundler's output naming: entries are
/// laid out relative to the lowest common ancestor of all entry files, and the
/// in-memory entry is written as `stdin`.
pub fn expected_output_stem(entry: &ResolvedEntry, out_base: &str, out_dir: &Path) -> PathBuf {
    match entry {
        ResolvedEntry::Stdin { .. } => out_dir.join("stdin"),
        ResolvedEntry::File { filename, .. } => {
            let full = filename.to_string_lossy();
            let relative = full
                .strip_prefix(out_base)
                .unwrap_or(&full)
                .trim_start_matches(['/', '\\']);
            out_dir.join(Path::new(relative).with_extension(""))
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// Joins logical path segments with `/`, skipping empty ones.
pub(crate) fn join_logical(dir: &str, rel: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        rel.to_string()
    } else {
        format!("{dir}/{rel}")
    }
}

fn publish_path(raw: &Path, layout: &OutputLayout<'_>) -> String {
    let relative = raw
        .strip_prefix(layout.out_dir)
        .unwrap_or_else(|_| Path::new(raw.file_name().unwrap_or_default()));
    let rel = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    join_logical(layout.publish_dir, &rel)
}

/// Classifies the bundler outputs of a build over `entries`.
pub fn classify(
    entries: &[ResolvedEntry],
    outputs: Vec<OutputFile>,
    layout: &OutputLayout<'_>,
) -> Result<Classified> {
    let Some(first) = entries.first() else {
        return Err(Error::NoResources);
    };

    let files: Vec<String> = entries
        .iter()
        .filter_map(|e| match e {
            ResolvedEntry::File { filename, .. } => Some(filename.to_string_lossy().into_owned()),
            ResolvedEntry::Stdin { .. } => None,
        })
        .collect();
    let out_base = lowest_common_ancestor_directory(&files);

    let mut expected: FxHashMap<PathBuf, usize> = FxHashMap::default();
    for (index, entry) in entries.iter().enumerate() {
        let stem = expected_output_stem(entry, &out_base, layout.out_dir);
        expected.entry(with_suffix(&stem, ".js")).or_insert(index);
        if layout.multiple {
            expected.entry(with_suffix(&stem, ".css")).or_insert(index);
        }
    }

    let primary_raw = with_suffix(&expected_output_stem(first, &out_base, layout.out_dir), ".js");
    let primary_map_raw = with_suffix(&primary_raw, ".map");

    let mut classified = Classified::default();
    for output in outputs {
        if output.path == primary_map_raw && layout.source_map.publishes_map_file() {
            classified.primary_map = Some(output.contents);
            continue;
        }

        let Some(&entry) = expected.get(&output.path) else {
            classified.additional.push(AdditionalFile {
                path: publish_path(&output.path, layout),
                contents: output.contents,
            });
            continue;
        };

        let raw = output.path.to_string_lossy();
        let media_type = MediaType::for_entry_output(&raw)
            .ok_or_else(|| Error::UnexpectedOutput(raw.to_string()))?;
        let path = if output.path == primary_raw {
            layout.primary_path.to_string()
        } else {
            publish_path(&output.path, layout)
        };
        classified.entries.push(EntryOutput {
            entry,
            path,
            media_type,
            contents: output.contents,
        });
    }

    if !classified
        .entries
        .iter()
        .any(|e| e.entry == 0 && e.path == layout.primary_path)
    {
        return Err(Error::MissingOutput {
            entry: first.import().to_string(),
        });
    }

    classified
        .entries
        .sort_by_key(|e| (e.entry, e.media_type != MediaType::JavaScript));

    tracing::debug!(
        entries = classified.entries.len(),
        additional = classified.additional.len(),
        out_base = %out_base,
        "classified bundler output"
    );

    Ok(classified)
}
