//! Asset tree abstraction.
//!
//! The asset tree is the virtual, layered filesystem logical import paths are
//! resolved against. Logical paths are slash-separated and relative to the
//! asset root. Implementations also accept absolute paths of real files that
//! live under one of their roots, which is how bundler diagnostics refer to
//! sources.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::io;
use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;

/// Metadata for an entry in the asset tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Logical path relative to the asset root.
    pub name: String,
    /// Absolute path of the underlying file.
    pub filename: PathBuf,
    pub is_dir: bool,
}

/// Read access to the site's asset tree.
pub trait AssetFs: Send + Sync + Debug {
    /// Looks up a logical path (or an absolute path under one of the roots).
    fn stat(&self, path: &str) -> Option<FileMeta>;

    /// Reads the contents of a file returned by [`AssetFs::stat`].
    fn read(&self, meta: &FileMeta) -> io::Result<Vec<u8>>;
}

/// Normalizes a logical path: forward slashes, no `.` segments, no leading
/// `./` or `/`. Returns `None` for paths that climb out of the root.
pub fn normalize_logical(path: &str) -> Option<String> {
    let slashed = path.replace('\\', "/");
    let cleaned = PathBuf::from(slashed.trim_start_matches('/')).clean();
    if cleaned
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return None;
    }
    let joined = cleaned
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    Some(joined)
}

fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Asset tree backed by one or more directories on disk.
///
/// Roots are layered: the first root containing a path wins.
#[derive(Debug, Clone)]
pub struct OsAssetFs {
    roots: Vec<PathBuf>,
}

impl OsAssetFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
        }
    }

    pub fn layered(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn meta_for(root: &Path, filename: PathBuf) -> Option<FileMeta> {
        let metadata = std::fs::metadata(&filename).ok()?;
        let name = to_slash(filename.strip_prefix(root).ok()?);
        Some(FileMeta {
            name,
            filename,
            is_dir: metadata.is_dir(),
        })
    }
}

impl AssetFs for OsAssetFs {
    fn stat(&self, path: &str) -> Option<FileMeta> {
        let as_path = Path::new(path);
        if as_path.is_absolute() {
            let filename = as_path.to_path_buf().clean();
            return self
                .roots
                .iter()
                .filter(|root| filename.starts_with(root))
                .find_map(|root| Self::meta_for(root, filename.clone()));
        }

        let logical = normalize_logical(path)?;
        self.roots
            .iter()
            .find_map(|root| Self::meta_for(root, root.join(&logical)))
    }

    fn read(&self, meta: &FileMeta) -> io::Result<Vec<u8>> {
        std::fs::read(&meta.filename)
    }
}

/// In-memory asset tree rooted at a virtual absolute directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetFs {
    root: PathBuf,
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryAssetFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: BTreeMap::new(),
        }
    }

    /// Adds a file. Paths that cannot be normalized are ignored.
    pub fn with_file(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&mut self, name: &str, content: impl Into<Vec<u8>>) {
        if let Some(name) = normalize_logical(name) {
            self.files.insert(name, content.into());
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn logical(&self, path: &str) -> Option<String> {
        let as_path = Path::new(path);
        if as_path.is_absolute() {
            let rel = as_path.strip_prefix(&self.root).ok()?;
            return normalize_logical(&to_slash(rel));
        }
        normalize_logical(path)
    }
}

impl AssetFs for MemoryAssetFs {
    fn stat(&self, path: &str) -> Option<FileMeta> {
        let name = self.logical(path)?;
        let filename = self.root.join(&name);
        if self.files.contains_key(&name) {
            return Some(FileMeta {
                name,
                filename,
                is_dir: false,
            });
        }
        let prefix = if name.is_empty() {
            String::new()
        } else {
            format!("{name}/")
        };
        self.files
            .keys()
            .any(|key| key.starts_with(&prefix))
            .then_some(FileMeta {
                name,
                filename,
                is_dir: true,
            })
    }

    fn read(&self, meta: &FileMeta) -> io::Result<Vec<u8>> {
        self.files.get(&meta.name).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a file in the asset tree", meta.name),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_logical() {
        assert_eq!(normalize_logical("./js/main.js").as_deref(), Some("js/main.js"));
        assert_eq!(normalize_logical("js//a/../b.js").as_deref(), Some("js/b.js"));
        assert_eq!(normalize_logical("js\\win.js").as_deref(), Some("js/win.js"));
        assert_eq!(normalize_logical("../escape.js"), None);
    }

    #[test]
    fn test_memory_stat_files_and_dirs() {
        let fs = MemoryAssetFs::new("/site/assets")
            .with_file("js/foo.js", "a")
            .with_file("js/foo/index.js", "b");

        let file = fs.stat("js/foo.js").unwrap();
        assert!(!file.is_dir);
        assert_eq!(file.filename, PathBuf::from("/site/assets/js/foo.js"));

        let dir = fs.stat("js/foo").unwrap();
        assert!(dir.is_dir);
        assert!(fs.stat("js/bar").is_none());
    }

    #[test]
    fn test_memory_stat_accepts_absolute_paths_under_root() {
        let fs = MemoryAssetFs::new("/site/assets").with_file("js/foo.js", "a");
        let meta = fs.stat("/site/assets/js/foo.js").unwrap();
        assert_eq!(meta.name, "js/foo.js");
        assert!(fs.stat("/elsewhere/js/foo.js").is_none());
    }

    #[test]
    fn test_memory_read_directory_fails() {
        let fs = MemoryAssetFs::new("/a").with_file("js/x.js", "x");
        let dir = fs.stat("js").unwrap();
        assert_eq!(fs.read(&dir).unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_os_layered_first_root_wins() {
        let theme = TempDir::new().unwrap();
        let site = TempDir::new().unwrap();
        std::fs::create_dir_all(site.path().join("js")).unwrap();
        std::fs::create_dir_all(theme.path().join("js")).unwrap();
        std::fs::write(site.path().join("js/main.js"), "site").unwrap();
        std::fs::write(theme.path().join("js/main.js"), "theme").unwrap();
        std::fs::write(theme.path().join("js/only-theme.js"), "theme-only").unwrap();

        let fs = OsAssetFs::layered([site.path(), theme.path()]);

        let main = fs.stat("js/main.js").unwrap();
        assert_eq!(fs.read(&main).unwrap(), b"site");
        assert_eq!(main.name, "js/main.js");

        let fallback = fs.stat("js/only-theme.js").unwrap();
        assert_eq!(fs.read(&fallback).unwrap(), b"theme-only");
        assert!(fs.stat("js").unwrap().is_dir);
    }

    #[test]
    fn test_os_stat_absolute() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.js"), "x").unwrap();
        let fs = OsAssetFs::new(root.path());

        let abs = root.path().join("a.js");
        let meta = fs.stat(abs.to_str().unwrap()).unwrap();
        assert_eq!(meta.name, "a.js");
        assert!(fs.stat("/definitely/not/under/root.js").is_none());
    }
}
