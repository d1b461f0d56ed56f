//! Publishing of build artifacts and side files.
//!
//! [`FsPublisher`] writes under a site output directory. Every target path is
//! validated to stay inside that directory, and files are written atomically
//! (temp file + rename) so readers never observe a partial bundle file.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use path_clean::PathClean;

/// Destination for published files.
pub trait Publisher: Send + Sync + Debug {
    /// Publishes `contents` at the logical target path `path`.
    fn publish(&self, path: &str, contents: &[u8]) -> io::Result<()>;
}

/// Publishes files below a directory on disk.
#[derive(Debug, Clone)]
pub struct FsPublisher {
    root: PathBuf,
}

impl FsPublisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into().clean(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path for a target path, refusing anything that escapes the root.
    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        if path.contains('\0') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path contains a null byte",
            ));
        }

        let relative = Path::new(path.trim_start_matches(['/', '\\'])).clean();
        let full = self.root.join(relative).clean();
        if !full.starts_with(&self.root) || full == self.root {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "'{path}' escapes output directory '{}'",
                    self.root.display()
                ),
            ));
        }
        Ok(full)
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    // A uniquely named temp file per writer, so concurrent publishes of one
    // path never share a staging file.
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl Publisher for FsPublisher {
    fn publish(&self, path: &str, contents: &[u8]) -> io::Result<()> {
        let full = self.resolve(path)?;
        write_atomic(&full, contents)?;
        tracing::debug!(path = %full.display(), bytes = contents.len(), "published");
        Ok(())
    }
}

/// Records published files in memory.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().get(path).cloned()
    }

    /// Published paths in sorted order.
    pub fn paths(&self) -> Vec<String> {
        self.files.lock().keys().cloned().collect()
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&self, path: &str, contents: &[u8]) -> io::Result<()> {
        self.files.lock().insert(path.to_string(), contents.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_publisher_writes_nested_paths() {
        let dir = TempDir::new().unwrap();
        let publisher = FsPublisher::new(dir.path());

        publisher.publish("js/chunks/a.js", b"chunk").unwrap();
        publisher.publish("/js/main.js.map", b"{}").unwrap();

        assert_eq!(fs::read(dir.path().join("js/chunks/a.js")).unwrap(), b"chunk");
        assert_eq!(fs::read(dir.path().join("js/main.js.map")).unwrap(), b"{}");
        assert!(!dir.path().join("js/chunks/a.js.tmp").exists());
    }

    #[test]
    fn test_fs_publisher_overwrites() {
        let dir = TempDir::new().unwrap();
        let publisher = FsPublisher::new(dir.path());
        publisher.publish("a.js", b"one").unwrap();
        publisher.publish("a.js", b"two").unwrap();
        assert_eq!(fs::read(dir.path().join("a.js")).unwrap(), b"two");
    }

    #[test]
    fn test_fs_publisher_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let publisher = FsPublisher::new(dir.path().join("public"));

        for bad in ["../escape.js", "js/../../escape.js", "", "a\0b.js"] {
            let err = publisher.publish(bad, b"x").unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "path {bad:?}");
        }
        assert!(!dir.path().join("escape.js").exists());
    }

    #[test]
    fn test_fs_publisher_concurrent_writers_of_one_path() {
        let dir = TempDir::new().unwrap();
        let publisher = std::sync::Arc::new(FsPublisher::new(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let publisher = publisher.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        publisher
                            .publish("js/chunk-shared.js", format!("writer {i}").as_bytes())
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let written = fs::read_to_string(dir.path().join("js/chunk-shared.js")).unwrap();
        assert!(written.starts_with("writer "), "{written}");
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("js"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1, "{leftovers:?}");
    }

    #[test]
    fn test_memory_publisher_records_files() {
        let publisher = MemoryPublisher::new();
        publisher.publish("b.js", b"b").unwrap();
        publisher.publish("a.js", b"a").unwrap();
        assert_eq!(publisher.paths(), vec!["a.js", "b.js"]);
        assert_eq!(publisher.get("a.js").as_deref(), Some(b"a".as_slice()));
    }
}
