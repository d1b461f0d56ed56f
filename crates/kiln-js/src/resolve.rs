//! Entry-point resolution against the asset tree.

use crate::assets::{AssetFs, FileMeta, normalize_logical};

/// Script extensions tried for extensionless imports, in preference order.
///
/// Imports of JSON, CSS and the like are expected to carry their extension.
pub const SCRIPT_EXTENSIONS: [&str; 4] = [".js", ".ts", ".tsx", ".jsx"];

/// Resolves a logical import path to a single file in the asset tree.
///
/// Order, first match wins:
/// 1. the path as given, if it is a regular file;
/// 2. the path with each script extension appended, then `index.esm` when the
///    last segment is `index`;
/// 3. `index` then `index.esm` inside the path, if it is a directory;
/// 4. for `foo.js`, the other script extensions on `foo`.
pub fn resolve_component(fs: &dyn AssetFs, import_path: &str) -> Option<FileMeta> {
    let import_path = normalize_logical(import_path)?;
    if import_path.is_empty() {
        return None;
    }

    let stat = fs.stat(&import_path);
    if let Some(meta) = stat.as_ref().filter(|m| !m.is_dir) {
        return Some(meta.clone());
    }

    let find_first = |base: &str| -> Option<FileMeta> {
        SCRIPT_EXTENSIONS
            .iter()
            // foo.js must never resolve to foo.js.js
            .filter(|ext| !import_path.ends_with(*ext))
            .find_map(|ext| fs.stat(&format!("{base}{ext}")).filter(|m| !m.is_dir))
    };

    if let Some(found) = find_first(&import_path) {
        return Some(found);
    }

    let base = import_path.rsplit('/').next().unwrap_or(&import_path);
    if base == "index" {
        if let Some(found) = find_first(&format!("{import_path}.esm")) {
            return Some(found);
        }
    }

    if stat.is_some_and(|m| m.is_dir) {
        return find_first(&format!("{import_path}/index"))
            .or_else(|| find_first(&format!("{import_path}/index.esm")));
    }

    import_path
        .strip_suffix(".js")
        .and_then(|stem| find_first(stem))
}
