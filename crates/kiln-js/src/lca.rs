//! Lowest common ancestor of a set of file paths.
//!
//! Used to re-root bundler output: the bundler lays out entry outputs
//! relative to the deepest directory shared by all entry points.

use std::path::Path;

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Directory containing `path`, as a string.
fn dir_of(path: &str) -> &str {
    match Path::new(path).parent().and_then(Path::to_str) {
        Some("") | None => ".",
        Some(dir) => dir,
    }
}

fn eq_fold(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Returns the deepest directory that contains the directory of every path.
///
/// Comparison is case-insensitive. When paths diverge in their first segment
/// the root separator is kept, so the result is at least `/` (or a drive
/// root). An empty slice yields an empty string.
pub fn lowest_common_ancestor_directory<S: AsRef<str>>(paths: &[S]) -> String {
    let Some((first, rest)) = paths.split_first() else {
        return String::new();
    };
    let mut lowest = dir_of(first.as_ref()).to_string();

    for path in rest {
        let abs_dir = dir_of(path.as_ref());
        let (mut a, mut b) = (0usize, 0usize);
        let mut last_slash = 0usize;

        loop {
            let ca = abs_dir[a..].chars().next();
            let cb = lowest[b..].chars().next();
            let a_boundary = ca.is_none_or(is_separator);
            let b_boundary = cb.is_none_or(is_separator);

            if a_boundary && b_boundary {
                if ca.is_none() || cb.is_none() {
                    lowest = abs_dir[..a].to_string();
                    break;
                }
                last_slash = a;
            } else {
                let same = match (ca, cb) {
                    (Some(x), Some(y)) => eq_fold(x, y),
                    _ => false,
                };
                if a_boundary != b_boundary || !same {
                    if last_slash < abs_dir.len() && !abs_dir[..last_slash].contains(is_separator)
                    {
                        last_slash += 1;
                    }
                    lowest = abs_dir[..last_slash].to_string();
                    break;
                }
            }

            a += ca.map_or(0, char::len_utf8);
            b += cb.map_or(0, char::len_utf8);
        }
    }

    lowest
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_siblings_share_their_directory() {
        assert_eq!(
            lowest_common_ancestor_directory(&["/a/b/x.js", "/a/b/y.js"]),
            "/a/b"
        );
    }

    #[test]
    fn test_prefix_directory_wins() {
        assert_eq!(
            lowest_common_ancestor_directory(&["/a/b.js", "/a/b/c.js"]),
            "/a"
        );
        assert_eq!(
            lowest_common_ancestor_directory(&["/a/b/c.js", "/a/b.js"]),
            "/a"
        );
    }

    #[test]
    fn test_single_path_is_its_directory() {
        assert_eq!(lowest_common_ancestor_directory(&["/a/b/c.js"]), "/a/b");
    }

    #[test]
    fn test_case_insensitive_divergence() {
        let lca = lowest_common_ancestor_directory(&["/A/b.js", "/a/c.js"]);
        assert!(lca.eq_ignore_ascii_case("/a"), "got {lca}");
    }

    #[test]
    fn test_divergence_in_first_segment_keeps_root() {
        assert_eq!(
            lowest_common_ancestor_directory(&["/a/x.js", "/b/y.js"]),
            "/"
        );
    }

    #[test]
    fn test_partial_segment_match_is_not_a_boundary() {
        assert_eq!(
            lowest_common_ancestor_directory(&["/src/app/x.js", "/src/apple/y.js"]),
            "/src"
        );
    }

    #[test]
    fn test_deeper_fold_over_many_paths() {
        let paths = [
            "/site/assets/js/a/one.js",
            "/site/assets/js/a/b/two.js",
            "/site/assets/js/c/three.js",
        ];
        assert_eq!(lowest_common_ancestor_directory(&paths), "/site/assets/js");
    }

    #[test]
    fn test_empty_input() {
        let none: [&str; 0] = [];
        assert_eq!(lowest_common_ancestor_directory(&none), "");
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-c]{1,3}"
    }

    fn abs_path() -> impl Strategy<Value = String> {
        prop::collection::vec(segment(), 1..5).prop_map(|segs| format!("/{}.js", segs.join("/")))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_result_is_boundary_aligned_prefix(paths in prop::collection::vec(abs_path(), 1..6)) {
            let lca = lowest_common_ancestor_directory(&paths);
            for path in &paths {
                let dir = dir_of(path);
                prop_assert!(dir.starts_with(&lca), "{lca} is not a prefix of {dir}");
                let rest = &dir[lca.len()..];
                prop_assert!(
                    lca.ends_with('/') || rest.is_empty() || rest.starts_with('/'),
                    "{lca} cuts {dir} mid-segment"
                );
            }
        }

        #[test]
        fn prop_order_independent(paths in prop::collection::vec(abs_path(), 1..6)) {
            let forward = lowest_common_ancestor_directory(&paths);
            let mut reversed = paths.clone();
            reversed.reverse();
            prop_assert_eq!(forward, lowest_common_ancestor_directory(&reversed));
        }

        #[test]
        fn prop_shared_parent_is_found(parent in prop::collection::vec(segment(), 1..4), leaves in prop::collection::vec(segment(), 2..5)) {
            let base = format!("/{}", parent.join("/"));
            let paths: Vec<String> = leaves.iter().map(|leaf| format!("{base}/{leaf}.js")).collect();
            prop_assert_eq!(lowest_common_ancestor_directory(&paths), base);
        }
    }
}
