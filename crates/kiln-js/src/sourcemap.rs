//! Source-map reference rewriting for the primary output.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::options::SourceMapMode;

static SOURCE_MAPPING_URL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"//# sourceMappingURL=.*\n?").ok());

/// A source map to publish next to the primary output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapFile {
    pub path: String,
    pub contents: Vec<u8>,
}

fn reference_comment(output_path: &str) -> String {
    let base = output_path.rsplit('/').next().unwrap_or(output_path);
    format!("//# sourceMappingURL={base}.map\n")
}

/// Rewrites the primary output's map reference and pairs it with its map.
///
/// `map` is the bundler's map for the primary output, if it wrote one. It is
/// only published in external and linked modes, at `<output_path>.map`.
pub fn rewrite(
    mode: SourceMapMode,
    contents: Vec<u8>,
    output_path: &str,
    map: Option<Vec<u8>>,
) -> (Vec<u8>, Option<SourceMapFile>) {
    let map_file = |map: Option<Vec<u8>>| {
        map.map(|contents| SourceMapFile {
            path: format!("{output_path}.map"),
            contents,
        })
    };

    match mode {
        SourceMapMode::None | SourceMapMode::Inline => (contents, None),
        SourceMapMode::External => {
            let mut contents = contents;
            contents.push(b'\n');
            contents.extend_from_slice(reference_comment(output_path).as_bytes());
            (contents, map_file(map))
        }
        SourceMapMode::Linked => {
            let comment = reference_comment(output_path);
            let rewritten = match SOURCE_MAPPING_URL.as_ref() {
                Some(re) => re
                    .replace(&contents, regex::bytes::NoExpand(comment.as_bytes()))
                    .into_owned(),
                None => contents,
            };
            (rewritten, map_file(map))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(bytes: &[u8]) -> &str {
        std::str::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_linked_replaces_existing_comment() {
        let out = b"console.log(1);\n//# sourceMappingURL=old.map\n".to_vec();
        let (rewritten, map) = rewrite(
            SourceMapMode::Linked,
            out,
            "js/main.js",
            Some(b"{\"version\":3}".to_vec()),
        );
        let rewritten = text(&rewritten);

        assert_eq!(rewritten.matches("//# sourceMappingURL=").count(), 1);
        assert!(rewritten.contains("//# sourceMappingURL=main.js.map"));
        assert!(!rewritten.contains("old.map"));

        let map = map.unwrap();
        assert_eq!(map.path, "js/main.js.map");
        assert_eq!(map.contents, b"{\"version\":3}");
    }

    #[test]
    fn test_linked_replaces_only_first_occurrence() {
        let out = b"//# sourceMappingURL=a.map\nx\n//# sourceMappingURL=b.map".to_vec();
        let (rewritten, _) = rewrite(SourceMapMode::Linked, out, "main.js", None);
        let rewritten = text(&rewritten);
        assert!(rewritten.starts_with("//# sourceMappingURL=main.js.map\nx\n"));
        assert!(rewritten.ends_with("b.map"));
    }

    #[test]
    fn test_external_appends_reference() {
        let (rewritten, map) = rewrite(
            SourceMapMode::External,
            b"var a=1;".to_vec(),
            "js/bundle.js",
            Some(b"{}".to_vec()),
        );
        assert_eq!(
            text(&rewritten),
            "var a=1;\n//# sourceMappingURL=bundle.js.map\n"
        );
        assert_eq!(map.unwrap().path, "js/bundle.js.map");
    }

    #[test]
    fn test_external_without_bundler_map_publishes_nothing() {
        let (_, map) = rewrite(SourceMapMode::External, b"x".to_vec(), "a.js", None);
        assert!(map.is_none());
    }

    #[test]
    fn test_inline_and_none_pass_through() {
        let out = b"x\n//# sourceMappingURL=data:application/json;base64,e30=\n".to_vec();
        for mode in [SourceMapMode::Inline, SourceMapMode::None] {
            let (rewritten, map) = rewrite(mode, out.clone(), "a.js", Some(b"{}".to_vec()));
            assert_eq!(rewritten, out);
            assert!(map.is_none());
        }
    }
}
