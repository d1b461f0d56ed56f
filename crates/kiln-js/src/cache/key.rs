//! Cache key computation.
//!
//! A build's key is a SHA-256 over the ordered input resource names and a
//! canonical rendering of the options map, so it is stable across runs and
//! independent of option key order and case.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::options::{OptionsMap, lowercase_keys};

/// Prefix shared by every JS build key.
const KEY_PREFIX: &str = "jsbuild";

/// Hex digits of the digest kept in the key.
const KEY_HEX_LEN: usize = 16;

/// Lookup token for a build in the result cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Computes the key for a build of `names` with `options`.
    pub fn compute<S: AsRef<str>>(names: &[S], options: &OptionsMap) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_PREFIX.as_bytes());
        for name in names {
            hasher.update([0u8]);
            hasher.update(name.as_ref().as_bytes());
        }
        hasher.update(b"\n");

        let mut canonical = String::new();
        write_canonical(&Value::Object(lowercase_keys(options)), &mut canonical);
        hasher.update(canonical.as_bytes());

        let hex = format!("{:x}", hasher.finalize());
        Self(format!("{KEY_PREFIX}_{}", &hex[..KEY_HEX_LEN]))
    }

    pub fn from_string(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compact JSON with object keys sorted at every level.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> OptionsMap {
        match value {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_key_is_stable() {
        let key = CacheKey::compute(
            &["js/main.js"],
            &map(json!({ "TargetPath": "foo", "Target": "es2018" })),
        );
        assert_eq!(key.as_str(), "jsbuild_6f513f33f98d3d70");
    }

    #[test]
    fn test_key_without_resources() {
        let none: [&str; 0] = [];
        let key = CacheKey::compute(&none, &map(json!({ "target": "es2018", "targetPath": "foo" })));
        assert_eq!(key.as_str(), "jsbuild_ebc69d77f659e5a4");
    }

    #[test]
    fn test_key_with_multiple_resources() {
        let key = CacheKey::compute(&["js/a.js", "js/b.js"], &OptionsMap::new());
        assert_eq!(key.to_string(), "jsbuild_3b1dca27be4cedcc");
    }

    #[test]
    fn test_key_ignores_option_order_and_case() {
        let a = CacheKey::compute(&["a.js"], &map(json!({ "minify": true, "sourceMap": "linked" })));
        let b = CacheKey::compute(&["a.js"], &map(json!({ "SOURCEMAP": "linked", "Minify": true })));
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_depends_on_resource_order_and_values() {
        let opts = map(json!({ "minify": true }));
        let ab = CacheKey::compute(&["a.js", "b.js"], &opts);
        let ba = CacheKey::compute(&["b.js", "a.js"], &opts);
        assert_ne!(ab, ba);

        let other = CacheKey::compute(&["a.js", "b.js"], &map(json!({ "minify": false })));
        assert_ne!(ab, other);
    }

    #[test]
    fn test_name_boundaries_are_unambiguous() {
        let joined = CacheKey::compute(&["ab"], &OptionsMap::new());
        let split = CacheKey::compute(&["a", "b"], &OptionsMap::new());
        assert_ne!(joined, split);
    }

    #[test]
    fn test_nested_keys_keep_their_case() {
        let mut out = String::new();
        write_canonical(&json!({ "b": { "Z": 1, "a": [true, null, "x"] }, "a": 1.5 }), &mut out);
        assert_eq!(out, r#"{"a":1.5,"b":{"Z":1,"a":[true,null,"x"]}}"#);
    }
}
