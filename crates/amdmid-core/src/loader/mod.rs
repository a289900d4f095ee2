//! Legacy loader id normalization.
//!
//! The loader runtime is only consulted through [`ToAbsMid`]. [`DojoLoader`]
//! implements the loader's `toAbsMid` for a fixed [`LoaderConfig`] without
//! touching the filesystem.

mod config;
pub mod has;

pub use config::{LoaderConfig, PackageConfig, PackageEntry};

use regex_lite::Regex;
use tracing::{trace, warn};

use crate::error::{Error, Result};

/// Upper bound on alias re-normalization, guards against alias cycles.
const MAX_ALIAS_DEPTH: usize = 16;

/// The loader's module id normalization function.
pub trait ToAbsMid: Send + Sync {
    /// Compute the absolute module id of `mid` as referenced from the module
    /// whose id is `reference`. Relative ids without a reference are returned
    /// unchanged.
    fn to_abs_mid(&self, mid: &str, reference: Option<&str>) -> String;

    /// Build-time value of a `has` feature, `None` when unknown.
    fn has_feature(&self, _name: &str) -> Option<bool> {
        None
    }
}

impl<F> ToAbsMid for F
where
    F: Fn(&str, Option<&str>) -> String + Send + Sync,
{
    fn to_abs_mid(&self, mid: &str, reference: Option<&str>) -> String {
        self(mid, reference)
    }
}

/// Whether `mid` is relative to its referencing module.
#[must_use]
pub fn is_relative(mid: &str) -> bool {
    mid.starts_with('.')
}

/// Collapse `.` and `..` segments of a slash separated path.
///
/// A leading `..` that has nothing left to pop is kept.
#[must_use]
pub fn compact_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let mut result: Vec<&str> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "." => {}
            ".." if result.last().is_some_and(|last| *last != "..") => {
                result.pop();
            }
            _ => result.push(segment),
        }
    }
    result.join("/")
}

/// `toAbsMid` driven by a [`LoaderConfig`].
#[derive(Debug, Clone)]
pub struct DojoLoader {
    config: LoaderConfig,
    aliases: Vec<(Regex, String)>,
}

impl DojoLoader {
    /// Create a loader for `config`. Fails if an alias pattern is not a valid
    /// regular expression.
    pub fn new(config: LoaderConfig) -> Result<Self> {
        let aliases = config
            .aliases
            .iter()
            .map(|(pattern, replacement)| {
                Regex::new(pattern)
                    .map(|re| (re, replacement.clone()))
                    .map_err(|e| Error::other(format!("invalid alias pattern '{pattern}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { config, aliases })
    }

    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    fn normalize(&self, mid: &str, reference: Option<&str>, depth: usize) -> String {
        if mid.starts_with('/') || mid.contains(':') || mid.ends_with(".js") {
            return mid.to_string();
        }

        let mid = if is_relative(mid) {
            let Some(reference) = reference else {
                return mid.to_string();
            };
            compact_path(&format!("{reference}/../{mid}"))
        } else {
            compact_path(mid)
        };
        if is_relative(&mid) {
            // Escapes the top level; left for the host resolver to reject.
            return mid;
        }

        let mid = self.apply_map(&mid, reference);
        let mid = self.apply_package_main(mid);

        if let Some(candidate) = self.match_alias(&mid) {
            if depth < MAX_ALIAS_DEPTH {
                trace!(from = %mid, to = %candidate, "applying loader alias");
                return self.normalize(&candidate, None, depth + 1);
            }
            warn!(mid = %mid, "loader alias chain too deep, stopping");
        }
        mid
    }

    fn apply_map(&self, mid: &str, reference: Option<&str>) -> String {
        let scoped = reference.and_then(|reference| {
            longest_prefix(
                self.config
                    .map
                    .iter()
                    .filter(|(key, _)| key.as_str() != "*"),
                reference,
            )
        });
        let Some((_, table)) = scoped.or_else(|| self.config.map.get_key_value("*")) else {
            return mid.to_string();
        };
        match longest_prefix(table.iter(), mid) {
            Some((prefix, replacement)) => format!("{replacement}{}", &mid[prefix.len()..]),
            None => mid.to_string(),
        }
    }

    fn apply_package_main(&self, mid: String) -> String {
        match self.config.package(&mid) {
            Some(package) => format!("{mid}/{}", package.main()),
            None => mid,
        }
    }

    fn match_alias(&self, mid: &str) -> Option<String> {
        self.aliases
            .iter()
            .filter_map(|(re, replacement)| re.find(mid).map(|m| (m.len(), replacement)))
            .fold(None, |best: Option<(usize, &String)>, (len, replacement)| match best {
                Some((best_len, _)) if best_len >= len => best,
                _ => Some((len, replacement)),
            })
            .map(|(_, replacement)| replacement.clone())
    }
}

impl ToAbsMid for DojoLoader {
    fn to_abs_mid(&self, mid: &str, reference: Option<&str>) -> String {
        self.normalize(mid, reference, 0)
    }

    fn has_feature(&self, name: &str) -> Option<bool> {
        self.config.has.get(name).map(has::is_truthy)
    }
}

/// Longest key that equals `id` or prefixes it at a `/` boundary.
fn longest_prefix<'a, V: 'a>(
    entries: impl Iterator<Item = (&'a String, &'a V)>,
    id: &str,
) -> Option<(&'a String, &'a V)> {
    entries
        .filter(|(key, _)| {
            id.strip_prefix(key.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
        .max_by_key(|(key, _)| key.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loader(config: serde_json::Value) -> DojoLoader {
        DojoLoader::new(LoaderConfig::from_json(config).unwrap()).unwrap()
    }

    #[test]
    fn test_compact_path() {
        assert_eq!(compact_path("pkg/x/.././a"), "pkg/a");
        assert_eq!(compact_path("./a"), "a");
        assert_eq!(compact_path("../a"), "../a");
        assert_eq!(compact_path("a/../../b"), "../b");
        assert_eq!(compact_path("a\\b/./c"), "a/b/c");
    }

    #[test]
    fn test_relative_against_reference() {
        let loader = loader(json!({}));
        assert_eq!(loader.to_abs_mid("./a", Some("pkg/x")), "pkg/a");
        assert_eq!(loader.to_abs_mid("../b/c", Some("pkg/sub/x")), "pkg/b/c");
        assert_eq!(loader.to_abs_mid("./a", None), "./a");
        assert_eq!(loader.to_abs_mid("../../a", Some("pkg/x")), "../a");
    }

    #[test]
    fn test_urls_pass_through() {
        let loader = loader(json!({"packages": ["dojo"]}));
        assert_eq!(loader.to_abs_mid("/abs/file", Some("pkg/x")), "/abs/file");
        assert_eq!(loader.to_abs_mid("http://cdn/x", None), "http://cdn/x");
        assert_eq!(loader.to_abs_mid("lib/thing.js", None), "lib/thing.js");
    }

    #[test]
    fn test_package_main() {
        let loader = loader(json!({
            "packages": ["dojo", {"name": "app", "main": "./boot"}]
        }));
        assert_eq!(loader.to_abs_mid("dojo", None), "dojo/main");
        assert_eq!(loader.to_abs_mid("app", None), "app/boot");
        assert_eq!(loader.to_abs_mid("dojo/dom", None), "dojo/dom");
        assert_eq!(loader.to_abs_mid("other", None), "other");
    }

    #[test]
    fn test_map_prefers_most_specific_reference() {
        let loader = loader(json!({
            "map": {
                "*": {"dojo": "dojo16"},
                "legacy": {"dojo": "dojo10"},
                "legacy/deep": {"dojo/dom": "shim/dom"}
            }
        }));
        assert_eq!(loader.to_abs_mid("dojo/on", Some("app/x")), "dojo16/on");
        assert_eq!(loader.to_abs_mid("dojo/on", Some("legacy/x")), "dojo10/on");
        assert_eq!(loader.to_abs_mid("dojo/dom", Some("legacy/deep/y")), "shim/dom");
        assert_eq!(loader.to_abs_mid("dojox/on", Some("app/x")), "dojox/on");
        assert_eq!(loader.to_abs_mid("dojo/on", None), "dojo16/on");
    }

    #[test]
    fn test_aliases_longest_match_wins() {
        let loader = loader(json!({
            "aliases": [["^text$", "dojo/text"], ["^text/plain$", "plain/text"], ["^loop$", "loop"]]
        }));
        assert_eq!(loader.to_abs_mid("text", None), "dojo/text");
        assert_eq!(loader.to_abs_mid("text/plain", None), "plain/text");
        // Self-referencing alias terminates.
        assert_eq!(loader.to_abs_mid("loop", None), "loop");
    }

    #[test]
    fn test_invalid_alias_pattern() {
        let config = LoaderConfig::from_json(json!({"aliases": [["(", "x"]]})).unwrap();
        assert!(DojoLoader::new(config).is_err());
    }

    #[test]
    fn test_closure_implements_to_abs_mid() {
        let upper = |mid: &str, _: Option<&str>| mid.to_uppercase();
        assert_eq!(upper.to_abs_mid("a/b", None), "A/B");
        assert_eq!(upper.has_feature("x"), None);
    }
}
