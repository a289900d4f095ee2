//! Legacy loader configuration.
//!
//! Mirrors the subset of the loader's `dojoConfig` object that affects module
//! id normalization: packages, map, aliases and `has` features.

use rustc_hash::FxHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// A package entry; either a bare name or a full package object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PackageEntry {
    Name(String),
    Config(PackageConfig),
}

/// A package definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
}

impl PackageEntry {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Config(config) => &config.name,
        }
    }

    /// Module that a bare package id refers to.
    #[must_use]
    pub fn main(&self) -> &str {
        match self {
            Self::Config(PackageConfig {
                main: Some(main), ..
            }) => main.strip_prefix("./").unwrap_or(main),
            _ => "main",
        }
    }
}

/// Loader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderConfig {
    pub packages: Vec<PackageEntry>,
    /// Reference-mid prefix (or `"*"`) to a table of mid prefix replacements.
    pub map: HashMap<String, HashMap<String, String>>,
    /// `[pattern, replacement]` pairs; patterns are regular expressions.
    pub aliases: Vec<(String, String)>,
    /// Feature values for `dojo/has` conditionals.
    pub has: HashMap<String, serde_json::Value>,
}

impl LoaderConfig {
    /// Parse a loader config from a JSON value.
    pub fn from_json(value: serde_json::Value) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Read and parse a loader config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay build-time feature values on top of the configured `has` table.
    #[must_use]
    pub fn with_features<I, K>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        for (name, value) in features {
            self.has.insert(name.into(), value);
        }
        self
    }

    /// Look up a package by name.
    #[must_use]
    pub fn package(&self, name: &str) -> Option<&PackageEntry> {
        self.packages.iter().find(|p| p.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_packages_accept_names_and_objects() {
        let config = LoaderConfig::from_json(json!({
            "baseUrl": "../node_modules",
            "packages": ["dojo", {"name": "dijit", "location": "lib/dijit", "main": "./main2"}]
        }))
        .unwrap();

        assert_eq!(config.package("dojo").unwrap().main(), "main");
        assert_eq!(config.package("dijit").unwrap().main(), "main2");
        assert!(config.package("dojox").is_none());
    }

    #[test]
    fn test_from_path_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            LoaderConfig::from_path(&missing),
            Err(Error::ConfigRead { .. })
        ));

        let broken = dir.path().join("loaderConfig.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            LoaderConfig::from_path(&broken),
            Err(Error::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_with_features_overrides_has() {
        let config = LoaderConfig::from_json(json!({"has": {"foo": false}}))
            .unwrap()
            .with_features([("foo", json!(true)), ("bar", json!("x"))]);
        assert_eq!(config.has.get("foo"), Some(&json!(true)));
        assert_eq!(config.has.get("bar"), Some(&json!("x")));
    }
}
