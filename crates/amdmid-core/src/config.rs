use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default identifier of the host runtime's require function.
pub const DEFAULT_REQUIRE_IDENT: &str = "__webpack_require__";

/// Runtime configuration for a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory that entry requests are resolved against.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Options accepted by [`crate::amd::DojoAmdPlugin`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginOptions {
    /// Path to the legacy loader runtime injected into every AMD file.
    pub loader: PathBuf,

    /// Identifier of the host's runtime require function in generated code.
    pub require_ident: String,

    /// Empty file that the `require` and `module` pseudo-modules resolve to.
    pub no_module: PathBuf,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            loader: PathBuf::new(),
            require_ident: DEFAULT_REQUIRE_IDENT.to_string(),
            no_module: default_no_module(),
        }
    }
}

impl PluginOptions {
    /// Create options for the given loader runtime.
    #[must_use]
    pub fn new(loader: impl Into<PathBuf>) -> Self {
        Self {
            loader: loader.into(),
            ..Default::default()
        }
    }

    /// Override the runtime require identifier.
    #[must_use]
    pub fn with_require_ident(mut self, ident: impl Into<String>) -> Self {
        self.require_ident = ident.into();
        self
    }

    /// Override the pseudo-module stand-in file.
    #[must_use]
    pub fn with_no_module(mut self, path: impl Into<PathBuf>) -> Self {
        self.no_module = path.into();
        self
    }

    /// Loader path as a request string with forward slashes.
    #[must_use]
    pub fn loader_request(&self) -> String {
        slash_path(&self.loader)
    }

    /// Stand-in file path as a request string with forward slashes.
    #[must_use]
    pub fn no_module_request(&self) -> String {
        slash_path(&self.no_module)
    }
}

fn default_no_module() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("runtime")
        .join("NoModule.js")
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_options_from_json() {
        let options: PluginOptions =
            serde_json::from_str(r#"{"loader": "C:\\dojo\\dojo.js", "requireIdent": "__r"}"#)
                .unwrap();
        assert_eq!(options.loader_request(), "C:/dojo/dojo.js");
        assert_eq!(options.require_ident, "__r");
        assert!(options.no_module_request().ends_with("runtime/NoModule.js"));
    }

    #[test]
    fn test_default_stand_in_exists() {
        assert!(PluginOptions::default().no_module.is_file());
    }
}
