//! Request resolution.
//!
//! Turns a request such as `./util`, `app/view` or `dojo/text!app/tpl.html`
//! into a file on disk.
//!
//! ## Request Forms
//!
//! - Relative: `./util`, `../lib/foo`, taken against the request context
//! - Absolute: `/abs/path/to/module.js`
//! - Module id: `app/view`, looked up through the id prefix aliases and then
//!   the base directory
//!
//! Every `!`-separated segment but the last names a loader; the last segment
//! is the resource.

use rustc_hash::FxHashMap as HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::trace;

use super::factory::ResolveData;
use crate::absmid::PLUGIN_SEPARATOR;

/// Extensions tried, in order, when a request names no file.
const EXTENSIONS: &[&str] = &[".js", ".ts", ".jsx", ".tsx"];

/// Error during resolution.
#[derive(Debug, Clone)]
pub struct ResolveError {
    pub specifier: String,
    pub from: String,
    pub message: String,
}

impl ResolveError {
    pub fn new(specifier: impl Into<String>, from: &Path, message: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            from: from.display().to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cannot resolve '{}' from '{}': {}",
            self.specifier, self.from, self.message
        )
    }
}

impl std::error::Error for ResolveError {}

/// A successfully resolved request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedModule {
    /// Unique identifier: loaders, resource and query.
    pub request: String,
    /// Request as handed to the resolver.
    pub user_request: String,
    /// Request as written in the source.
    pub raw_request: String,
    pub resource: PathBuf,
    pub loaders: Vec<String>,
    pub abs_mid: Option<String>,
    pub abs_mid_aliases: Vec<String>,
}

/// Something that resolves requests.
pub trait Resolve: Send + Sync {
    fn resolve(&self, data: &ResolveData) -> Result<ResolvedModule, ResolveError>;
}

/// Filesystem resolver.
#[derive(Debug, Default)]
pub struct FsResolver {
    /// Module id prefix -> directory.
    aliases: Vec<(String, PathBuf)>,
    base_dir: Option<PathBuf>,
    cache: RwLock<HashMap<(PathBuf, String), PathBuf>>,
}

impl FsResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve module ids that match no alias against `dir`.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Map ids starting with the `prefix` path segment(s) into `dir`.
    #[must_use]
    pub fn with_alias(mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.aliases.push((prefix.into(), dir.into()));
        self
    }

    fn resolve_resource(&self, specifier: &str, context: &Path) -> Result<PathBuf, ResolveError> {
        let cache_key = (context.to_path_buf(), specifier.to_string());
        if let Some(cached) = self
            .cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&cache_key).cloned())
        {
            return Ok(cached);
        }

        let target = self.target_path(specifier, context)?;
        let resolved = resolve_file_or_directory(&target, specifier, context)?;

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(cache_key, resolved.clone());
        }
        Ok(resolved)
    }

    fn target_path(&self, specifier: &str, context: &Path) -> Result<PathBuf, ResolveError> {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            return Ok(context.join(specifier));
        }
        let path = Path::new(specifier);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }

        if let Some((prefix, dir)) = self
            .aliases
            .iter()
            .filter(|(prefix, _)| {
                specifier == prefix
                    || specifier
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|(prefix, _)| prefix.len())
        {
            let rest = specifier[prefix.len()..].trim_start_matches('/');
            trace!(specifier, prefix, "module id matched alias");
            return Ok(if rest.is_empty() {
                dir.clone()
            } else {
                dir.join(rest)
            });
        }

        match &self.base_dir {
            Some(base) => Ok(base.join(specifier)),
            None => Err(ResolveError::new(
                specifier,
                context,
                "No alias or base directory for module id",
            )),
        }
    }
}

impl Resolve for FsResolver {
    fn resolve(&self, data: &ResolveData) -> Result<ResolvedModule, ResolveError> {
        let mut segments: Vec<&str> = data.request.split(PLUGIN_SEPARATOR).collect();
        let resource_request = segments.pop().unwrap_or_default();
        let (specifier, query) = match resource_request.find('?') {
            Some(idx) => resource_request.split_at(idx),
            None => (resource_request, ""),
        };
        if specifier.is_empty() {
            return Err(ResolveError::new(
                data.request.clone(),
                &data.context,
                "Empty resource",
            ));
        }

        let resource = self.resolve_resource(specifier, &data.context)?;
        let loaders: Vec<String> = segments.into_iter().map(str::to_string).collect();

        let mut request = String::new();
        for loader in &loaders {
            request.push_str(loader);
            request.push(PLUGIN_SEPARATOR);
        }
        request.push_str(&resource.display().to_string());
        request.push_str(query);

        trace!(request = %data.request, resolved = %request, "resolved");
        Ok(ResolvedModule {
            request,
            user_request: data.request.clone(),
            raw_request: data
                .raw_request
                .clone()
                .unwrap_or_else(|| data.request.clone()),
            resource,
            loaders,
            abs_mid: None,
            abs_mid_aliases: Vec::new(),
        })
    }
}

fn canonicalize(path: &Path, specifier: &str, from: &Path) -> Result<PathBuf, ResolveError> {
    dunce::canonicalize(path).map_err(|e| ResolveError::new(specifier, from, e.to_string()))
}

/// Resolve a path that might be a file or directory.
fn resolve_file_or_directory(
    target: &Path,
    specifier: &str,
    from: &Path,
) -> Result<PathBuf, ResolveError> {
    if target.is_file() {
        return canonicalize(target, specifier, from);
    }

    for ext in EXTENSIONS {
        let with_ext = PathBuf::from(format!("{}{}", target.display(), ext));
        if with_ext.is_file() {
            return canonicalize(&with_ext, specifier, from);
        }
    }

    if target.is_dir() {
        for ext in EXTENSIONS {
            let index_path = target.join(format!("index{ext}"));
            if index_path.is_file() {
                return canonicalize(&index_path, specifier, from);
            }
        }
    }

    Err(ResolveError::new(specifier, from, "File not found"))
}
