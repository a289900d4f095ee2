//! Module creation pipeline.
//!
//! A request flows through three hook points:
//!
//! 1. `before_resolve` may rewrite the [`ResolveData`].
//! 2. The resolver, which plugins may wrap, turns it into a
//!    [`ResolvedModule`].
//! 3. `create_module` may build the [`ModuleRecord`] itself.
//!
//! Records are cached by absMid and by resolved identifier, so requests that
//! resolve to the same file and loaders share one record.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

use super::dependency::ModuleIdentity;
use super::graph::{ModuleGraph, ModuleIdx, ModuleRecord};
use super::parser::HookResult;
use super::resolve::{Resolve, ResolvedModule};
use crate::error::Result;

/// The dependency a module is being created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryDependency {
    /// The build entry.
    Entry,
    /// An id from an AMD dependency list.
    AmdItem { issuer: ModuleIdentity },
    /// A synchronous `require("...")`.
    CommonJs,
}

/// Input of one module creation.
#[derive(Debug, Clone, Default)]
pub struct ResolveData {
    /// Directory relative requests are taken against.
    pub context: PathBuf,
    pub request: String,
    /// Dependencies waiting on this module.
    pub dependencies: Vec<FactoryDependency>,
    pub abs_mid: Option<String>,
    pub abs_mid_aliases: Vec<String>,
    /// Request before any rewrite.
    pub raw_request: Option<String>,
}

impl ResolveData {
    pub fn new(context: impl Into<PathBuf>, request: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            request: request.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_dependency(mut self, dependency: FactoryDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// Hooks over module creation.
pub trait FactoryPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn before_resolve(&self, _data: &mut ResolveData) -> HookResult<()> {
        Ok(())
    }

    /// Wrap the resolver. Called once when the plugin is added.
    fn resolver(&self, inner: Arc<dyn Resolve>) -> Arc<dyn Resolve> {
        inner
    }

    /// Build the record for a resolved module; `None` leaves it to the
    /// factory.
    fn create_module(&self, _resolved: &ResolvedModule) -> HookResult<Option<ModuleRecord>> {
        Ok(None)
    }
}

/// Creates module records for requests.
pub struct NormalModuleFactory {
    plugins: Vec<Arc<dyn FactoryPlugin>>,
    resolver: Arc<dyn Resolve>,
}

impl NormalModuleFactory {
    #[must_use]
    pub fn new(resolver: Arc<dyn Resolve>) -> Self {
        Self {
            plugins: Vec::new(),
            resolver,
        }
    }

    /// Add a plugin, letting it wrap the current resolver.
    pub fn add_plugin(&mut self, plugin: Arc<dyn FactoryPlugin>) {
        self.resolver = plugin.resolver(Arc::clone(&self.resolver));
        self.plugins.push(plugin);
    }

    /// Create, or find, the module for `data`.
    ///
    /// Resolution errors are returned unchanged.
    pub fn create(&self, mut data: ResolveData, graph: &mut ModuleGraph) -> Result<ModuleIdx> {
        for plugin in &self.plugins {
            plugin.before_resolve(&mut data)?;
        }

        if let Some(idx) = data.abs_mid.as_deref().and_then(|mid| graph.by_abs_mid(mid)) {
            trace!(request = %data.request, "module found by absMid");
            return Ok(idx);
        }

        let resolved = self.resolver.resolve(&data)?;

        if let Some(idx) = graph.by_identifier(&resolved.request) {
            if let Some(abs_mid) = &resolved.abs_mid {
                if graph.add_alias(idx, abs_mid) {
                    debug!(module = %resolved.request, alias = %abs_mid, "absMid alias");
                }
            }
            return Ok(idx);
        }

        let mut record = None;
        for plugin in &self.plugins {
            if let Some(created) = plugin.create_module(&resolved)? {
                record = Some(created);
                break;
            }
        }
        let record = record.unwrap_or_else(|| default_record(resolved));

        debug!(module = %record.request, abs_mid = ?record.abs_mid, "module created");
        Ok(graph.add(record))
    }

    /// Directory that requests issued from `record` are taken against.
    #[must_use]
    pub fn context_of(record: &ModuleRecord) -> &Path {
        record.resource.parent().unwrap_or_else(|| Path::new("."))
    }
}

fn default_record(resolved: ResolvedModule) -> ModuleRecord {
    ModuleRecord {
        request: resolved.request,
        user_request: resolved.user_request,
        raw_request: resolved.raw_request,
        resource: resolved.resource,
        loaders: resolved.loaders,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::resolve::FsResolver;
    use tempfile::tempdir;

    struct Rename;

    impl FactoryPlugin for Rename {
        fn name(&self) -> &str {
            "rename"
        }

        fn before_resolve(&self, data: &mut ResolveData) -> HookResult<()> {
            if data.request == "./old" {
                data.request = "./new".to_string();
            }
            Ok(())
        }
    }

    #[test]
    fn test_same_file_shares_record() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("lib").join("a.js"), "").unwrap();

        let factory = NormalModuleFactory::new(Arc::new(FsResolver::new()));
        let mut graph = ModuleGraph::new();
        let first = factory
            .create(ResolveData::new(dir.path(), "./lib/a"), &mut graph)
            .unwrap();
        let second = factory
            .create(
                ResolveData::new(dir.path().join("lib"), "./a.js"),
                &mut graph,
            )
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_before_resolve_rewrites_request() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("new.js"), "").unwrap();

        let mut factory = NormalModuleFactory::new(Arc::new(FsResolver::new()));
        factory.add_plugin(Arc::new(Rename));
        let mut graph = ModuleGraph::new();
        let idx = factory
            .create(ResolveData::new(dir.path(), "./old"), &mut graph)
            .unwrap();

        let record = graph.get(idx).unwrap();
        assert!(record.resource.ends_with("new.js"));
        assert_eq!(record.user_request, "./new");
    }

    #[test]
    fn test_resolve_error_is_forwarded() {
        let dir = tempdir().unwrap();
        let factory = NormalModuleFactory::new(Arc::new(FsResolver::new()));
        let err = factory
            .create(ResolveData::new(dir.path(), "./nope"), &mut ModuleGraph::new())
            .unwrap_err();
        assert!(matches!(err, crate::Error::Resolve(ref e) if e.specifier == "./nope"));
    }
}
