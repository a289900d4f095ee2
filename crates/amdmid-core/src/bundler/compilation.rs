//! Builds the module graph from an entry request.

use rustc_hash::FxHashSet as HashSet;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

use super::ast::Node;
use super::dependency::{AmdItem, Dependency, ItemDependency, ModuleIdentity};
use super::factory::{FactoryDependency, NormalModuleFactory, ResolveData};
use super::graph::{ModuleGraph, ModuleIdx, ModuleRecord};
use super::parser::{Parser, ParserHooks};
use crate::config::Config;
use crate::error::Result;

/// Supplies the syntax tree of a module.
pub trait ModuleSource: Send + Sync {
    fn load(&self, module: &ModuleRecord) -> Result<Vec<Node>>;
}

impl<F> ModuleSource for F
where
    F: Fn(&ModuleRecord) -> Result<Vec<Node>> + Send + Sync,
{
    fn load(&self, module: &ModuleRecord) -> Result<Vec<Node>> {
        self(module)
    }
}

/// Result of a build.
#[derive(Debug)]
pub struct CompilationOutput {
    pub graph: ModuleGraph,
    pub entry: ModuleIdx,
    pub warnings: Vec<String>,
}

impl CompilationOutput {
    /// Modules with dependencies before dependents.
    pub fn modules_in_order(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.graph
            .toposort()
            .into_iter()
            .filter_map(|idx| self.graph.get(idx))
    }
}

/// One build.
pub struct Compilation {
    config: Config,
    hooks: Arc<ParserHooks>,
    factory: NormalModuleFactory,
    source: Box<dyn ModuleSource>,
}

impl Compilation {
    pub fn new(
        config: Config,
        hooks: ParserHooks,
        factory: NormalModuleFactory,
        source: impl ModuleSource + 'static,
    ) -> Self {
        Self {
            config,
            hooks: Arc::new(hooks),
            factory,
            source: Box::new(source),
        }
    }

    /// Build the graph reachable from `entry`, resolved against the working
    /// directory.
    pub fn build(&self, entry: &str) -> Result<CompilationOutput> {
        let mut graph = ModuleGraph::new();
        let mut warnings = Vec::new();

        let data =
            ResolveData::new(&self.config.cwd, entry).with_dependency(FactoryDependency::Entry);
        let entry_idx = self.factory.create(data, &mut graph)?;

        let mut queue = VecDeque::from([entry_idx]);
        let mut seen: HashSet<ModuleIdx> = HashSet::default();
        seen.insert(entry_idx);

        while let Some(idx) = queue.pop_front() {
            let Some(record) = graph.get(idx).cloned() else {
                continue;
            };
            let nodes = self.source.load(&record)?;

            let identity = ModuleIdentity::new(record.abs_mid.clone(), record.request.clone());
            let mut parser = Parser::new(Arc::clone(&self.hooks), identity);
            parser.parse(&nodes)?;
            let output = parser.finish();
            warnings.extend(output.warnings);

            let context = NormalModuleFactory::context_of(&record).to_path_buf();
            let mut dependencies = Vec::new();
            for dependency in &output.dependencies {
                let Some(request) = dependency.module_request() else {
                    continue;
                };
                let pending = match dependency {
                    Dependency::Item(ItemDependency {
                        item: AmdItem::External(external),
                        ..
                    }) => FactoryDependency::AmdItem {
                        issuer: external.issuer.clone(),
                    },
                    _ => FactoryDependency::CommonJs,
                };
                let data = ResolveData::new(&context, request).with_dependency(pending);
                let dep_idx = self.factory.create(data, &mut graph)?;
                if !dependencies.contains(&dep_idx) {
                    dependencies.push(dep_idx);
                }
                if seen.insert(dep_idx) {
                    queue.push_back(dep_idx);
                }
            }

            debug!(
                module = %record.request,
                is_amd = output.is_amd,
                dependencies = dependencies.len(),
                "module built"
            );
            if let Some(module) = graph.get_mut(idx) {
                module.is_amd = output.is_amd;
                module.dependencies = dependencies;
            }
        }

        info!(modules = graph.len(), warnings = warnings.len(), "build finished");
        Ok(CompilationOutput {
            graph,
            entry: entry_idx,
            warnings,
        })
    }
}
