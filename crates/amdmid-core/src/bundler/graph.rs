//! Module graph.
//!
//! Holds one [`ModuleRecord`] per resolved identifier, so two requests that
//! resolve to the same identifier share a record.

use rustc_hash::FxHashMap as HashMap;
use std::collections::VecDeque;
use std::path::PathBuf;

/// Index of a module in the graph.
pub type ModuleIdx = usize;

/// A module in the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Unique identifier: loaders, resource and query.
    pub request: String,
    /// Request handed to the resolver.
    pub user_request: String,
    /// Request as written in the source.
    pub raw_request: String,
    pub resource: PathBuf,
    pub loaders: Vec<String>,
    /// Canonical loader id.
    pub abs_mid: Option<String>,
    /// Other loader ids that reach this module.
    pub abs_mid_aliases: Vec<String>,
    /// Set once parsing found a `define` call.
    pub is_amd: bool,
    /// Modules this module depends on.
    pub dependencies: Vec<ModuleIdx>,
}

impl ModuleRecord {
    /// Whether `abs_mid` names this module.
    #[must_use]
    pub fn answers_to(&self, abs_mid: &str) -> bool {
        self.abs_mid.as_deref() == Some(abs_mid)
            || self.abs_mid_aliases.iter().any(|alias| alias == abs_mid)
    }
}

/// The module graph.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<ModuleRecord>,
    by_identifier: HashMap<String, ModuleIdx>,
    by_abs_mid: HashMap<String, ModuleIdx>,
}

impl ModuleGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, returning its index.
    pub fn add(&mut self, module: ModuleRecord) -> ModuleIdx {
        let idx = self.modules.len();
        self.by_identifier.insert(module.request.clone(), idx);
        if let Some(abs_mid) = &module.abs_mid {
            self.by_abs_mid.entry(abs_mid.clone()).or_insert(idx);
        }
        for alias in &module.abs_mid_aliases {
            self.by_abs_mid.entry(alias.clone()).or_insert(idx);
        }
        self.modules.push(module);
        idx
    }

    #[must_use]
    pub fn get(&self, idx: ModuleIdx) -> Option<&ModuleRecord> {
        self.modules.get(idx)
    }

    pub fn get_mut(&mut self, idx: ModuleIdx) -> Option<&mut ModuleRecord> {
        self.modules.get_mut(idx)
    }

    #[must_use]
    pub fn by_identifier(&self, request: &str) -> Option<ModuleIdx> {
        self.by_identifier.get(request).copied()
    }

    /// Find a module by its canonical id or one of its aliases.
    #[must_use]
    pub fn by_abs_mid(&self, abs_mid: &str) -> Option<ModuleIdx> {
        self.by_abs_mid.get(abs_mid).copied()
    }

    /// Record that `abs_mid` also reaches module `idx`. A module without a
    /// canonical id takes `abs_mid` as its canonical id.
    ///
    /// Returns `false` if the id was already known for the module.
    pub fn add_alias(&mut self, idx: ModuleIdx, abs_mid: &str) -> bool {
        let Some(module) = self.modules.get_mut(idx) else {
            return false;
        };
        if module.answers_to(abs_mid) {
            return false;
        }
        if module.abs_mid.is_none() {
            module.abs_mid = Some(abs_mid.to_string());
        } else {
            module.abs_mid_aliases.push(abs_mid.to_string());
        }
        self.by_abs_mid.entry(abs_mid.to_string()).or_insert(idx);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleIdx, &ModuleRecord)> {
        self.modules.iter().enumerate()
    }

    /// Modules with dependencies before dependents. Modules on a cycle are
    /// appended in index order.
    #[must_use]
    pub fn toposort(&self) -> Vec<ModuleIdx> {
        let n = self.modules.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<ModuleIdx>> = vec![Vec::new(); n];

        for (idx, module) in self.modules.iter().enumerate() {
            for &dep in &module.dependencies {
                if dep < n {
                    dependents[dep].push(idx);
                    in_degree[idx] += 1;
                }
            }
        }

        let mut queue: VecDeque<ModuleIdx> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut placed = vec![false; n];
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            placed[idx] = true;
            for &next in &dependents[idx] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        order.extend((0..n).filter(|&i| !placed[i]));
        order
    }
}
