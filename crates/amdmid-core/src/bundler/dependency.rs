//! Dependencies recorded while parsing a module.

use super::ast::Span;

/// Identity of a module as seen by the modules it references.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleIdentity {
    /// Canonical loader id, when known.
    pub abs_mid: Option<String>,
    /// Resolved request of the module.
    pub request: String,
}

impl ModuleIdentity {
    #[must_use]
    pub fn new(abs_mid: Option<String>, request: impl Into<String>) -> Self {
        Self {
            abs_mid,
            request: request.into(),
        }
    }

    /// Base id for relative resolution: the absMid, else the request.
    #[must_use]
    pub fn context(&self) -> &str {
        self.abs_mid.as_deref().unwrap_or(&self.request)
    }
}

/// A module declared by a named `define` in the current file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalModule {
    pub name: String,
    pub idx: usize,
}

/// Bindings synthesized by the loader rather than backed by files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoModule {
    Require,
    Module,
    Exports,
}

impl PseudoModule {
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "require" => Some(Self::Require),
            "module" => Some(Self::Module),
            "exports" => Some(Self::Exports),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Require => "require",
            Self::Module => "module",
            Self::Exports => "exports",
        }
    }
}

/// A module reference that the host resolves later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalModuleRef {
    /// Id exactly as written in the source.
    pub request: String,
    /// Module containing the reference.
    pub issuer: ModuleIdentity,
}

/// One entry of an AMD dependency list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmdItem {
    /// Replaced by `expression` in generated code.
    Pseudo {
        module: PseudoModule,
        expression: String,
    },
    Local(LocalModule),
    External(ExternalModuleRef),
}

/// A single AMD dependency registered on the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDependency {
    pub item: AmdItem,
    /// Source range replaced in generated code; `None` for entries of an
    /// array, which is rendered as a whole.
    pub range: Option<Span>,
    pub loc: Span,
    pub optional: bool,
}

/// All entries of one constant dependency array, in argument order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayDependency {
    pub items: Vec<AmdItem>,
    pub range: Span,
    pub loc: Span,
    pub optional: bool,
}

/// Which implementation renders a `define` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineKind {
    /// The host's own AMD define.
    Standard,
    /// Define routed through the legacy loader runtime.
    Loader,
}

/// Structural pieces of a `define` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DefineParts {
    pub range: Span,
    pub array_range: Option<Span>,
    pub function_range: Option<Span>,
    pub object_range: Option<Span>,
    pub local_module: Option<LocalModule>,
    /// Factory parameter names fixed by the dependency array, by position.
    pub param_bindings: Vec<Option<String>>,
}

/// The dependency standing for a whole `define` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineDependency {
    pub kind: DefineKind,
    pub parts: DefineParts,
    pub loc: Span,
}

/// A dependency of the module under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// Synchronous CommonJS-style require of `request`.
    Require { request: String },
    Item(ItemDependency),
    Array(ArrayDependency),
    Define(DefineDependency),
}

impl Dependency {
    /// Request the host must resolve for this dependency, if any.
    #[must_use]
    pub fn module_request(&self) -> Option<&str> {
        match self {
            Self::Require { request } => Some(request),
            Self::Item(ItemDependency {
                item: AmdItem::External(external),
                ..
            }) => Some(&external.request),
            _ => None,
        }
    }
}

/// Named modules declared in one file.
#[derive(Debug, Default)]
pub struct LocalModules {
    modules: Vec<LocalModule>,
}

impl LocalModules {
    /// Declare `name`, returning its binding.
    pub fn add(&mut self, name: &str) -> LocalModule {
        let module = LocalModule {
            name: name.to_string(),
            idx: self.modules.len(),
        };
        self.modules.push(module.clone());
        module
    }

    /// Find a declared module. Relative names are taken relative to
    /// `named_module` when one is given.
    #[must_use]
    pub fn get(&self, name: &str, named_module: Option<&str>) -> Option<LocalModule> {
        let name = match named_module {
            Some(parent) if crate::loader::is_relative(name) => {
                crate::loader::compact_path(&format!("{parent}/../{name}"))
            }
            _ => name.to_string(),
        };
        self.modules.iter().find(|m| m.name == name).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
