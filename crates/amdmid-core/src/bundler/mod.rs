//! Minimal bundler host.
//!
//! Just enough of a module bundler to drive AMD rewriting end to end.
//!
//! ## Usage
//!
//! ```ignore
//! use amdmid_core::bundler::{Compilation, FsResolver, NormalModuleFactory, ParserHooks};
//!
//! let factory = NormalModuleFactory::new(Arc::new(FsResolver::new().with_alias("app", "src/app")));
//! let compilation = Compilation::new(config, ParserHooks::new(), factory, source);
//! let output = compilation.build("./main")?;
//! ```
//!
//! ## Architecture
//!
//! 1. **Parse** - Walk each module and dispatch call hooks ([`Parser`])
//! 2. **Dependencies** - Hooks register typed dependencies on the module
//! 3. **Factory** - Each dependency request runs through the
//!    [`NormalModuleFactory`] hooks and the resolver
//! 4. **Graph** - Records are cached by resolved identifier ([`ModuleGraph`])

mod amd;
pub mod ast;
mod compilation;
mod dependency;
mod factory;
mod graph;
mod parser;
mod resolve;

pub use amd::{add_array, add_item, classify_item, AmdHandler};
pub use compilation::{Compilation, CompilationOutput, ModuleSource};
pub use dependency::{
    AmdItem, ArrayDependency, DefineDependency, DefineKind, DefineParts, Dependency,
    ExternalModuleRef, ItemDependency, LocalModule, LocalModules, ModuleIdentity, PseudoModule,
};
pub use factory::{FactoryDependency, FactoryPlugin, NormalModuleFactory, ResolveData};
pub use graph::{ModuleGraph, ModuleIdx, ModuleRecord};
pub use parser::{
    DefineNodeFactory, HookResult, ParseOutput, Parser, ParserHooks, ParserPlugin, ParserState,
    PluginEnforce, PluginError, Scope, StandardDefineFactory,
};
pub use resolve::{FsResolver, Resolve, ResolveError, ResolvedModule};
