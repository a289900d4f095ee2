//! Parser driver and its hook table.
//!
//! The parser walks a module's syntax tree and offers every call expression
//! to the registered [`ParserPlugin`]s. Dispatch is "first handler wins":
//! plugins are asked in order and the first one returning `Some` ends the
//! dispatch.

use rustc_hash::FxHashSet as HashSet;
use std::sync::Arc;
use tracing::trace;

use super::amd::AmdHandler;
use super::ast::{CallExpr, Expr, ExprId, Node};
use super::dependency::{
    DefineDependency, DefineKind, DefineParts, Dependency, LocalModules, ModuleIdentity,
};

/// Result type for plugin hooks.
pub type HookResult<T> = Result<T, PluginError>;

/// Error from a plugin.
#[derive(Debug)]
pub struct PluginError {
    /// Plugin name that caused the error.
    pub plugin: String,
    /// Hook that failed.
    pub hook: &'static str,
    /// Error message.
    pub message: String,
}

impl PluginError {
    pub fn new(plugin: impl Into<String>, hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            hook,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for PluginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.plugin, self.hook, self.message)
    }
}

impl std::error::Error for PluginError {}

/// Plugin enforcement ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PluginEnforce {
    /// Runs before normal plugins.
    Pre,
    #[default]
    Normal,
    /// Runs after normal plugins; the built-in AMD handling lives here.
    Post,
}

/// Hooks over call expressions.
///
/// Every hook returns `Ok(None)` to pass and `Ok(Some(_))` to claim the
/// expression.
pub trait ParserPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn enforce(&self) -> PluginEnforce {
        PluginEnforce::Normal
    }

    /// A `define(...)` call.
    fn call_define(&self, _parser: &mut Parser, _call: &CallExpr) -> HookResult<Option<bool>> {
        Ok(None)
    }

    /// A `require(...)` call.
    fn call_require(&self, _parser: &mut Parser, _call: &CallExpr) -> HookResult<Option<bool>> {
        Ok(None)
    }

    /// The dependency array of an AMD call. `identifiers` holds, by position,
    /// the name the factory parameter must be bound to.
    fn amd_array(
        &self,
        _parser: &mut Parser,
        _call: &CallExpr,
        _param: &Expr,
        _identifiers: &mut [Option<String>],
        _named_module: Option<&str>,
    ) -> HookResult<Option<bool>> {
        Ok(None)
    }

    /// One dependency id of an AMD call.
    fn amd_item(
        &self,
        _parser: &mut Parser,
        _call: &CallExpr,
        _param: &Expr,
        _named_module: Option<&str>,
    ) -> HookResult<Option<bool>> {
        Ok(None)
    }
}

/// Builds the dependency that stands for a whole `define` call.
pub trait DefineNodeFactory: Send + Sync {
    fn create(&self, parts: DefineParts, loc: super::ast::Span) -> DefineDependency;
}

/// Produces [`DefineKind::Standard`] nodes.
#[derive(Debug, Default)]
pub struct StandardDefineFactory;

impl DefineNodeFactory for StandardDefineFactory {
    fn create(&self, parts: DefineParts, loc: super::ast::Span) -> DefineDependency {
        DefineDependency {
            kind: DefineKind::Standard,
            parts,
            loc,
        }
    }
}

/// The parser's hook table.
pub struct ParserHooks {
    plugins: Vec<Arc<dyn ParserPlugin>>,
    define_factory: Arc<dyn DefineNodeFactory>,
}

impl Default for ParserHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserHooks {
    /// A hook table with the built-in AMD handling registered.
    #[must_use]
    pub fn new() -> Self {
        let mut hooks = Self::empty();
        hooks.add(Arc::new(AmdHandler));
        hooks
    }

    /// A hook table with no plugins at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            plugins: Vec::new(),
            define_factory: Arc::new(StandardDefineFactory),
        }
    }

    /// Add a plugin, keeping `Pre` → `Normal` → `Post` order. Insertion
    /// order is preserved within a level.
    pub fn add(&mut self, plugin: Arc<dyn ParserPlugin>) {
        self.plugins.push(plugin);
        self.plugins.sort_by_key(|p| p.enforce());
    }

    /// Replace the factory used for `define` dependencies.
    pub fn set_define_factory(&mut self, factory: Arc<dyn DefineNodeFactory>) {
        self.define_factory = factory;
    }

    #[must_use]
    pub fn define_factory(&self) -> &dyn DefineNodeFactory {
        self.define_factory.as_ref()
    }

    pub fn call_define(&self, parser: &mut Parser, call: &CallExpr) -> HookResult<Option<bool>> {
        for plugin in &self.plugins {
            if let Some(result) = plugin.call_define(parser, call)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    pub fn call_require(&self, parser: &mut Parser, call: &CallExpr) -> HookResult<Option<bool>> {
        for plugin in &self.plugins {
            if let Some(result) = plugin.call_require(parser, call)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    pub fn amd_array(
        &self,
        parser: &mut Parser,
        call: &CallExpr,
        param: &Expr,
        identifiers: &mut [Option<String>],
        named_module: Option<&str>,
    ) -> HookResult<Option<bool>> {
        for plugin in &self.plugins {
            if let Some(result) =
                plugin.amd_array(parser, call, param, identifiers, named_module)?
            {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    pub fn amd_item(
        &self,
        parser: &mut Parser,
        call: &CallExpr,
        param: &Expr,
        named_module: Option<&str>,
    ) -> HookResult<Option<bool>> {
        for plugin in &self.plugins {
            if let Some(result) = plugin.amd_item(parser, call, param, named_module)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }
}

/// Lexical scope flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope {
    /// Inside the block of a `try` statement.
    pub in_try: bool,
}

/// State of the file being parsed. Created fresh for every file.
#[derive(Debug, Default)]
pub struct ParserState {
    /// The module being parsed.
    pub module: ModuleIdentity,
    /// Set once any `define` call was seen.
    pub is_amd: bool,
    /// Set once the loader runtime dependency was added.
    pub loader_injected: bool,
    pub local_modules: LocalModules,
    dependencies: Vec<Dependency>,
    processing: HashSet<ExprId>,
    warnings: Vec<String>,
}

impl ParserState {
    #[must_use]
    pub fn new(module: ModuleIdentity) -> Self {
        Self {
            module,
            ..Default::default()
        }
    }

    /// Register a dependency on the module under construction.
    pub fn add_dependency(&mut self, dependency: Dependency) {
        self.dependencies.push(dependency);
    }

    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Mark `id` as being processed. Returns `false` if it already was.
    pub fn enter_expression(&mut self, id: ExprId) -> bool {
        self.processing.insert(id)
    }

    pub fn leave_expression(&mut self, id: ExprId) {
        self.processing.remove(&id);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// What parsing one file produced.
#[derive(Debug, Default)]
pub struct ParseOutput {
    pub dependencies: Vec<Dependency>,
    pub is_amd: bool,
    pub warnings: Vec<String>,
}

/// Walks one file.
pub struct Parser {
    hooks: Arc<ParserHooks>,
    pub state: ParserState,
    scope: Scope,
}

impl Parser {
    #[must_use]
    pub fn new(hooks: Arc<ParserHooks>, module: ModuleIdentity) -> Self {
        Self {
            hooks,
            state: ParserState::new(module),
            scope: Scope::default(),
        }
    }

    /// The hook table, for re-dispatching from inside a hook.
    #[must_use]
    pub fn hooks(&self) -> Arc<ParserHooks> {
        Arc::clone(&self.hooks)
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn parse(&mut self, program: &[Node]) -> HookResult<()> {
        self.walk_nodes(program)
    }

    #[must_use]
    pub fn finish(self) -> ParseOutput {
        ParseOutput {
            dependencies: self.state.dependencies,
            is_amd: self.state.is_amd,
            warnings: self.state.warnings,
        }
    }

    pub fn walk_nodes(&mut self, nodes: &[Node]) -> HookResult<()> {
        for node in nodes {
            match node {
                Node::Expr(expr) => self.walk_expr(expr)?,
                Node::Try { block, handler } => {
                    self.in_try(|parser| parser.walk_nodes(block))?;
                    self.walk_nodes(handler)?;
                }
            }
        }
        Ok(())
    }

    pub fn walk_expr(&mut self, expr: &Expr) -> HookResult<()> {
        match expr {
            Expr::Call(call) => self.walk_call(call),
            Expr::Function { body, .. } => self.in_function_scope(|parser| parser.walk_nodes(body)),
            Expr::Array { elements, .. } => {
                for element in elements {
                    self.walk_expr(element)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Offer a call to the hooks; unclaimed calls have their arguments walked.
    pub fn walk_call(&mut self, call: &CallExpr) -> HookResult<()> {
        let hooks = self.hooks();
        let handled = match call.callee.as_str() {
            "define" => hooks.call_define(self, call)?,
            "require" => hooks.call_require(self, call)?,
            _ => None,
        };
        if handled.is_none() {
            trace!(callee = %call.callee, "call not claimed by any hook");
            for arg in &call.args {
                self.walk_expr(arg)?;
            }
        }
        Ok(())
    }

    /// Run `f` with the `try` flag set.
    pub fn in_try<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.scope;
        self.scope.in_try = true;
        let result = f(self);
        self.scope = saved;
        result
    }

    /// Run `f` in a fresh function scope; an enclosing `try` does not carry
    /// into the function body.
    pub fn in_function_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::take(&mut self.scope);
        let result = f(self);
        self.scope = saved;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::ast::AstBuilder;
    use std::sync::Mutex;

    /// Records the try flag seen at every `require` call.
    struct ScopeRecorder {
        seen: Mutex<Vec<bool>>,
    }

    impl ParserPlugin for ScopeRecorder {
        fn name(&self) -> &str {
            "scope-recorder"
        }

        fn call_require(&self, parser: &mut Parser, _call: &CallExpr) -> HookResult<Option<bool>> {
            self.seen.lock().unwrap().push(parser.scope().in_try);
            Ok(Some(true))
        }
    }

    struct Named(&'static str, PluginEnforce);

    impl ParserPlugin for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn enforce(&self) -> PluginEnforce {
            self.1
        }

        fn call_define(&self, parser: &mut Parser, _call: &CallExpr) -> HookResult<Option<bool>> {
            parser.state.warn(self.0);
            Ok(None)
        }
    }

    #[test]
    fn test_try_scope_resets_in_functions() {
        let recorder = Arc::new(ScopeRecorder {
            seen: Mutex::new(Vec::new()),
        });
        let mut hooks = ParserHooks::empty();
        hooks.add(recorder.clone());

        let mut b = AstBuilder::new();
        let outside = b.stmt("require", Vec::new());
        let inside = b.stmt("require", Vec::new());
        let nested = b.stmt("require", Vec::new());
        let function = b.function(&[], vec![nested]);
        let program = vec![
            outside,
            Node::Try {
                block: vec![inside, Node::Expr(function)],
                handler: Vec::new(),
            },
        ];

        let mut parser = Parser::new(Arc::new(hooks), ModuleIdentity::default());
        parser.parse(&program).unwrap();

        assert_eq!(*recorder.seen.lock().unwrap(), vec![false, true, false]);
    }

    #[test]
    fn test_plugins_run_in_enforce_order() {
        let mut hooks = ParserHooks::empty();
        hooks.add(Arc::new(Named("post", PluginEnforce::Post)));
        hooks.add(Arc::new(Named("normal", PluginEnforce::Normal)));
        hooks.add(Arc::new(Named("pre", PluginEnforce::Pre)));

        let mut b = AstBuilder::new();
        let program = vec![b.stmt("define", Vec::new())];
        let mut parser = Parser::new(Arc::new(hooks), ModuleIdentity::default());
        parser.parse(&program).unwrap();

        assert_eq!(parser.finish().warnings, vec!["pre", "normal", "post"]);
    }

    #[test]
    fn test_expression_guard() {
        let mut state = ParserState::default();
        assert!(state.enter_expression(ExprId(1)));
        assert!(!state.enter_expression(ExprId(1)));
        state.leave_expression(ExprId(1));
        assert!(state.enter_expression(ExprId(1)));
    }
}
