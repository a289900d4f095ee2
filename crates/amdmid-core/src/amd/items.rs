//! Rewriting of AMD dependency ids.
//!
//! The `require` and `module` pseudo-modules are bound to the absMid of the
//! module that lists them, so code running through the legacy loader sees the
//! same ids it would at runtime.

use tracing::trace;

use crate::bundler::ast::{CallExpr, Evaluated, Expr};
use crate::bundler::{
    add_array, add_item, HookResult, Parser, ParserPlugin, PluginEnforce, PseudoModule,
};

/// Claims constant AMD dependency lists and string ids.
#[derive(Debug)]
pub struct DependencyRewriter {
    require_ident: String,
}

impl DependencyRewriter {
    #[must_use]
    pub fn new(require_ident: impl Into<String>) -> Self {
        Self {
            require_ident: require_ident.into(),
        }
    }

    /// Replacement expression for a pseudo-module referenced from `abs_mid`.
    #[must_use]
    pub fn expression(&self, module: PseudoModule, abs_mid: Option<&str>) -> String {
        let ident = &self.require_ident;
        match (module, abs_mid) {
            (PseudoModule::Require, Some(mid)) => format!("{ident}.djr({})", js_string(mid)),
            (PseudoModule::Require, None) => ident.clone(),
            (PseudoModule::Module, Some(mid)) => format!("{ident}.djm(module, {})", js_string(mid)),
            (PseudoModule::Module, None) => format!("{ident}.djm(module)"),
            (PseudoModule::Exports, _) => "exports".to_string(),
        }
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

impl ParserPlugin for DependencyRewriter {
    fn name(&self) -> &str {
        "dojo-amd:items"
    }

    fn enforce(&self) -> PluginEnforce {
        PluginEnforce::Pre
    }

    fn amd_array(
        &self,
        parser: &mut Parser,
        _call: &CallExpr,
        param: &Expr,
        identifiers: &mut [Option<String>],
        named_module: Option<&str>,
    ) -> HookResult<Option<bool>> {
        let Evaluated::ConstArray(ids) = param.evaluate() else {
            trace!(start = param.span().start, "declined dynamic dependency list");
            return Ok(None);
        };
        let abs_mid = parser.state.module.abs_mid.clone();
        let render = |module: PseudoModule| self.expression(module, abs_mid.as_deref());
        add_array(parser, &ids, param.span(), identifiers, named_module, &render);
        Ok(Some(true))
    }

    fn amd_item(
        &self,
        parser: &mut Parser,
        _call: &CallExpr,
        param: &Expr,
        named_module: Option<&str>,
    ) -> HookResult<Option<bool>> {
        let Evaluated::String(id) = param.evaluate() else {
            trace!(start = param.span().start, "declined dynamic dependency id");
            return Ok(None);
        };
        let abs_mid = parser.state.module.abs_mid.clone();
        let render = |module: PseudoModule| self.expression(module, abs_mid.as_deref());
        add_item(parser, &id, param.span(), named_module, &render);
        Ok(Some(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::ast::AstBuilder;
    use crate::bundler::{AmdItem, Dependency, ItemDependency, ModuleIdentity, ParserHooks};
    use std::sync::Arc;

    fn parse(abs_mid: Option<&str>, program: &[crate::bundler::ast::Node]) -> Vec<Dependency> {
        let mut hooks = ParserHooks::new();
        hooks.add(Arc::new(DependencyRewriter::new("__webpack_require__")));
        let module = ModuleIdentity::new(abs_mid.map(str::to_string), "/src/pkg/x.js");
        let mut parser = Parser::new(Arc::new(hooks), module);
        parser.parse(program).unwrap();
        parser.finish().dependencies
    }

    #[test]
    fn test_expressions() {
        let rewriter = DependencyRewriter::new("__r");
        assert_eq!(
            rewriter.expression(PseudoModule::Require, Some("pkg/x")),
            r#"__r.djr("pkg/x")"#
        );
        assert_eq!(rewriter.expression(PseudoModule::Require, None), "__r");
        assert_eq!(
            rewriter.expression(PseudoModule::Module, Some("pkg/x")),
            r#"__r.djm(module, "pkg/x")"#
        );
        assert_eq!(rewriter.expression(PseudoModule::Module, None), "__r.djm(module)");
        assert_eq!(rewriter.expression(PseudoModule::Exports, Some("pkg/x")), "exports");
        assert_eq!(
            rewriter.expression(PseudoModule::Require, Some(r#"a"b"#)),
            r#"__r.djr("a\"b")"#
        );
    }

    #[test]
    fn test_mixed_list_claims_string_entries() {
        let mut b = AstBuilder::new();
        let dynamic = b.ident("dyn");
        let id = b.str("./a");
        let item_span = id.span();
        let deps = b.array(vec![dynamic, id]);
        let program = vec![b.stmt("require", vec![deps])];

        let deps = parse(Some("pkg/x"), &program);
        assert!(matches!(
            deps.as_slice(),
            [Dependency::Item(ItemDependency { item: AmdItem::External(_), range: Some(r), .. })]
                if *r == item_span
        ));
    }

    #[test]
    fn test_unbound_pseudo_modules_without_abs_mid() {
        let mut b = AstBuilder::new();
        let deps = b.strings(&["require", "module"]);
        let factory = b.function(&["require", "module"], Vec::new());
        let program = vec![b.stmt("define", vec![deps, factory])];

        let deps = parse(None, &program);
        let Some(Dependency::Array(array)) = deps.first() else {
            panic!("expected array dependency first");
        };
        let expressions: Vec<_> = array
            .items
            .iter()
            .filter_map(|item| match item {
                AmdItem::Pseudo { expression, .. } => Some(expression.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(expressions, vec!["__webpack_require__", "__webpack_require__.djm(module)"]);
    }
}
