//! `define()` interception.

use tracing::debug;

use crate::bundler::ast::{CallExpr, Span};
use crate::bundler::{
    DefineDependency, DefineKind, DefineNodeFactory, DefineParts, Dependency, HookResult, Parser,
    ParserPlugin, PluginEnforce,
};

/// Injects the loader runtime into AMD files and hands `define` calls on to
/// the remaining handlers.
#[derive(Debug)]
pub struct DefineInterceptor {
    loader_request: String,
}

impl DefineInterceptor {
    #[must_use]
    pub fn new(loader_request: impl Into<String>) -> Self {
        Self {
            loader_request: loader_request.into(),
        }
    }
}

impl ParserPlugin for DefineInterceptor {
    fn name(&self) -> &str {
        "dojo-amd:define"
    }

    fn enforce(&self) -> PluginEnforce {
        PluginEnforce::Pre
    }

    fn call_define(&self, parser: &mut Parser, call: &CallExpr) -> HookResult<Option<bool>> {
        if !parser.state.enter_expression(call.id) {
            return Ok(None);
        }

        if !parser.state.loader_injected {
            debug!(module = %parser.state.module.request, loader = %self.loader_request, "injecting loader");
            parser.state.add_dependency(Dependency::Require {
                request: self.loader_request.clone(),
            });
            parser.state.loader_injected = true;
        }
        parser.state.is_amd = true;

        let result = parser.hooks().call_define(parser, call);
        parser.state.leave_expression(call.id);
        result
    }
}

/// Builds `define` dependencies that run through the loader runtime.
#[derive(Debug, Default)]
pub struct LoaderDefineFactory;

impl DefineNodeFactory for LoaderDefineFactory {
    fn create(&self, parts: DefineParts, loc: Span) -> DefineDependency {
        DefineDependency {
            kind: DefineKind::Loader,
            parts,
            loc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::ast::AstBuilder;
    use crate::bundler::{ModuleIdentity, ParserHooks};
    use std::sync::Arc;

    fn hooks() -> Arc<ParserHooks> {
        let mut hooks = ParserHooks::new();
        hooks.add(Arc::new(DefineInterceptor::new("/dojo/dojo.js")));
        hooks.set_define_factory(Arc::new(LoaderDefineFactory));
        Arc::new(hooks)
    }

    #[test]
    fn test_loader_injected_once_per_file() {
        let mut b = AstBuilder::new();
        let first = b.object();
        let second = b.object();
        let program = vec![
            b.stmt("define", vec![first]),
            b.stmt("define", vec![second]),
        ];

        let mut parser = Parser::new(hooks(), ModuleIdentity::default());
        parser.parse(&program).unwrap();
        let out = parser.finish();

        let loaders = out
            .dependencies
            .iter()
            .filter(|d| matches!(d, Dependency::Require { request } if request == "/dojo/dojo.js"))
            .count();
        assert_eq!(loaders, 1);
        assert!(out.is_amd);
        assert!(matches!(out.dependencies[0], Dependency::Require { .. }));
    }

    #[test]
    fn test_define_node_is_loader_kind() {
        let mut b = AstBuilder::new();
        let body = b.function(&[], Vec::new());
        let program = vec![b.stmt("define", vec![body])];

        let mut parser = Parser::new(hooks(), ModuleIdentity::default());
        parser.parse(&program).unwrap();
        let defines: Vec<_> = parser
            .finish()
            .dependencies
            .into_iter()
            .filter_map(|d| match d {
                Dependency::Define(define) => Some(define.kind),
                _ => None,
            })
            .collect();
        assert_eq!(defines, vec![DefineKind::Loader]);
    }

    #[test]
    fn test_declined_define_leaves_no_define_node() {
        let mut b = AstBuilder::new();
        let a = b.ident("a");
        let c = b.ident("c");
        let d = b.ident("d");
        let program = vec![b.stmt("define", vec![a, c, d])];

        let mut parser = Parser::new(hooks(), ModuleIdentity::default());
        parser.parse(&program).unwrap();
        let out = parser.finish();
        assert!(out.is_amd);
        assert!(!out
            .dependencies
            .iter()
            .any(|d| matches!(d, Dependency::Define(_))));
    }

    #[test]
    fn test_state_does_not_leak_between_files() {
        let hooks = hooks();
        for _ in 0..2 {
            let mut b = AstBuilder::new();
            let body = b.object();
            let program = vec![b.stmt("define", vec![body])];
            let mut parser = Parser::new(Arc::clone(&hooks), ModuleIdentity::default());
            parser.parse(&program).unwrap();
            let out = parser.finish();
            assert!(matches!(out.dependencies[0], Dependency::Require { .. }));
        }
    }
}
