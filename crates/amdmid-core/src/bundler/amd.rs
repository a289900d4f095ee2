//! Built-in AMD handling.
//!
//! [`AmdHandler`] decomposes `define(...)` and `require([...], cb)` calls and
//! registers plain dependencies for their id lists. Plugins that want other
//! code for the same ids claim the `amd_array` / `amd_item` hooks before it.

use tracing::trace;

use super::ast::{CallExpr, Evaluated, Expr, Span};
use super::dependency::{
    AmdItem, ArrayDependency, DefineParts, Dependency, ExternalModuleRef, ItemDependency,
    PseudoModule,
};
use super::parser::{HookResult, Parser, ParserPlugin, PluginEnforce};
use crate::config::DEFAULT_REQUIRE_IDENT;

/// Classify one dependency id.
///
/// Pseudo-modules win over local modules, which win over external ones.
/// `render` produces the replacement expression of a pseudo-module.
pub fn classify_item(
    parser: &Parser,
    id: &str,
    named_module: Option<&str>,
    render: &dyn Fn(PseudoModule) -> String,
) -> AmdItem {
    if let Some(module) = PseudoModule::from_id(id) {
        return AmdItem::Pseudo {
            module,
            expression: render(module),
        };
    }
    if let Some(local) = parser.state.local_modules.get(id, named_module) {
        return AmdItem::Local(local);
    }
    AmdItem::External(ExternalModuleRef {
        request: id.to_string(),
        issuer: parser.state.module.clone(),
    })
}

/// Register a constant id list as one ordered aggregate.
///
/// Local and external entries are also registered on their own so the host
/// resolves them; pseudo-module names are written into `identifiers`.
pub fn add_array(
    parser: &mut Parser,
    ids: &[String],
    span: Span,
    identifiers: &mut [Option<String>],
    named_module: Option<&str>,
    render: &dyn Fn(PseudoModule) -> String,
) {
    let optional = parser.scope().in_try;
    let mut items = Vec::with_capacity(ids.len());
    for (idx, id) in ids.iter().enumerate() {
        let item = classify_item(parser, id, named_module, render);
        match &item {
            AmdItem::Pseudo { module, .. } => {
                if let Some(slot) = identifiers.get_mut(idx) {
                    *slot = Some(module.as_str().to_string());
                }
            }
            AmdItem::Local(_) | AmdItem::External(_) => {
                parser
                    .state
                    .add_dependency(Dependency::Item(ItemDependency {
                        item: item.clone(),
                        range: None,
                        loc: span,
                        optional,
                    }));
            }
        }
        items.push(item);
    }
    parser.state.add_dependency(Dependency::Array(ArrayDependency {
        items,
        range: span,
        loc: span,
        optional,
    }));
}

/// Register a single id replaced in place at `span`.
pub fn add_item(
    parser: &mut Parser,
    id: &str,
    span: Span,
    named_module: Option<&str>,
    render: &dyn Fn(PseudoModule) -> String,
) {
    let item = classify_item(parser, id, named_module, render);
    let optional = parser.scope().in_try;
    parser.state.add_dependency(Dependency::Item(ItemDependency {
        item,
        range: Some(span),
        loc: span,
        optional,
    }));
}

fn host_expression(module: PseudoModule) -> String {
    match module {
        PseudoModule::Require => DEFAULT_REQUIRE_IDENT.to_string(),
        PseudoModule::Module | PseudoModule::Exports => module.as_str().to_string(),
    }
}

/// Arguments of a `define` call.
struct DefineArgs<'a> {
    name: Option<&'a str>,
    array: Option<&'a Expr>,
    body: Option<&'a Expr>,
}

impl<'a> DefineArgs<'a> {
    fn from_call(call: &'a CallExpr) -> Option<Self> {
        let name_of = |expr: &'a Expr| match expr {
            Expr::Str { value, .. } => Some(value.as_str()),
            _ => None,
        };
        let args = match call.args.as_slice() {
            [Expr::Array { .. }] => Self {
                name: None,
                array: call.args.first(),
                body: None,
            },
            [body] => Self {
                name: None,
                array: None,
                body: Some(body),
            },
            [first, body] => match name_of(first) {
                Some(name) => Self {
                    name: Some(name),
                    array: None,
                    body: Some(body),
                },
                None => Self {
                    name: None,
                    array: Some(first),
                    body: Some(body),
                },
            },
            [first, array, body] => Self {
                name: Some(name_of(first)?),
                array: Some(array),
                body: Some(body),
            },
            _ => return None,
        };
        Some(args)
    }
}

/// Default handling of AMD calls.
#[derive(Debug, Default)]
pub struct AmdHandler;

impl AmdHandler {
    /// Offer an id list to the array hook, falling back to its entries.
    fn process_array(
        parser: &mut Parser,
        call: &CallExpr,
        param: &Expr,
        identifiers: &mut [Option<String>],
        named_module: Option<&str>,
    ) -> HookResult<()> {
        let hooks = parser.hooks();
        if hooks
            .amd_array(parser, call, param, identifiers, named_module)?
            .is_some()
        {
            return Ok(());
        }

        let Expr::Array { elements, .. } = param else {
            trace!(start = param.span().start, "dynamic dependency list");
            let request = parser.state.module.request.clone();
            parser.state.warn(format!(
                "{request}: dependency list at {} is not a constant array",
                param.span().start
            ));
            return Ok(());
        };
        for element in elements {
            if hooks.amd_item(parser, call, element, named_module)?.is_none() {
                let request = parser.state.module.request.clone();
                parser.state.warn(format!(
                    "{request}: dependency at {} is not a string literal",
                    element.span().start
                ));
                parser.walk_expr(element)?;
            }
        }
        Ok(())
    }
}

impl ParserPlugin for AmdHandler {
    fn name(&self) -> &str {
        "amd"
    }

    fn enforce(&self) -> PluginEnforce {
        PluginEnforce::Post
    }

    fn call_define(&self, parser: &mut Parser, call: &CallExpr) -> HookResult<Option<bool>> {
        let Some(args) = DefineArgs::from_call(call) else {
            return Ok(None);
        };

        let local_module = args.name.map(|name| parser.state.local_modules.add(name));

        let mut identifiers = match args.array {
            Some(Expr::Array { elements, .. }) => vec![None; elements.len()],
            _ => Vec::new(),
        };
        if let Some(array) = args.array {
            Self::process_array(parser, call, array, &mut identifiers, args.name)?;
        }

        let mut parts = DefineParts {
            range: call.span,
            array_range: args.array.map(Expr::span),
            local_module,
            param_bindings: identifiers,
            ..Default::default()
        };
        if let Some(body) = args.body {
            if matches!(body, Expr::Function { .. }) {
                parts.function_range = Some(body.span());
            } else {
                parts.object_range = Some(body.span());
            }
            parser.walk_expr(body)?;
        }

        let define = parser.hooks().define_factory().create(parts, call.span);
        parser.state.add_dependency(Dependency::Define(define));
        Ok(Some(true))
    }

    fn call_require(&self, parser: &mut Parser, call: &CallExpr) -> HookResult<Option<bool>> {
        match call.args.as_slice() {
            [Expr::Str { value, .. }] => {
                parser.state.add_dependency(Dependency::Require {
                    request: value.clone(),
                });
                Ok(Some(true))
            }
            // a lone non-array argument is a dynamic CommonJS require
            [array, callbacks @ ..]
                if callbacks.len() <= 2
                    && (!callbacks.is_empty() || matches!(array, Expr::Array { .. }))
                    && !array.evaluate().is_string() =>
            {
                let mut identifiers = match array {
                    Expr::Array { elements, .. } => vec![None; elements.len()],
                    _ => Vec::new(),
                };
                Self::process_array(parser, call, array, &mut identifiers, None)?;
                for callback in callbacks {
                    parser.walk_expr(callback)?;
                }
                Ok(Some(true))
            }
            _ => Ok(None),
        }
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
            return Ok(None);
        };
        add_array(
            parser,
            &ids,
            param.span(),
            identifiers,
            named_module,
            &host_expression,
        );
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
            return Ok(None);
        };
        add_item(parser, &id, param.span(), named_module, &host_expression);
        Ok(Some(true))
    }
}
