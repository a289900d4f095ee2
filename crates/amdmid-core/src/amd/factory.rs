//! Module creation hooks.
//!
//! Requests issued by AMD modules are rewritten to their absMid before the
//! resolver sees them, and the absMid travels with the resolved module onto
//! its record.

use std::sync::Arc;
use tracing::debug;

use crate::absmid::{split_abs_mid_query, AbsMidResolver};
use crate::bundler::{
    FactoryDependency, FactoryPlugin, HookResult, ModuleRecord, PluginError, Resolve,
    ResolveData, ResolveError, ResolvedModule,
};

/// Rewrites requests to absMids and attaches them to created modules.
#[derive(Debug)]
pub struct ModuleFactoryAdapter {
    resolver: AbsMidResolver,
    no_module_request: String,
}

impl ModuleFactoryAdapter {
    #[must_use]
    pub fn new(resolver: AbsMidResolver, no_module_request: impl Into<String>) -> Self {
        Self {
            resolver,
            no_module_request: no_module_request.into(),
        }
    }
}

/// Context for resolving `data`: `Some(None)` for the entry,
/// `Some(Some(issuer))` for AMD ids, `None` when nothing applies.
fn issuer_context(data: &ResolveData) -> Option<Option<String>> {
    data.dependencies.iter().find_map(|dependency| match dependency {
        FactoryDependency::Entry => Some(None),
        FactoryDependency::AmdItem { issuer } => Some(Some(issuer.context().to_string())),
        FactoryDependency::CommonJs => None,
    })
}

impl FactoryPlugin for ModuleFactoryAdapter {
    fn name(&self) -> &str {
        "dojo-amd:factory"
    }

    fn before_resolve(&self, data: &mut ResolveData) -> HookResult<()> {
        let marker = split_abs_mid_query(&data.request)
            .map_err(|e| PluginError::new(self.name(), "before_resolve", e.to_string()))?;
        if let Some((request, abs_mid)) = marker {
            debug!(%request, %abs_mid, "absMid from query");
            data.request = request;
            data.abs_mid = Some(abs_mid);
            return Ok(());
        }

        if data.request == "require" || data.request == "module" {
            data.abs_mid = Some(std::mem::replace(
                &mut data.request,
                self.no_module_request.clone(),
            ));
            return Ok(());
        }

        let Some(context) = issuer_context(data) else {
            return Ok(());
        };
        let abs_mid = self.resolver.resolve(&data.request, context.as_deref());
        if !abs_mid.starts_with('.') {
            debug!(request = %data.request, %abs_mid, "request rewritten to absMid");
            data.raw_request = Some(std::mem::replace(&mut data.request, abs_mid.clone()));
            data.abs_mid = Some(abs_mid);
        }
        data.abs_mid_aliases.clear();
        Ok(())
    }

    fn resolver(&self, inner: Arc<dyn Resolve>) -> Arc<dyn Resolve> {
        Arc::new(AbsMidResolve { inner })
    }

    fn create_module(&self, resolved: &ResolvedModule) -> HookResult<Option<ModuleRecord>> {
        let Some(abs_mid) = &resolved.abs_mid else {
            return Ok(None);
        };
        Ok(Some(ModuleRecord {
            request: resolved.request.clone(),
            user_request: resolved.user_request.clone(),
            raw_request: resolved.raw_request.clone(),
            resource: resolved.resource.clone(),
            loaders: resolved.loaders.clone(),
            abs_mid: Some(abs_mid.clone()),
            abs_mid_aliases: resolved.abs_mid_aliases.clone(),
            ..Default::default()
        }))
    }
}

/// Carries the absMid fields of the request onto the resolved module.
struct AbsMidResolve {
    inner: Arc<dyn Resolve>,
}

impl Resolve for AbsMidResolve {
    fn resolve(&self, data: &ResolveData) -> Result<ResolvedModule, ResolveError> {
        let mut resolved = self.inner.resolve(data)?;
        resolved.abs_mid.clone_from(&data.abs_mid);
        resolved.abs_mid_aliases.clone_from(&data.abs_mid_aliases);
        if let Some(raw) = &data.raw_request {
            resolved.raw_request.clone_from(raw);
        }
        Ok(resolved)
    }
}
