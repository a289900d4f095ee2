//! Dojo AMD support.
//!
//! [`DojoAmdPlugin`] teaches the bundler host to build modules written for
//! the Dojo loader:
//!
//! - `define()` calls pull in the loader runtime once per file and render
//!   through it
//! - `require`, `module` and `exports` in dependency lists are bound to the
//!   absMid of the listing module
//! - module requests are rewritten to absMids before resolution, so a module
//!   reached through different relative paths is built once
//!
//! ## Usage
//!
//! ```ignore
//! let plugin = DojoAmdPlugin::new(PluginOptions::new("dojo/dojo.js"), Arc::new(loader));
//! let mut hooks = ParserHooks::new();
//! let mut factory = NormalModuleFactory::new(resolver);
//! plugin.apply(&mut hooks, &mut factory);
//! ```

mod define;
mod factory;
mod items;

pub use define::{DefineInterceptor, LoaderDefineFactory};
pub use factory::ModuleFactoryAdapter;
pub use items::DependencyRewriter;

use std::sync::Arc;
use tracing::debug;

use crate::absmid::AbsMidResolver;
use crate::bundler::{NormalModuleFactory, ParserHooks, ParserPlugin};
use crate::config::PluginOptions;
use crate::loader::ToAbsMid;

/// The Dojo AMD plugin.
#[derive(Debug)]
pub struct DojoAmdPlugin {
    options: PluginOptions,
    resolver: AbsMidResolver,
}

impl DojoAmdPlugin {
    pub fn new(options: PluginOptions, loader: Arc<dyn ToAbsMid>) -> Self {
        Self {
            options,
            resolver: AbsMidResolver::new(loader),
        }
    }

    /// Absolute module id of `request` as referenced from `issuer`.
    #[must_use]
    pub fn to_abs_mid(&self, request: &str, issuer: Option<&str>) -> String {
        self.resolver.resolve(request, issuer)
    }

    /// Register the plugin's hooks.
    pub fn apply(&self, hooks: &mut ParserHooks, factory: &mut NormalModuleFactory) {
        for plugin in self.parser_plugins() {
            hooks.add(plugin);
        }
        hooks.set_define_factory(Arc::new(LoaderDefineFactory));
        factory.add_plugin(Arc::new(self.factory_plugin()));
        debug!(loader = %self.options.loader.display(), "dojo amd plugin applied");
    }

    /// Parser plugins, interceptor first.
    #[must_use]
    pub fn parser_plugins(&self) -> Vec<Arc<dyn ParserPlugin>> {
        vec![
            Arc::new(DefineInterceptor::new(self.options.loader_request())),
            Arc::new(DependencyRewriter::new(self.options.require_ident.clone())),
        ]
    }

    #[must_use]
    pub fn factory_plugin(&self) -> ModuleFactoryAdapter {
        ModuleFactoryAdapter::new(self.resolver.clone(), self.options.no_module_request())
    }
}
