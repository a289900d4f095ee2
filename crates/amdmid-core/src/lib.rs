//! AMD `define()`/`require()` rewriting for bundlers.
//!
//! Computes canonical absolute module ids (absMids) for the dependencies of
//! modules written against the Dojo loader, and threads them through module
//! creation so every module is addressed by one id.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

pub mod absmid;
pub mod amd;
pub mod bundler;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;

pub use absmid::AbsMidResolver;
pub use amd::DojoAmdPlugin;
pub use config::{Config, PluginOptions};
pub use error::{Error, Result};
pub use loader::{DojoLoader, LoaderConfig, ToAbsMid};
