use std::path::PathBuf;
use thiserror::Error;

use crate::bundler::{PluginError, ResolveError};

/// Core error type for amdmid operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read loader config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse loader config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("Failed to load {resource}: {message}")]
    Load { resource: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    #[must_use]
    pub fn load(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
