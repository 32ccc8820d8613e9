//! Module and Dockerfile discovery for edge image builds
//!
//! Turns the on-disk `modules/` layout into typed descriptors so the build
//! pipeline can be planned and filtered without touching the container
//! runtime or the .NET toolchain.

mod allowlist;
mod discovery;
mod target;

pub use allowlist::Allowlist;
pub use discovery::{discover_modules, Module};
pub use target::{discover_targets, BuildTarget};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while scanning the module tree
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid Dockerfile search pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Unreadable path while searching for Dockerfiles: {0}")]
    Glob(#[from] glob::GlobError),
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
