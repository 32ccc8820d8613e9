//! Edge orchestrator CLI
//!
//! Automates build, registry, and deployment chores for an IoT edge device:
//! expands environment variables into config files, drives `dotnet` and
//! `docker` to produce module images, wraps the `iotedgectl` runtime tool,
//! and pushes deployment configurations to the hub.

pub mod build;
pub mod configs;
pub mod docker;
pub mod process;
pub mod runtime;
pub mod settings;

pub use build::{build_modules, PipelineError};
pub use configs::{expand_configs, expand_placeholders, ConfigError};
pub use docker::DockerError;
pub use process::{run, run_detached, run_in, ProcessError};
pub use runtime::RuntimeError;
pub use settings::{Settings, SettingsError};
