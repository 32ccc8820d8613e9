use crate::configs::{self, ConfigError};
use crate::docker::{self, DockerError};
use crate::process::{self, ProcessError};
use crate::settings::Settings;
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Runtime images mirrored into the private registry by
/// `set_container_registry`.
pub const RUNTIME_IMAGES: [&str; 3] = [
    "azureiotedge-agent",
    "azureiotedge-hub",
    "azureiotedge-simulated-temperature-sensor",
];

/// Public registry namespace the runtime images are pulled from.
const PUBLIC_REGISTRY: &str = "microsoft";

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("{0}")]
    Process(#[from] ProcessError),

    #[error("{0}")]
    Docker(#[from] DockerError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read modules config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Modules config {path} is not valid JSON: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("Modules config {path} has no desired module list")]
    MissingDesiredModules { path: String },
}

pub fn setup(settings: &Settings) -> Result<(), RuntimeError> {
    println!("Setting up edge runtime");
    process::run(
        "iotedgectl",
        &[
            "--verbose",
            &settings.runtime_verbosity,
            "setup",
            "--config-file",
            &settings.runtime_config_file,
        ],
    )?;
    Ok(())
}

pub fn start(settings: &Settings) -> Result<(), RuntimeError> {
    println!("Starting edge runtime");
    process::run(
        "iotedgectl",
        &["--verbose", &settings.runtime_verbosity, "start"],
    )?;
    Ok(())
}

pub fn stop(settings: &Settings) -> Result<(), RuntimeError> {
    println!("Stopping edge runtime");
    process::run(
        "iotedgectl",
        &["--verbose", &settings.runtime_verbosity, "stop"],
    )?;
    Ok(())
}

/// Stop, re-configure, and start; a failed step aborts the remainder.
pub fn restart(settings: &Settings) -> Result<(), RuntimeError> {
    stop(settings)?;
    setup(settings)?;
    start(settings)
}

pub fn status(settings: &Settings) -> Result<(), RuntimeError> {
    println!("Getting edge runtime status");
    process::run(
        "iotedgectl",
        &["--verbose", &settings.runtime_verbosity, "status"],
    )?;
    Ok(())
}

/// Open a log stream for every module named in the deployment config.
///
/// Each stream is spawned through the LOGS_CMD shell template and left
/// running; nothing is aggregated or awaited.
pub fn logs(settings: &Settings) -> Result<(), RuntimeError> {
    for module in deployed_modules(&settings.modules_config_file)? {
        let command = settings.logs_cmd.replace("{0}", &module);
        process::run_detached(&command)?;
    }
    Ok(())
}

/// Mirror the runtime images into the configured registry and point the
/// configs at it.
pub fn set_container_registry(settings: &Settings) -> Result<(), RuntimeError> {
    docker::setup_registry(settings)?;
    println!("Pushing edge runtime images to container registry");

    for image in RUNTIME_IMAGES {
        let public = format!("{}/{}:{}", PUBLIC_REGISTRY, image, settings.runtime_tag);
        let private = format!(
            "{}/{}:{}",
            settings.container_registry_server, image, settings.runtime_tag
        );

        docker::pull_image(&public)?;
        docker::tag_image(&public, &private)?;
        docker::push_image(&private)?;
    }

    configs::point_configs_at_registry(
        Path::new(configs::CONFIG_DIR),
        PUBLIC_REGISTRY,
        &RUNTIME_IMAGES,
    )?;
    configs::expand_configs(
        Path::new(configs::CONFIG_DIR),
        Path::new(configs::BUILD_CONFIG_DIR),
    )?;
    Ok(())
}

/// Module names from the desired-state lists, system modules first.
fn deployed_modules(path: &str) -> Result<Vec<String>, RuntimeError> {
    let contents = fs::read_to_string(path).map_err(|source| RuntimeError::Io {
        path: path.to_string(),
        source,
    })?;
    let config: Value = serde_json::from_str(&contents).map_err(|source| RuntimeError::Json {
        path: path.to_string(),
        source,
    })?;

    let desired = config
        .pointer("/moduleContent/$edgeAgent/properties.desired")
        .ok_or_else(|| RuntimeError::MissingDesiredModules {
            path: path.to_string(),
        })?;

    let system = desired.get("systemModules").and_then(Value::as_object);
    let user = desired.get("modules").and_then(Value::as_object);
    if system.is_none() && user.is_none() {
        return Err(RuntimeError::MissingDesiredModules {
            path: path.to_string(),
        });
    }

    let mut modules = Vec::new();
    for group in [system, user].into_iter().flatten() {
        modules.extend(group.keys().cloned());
    }
    Ok(modules)
}
