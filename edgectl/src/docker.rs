use crate::process::{self, ProcessError};
use crate::settings::Settings;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;

/// Name given to the local registry container.
const REGISTRY_CONTAINER: &str = "registry";
/// Image backing the local registry.
const REGISTRY_IMAGE: &str = "registry:2";

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("{0}")]
    Process(#[from] ProcessError),

    #[error("Failed to run docker: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry server '{server}' must include a port, e.g. 'localhost:5000'")]
    MissingRegistryPort { server: String },
}

/// Probe for a container by name; a failed inspect means "not found".
pub fn container_exists(name: &str) -> Result<bool, DockerError> {
    let status = Command::new("docker")
        .args(["container", "inspect", name])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    Ok(status.success())
}

/// Probe for a local image.
pub fn image_exists(image: &str) -> Result<bool, DockerError> {
    let status = Command::new("docker")
        .args(["image", "inspect", image])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    Ok(status.success())
}

pub fn pull_image(image: &str) -> Result<(), DockerError> {
    println!("📥 Pulling image: {}", image);
    process::run("docker", &["pull", image])?;
    Ok(())
}

pub fn tag_image(source: &str, destination: &str) -> Result<(), DockerError> {
    process::run("docker", &["tag", source, destination])?;
    Ok(())
}

pub fn push_image(image: &str) -> Result<(), DockerError> {
    println!("🚀 Pushing image: {}", image);
    process::run("docker", &["push", image])?;
    Ok(())
}

/// Build `build_dir` into an image named `tag`, using the named Dockerfile
/// inside that directory.
pub fn build_image(build_dir: &Path, dockerfile: &str, tag: &str) -> Result<(), DockerError> {
    println!("📦 Building image: {}", tag);
    process::run_in(
        "docker",
        &["build", "-t", tag, "-f", dockerfile, "."],
        build_dir,
    )?;
    Ok(())
}

/// Log in to the configured registry, or bring up a local one when the
/// server string points at localhost.
pub fn setup_registry(settings: &Settings) -> Result<(), DockerError> {
    if settings.container_registry_server.contains("localhost") {
        setup_local_registry(settings)
    } else {
        println!(
            "Logging into container registry: {}",
            settings.container_registry_server
        );
        process::run(
            "docker",
            &[
                "login",
                &settings.container_registry_server,
                "--username",
                &settings.container_registry_username,
                "--password",
                &settings.container_registry_password,
            ],
        )?;
        Ok(())
    }
}

/// Ensure a registry container is running for a localhost registry server.
///
/// The server string must carry a port (`localhost:5000`); the registry
/// container maps that port straight through.
pub fn setup_local_registry(settings: &Settings) -> Result<(), DockerError> {
    let server = &settings.container_registry_server;
    println!("Setting up local container registry: {}", server);

    let port = registry_port(server)?;

    println!("Looking for local registry container");
    if container_exists(REGISTRY_CONTAINER)? {
        println!("Found local registry container");
        return Ok(());
    }
    println!("Local registry container not found");

    println!("Looking for local registry image");
    if image_exists(REGISTRY_IMAGE)? {
        println!("Local registry image found");
    } else {
        println!("Local registry image not found");
        pull_image(REGISTRY_IMAGE)?;
    }

    println!("Running registry container");
    let mapping = format!("{0}:{0}", port);
    process::run(
        "docker",
        &[
            "run",
            "-d",
            "--restart",
            "always",
            "--name",
            REGISTRY_CONTAINER,
            "-p",
            &mapping,
            REGISTRY_IMAGE,
        ],
    )?;
    Ok(())
}

/// Force-remove every container, running or stopped.
pub fn remove_all_containers() -> Result<(), DockerError> {
    println!("Removing containers...");
    let ids = list_ids(&["ps", "-aq"])?;
    println!("Found {} containers", ids.len());

    for id in &ids {
        println!("Removing container: {}", id);
        process::run("docker", &["rm", "-f", id])?;
    }

    println!("Containers removed");
    Ok(())
}

/// Force-remove dangling images first, then everything that remains.
pub fn remove_all_images() -> Result<(), DockerError> {
    println!("Removing dangling images...");
    let dangling = list_ids(&["images", "-q", "--filter", "dangling=true"])?;
    println!("Found {} images", dangling.len());
    for id in &dangling {
        println!("Removing image: {}", id);
        process::run("docker", &["rmi", "-f", id])?;
    }

    println!("Removing images...");
    let remaining = list_ids(&["images", "-q"])?;
    println!("Found {} images", remaining.len());
    for id in &remaining {
        println!("Removing image: {}", id);
        process::run("docker", &["rmi", "-f", id])?;
    }

    println!("Images removed");
    Ok(())
}

/// Port suffix of a `host:port` registry server string.
fn registry_port(server: &str) -> Result<u16, DockerError> {
    server
        .split_once(':')
        .and_then(|(_, port)| port.parse().ok())
        .ok_or_else(|| DockerError::MissingRegistryPort {
            server: server.to_string(),
        })
}

/// IDs printed one per line by a docker listing command.
fn list_ids(args: &[&str]) -> Result<Vec<String>, DockerError> {
    let output = Command::new("docker").args(args).output()?;

    if !output.status.success() {
        return Err(ProcessError::Failed {
            command: format!("docker {}", args.join(" ")),
            code: process::exit_code(&output.status),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}
