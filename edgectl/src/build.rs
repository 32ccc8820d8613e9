use crate::docker::{self, DockerError};
use crate::process::{self, ProcessError};
use crate::settings::Settings;
use module_builder::{discover_modules, discover_targets, DiscoveryError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Root of the module source tree.
pub const MODULES_DIR: &str = "modules";
/// Root of the per-module build output tree.
pub const BUILD_MODULES_DIR: &str = "build/modules";
/// Target framework the module projects are published for.
const TARGET_FRAMEWORK: &str = "netcoreapp2.0";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Discovery(#[from] DiscoveryError),

    #[error("{0}")]
    Process(#[from] ProcessError),

    #[error("{0}")]
    Docker(#[from] DockerError),

    #[error("Failed to prepare build directory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Restore, build, publish, containerize, and push every active module.
///
/// A module without a project file is skipped with a warning; any external
/// command failure aborts the whole pipeline, with no rollback of images
/// already pushed.
pub fn build_modules(settings: &Settings) -> Result<(), PipelineError> {
    println!("Building modules");

    let cwd = std::env::current_dir().map_err(|source| PipelineError::Io {
        path: PathBuf::from("."),
        source,
    })?;

    let modules = discover_modules(Path::new(MODULES_DIR), &settings.active_modules)?;
    for module in modules {
        println!("Restoring module {}", module.name);
        let module_dir = module.dir.display().to_string();
        process::run(
            "dotnet",
            &["restore", &module_dir, "-v", &settings.dotnet_verbosity],
        )?;

        let project = match &module.project_file {
            Some(path) => path.display().to_string(),
            None => {
                println!(
                    "⚠️  No project file found for module {}; skipping",
                    module.name
                );
                continue;
            }
        };

        println!("Building module {}", module.name);
        println!("Processing project file: {}", project);
        process::run(
            "dotnet",
            &["build", &project, "-v", &settings.dotnet_verbosity],
        )?;

        for target in discover_targets(&module, &settings.active_docker_dirs)? {
            println!("Processing Dockerfile: {}", target.dockerfile.display());

            let build_dir = cwd
                .join(BUILD_MODULES_DIR)
                .join(&module.name)
                .join(&target.runtime);
            fs::create_dir_all(&build_dir).map_err(|source| PipelineError::Io {
                path: build_dir.clone(),
                source,
            })?;

            let build_dir_str = build_dir.display().to_string();
            process::run(
                "dotnet",
                &[
                    "publish",
                    &project,
                    "-f",
                    TARGET_FRAMEWORK,
                    "-o",
                    &build_dir_str,
                    "-v",
                    &settings.dotnet_verbosity,
                ],
            )?;

            let dockerfile_name = target.dockerfile_name();
            let copied = build_dir.join(&dockerfile_name);
            fs::copy(&target.dockerfile, &copied).map_err(|source| PipelineError::Io {
                path: copied.clone(),
                source,
            })?;

            let local = target.image_name(&settings.container_tag);
            let remote = format!("{}/{}", settings.container_registry_server, local);

            docker::build_image(&build_dir, &dockerfile_name, &local)?;
            docker::tag_image(&local, &remote)?;
            docker::push_image(&remote)?;
        }
    }

    Ok(())
}
