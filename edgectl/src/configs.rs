use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Source directory of configuration templates.
pub const CONFIG_DIR: &str = "config";
/// Output directory of expanded configuration files.
pub const BUILD_CONFIG_DIR: &str = "build/config";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Replace every `${NAME}` token in `input` using `lookup`.
///
/// Tokens whose name has no value are left verbatim, matching shell-style
/// expansion; nothing else in the input changes.
pub fn expand_placeholders<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => output.push_str(&value),
                    None => output.push_str(&rest[start..start + end + 3]),
                }
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated token; keep the remainder as-is.
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

/// The `*.json` files directly under `source_dir`, sorted by name.
pub fn config_files(source_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = fs::read_dir(source_dir).map_err(|source| ConfigError::ReadDir {
        path: source_dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ConfigError::ReadDir {
            path: source_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Expand every source config against the process environment and write the
/// result under `out_dir`, creating it if needed.
///
/// Runs before any runtime or module command so nothing ever executes
/// against an un-expanded config.
pub fn expand_configs(source_dir: &Path, out_dir: &Path) -> Result<(), ConfigError> {
    println!("Setting config files in build directory");

    fs::create_dir_all(out_dir).map_err(|source| ConfigError::WriteFile {
        path: out_dir.to_path_buf(),
        source,
    })?;

    for source_file in config_files(source_dir)? {
        let basename = match source_file.file_name() {
            Some(name) => name.to_owned(),
            None => continue,
        };
        let destination = out_dir.join(basename);

        println!(
            "Expanding env vars in config file '{}' and writing out to '{}'",
            source_file.display(),
            destination.display()
        );

        let contents = fs::read_to_string(&source_file).map_err(|source| ConfigError::ReadFile {
            path: source_file.clone(),
            source,
        })?;
        let expanded = expand_placeholders(&contents, |name| std::env::var(name).ok());
        fs::write(&destination, expanded).map_err(|source| ConfigError::WriteFile {
            path: destination.clone(),
            source,
        })?;
    }

    Ok(())
}

/// Rewrite the source configs so the given images are referenced through the
/// registry-server placeholder instead of the public namespace.
///
/// Applied by `runtime --set-container-registry` before re-expansion; this
/// is the one operation that edits the source config files in place.
pub fn point_configs_at_registry(
    source_dir: &Path,
    public_registry: &str,
    image_names: &[&str],
) -> Result<(), ConfigError> {
    println!("Changing edge config files to use the container registry");

    for path in config_files(source_dir)? {
        let mut contents = fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
            path: path.clone(),
            source,
        })?;

        for image in image_names {
            contents = contents.replace(
                &format!("{}/{}", public_registry, image),
                &format!("${{CONTAINER_REGISTRY_SERVER}}/{}", image),
            );
        }

        fs::write(&path, contents).map_err(|source| ConfigError::WriteFile {
            path: path.clone(),
            source,
        })?;
    }

    Ok(())
}
