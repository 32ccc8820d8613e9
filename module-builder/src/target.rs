use crate::{Allowlist, DiscoveryResult, Module};
use std::path::PathBuf;

/// One Dockerfile to build, tag, and push for a module.
///
/// The expected layout is `modules/<name>/Docker/<runtime>/Dockerfile[.ext]`;
/// the runtime variant is always the Dockerfile's immediate parent directory.
#[derive(Debug, Clone)]
pub struct BuildTarget {
    /// Owning module name
    pub module: String,
    /// Runtime variant (the Dockerfile's parent directory name)
    pub runtime: String,
    /// Tag suffix from the Dockerfile name, after the first dot
    pub ext: Option<String>,
    /// Path to the Dockerfile
    pub dockerfile: PathBuf,
}

impl BuildTarget {
    /// Dockerfile file name, e.g. `Dockerfile.debug`.
    pub fn dockerfile_name(&self) -> String {
        self.dockerfile
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Derived image tag: `{runtime}[-{ext}][-{container_tag}]`, lower-cased.
    pub fn tag(&self, container_tag: &str) -> String {
        let mut tag = self.runtime.clone();
        if let Some(ext) = &self.ext {
            tag.push('-');
            tag.push_str(ext);
        }
        if !container_tag.is_empty() {
            tag.push('-');
            tag.push_str(container_tag);
        }
        tag.to_lowercase()
    }

    /// Local image name: `{module}:{tag}`, lower-cased.
    pub fn image_name(&self, container_tag: &str) -> String {
        format!("{}:{}", self.module, self.tag(container_tag)).to_lowercase()
    }
}

/// Find every `Dockerfile*` under the module whose parent directory name is
/// admitted by `allowlist`.
pub fn discover_targets(
    module: &Module,
    allowlist: &Allowlist,
) -> DiscoveryResult<Vec<BuildTarget>> {
    let pattern = format!("{}/**/Dockerfile*", module.dir.display());

    let mut targets = Vec::new();
    for entry in glob::glob(&pattern)? {
        let dockerfile = entry?;
        if !dockerfile.is_file() {
            continue;
        }

        let runtime = match dockerfile.parent().and_then(|dir| dir.file_name()) {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };
        if !allowlist.allows(&runtime) {
            continue;
        }

        let file_name = dockerfile
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = file_name
            .split_once('.')
            .map(|(_, suffix)| suffix.to_string());

        targets.push(BuildTarget {
            module: module.name.clone(),
            runtime,
            ext,
            dockerfile,
        });
    }

    Ok(targets)
}
