use crate::{Allowlist, DiscoveryError, DiscoveryResult};
use std::fs;
use std::path::{Path, PathBuf};

/// A deployable module directory under the modules root.
#[derive(Debug, Clone)]
pub struct Module {
    /// Module name (the directory name)
    pub name: String,
    /// Module source directory
    pub dir: PathBuf,
    /// First file in the directory whose name ends in `proj`, if any
    pub project_file: Option<PathBuf>,
}

/// List the module directories under `root` admitted by `allowlist`, sorted
/// by name.
pub fn discover_modules(root: &Path, allowlist: &Allowlist) -> DiscoveryResult<Vec<Module>> {
    let entries = fs::read_dir(root).map_err(|source| DiscoveryError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let mut modules = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if !allowlist.allows(&name) {
            continue;
        }

        let project_file = find_project_file(&path)?;
        modules.push(Module {
            name,
            dir: path,
            project_file,
        });
    }

    modules.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(modules)
}

/// First file in `dir` ending in `proj`, in lexicographic order.
fn find_project_file(dir: &Path) -> DiscoveryResult<Option<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| DiscoveryError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_project = path
            .file_name()
            .map(|name| name.to_string_lossy().ends_with("proj"))
            .unwrap_or(false);
        if path.is_file() && is_project {
            candidates.push(path);
        }
    }

    candidates.sort();
    Ok(candidates.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn make_module(root: &Path, name: &str, files: &[&str]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            File::create(dir.join(file)).unwrap();
        }
    }

    #[test]
    fn test_discovers_modules_sorted_by_name() {
        let root = TempDir::new().unwrap();
        make_module(root.path(), "zeta", &["zeta.csproj"]);
        make_module(root.path(), "alpha", &["alpha.csproj"]);

        let modules = discover_modules(root.path(), &Allowlist::default()).unwrap();
        let names: Vec<_> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }

    #[test]
    fn test_allowlist_restricts_modules() {
        let root = TempDir::new().unwrap();
        make_module(root.path(), "moduleA", &["moduleA.csproj"]);
        make_module(root.path(), "moduleB", &["moduleB.csproj"]);

        let allowlist = Allowlist::from_csv("moduleA");
        let modules = discover_modules(root.path(), &allowlist).unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name, "moduleA");
    }

    #[test]
    fn test_first_project_file_wins() {
        let root = TempDir::new().unwrap();
        make_module(
            root.path(),
            "multi",
            &["b.fsproj", "a.csproj", "readme.md"],
        );

        let modules = discover_modules(root.path(), &Allowlist::default()).unwrap();
        let project = modules[0].project_file.as_ref().unwrap();
        assert!(project.ends_with("a.csproj"));
    }

    #[test]
    fn test_module_without_project_file() {
        let root = TempDir::new().unwrap();
        make_module(root.path(), "empty", &["notes.txt"]);

        let modules = discover_modules(root.path(), &Allowlist::default()).unwrap();
        assert!(modules[0].project_file.is_none());
    }

    #[test]
    fn test_plain_files_under_root_are_ignored() {
        let root = TempDir::new().unwrap();
        File::create(root.path().join("stray.json")).unwrap();
        make_module(root.path(), "moduleA", &["moduleA.csproj"]);

        let modules = discover_modules(root.path(), &Allowlist::default()).unwrap();
        assert_eq!(modules.len(), 1);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let result = discover_modules(Path::new("/nonexistent/modules"), &Allowlist::default());
        assert!(matches!(result, Err(DiscoveryError::Io { .. })));
    }
}
