//! Taskfile discovery, module resolution and loading

use crate::config::schema::validate_taskfile;
use crate::config::types::Taskfile;
use crate::error::{DispatchError, LoadResult, ModuleLoadError};
use std::path::{Path, PathBuf};

/// Taskfile names, in the order they are looked for
pub const TASKFILE_NAMES: &[&str] = &["Taskfile.yml", "Taskfile.yaml"];

const FILE_SCHEME: &str = "file://";

/// Find the Taskfile in `dir`
pub fn find_taskfile(dir: &Path) -> Result<PathBuf, DispatchError> {
    TASKFILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| DispatchError::TaskfileNotFound(describe_taskfile_names()))
}

/// `'Taskfile.yml' or 'Taskfile.yaml'`
pub fn describe_taskfile_names() -> String {
    TASKFILE_NAMES
        .iter()
        .map(|name| format!("'{}'", name))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Whether a script reference names a Taskfile rather than a plain script
pub fn is_taskfile_name(reference: &str) -> bool {
    TASKFILE_NAMES.iter().any(|name| reference.ends_with(name))
}

/// Whether a CLI argument looks like a script reference rather than a task name
pub fn is_script_reference(arg: &str) -> bool {
    is_url(arg) || arg.ends_with(".yml") || arg.ends_with(".yaml")
}

fn is_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// A resolved, loadable module identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleId {
    File(PathBuf),
    Url(String),
}

impl ModuleId {
    /// Resolve a script reference.
    ///
    /// URLs are kept as they are, absolute paths are used directly and
    /// relative paths are joined to `cwd`.
    pub fn resolve(reference: &str, cwd: &Path) -> Self {
        if is_url(reference) {
            ModuleId::Url(reference.to_string())
        } else if let Some(path) = reference.strip_prefix(FILE_SCHEME) {
            ModuleId::File(PathBuf::from(path))
        } else if Path::new(reference).is_absolute() {
            ModuleId::File(PathBuf::from(reference))
        } else {
            ModuleId::File(cwd.join(reference))
        }
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleId::File(path) => write!(f, "{}{}", FILE_SCHEME, path.display()),
            ModuleId::Url(url) => f.write_str(url),
        }
    }
}

/// Read the module source from disk or over HTTP
pub async fn read_module(id: &ModuleId) -> LoadResult<String> {
    match id {
        ModuleId::File(path) => {
            tracing::debug!(path = %path.display(), "reading module");
            tokio::fs::read_to_string(path).await.map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    ModuleLoadError::NotFound(path.clone())
                } else {
                    ModuleLoadError::Read {
                        path: path.clone(),
                        source,
                    }
                }
            })
        }
        ModuleId::Url(url) => {
            tracing::debug!(url = %url, "fetching module");
            let fetch_error = |source: reqwest::Error| ModuleLoadError::Fetch {
                url: url.clone(),
                source,
            };
            let response = reqwest::get(url).await.map_err(fetch_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(ModuleLoadError::HttpStatus {
                    url: url.clone(),
                    status: status.as_u16(),
                });
            }
            response.text().await.map_err(fetch_error)
        }
    }
}

/// Parse and validate Taskfile source
pub fn parse_taskfile(source: &str, module: &str) -> LoadResult<Taskfile> {
    // an empty document is a module without tasks
    if source.trim().is_empty() {
        return Ok(Taskfile::default());
    }

    let taskfile: Taskfile =
        serde_yaml::from_str(source).map_err(|source| ModuleLoadError::Parse {
            module: module.to_string(),
            source,
        })?;

    validate_taskfile(&taskfile).map_err(|reason| ModuleLoadError::Invalid {
        module: module.to_string(),
        reason,
    })?;

    Ok(taskfile)
}

/// Read, parse and validate a module
pub async fn load_taskfile(id: &ModuleId) -> LoadResult<Taskfile> {
    let source = read_module(id).await?;
    parse_taskfile(&source, &id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_url() {
        let id = ModuleId::resolve("https://example.com/Taskfile.yml", Path::new("/work"));
        assert_eq!(id, ModuleId::Url("https://example.com/Taskfile.yml".to_string()));
        assert_eq!(id.to_string(), "https://example.com/Taskfile.yml");
    }

    #[test]
    fn test_resolve_absolute_path() {
        let id = ModuleId::resolve("/opt/scripts/build.yml", Path::new("/work"));
        assert_eq!(id, ModuleId::File(PathBuf::from("/opt/scripts/build.yml")));
        assert_eq!(id.to_string(), "file:///opt/scripts/build.yml");
    }

    #[test]
    fn test_resolve_relative_path() {
        let id = ModuleId::resolve("scripts/build.yml", Path::new("/work"));
        assert_eq!(id.to_string(), "file:///work/scripts/build.yml");
    }

    #[test]
    fn test_find_taskfile_prefers_yml() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("Taskfile.yaml"), "tasks: {}").unwrap();
        fs::write(temp_dir.path().join("Taskfile.yml"), "tasks: {}").unwrap();

        let found = find_taskfile(temp_dir.path()).unwrap();
        assert_eq!(found, temp_dir.path().join("Taskfile.yml"));
    }

    #[test]
    fn test_find_taskfile_yaml() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("Taskfile.yaml"), "tasks: {}").unwrap();

        let found = find_taskfile(temp_dir.path()).unwrap();
        assert_eq!(found, temp_dir.path().join("Taskfile.yaml"));
    }

    #[test]
    fn test_taskfile_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = find_taskfile(temp_dir.path());
        assert!(matches!(result, Err(DispatchError::TaskfileNotFound(_))));
    }

    #[test]
    fn test_script_reference_detection() {
        assert!(is_script_reference("deploy.yml"));
        assert!(is_script_reference("https://example.com/x"));
        assert!(!is_script_reference("build"));
        assert!(is_taskfile_name("sub/Taskfile.yml"));
        assert!(!is_taskfile_name("deploy.yml"));
    }

    #[test]
    fn test_parse_empty_module() {
        let taskfile = parse_taskfile("", "file:///x.yml").unwrap();
        assert!(taskfile.tasks.is_empty());
    }

    #[test]
    fn test_parse_invalid_module() {
        let result = parse_taskfile("default: nope\n", "file:///x.yml");
        assert!(matches!(result, Err(ModuleLoadError::Invalid { .. })));

        let result = parse_taskfile("tasks: [1, 2", "file:///x.yml");
        assert!(matches!(result, Err(ModuleLoadError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let id = ModuleId::resolve("missing.yml", temp_dir.path());
        let result = load_taskfile(&id).await;
        assert!(matches!(result, Err(ModuleLoadError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_load_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("Taskfile.yml"),
            "tasks:\n  hello:\n    run: echo hello\n",
        )
        .unwrap();

        let id = ModuleId::resolve("Taskfile.yml", temp_dir.path());
        let taskfile = load_taskfile(&id).await.unwrap();
        assert!(taskfile.tasks.contains_key("hello"));
    }
}
