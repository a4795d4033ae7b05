//! Workspace and storage path resolution.
//!
//! Every location the engine touches resolves in the same order: explicit
//! environment override, then a detected container-like root, then the
//! nearest ancestor of the working directory carrying a project marker, then
//! the working directory itself. Resolution never fails; there is always a
//! usable default.
//!
//! Repository identity is derived here too: `repo_id` hashes the normalized
//! absolute path with sha256 and keeps the first 12 hex characters. The same
//! path always yields the same id; that stability is the contract the
//! registry and the on-disk layout are built on.

use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

/// Environment override for the workspace root.
pub const ENV_WORKSPACE_ROOT: &str = "QUARRY_WORKSPACE_ROOT";
/// Environment override for the index storage root.
pub const ENV_INDEX_ROOT: &str = "QUARRY_INDEX_ROOT";
/// Environment override for the registry document path.
pub const ENV_REGISTRY_PATH: &str = "QUARRY_REGISTRY_PATH";
/// Environment override for scratch space.
pub const ENV_TEMP_PATH: &str = "QUARRY_TEMP";
/// Environment override for log output.
pub const ENV_LOG_PATH: &str = "QUARRY_LOG";
/// Environment override for the data directory.
pub const ENV_DATA_PATH: &str = "QUARRY_DATA";
/// Host-visible prefix substituted for the container workspace root.
pub const ENV_HOST_ROOT: &str = "QUARRY_HOST_ROOT";

/// Conventional mount point of container dev environments.
const CONTAINER_WORKSPACE: &str = "/workspaces";

/// Files whose presence marks a project root.
const PROJECT_MARKERS: &[&str] = &[
    ".git",
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    "go.mod",
    "pom.xml",
];

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// True when the process appears to run inside a container-like environment.
pub fn in_container() -> bool {
    Path::new("/.dockerenv").exists() || Path::new(CONTAINER_WORKSPACE).is_dir()
}

/// Nearest ancestor of `start` containing a project marker.
fn nearest_project_root(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|ancestor| {
        PROJECT_MARKERS
            .iter()
            .any(|marker| ancestor.join(marker).exists())
            .then(|| ancestor.to_path_buf())
    })
}

fn cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Root of the workspace being indexed.
pub fn workspace_root() -> PathBuf {
    if let Some(path) = env_path(ENV_WORKSPACE_ROOT) {
        return path;
    }
    let current = cwd();
    if in_container() && current.starts_with(CONTAINER_WORKSPACE) {
        // Inside /workspaces/<name>/..., the workspace is the first level
        // below the mount point.
        let mut components = current.components();
        let root: PathBuf = components.by_ref().take(3).collect();
        if root.components().count() == 3 {
            return root;
        }
    }
    nearest_project_root(&current).unwrap_or(current)
}

/// Directory under which per-repository indexes live.
pub fn index_storage_root() -> PathBuf {
    if let Some(path) = env_path(ENV_INDEX_ROOT) {
        return path;
    }
    if in_container() {
        return PathBuf::from(CONTAINER_WORKSPACE).join(".quarry").join("index");
    }
    data_path().join("index")
}

/// Location of the repository registry document.
pub fn registry_path() -> PathBuf {
    env_path(ENV_REGISTRY_PATH)
        .unwrap_or_else(|| index_storage_root().join("repository_registry.json"))
}

/// Scratch space for temporary artifacts.
pub fn temp_path() -> PathBuf {
    env_path(ENV_TEMP_PATH).unwrap_or_else(|| std::env::temp_dir().join("quarry"))
}

/// Directory for log output.
pub fn log_path() -> PathBuf {
    env_path(ENV_LOG_PATH).unwrap_or_else(|| data_path().join("logs"))
}

/// Per-user data directory.
pub fn data_path() -> PathBuf {
    if let Some(path) = env_path(ENV_DATA_PATH) {
        return path;
    }
    dirs::home_dir()
        .map(|home| home.join(".quarry"))
        .unwrap_or_else(|| cwd().join(".quarry"))
}

/// Normalize a path without touching the filesystem: make it absolute
/// against the working directory and resolve `.` / `..` components
/// lexically.
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd().join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Stable 12-hex-char identifier for a repository path.
///
/// First 12 characters of sha256 over the normalized absolute path. Used as
/// the directory name under the index storage root and as the registry key.
pub fn repo_id(path: &Path) -> String {
    let normalized = normalize(path);
    let digest = Sha256::digest(normalized.to_string_lossy().as_bytes());
    let mut id = String::with_capacity(12);
    for byte in digest.iter().take(6) {
        id.push_str(&format!("{byte:02x}"));
    }
    id
}

/// Index directory for a repository path: `<index_storage_root>/<repo_id>/code_index`.
pub fn index_path_for(repo_path: &Path) -> PathBuf {
    index_storage_root().join(repo_id(repo_path)).join("code_index")
}

/// Map a container-internal path to its host-visible equivalent.
///
/// Applies the fixed prefix rule `<container workspace> -> $QUARRY_HOST_ROOT`
/// when running containerized with a host root configured; otherwise the
/// path is returned unchanged.
pub fn translate_container_path(path: &Path) -> PathBuf {
    if !in_container() {
        return path.to_path_buf();
    }
    let Some(host_root) = env_path(ENV_HOST_ROOT) else {
        return path.to_path_buf();
    };
    match path.strip_prefix(CONTAINER_WORKSPACE) {
        Ok(rest) => host_root.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_id_is_stable() {
        let path = Path::new("/repos/alpha");
        let first = repo_id(path);
        let second = repo_id(path);
        assert_eq!(first, second);
        assert_eq!(first.len(), 12);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_repo_id_distinguishes_paths() {
        assert_ne!(repo_id(Path::new("/repos/alpha")), repo_id(Path::new("/repos/beta")));
    }

    #[test]
    fn test_repo_id_normalizes_dot_segments() {
        assert_eq!(
            repo_id(Path::new("/repos/alpha")),
            repo_id(Path::new("/repos/./beta/../alpha"))
        );
    }

    #[test]
    fn test_normalize_resolves_lexically() {
        assert_eq!(
            normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
    }

    #[test]
    fn test_env_override_wins() {
        // Env manipulation is process-global; scope it to this test's vars.
        unsafe { std::env::set_var(ENV_TEMP_PATH, "/tmp/quarry-test-override") };
        assert_eq!(temp_path(), PathBuf::from("/tmp/quarry-test-override"));
        unsafe { std::env::remove_var(ENV_TEMP_PATH) };
    }

    #[test]
    fn test_resolution_always_succeeds() {
        // None of the resolvers may panic or error regardless of environment.
        let _ = workspace_root();
        let _ = index_storage_root();
        let _ = registry_path();
        let _ = temp_path();
        let _ = log_path();
        let _ = data_path();
    }

    #[test]
    fn test_index_path_layout() {
        let path = index_path_for(Path::new("/repos/alpha"));
        let id = repo_id(Path::new("/repos/alpha"));
        assert!(path.ends_with(Path::new(&id).join("code_index")));
    }
}
