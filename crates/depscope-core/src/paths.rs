//! Lexical path helpers
//!
//! Nothing here touches the file system: paths are compared the way they were
//! spelled once made absolute against the cache root, so symlinked roots keep
//! matching the paths the catalog reported.

use std::path::{Component, Path, PathBuf};

/// Join a relative path onto `root`; absolute paths are returned as they are.
pub fn absolutize(path: &Path, root: &Path) -> PathBuf {
    if path.is_relative() {
        normalize(&root.join(path))
    } else {
        normalize(path)
    }
}

/// Absolute, lexically normalized form of `path` against the working directory.
pub fn absolute(path: &Path) -> PathBuf {
    let joined = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    normalize(&joined)
}

/// Drop `.` components and fold `..` into their parent.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Path of `path` relative to `root`, with `/` separators.
pub fn relative_slash(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(to_slash(rel))
}

/// Render a relative path with `/` separators; the empty path becomes `.`.
pub fn to_slash(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// File name of a path as an owned string.
pub fn base_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_dots() {
        assert_eq!(
            normalize(Path::new("/repo/./app/../db/db.go")),
            PathBuf::from("/repo/db/db.go")
        );
    }

    #[test]
    fn test_absolutize_relative_and_absolute() {
        let root = Path::new("/repo");
        assert_eq!(absolutize(Path::new("app/main.go"), root), PathBuf::from("/repo/app/main.go"));
        assert_eq!(absolutize(Path::new("/elsewhere/x.go"), root), PathBuf::from("/elsewhere/x.go"));
    }

    #[test]
    fn test_relative_slash() {
        let root = Path::new("/repo");
        assert_eq!(relative_slash(Path::new("/repo/pwa/main.go"), root).as_deref(), Some("pwa/main.go"));
        assert_eq!(relative_slash(Path::new("/repo"), root).as_deref(), Some("."));
        assert_eq!(relative_slash(Path::new("/other/main.go"), root), None);
    }
}
