//! Guards between the model's tool calls and the host.

pub mod command_guard;

use std::io;
use std::path::{Component, Path, PathBuf};

pub use command_guard::{CommandGuard, GuardVerdict, Severity};

/// File names the file tool refuses to touch even inside its workspace.
pub(crate) const PROTECTED_NAMES: &[&str] = &["my_seed.json", "wallet_ids.txt", ".env"];
pub(crate) const PROTECTED_DIRS: &[&str] = &["wallet_storage"];
pub(crate) const SEED_SUFFIX: &str = ".seed.json";

fn is_protected_name(name: &str) -> bool {
    PROTECTED_DIRS.contains(&name) || PROTECTED_NAMES.contains(&name) || name.ends_with(SEED_SUFFIX)
}

/// Whether any component of `path` names wallet secrets.
pub fn is_protected_path(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(part) => is_protected_name(&part.to_string_lossy()),
        _ => false,
    })
}

/// Whether the directory `dir` directly holds wallet secrets.
pub fn holds_secrets(dir: &Path) -> bool {
    PROTECTED_DIRS
        .iter()
        .chain(PROTECTED_NAMES)
        .any(|name| dir.join(name).symlink_metadata().is_ok())
}

/// Resolve `requested` against `root`, rejecting absolute paths and any
/// `..` that would climb out of it.
pub fn confine(root: &Path, requested: &str) -> Option<PathBuf> {
    let requested = Path::new(requested.trim());
    let mut clean = PathBuf::new();
    for component in requested.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(root.join(clean))
}

/// Canonical form of the workspace directory, created on first use.
pub fn workspace_root(root: &Path) -> io::Result<PathBuf> {
    std::fs::create_dir_all(root)?;
    root.canonicalize()
}

/// Follow every symlink in `path`.
///
/// Trailing components that do not exist yet are appended to the canonical
/// form of the deepest existing ancestor. A dangling symlink is an error.
pub fn real_path(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(mut real) => {
                real.extend(missing.iter().rev());
                return Ok(real);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if existing.symlink_metadata().is_ok() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("{} is a dangling symlink", existing.display()),
                    ));
                }
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Err(e);
                };
                missing.push(name);
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_paths() {
        assert!(is_protected_path(Path::new("wallet_storage/abc.json")));
        assert!(is_protected_path(Path::new("nested/my_seed.json")));
        assert!(is_protected_path(Path::new("x.seed.json")));
        assert!(is_protected_path(Path::new(".env")));
        assert!(!is_protected_path(Path::new("notes/env.txt")));
        assert!(!is_protected_path(Path::new("DB/0xabc.json")));
    }

    #[test]
    fn dangerous_dirs_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!holds_secrets(dir.path()));
        std::fs::create_dir(dir.path().join("wallet_storage")).unwrap();
        assert!(holds_secrets(dir.path()));
    }

    #[test]
    fn real_path_appends_missing_tail() {
        let dir = tempfile::tempdir().unwrap();
        let root = workspace_root(&dir.path().join("workspace")).unwrap();
        assert_eq!(
            real_path(&root.join("new/file.txt")).unwrap(),
            root.join("new").join("file.txt")
        );
    }

    #[cfg(unix)]
    #[test]
    fn real_path_follows_directory_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir(root.join("wallet_storage")).unwrap();
        std::os::unix::fs::symlink(root.join("wallet_storage"), root.join("alias")).unwrap();

        let real = real_path(&root.join("alias").join("w.json")).unwrap();
        assert_eq!(real, root.join("wallet_storage").join("w.json"));
        assert!(is_protected_path(&real));

        std::os::unix::fs::symlink(root.join("gone"), root.join("dangling")).unwrap();
        assert!(real_path(&root.join("dangling")).is_err());
    }

    #[test]
    fn confine_rejects_escapes() {
        let root = Path::new("/work");
        assert_eq!(confine(root, "a/b.txt"), Some(PathBuf::from("/work/a/b.txt")));
        assert_eq!(confine(root, "./a/../b.txt"), Some(PathBuf::from("/work/b.txt")));
        assert_eq!(confine(root, "."), Some(PathBuf::from("/work")));
        assert_eq!(confine(root, "../etc/passwd"), None);
        assert_eq!(confine(root, "/etc/passwd"), None);
    }
}
