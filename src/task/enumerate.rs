//! Recursive directory walk
//!
//! Walk order is depth-first pre-order with the entries of each directory
//! sorted by file name, so the same tree always yields the same queue.

use crate::error::{Error, Result};
use crate::task::{Task, TaskQueue};
use crate::transform::Action;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Options controlling the walk
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumerateOptions {
    /// Follow symbolic links to files and directories. When false, symlinks
    /// are skipped entirely.
    pub follow_symlinks: bool,
}

/// A subtree or entry the walk could not read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationWarning {
    /// Path that failed, when known
    pub path: Option<PathBuf>,
    /// Description of the failure
    pub message: String,
}

/// Result of walking a tree
#[derive(Debug, Default)]
pub struct Enumeration {
    /// One task per regular file, in walk order
    pub queue: TaskQueue,
    /// Unreadable subtrees that were skipped
    pub warnings: Vec<EnumerationWarning>,
}

/// Walk `root` and queue one task per regular file
///
/// # Errors
/// Fails only when `root` itself does not exist or is not a directory.
/// Unreadable subdirectories below it become warnings.
pub fn enumerate(root: &Path, action: Action, options: EnumerateOptions) -> Result<Enumeration> {
    let root = resolve_root(root)?;
    let mut enumeration = Enumeration::default();
    let mut seen = HashSet::new();

    let walker = WalkDir::new(&root)
        .follow_links(options.follow_symlinks)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf);
                warn!("Skipping unreadable entry {:?}: {}", path, e);
                enumeration.warnings.push(EnumerationWarning {
                    path,
                    message: e.to_string(),
                });
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            debug!("Skipping symlink {:?}", entry.path());
            continue;
        }
        if !file_type.is_file() {
            if !file_type.is_dir() {
                debug!("Skipping non-regular file {:?}", entry.path());
            }
            continue;
        }

        // Through links the same file can be reached twice; queue it once.
        let path = if options.follow_symlinks {
            match std::fs::canonicalize(entry.path()) {
                Ok(path) => path,
                Err(e) => {
                    enumeration.warnings.push(EnumerationWarning {
                        path: Some(entry.path().to_path_buf()),
                        message: e.to_string(),
                    });
                    continue;
                }
            }
        } else {
            entry.into_path()
        };

        if !seen.insert(path.clone()) {
            debug!("Already queued {:?}", path);
            continue;
        }

        enumeration.queue.push(Task::new(path, action));
    }

    debug!(
        "Enumerated {} files under {:?} ({} warnings)",
        enumeration.queue.len(),
        root,
        enumeration.warnings.len()
    );

    Ok(enumeration)
}

/// Canonicalize the walk root, rejecting anything but an existing directory
pub fn resolve_root(root: &Path) -> Result<PathBuf> {
    let resolved = std::fs::canonicalize(root).map_err(|e| Error::InvalidPath {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;

    if !resolved.is_dir() {
        return Err(Error::InvalidPath {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn names(enumeration: &Enumeration, root: &Path) -> Vec<String> {
        let root = fs::canonicalize(root).unwrap();
        enumeration
            .queue
            .iter()
            .map(|t| {
                t.path()
                    .strip_prefix(&root)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn test_counts_every_regular_file_at_any_depth() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("top.txt"), b"1").unwrap();
        fs::write(root.join("a/one.txt"), b"2").unwrap();
        fs::write(root.join("a/b/two.txt"), b"3").unwrap();
        fs::write(root.join("a/b/c/three.txt"), b"").unwrap();

        let enumeration = enumerate(root, Action::Encrypt, EnumerateOptions::default()).unwrap();

        assert_eq!(enumeration.queue.len(), 4);
        assert!(enumeration.warnings.is_empty());
        assert!(enumeration
            .queue
            .iter()
            .all(|t| t.action() == Action::Encrypt && t.path().is_absolute()));
    }

    #[test]
    fn test_order_is_sorted_depth_first() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::write(root.join("c.txt"), b"").unwrap();
        fs::write(root.join("a.txt"), b"").unwrap();
        fs::write(root.join("b/z.txt"), b"").unwrap();
        fs::write(root.join("b/y.txt"), b"").unwrap();

        let enumeration = enumerate(root, Action::Decrypt, EnumerateOptions::default()).unwrap();

        assert_eq!(
            names(&enumeration, root),
            vec!["a.txt", "b/y.txt", "b/z.txt", "c.txt"]
        );
    }

    #[test]
    fn test_missing_root_is_invalid_path() {
        let dir = tempdir().unwrap();
        let err = enumerate(
            &dir.path().join("nope"),
            Action::Encrypt,
            EnumerateOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn test_file_root_is_invalid_path() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, b"x").unwrap();

        let err = enumerate(&file, Action::Encrypt, EnumerateOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_skipped_by_default() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("real.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(root.join("real.txt"), root.join("link.txt")).unwrap();

        let enumeration = enumerate(root, Action::Encrypt, EnumerateOptions::default()).unwrap();
        assert_eq!(names(&enumeration, root), vec!["real.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_followed_symlinks_queue_each_file_once() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("data")).unwrap();
        fs::write(root.join("data/real.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(root.join("data"), root.join("alias")).unwrap();
        std::os::unix::fs::symlink(root.join("data/real.txt"), root.join("link.txt")).unwrap();

        let options = EnumerateOptions {
            follow_symlinks: true,
        };
        let enumeration = enumerate(root, Action::Encrypt, options).unwrap();
        assert_eq!(names(&enumeration, root), vec!["data/real.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_regular_files_skipped() {
        use std::os::unix::net::UnixListener;

        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("real.txt"), b"x").unwrap();
        let status = std::process::Command::new("mkfifo")
            .arg(root.join("fifo"))
            .status()
            .unwrap();
        assert!(status.success());
        let _listener = UnixListener::bind(root.join("sock")).unwrap();

        let enumeration = enumerate(root, Action::Encrypt, EnumerateOptions::default()).unwrap();
        assert_eq!(names(&enumeration, root), vec!["real.txt"]);
        assert!(enumeration.warnings.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_followed_symlink_loop_is_a_warning() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("d")).unwrap();
        fs::write(root.join("real.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(root, root.join("d/loop")).unwrap();

        let options = EnumerateOptions {
            follow_symlinks: true,
        };
        let enumeration = enumerate(root, Action::Encrypt, options).unwrap();

        assert_eq!(names(&enumeration, root), vec!["real.txt"]);
        assert_eq!(enumeration.warnings.len(), 1);
        assert!(enumeration.warnings[0]
            .path
            .as_deref()
            .unwrap()
            .ends_with("d/loop"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unresolvable_entry_is_a_warning() {
        // Works regardless of privilege, unlike mode bits
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::write(root.join("a/first.txt"), b"x").unwrap();
        fs::write(root.join("b/second.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(root.join("missing"), root.join("a/dangling")).unwrap();

        let options = EnumerateOptions {
            follow_symlinks: true,
        };
        let enumeration = enumerate(root, Action::Encrypt, options).unwrap();

        assert_eq!(
            names(&enumeration, root),
            vec!["a/first.txt", "b/second.txt"]
        );
        assert_eq!(enumeration.warnings.len(), 1);
        assert_eq!(
            enumeration.warnings[0].path.as_deref(),
            Some(fs::canonicalize(root).unwrap().join("a/dangling").as_path())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_is_a_warning() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("locked")).unwrap();
        fs::create_dir_all(root.join("open")).unwrap();
        fs::write(root.join("locked/hidden.txt"), b"x").unwrap();
        fs::write(root.join("open/visible.txt"), b"x").unwrap();
        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o000)).unwrap();

        // Mode bits do not bind root; test_unresolvable_entry_is_a_warning
        // covers the warning path there.
        if fs::read_dir(root.join("locked")).is_ok() {
            fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let enumeration = enumerate(root, Action::Encrypt, EnumerateOptions::default()).unwrap();
        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(names(&enumeration, root), vec!["open/visible.txt"]);
        assert_eq!(enumeration.warnings.len(), 1);
        assert_eq!(
            enumeration.warnings[0].path.as_deref(),
            Some(fs::canonicalize(root).unwrap().join("locked").as_path())
        );
    }
}
