//! Sandbox root: every file-touching tool resolves paths through here.
//!
//! Paths from the model are treated as relative to the root. `..` segments
//! are resolved lexically and may not climb above the root, and the nearest
//! existing ancestor is canonicalized so a symlink cannot point outside it.
//! Dangling symlinks are followed by hand, since the OS would create their
//! target on write.

use chimera_core::error::ToolError;
use std::path::{Component, Path, PathBuf};

/// Chains of dangling links longer than this are refused.
const MAX_LINK_HOPS: usize = 8;

#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Create the root directory if needed and pin its canonical location.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a model-supplied path onto a location inside the root.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, ToolError> {
        let requested = requested.trim();
        if requested.is_empty() {
            return Err(ToolError::InvalidArguments("Path must not be empty".into()));
        }

        let raw = Path::new(requested);
        let relative = if raw.is_absolute() {
            raw.strip_prefix(&self.root)
                .map_err(|_| violation(requested))?
                .to_path_buf()
        } else {
            raw.to_path_buf()
        };

        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if resolved == self.root {
                        return Err(violation(requested));
                    }
                    resolved.pop();
                }
                Component::RootDir | Component::Prefix(_) => return Err(violation(requested)),
            }
        }

        self.check_links(&resolved, requested)?;
        Ok(resolved)
    }

    /// Display form of `path` relative to the root.
    pub fn display(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        if rel.as_os_str().is_empty() {
            ".".into()
        } else {
            rel.to_string_lossy().replace('\\', "/")
        }
    }

    fn check_links(&self, resolved: &Path, requested: &str) -> Result<(), ToolError> {
        self.check_links_from(resolved, requested, 0)
    }

    fn check_links_from(&self, path: &Path, requested: &str, hops: usize) -> Result<(), ToolError> {
        if hops > MAX_LINK_HOPS {
            return Err(violation(requested));
        }

        let existing = path.ancestors().find(|p| p.exists()).unwrap_or(&self.root);
        let canonical = existing.canonicalize().map_err(|e| unresolvable(requested, e))?;
        if !canonical.starts_with(&self.root) {
            return Err(violation(requested));
        }

        // `exists()` is false for a link whose target is missing.
        for ancestor in path.ancestors().take_while(|p| *p != self.root.as_path()) {
            let is_link = std::fs::symlink_metadata(ancestor).is_ok_and(|m| m.file_type().is_symlink());
            if !is_link || ancestor.exists() {
                continue;
            }
            let link_target = std::fs::read_link(ancestor).map_err(|e| unresolvable(requested, e))?;
            let parent = ancestor
                .parent()
                .unwrap_or(&self.root)
                .canonicalize()
                .map_err(|e| unresolvable(requested, e))?;
            let target = normalize(&parent.join(link_target));
            if !target.starts_with(&self.root) {
                return Err(violation(requested));
            }
            self.check_links_from(&target, requested, hops + 1)?;
        }
        Ok(())
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

fn unresolvable(requested: &str, e: std::io::Error) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "sandbox".into(),
        reason: format!("cannot resolve '{requested}': {e}"),
    }
}

fn violation(requested: &str) -> ToolError {
    ToolError::SandboxViolation(format!("'{requested}' is outside the sandbox"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (tempfile::TempDir, Sandbox) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path().join("sandbox")).unwrap();
        (dir, sandbox)
    }

    #[test]
    fn relative_paths_land_inside_root() {
        let (_dir, sb) = sandbox();
        let path = sb.resolve("notes/todo.txt").unwrap();
        assert!(path.starts_with(sb.root()));
        assert_eq!(sb.display(&path), "notes/todo.txt");
    }

    #[test]
    fn inner_parent_segments_are_fine() {
        let (_dir, sb) = sandbox();
        let path = sb.resolve("a/../b.txt").unwrap();
        assert_eq!(path, sb.root().join("b.txt"));
    }

    #[test]
    fn escaping_the_root_is_rejected() {
        let (_dir, sb) = sandbox();
        assert!(matches!(sb.resolve("../secret"), Err(ToolError::SandboxViolation(_))));
        assert!(matches!(sb.resolve("a/../../secret"), Err(ToolError::SandboxViolation(_))));
        assert!(matches!(sb.resolve("/etc/passwd"), Err(ToolError::SandboxViolation(_))));
    }

    #[test]
    fn absolute_path_inside_root_is_accepted() {
        let (_dir, sb) = sandbox();
        let inside = sb.root().join("data.csv");
        let resolved = sb.resolve(inside.to_str().unwrap()).unwrap();
        assert_eq!(resolved, inside);
    }

    #[test]
    fn empty_path_is_invalid() {
        let (_dir, sb) = sandbox();
        assert!(matches!(sb.resolve("  "), Err(ToolError::InvalidArguments(_))));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_root_is_rejected() {
        let (dir, sb) = sandbox();
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, sb.root().join("link")).unwrap();

        assert!(matches!(sb.resolve("link/file.txt"), Err(ToolError::SandboxViolation(_))));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_out_of_root_is_rejected() {
        let (dir, sb) = sandbox();
        let target = dir.path().join("outside").join("planted.txt");
        std::os::unix::fs::symlink(&target, sb.root().join("report.txt")).unwrap();
        std::os::unix::fs::symlink("../../elsewhere", sb.root().join("relative")).unwrap();

        assert!(matches!(sb.resolve("report.txt"), Err(ToolError::SandboxViolation(_))));
        assert!(matches!(sb.resolve("relative/file.txt"), Err(ToolError::SandboxViolation(_))));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_inside_root_is_allowed() {
        let (_dir, sb) = sandbox();
        std::os::unix::fs::symlink("drafts/next.txt", sb.root().join("next")).unwrap();
        assert_eq!(sb.resolve("next").unwrap(), sb.root().join("next"));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_chain_is_followed() {
        let (dir, sb) = sandbox();
        std::os::unix::fs::symlink(dir.path().join("loot.txt"), sb.root().join("hop2")).unwrap();
        std::os::unix::fs::symlink("hop2", sb.root().join("hop1")).unwrap();
        assert!(matches!(sb.resolve("hop1"), Err(ToolError::SandboxViolation(_))));
    }

    #[test]
    fn root_displays_as_dot() {
        let (_dir, sb) = sandbox();
        assert_eq!(sb.display(sb.root()), ".");
    }
}
