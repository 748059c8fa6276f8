//! Sandbox root resolution and the filesystem seam.
//!
//! Resolution happens in two stages:
//!
//! 1. **Lexical**: reject `..`, foreign absolute paths and NUL bytes. No
//!    syscall is made, so a traversal attempt never touches the disk.
//! 2. **Physical**: canonicalize the nearest existing ancestor and require it
//!    to stay under the canonical root. This catches symlinks that point out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Component, Path, PathBuf};
use suna_domain::ToolError;

/// Metadata subset the file tool needs.
#[derive(Debug, Clone)]
pub struct FsMetadata {
    pub is_dir: bool,
    pub is_symlink: bool,
    pub len: u64,
    pub readonly: bool,
    pub modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
}

/// Every filesystem call the file tool makes goes through this trait.
#[async_trait]
pub trait SandboxFs: Send + Sync {
    async fn metadata(&self, path: &Path) -> io::Result<FsMetadata>;
    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Entry names, unsorted
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<String>>;
    async fn remove_file(&self, path: &Path) -> io::Result<()>;
    async fn remove_dir(&self, path: &Path, recursive: bool) -> io::Result<()>;
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// [`SandboxFs`] backed by `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

#[async_trait]
impl SandboxFs for LocalFs {
    async fn metadata(&self, path: &Path) -> io::Result<FsMetadata> {
        let link = tokio::fs::symlink_metadata(path).await?;
        let meta = if link.file_type().is_symlink() {
            tokio::fs::metadata(path).await?
        } else {
            link.clone()
        };
        Ok(FsMetadata {
            is_dir: meta.is_dir(),
            is_symlink: link.file_type().is_symlink(),
            len: meta.len(),
            readonly: meta.permissions().readonly(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
            created: meta.created().ok().map(DateTime::<Utc>::from),
        })
    }

    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        tokio::fs::canonicalize(path).await
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    async fn remove_dir(&self, path: &Path, recursive: bool) -> io::Result<()> {
        if recursive {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_dir(path).await
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }
}

/// A fixed, canonical root directory.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// `root` must already be canonical.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `requested` onto the root without touching the filesystem.
    pub fn resolve_lexical(&self, requested: &str) -> Result<PathBuf, ToolError> {
        if requested.contains('\0') {
            return Err(ToolError::invalid_argument("Path contains a NUL byte"));
        }

        let requested_path = Path::new(requested);
        let relative = if requested_path.is_absolute() {
            requested_path.strip_prefix(&self.root).map_err(|_| {
                ToolError::permission_denied(format!(
                    "Path outside sandbox not allowed: {requested}"
                ))
            })?
        } else {
            requested_path
        };

        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(ToolError::permission_denied(format!(
                        "Path traversal not allowed: {requested}"
                    )));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(ToolError::permission_denied(format!(
                        "Path outside sandbox not allowed: {requested}"
                    )));
                }
            }
        }
        Ok(resolved)
    }

    /// Lexical resolution followed by the symlink check.
    pub async fn resolve(&self, fs: &dyn SandboxFs, requested: &str) -> Result<PathBuf, ToolError> {
        let resolved = self.resolve_lexical(requested)?;

        let mut ancestor = resolved.as_path();
        loop {
            match fs.canonicalize(ancestor).await {
                Ok(real) if real.starts_with(&self.root) => return Ok(resolved),
                Ok(_) => {
                    return Err(ToolError::permission_denied(format!(
                        "Path escapes the sandbox through a symlink: {requested}"
                    )));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => match ancestor.parent() {
                    Some(parent) if parent.starts_with(&self.root) => ancestor = parent,
                    _ => return Ok(resolved),
                },
                Err(e) => {
                    return Err(ToolError::execution_failed(format!(
                        "Failed to resolve path {requested}: {e}"
                    )));
                }
            }
        }
    }

    /// Root-relative display form of a resolved path.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let text = rel.to_string_lossy();
        if text.is_empty() {
            ".".to_string()
        } else {
            text.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> Sandbox {
        Sandbox::new(PathBuf::from("/srv/sandbox"))
    }

    #[test]
    fn test_lexical_resolution() {
        let sb = sandbox();
        assert_eq!(
            sb.resolve_lexical("notes/a.txt").unwrap(),
            PathBuf::from("/srv/sandbox/notes/a.txt")
        );
        assert_eq!(sb.resolve_lexical("./a.txt").unwrap(), PathBuf::from("/srv/sandbox/a.txt"));
        assert_eq!(
            sb.resolve_lexical("/srv/sandbox/x").unwrap(),
            PathBuf::from("/srv/sandbox/x")
        );
        assert_eq!(sb.resolve_lexical(".").unwrap(), PathBuf::from("/srv/sandbox"));
    }

    #[test]
    fn test_lexical_rejections() {
        let sb = sandbox();
        for bad in ["../etc/passwd", "a/../../b", "a/..", "/etc/passwd", "/srv/sandboxed/x"] {
            let err = sb.resolve_lexical(bad).unwrap_err();
            assert_eq!(err.kind, suna_domain::ErrorKind::PermissionDenied, "{bad}");
        }
    }

    #[test]
    fn test_relative_display() {
        let sb = sandbox();
        assert_eq!(sb.relative(Path::new("/srv/sandbox")), ".");
        assert_eq!(sb.relative(Path::new("/srv/sandbox/a/b.txt")), "a/b.txt");
    }
}
