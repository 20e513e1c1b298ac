use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{EvalError, Result};

/// Reads run inputs and writes run outputs by path.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn read_text(&self, path: &Path) -> Result<String>;

    /// Write the whole document at once, creating parent directories as needed.
    async fn write_text(&self, path: &Path, content: &str) -> Result<()>;
}

/// Filesystem-backed store.
#[derive(Debug, Clone, Default)]
pub struct FsStore {
    root: Option<PathBuf>,
}

impl FsStore {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Resolve relative paths against `root` instead of the working directory.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl ArtifactStore for FsStore {
    async fn read_text(&self, path: &Path) -> Result<String> {
        let path = self.resolve(path);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| EvalError::Read { path, source })
    }

    async fn write_text(&self, path: &Path, content: &str) -> Result<()> {
        let path = self.resolve(path);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| EvalError::Write {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| EvalError::Write { path, source })
    }
}
