use std::path::{Path, PathBuf};

use crate::KwantError;

/// Reads shader bytecode from somewhere
pub trait ShaderLoader: Send + Sync {
    fn read_all(&self, path: &Path) -> crate::Result<Vec<u8>>;
}

/// Reads from the file system, relative paths resolve against `root` when one is set
#[derive(Debug, Clone, Default)]
pub struct FsShaderLoader {
    root: Option<PathBuf>,
}

impl FsShaderLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match self.root.as_ref() {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ShaderLoader for FsShaderLoader {
    fn read_all(&self, path: &Path) -> crate::Result<Vec<u8>> {
        let path = self.resolve(path);
        std::fs::read(&path).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => KwantError::FileNotFound(path.clone()),
            _ => KwantError::IoFailure {
                path: path.clone(),
                message: error.to_string(),
            },
        })
    }
}
