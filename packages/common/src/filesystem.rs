use crate::{CommonError, CommonResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File system abstraction for devfile persistence and testing
pub trait FileSystem: Send + Sync {
    /// Check if a file exists
    fn exists(&self, path: &Path) -> bool;

    /// Read a whole file as UTF-8
    fn read_to_string(&self, path: &Path) -> CommonResult<String>;

    /// Replace the file content, creating the file if needed
    fn write(&self, path: &Path, content: &str) -> CommonResult<()>;
}

/// Real file system implementation
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_to_string(&self, path: &Path) -> CommonResult<String> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CommonError::NotFound(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &Path, content: &str) -> CommonResult<()> {
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// In-memory file system for testing
#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<HashMap<PathBuf, String>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.lock().insert(path.into(), content.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, String>> {
        // A poisoned map is still a valid map
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    fn read_to_string(&self, path: &Path) -> CommonResult<String> {
        self.lock()
            .get(path)
            .cloned()
            .ok_or_else(|| CommonError::NotFound(path.to_path_buf()))
    }

    fn write(&self, path: &Path, content: &str) -> CommonResult<()> {
        self.lock().insert(path.to_path_buf(), content.to_string());
        Ok(())
    }
}
