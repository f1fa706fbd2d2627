use crate::{File, FileReadError, FileSystem, FileWriteError, normalize_path};
use std::collections::BTreeMap;

/// In-memory file table. Used by tools and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.insert(path, data);
        self
    }

    pub fn insert(&mut self, path: &str, data: impl Into<Vec<u8>>) {
        self.files.insert(normalize_path(path), data.into());
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(&normalize_path(path))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileSystem for MemoryFileSystem {
    fn read(&self, path: &str) -> Result<File, FileReadError> {
        let normalized = normalize_path(path);
        match self.files.get(&normalized) {
            Some(data) => Ok(File::new(normalized, data.clone())),
            None => Err(FileReadError::NotFound(normalized)),
        }
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), FileWriteError> {
        self.files.insert(normalize_path(path), data.to_vec());
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    fn list(&self, prefix: &str) -> Vec<String> {
        let prefix = normalize_path(prefix);
        self.files
            .keys()
            .filter(|p| prefix == "/" || p.starts_with(&format!("{prefix}/")))
            .cloned()
            .collect()
    }
}
