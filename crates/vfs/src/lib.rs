//! Virtual file system.
//!
//! Resources are addressed by virtual paths (`/shaders/ship.wgsl`). A
//! [`FileSystem`] maps those paths onto a backing store: a directory on disk
//! ([`NativeFileSystem`]) or an in-memory table ([`MemoryFileSystem`]).
//!
//! # Invariants
//! - A read yields either the complete file or exactly one [`FileReadError`].
//! - A native file listed in the integrity manifest is only returned when its
//!   SHA-256 matches the manifest entry.

mod manifest;
mod memory;
mod native;

pub use manifest::{IntegrityManifest, sha256_hex};
pub use memory::MemoryFileSystem;
pub use native::NativeFileSystem;

pub use hearth_common::normalize_path;

use hearth_common::{resource_extension, resource_name};

/// Errors from reading a file.
#[derive(Debug, thiserror::Error)]
pub enum FileReadError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("hash mismatch for {path}: expected {expected}, got {actual}")]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from writing a file.
#[derive(Debug, thiserror::Error)]
pub enum FileWriteError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// A file read through the VFS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    path: String,
    data: Vec<u8>,
}

impl File {
    pub fn new(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        resource_name(&self.path)
    }

    pub fn extension(&self) -> Option<String> {
        resource_extension(&self.path)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.data)
    }
}

/// Storage backend for virtual paths.
pub trait FileSystem {
    fn read(&self, path: &str) -> Result<File, FileReadError>;
    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), FileWriteError>;
    fn exists(&self, path: &str) -> bool;
    /// Virtual paths under `prefix`, sorted.
    fn list(&self, prefix: &str) -> Vec<String>;
}

pub fn crate_info() -> &'static str {
    "hearth-vfs v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("vfs"));
    }

    #[test]
    fn normalize_collapses_separators() {
        assert_eq!(normalize_path("shaders//a.wgsl"), "/shaders/a.wgsl");
        assert_eq!(normalize_path("/./models/b.glb"), "/models/b.glb");
        assert_eq!(normalize_path("\\x\\y.json"), "/x/y.json");
    }

    #[test]
    fn file_accessors() {
        let f = File::new("/shaders/Hull.WGSL", b"fn main() {}".to_vec());
        assert_eq!(f.name(), "Hull.WGSL");
        assert_eq!(f.extension().as_deref(), Some("wgsl"));
        assert_eq!(f.as_str().unwrap(), "fn main() {}");
    }
}
