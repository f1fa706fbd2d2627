//! Directory-backed file system.
//!
//! Layout inside the data directory:
//! ```text
//! manifest.json      - optional integrity manifest (virtual path -> sha256)
//! shaders/*.wgsl
//! models/*.glb
//! ...
//! ```

use crate::manifest::{IntegrityManifest, MANIFEST_FILE};
use crate::{File, FileReadError, FileSystem, FileWriteError, normalize_path};
use std::path::{Path, PathBuf};

/// File system rooted at a directory on disk.
pub struct NativeFileSystem {
    root: PathBuf,
    manifest: Option<IntegrityManifest>,
}

impl NativeFileSystem {
    /// Open a data directory, loading `manifest.json` when present.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let manifest_path = root.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            Some(IntegrityManifest::load(&manifest_path)?)
        } else {
            None
        };
        tracing::debug!(root = %root.display(), manifest = manifest.is_some(), "opened data directory");
        Ok(Self { root, manifest })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> Option<&IntegrityManifest> {
        self.manifest.as_ref()
    }

    /// On-disk location of a virtual path.
    pub fn host_path(&self, path: &str) -> PathBuf {
        let normalized = normalize_path(path);
        self.root.join(normalized.trim_start_matches('/'))
    }

    /// Hash every file under the root and write a fresh manifest.
    pub fn write_manifest(&mut self) -> Result<&IntegrityManifest, FileWriteError> {
        let mut manifest = IntegrityManifest::default();
        for path in self.list("/") {
            let host = self.host_path(&path);
            let data = std::fs::read(&host).map_err(|source| FileWriteError::Io {
                path: path.clone(),
                source,
            })?;
            manifest.record(&path, &data);
        }
        manifest.save(self.root.join(MANIFEST_FILE))?;
        tracing::info!(files = manifest.files.len(), "wrote integrity manifest");
        Ok(self.manifest.insert(manifest))
    }

    /// Verify every manifest entry. Returns the failures, empty when intact.
    pub fn verify_integrity(&self) -> Vec<FileReadError> {
        let Some(manifest) = &self.manifest else {
            return Vec::new();
        };
        manifest
            .files
            .keys()
            .filter_map(|path| self.read(path).err())
            .collect()
    }

    fn collect(&self, dir: &Path, out: &mut Vec<String>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let host = entry.path();
            if host.is_dir() {
                self.collect(&host, out);
            } else if let Ok(relative) = host.strip_prefix(&self.root) {
                let virtual_path = normalize_path(&relative.to_string_lossy());
                if virtual_path != format!("/{MANIFEST_FILE}") {
                    out.push(virtual_path);
                }
            }
        }
    }
}

impl FileSystem for NativeFileSystem {
    fn read(&self, path: &str) -> Result<File, FileReadError> {
        let normalized = normalize_path(path);
        let host = self.host_path(&normalized);
        let data = std::fs::read(&host).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                FileReadError::NotFound(normalized.clone())
            } else {
                FileReadError::Io {
                    path: normalized.clone(),
                    source,
                }
            }
        })?;

        if let Some(manifest) = &self.manifest {
            if let Err((expected, actual)) = manifest.verify(&normalized, &data) {
                tracing::error!(path = %normalized, "integrity check failed");
                return Err(FileReadError::HashMismatch {
                    path: normalized,
                    expected,
                    actual,
                });
            }
        }

        Ok(File::new(normalized, data))
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), FileWriteError> {
        let normalized = normalize_path(path);
        let host = self.host_path(&normalized);
        let io_err = |source| FileWriteError::Io {
            path: normalized.clone(),
            source,
        };
        if let Some(parent) = host.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&host, data).map_err(io_err)?;

        if let Some(manifest) = &mut self.manifest {
            if manifest.expected(&normalized).is_some() {
                manifest.record(&normalized, data);
                manifest.save(self.root.join(MANIFEST_FILE))?;
            }
        }
        tracing::debug!(path = %normalized, bytes = data.len(), "wrote file");
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.host_path(path).is_file()
    }

    fn list(&self, prefix: &str) -> Vec<String> {
        let prefix = normalize_path(prefix);
        let mut out = Vec::new();
        self.collect(&self.root, &mut out);
        out.retain(|p| prefix == "/" || p == &prefix || p.starts_with(&format!("{prefix}/")));
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut fs = NativeFileSystem::open(tmp.path()).unwrap();
        fs.write("/shaders/a.wgsl", b"// a").unwrap();
        assert!(fs.exists("/shaders/a.wgsl"));
        let file = fs.read("shaders/a.wgsl").unwrap();
        assert_eq!(file.path(), "/shaders/a.wgsl");
        assert_eq!(file.data(), b"// a");
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = NativeFileSystem::open(tmp.path()).unwrap();
        assert!(matches!(fs.read("/nope.glb"), Err(FileReadError::NotFound(_))));
    }

    #[test]
    fn list_is_sorted_and_prefixed() {
        let tmp = tempfile::tempdir().unwrap();
        let mut fs = NativeFileSystem::open(tmp.path()).unwrap();
        fs.write("/shaders/b.wgsl", b"b").unwrap();
        fs.write("/shaders/a.wgsl", b"a").unwrap();
        fs.write("/models/m.glb", b"m").unwrap();
        assert_eq!(fs.list("/shaders"), vec!["/shaders/a.wgsl", "/shaders/b.wgsl"]);
        assert_eq!(fs.list("/").len(), 3);
    }

    #[test]
    fn manifest_fails_closed_on_corruption() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut fs = NativeFileSystem::open(tmp.path()).unwrap();
            fs.write("/data/config.json", b"{\"a\":1}").unwrap();
            fs.write_manifest().unwrap();
        }

        // Corrupt behind the manifest's back.
        std::fs::write(tmp.path().join("data/config.json"), b"{\"a\":2}").unwrap();

        let fs = NativeFileSystem::open(tmp.path()).unwrap();
        match fs.read("/data/config.json") {
            Err(FileReadError::HashMismatch { path, .. }) => assert_eq!(path, "/data/config.json"),
            other => panic!("expected HashMismatch, got {other:?}"),
        }
        assert_eq!(fs.verify_integrity().len(), 1);
    }

    #[test]
    fn write_through_vfs_keeps_manifest_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let mut fs = NativeFileSystem::open(tmp.path()).unwrap();
        fs.write("/shaders/a.wgsl", b"old").unwrap();
        fs.write_manifest().unwrap();

        fs.write("/shaders/a.wgsl", b"new").unwrap();
        let reopened = NativeFileSystem::open(tmp.path()).unwrap();
        assert_eq!(reopened.read("/shaders/a.wgsl").unwrap().data(), b"new");
        assert!(reopened.verify_integrity().is_empty());
    }
}
