use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// File name of the manifest at the root of a native data directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Expected SHA-256 per virtual path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub files: BTreeMap<String, String>,
}

impl IntegrityManifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let file = std::fs::File::open(path)?;
        serde_json::from_reader(file).map_err(std::io::Error::other)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), serde_json::Error> {
        let file = std::fs::File::create(path).map_err(serde_json::Error::io)?;
        serde_json::to_writer_pretty(file, self)
    }

    pub fn expected(&self, virtual_path: &str) -> Option<&str> {
        self.files.get(virtual_path).map(String::as_str)
    }

    /// Checks `data` against the entry for `virtual_path`. Untracked files pass.
    pub fn verify(&self, virtual_path: &str, data: &[u8]) -> Result<(), (String, String)> {
        match self.expected(virtual_path) {
            Some(expected) => {
                let actual = sha256_hex(data);
                if actual == expected {
                    Ok(())
                } else {
                    Err((expected.to_string(), actual))
                }
            }
            None => Ok(()),
        }
    }

    pub fn record(&mut self, virtual_path: &str, data: &[u8]) {
        self.files.insert(virtual_path.to_string(), sha256_hex(data));
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_tracked_and_untracked() {
        let mut manifest = IntegrityManifest::default();
        manifest.record("/a.json", b"{}");
        assert!(manifest.verify("/a.json", b"{}").is_ok());
        assert!(manifest.verify("/a.json", b"[]").is_err());
        assert!(manifest.verify("/untracked", b"anything").is_ok());
    }

    #[test]
    fn sha256_known_value() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
