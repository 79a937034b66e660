//! # Package Archive
//!
//! A generated module travels as one file: the canonical JSON encoding of
//!
//! ```json
//! {"digest":"sha256:…","files":{"manifest.json":"…"},"format":"modforge-archive/1","module":"contracts"}
//! ```
//!
//! Canonical encoding makes the archive bytes themselves deterministic.
//! Decoding recomputes the tree digest and rejects any archive whose content
//! does not match it, so a tampered package never reaches the installer.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use modforge_core::{CanonicalBytes, ContentDigest};
use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;
use crate::module::{tree_digest, GeneratedModule};

pub const ARCHIVE_FORMAT: &str = "modforge-archive/1";

/// File extension used for archives on disk.
pub const ARCHIVE_EXTENSION: &str = "mfpkg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    pub format: String,
    pub module: String,
    pub digest: ContentDigest,
    pub files: BTreeMap<String, String>,
}

impl Archive {
    pub fn from_module(module: &GeneratedModule) -> Self {
        Self {
            format: ARCHIVE_FORMAT.to_string(),
            module: module.name.to_string(),
            digest: module.digest.clone(),
            files: module.files.clone(),
        }
    }

    /// Canonical bytes of the archive.
    pub fn encode(&self) -> Result<Vec<u8>, ArchiveError> {
        Ok(CanonicalBytes::new(self)?.into_bytes())
    }

    /// Parse and verify archive bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let archive: Archive = serde_json::from_slice(bytes).map_err(|e| ArchiveError::Decode(e.to_string()))?;
        if archive.format != ARCHIVE_FORMAT {
            return Err(ArchiveError::UnsupportedFormat(archive.format));
        }
        for path in archive.files.keys() {
            check_relative(path)?;
        }
        let computed = tree_digest(&archive.files)?;
        if computed != archive.digest {
            return Err(ArchiveError::DigestMismatch {
                declared: archive.digest.to_string(),
                computed: computed.to_string(),
            });
        }
        Ok(archive)
    }

    /// Write the files under `dir/<module>/`, returning the package directory.
    pub fn unpack(&self, dir: &Path) -> Result<PathBuf, ArchiveError> {
        check_relative(&self.module)?;
        let root = dir.join(&self.module);
        for (path, content) in &self.files {
            check_relative(path)?;
            let target = root.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|source| ArchiveError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
            std::fs::write(&target, content).map_err(|source| ArchiveError::Io {
                path: target.display().to_string(),
                source,
            })?;
        }
        tracing::debug!(module = %self.module, root = %root.display(), files = self.files.len(), "archive unpacked");
        Ok(root)
    }
}

/// Encode a module straight to archive bytes.
pub fn encode(module: &GeneratedModule) -> Result<Vec<u8>, ArchiveError> {
    Archive::from_module(module).encode()
}

/// Read and verify an archive file.
pub fn read(path: &Path) -> Result<Archive, ArchiveError> {
    let bytes = std::fs::read(path).map_err(|source| ArchiveError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Archive::decode(&bytes)
}

/// Only plain relative components; no `..`, roots or prefixes.
fn check_relative(path: &str) -> Result<(), ArchiveError> {
    let p = Path::new(path);
    let plain = !path.is_empty() && p.components().all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(())
    } else {
        Err(ArchiveError::UnsafePath(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive() -> Archive {
        let mut files = BTreeMap::new();
        files.insert("manifest.json".to_string(), "{}\n".to_string());
        files.insert("models/contract.py".to_string(), "# model\n".to_string());
        Archive {
            format: ARCHIVE_FORMAT.to_string(),
            module: "contracts".to_string(),
            digest: tree_digest(&files).unwrap(),
            files,
        }
    }

    #[test]
    fn decode_accepts_what_encode_wrote() {
        let a = archive();
        let bytes = a.encode().unwrap();
        assert_eq!(Archive::decode(&bytes).unwrap(), a);
        assert!(bytes.starts_with(b"{\"digest\":\"sha256:"));
    }

    #[test]
    fn tampered_content_is_rejected() {
        let mut a = archive();
        a.files.insert("models/contract.py".into(), "# changed\n".into());
        let bytes = a.encode().unwrap();
        assert!(matches!(Archive::decode(&bytes), Err(ArchiveError::DigestMismatch { .. })));
    }

    #[test]
    fn unknown_format_is_rejected() {
        let mut a = archive();
        a.format = "zip".into();
        let bytes = a.encode().unwrap();
        assert!(matches!(Archive::decode(&bytes), Err(ArchiveError::UnsupportedFormat(f)) if f == "zip"));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(Archive::decode(b"not json"), Err(ArchiveError::Decode(_))));
    }

    #[test]
    fn escaping_paths_are_rejected() {
        for bad in ["../evil.py", "/etc/passwd", "", "a/../../b"] {
            assert!(check_relative(bad).is_err(), "{bad} should be rejected");
        }
        assert!(check_relative("security/ir.model.access.csv").is_ok());
    }

    #[test]
    fn unpack_writes_the_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = archive().unpack(dir.path()).unwrap();
        assert_eq!(root, dir.path().join("contracts"));
        assert_eq!(std::fs::read_to_string(root.join("models/contract.py")).unwrap(), "# model\n");
    }
}
