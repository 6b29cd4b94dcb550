//! Deterministic output identity.
//!
//! The artifact key is the SHA-512 digest of the raw spec bytes, not of the
//! parsed document. Byte-identical submissions therefore always map to the
//! same artifact, while a reformatted but semantically equal spec gets a
//! different one.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

/// Number of hex digits of the digest used in artifact file names.
pub const SHORT_KEY_LEN: usize = 12;

/// Hex-encoded SHA-512 digest of a raw spec document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Hash the raw spec bytes.
    pub fn from_spec_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha512::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Full hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digest prefix used for naming.
    pub fn short(&self) -> &str {
        self.0.get(..SHORT_KEY_LEN).unwrap_or(&self.0)
    }

    /// Artifact file name for the given container extension.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.short(), extension)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

/// A produced (or already present) output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub key: ArtifactKey,
    pub local_path: PathBuf,
}
