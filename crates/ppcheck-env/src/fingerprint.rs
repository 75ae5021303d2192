//! Environment definition fingerprinting
//!
//! The Dockerfile is the whole definition of a toolchain environment, so its
//! sha256 decides whether an existing image is still current.

use crate::error::EnvError;
use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

/// Content hash of an environment definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefinitionHash {
    /// The SHA256 hash, lowercase hex
    pub hash: String,
}

impl std::fmt::Display for DefinitionHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl DefinitionHash {
    /// Hash the given bytes.
    pub fn from_bytes(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        DefinitionHash {
            hash: hex::encode(hasher.finalize()),
        }
    }

    /// Get short hash (first 12 characters)
    pub fn short(&self) -> &str {
        &self.hash[..12.min(self.hash.len())]
    }

    /// Whether a stored label value refers to this definition.
    pub fn matches(&self, stored: Option<&str>) -> bool {
        stored == Some(self.hash.as_str())
    }
}

/// Fingerprint the environment definition at `definition_path`.
///
/// Raw bytes are hashed; whitespace edits count as changes.
pub fn fingerprint_definition(definition_path: &Path) -> Result<DefinitionHash> {
    if !definition_path.is_file() {
        return Err(EnvError::DefinitionNotFound(
            definition_path.display().to_string(),
        ));
    }

    let content = std::fs::read(definition_path)?;
    let hash = DefinitionHash::from_bytes(&content);
    debug!(definition = %definition_path.display(), hash = %hash.short(), "Fingerprinted environment definition");
    Ok(hash)
}
