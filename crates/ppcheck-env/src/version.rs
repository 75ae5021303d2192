//! Toolchain version identifiers

use crate::error::EnvError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// LLVM versions exercised when the caller does not pick one.
pub const DEFAULT_VERSIONS: [&str; 2] = ["18", "21"];

/// An LLVM toolchain version, e.g. `18`.
///
/// Used verbatim in image tags, build arguments and the compiler name, so the
/// constructor only admits [`is_safe_token`] strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolchainVersion(String);

impl ToolchainVersion {
    /// Create a version from an already-extracted identifier.
    pub fn new(version: impl Into<String>) -> Result<Self> {
        let version = version.into();
        if !is_safe_token(&version) {
            return Err(EnvError::InvalidVersion(version));
        }
        Ok(ToolchainVersion(version))
    }

    /// Extract a version from a compiler spelling such as `clang++-18` or `18`.
    ///
    /// The first run of ASCII digits wins; input without digits is taken as is.
    pub fn from_compiler_arg(arg: &str) -> Result<Self> {
        let digits = arg
            .split(|c: char| !c.is_ascii_digit())
            .find(|run| !run.is_empty());
        match digits {
            Some(run) => Self::new(run),
            None => Self::new(arg.trim()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compiler binary inside the environment.
    pub fn compiler(&self) -> String {
        format!("clang++-{}", self.0)
    }

    /// Image tag for this version under `prefix`.
    pub fn image_tag(&self, prefix: &str) -> String {
        format!("{}:{}", prefix, self.0)
    }
}

impl fmt::Display for ToolchainVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ToolchainVersion {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_compiler_arg(s)
    }
}

impl TryFrom<String> for ToolchainVersion {
    type Error = EnvError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ToolchainVersion> for String {
    fn from(version: ToolchainVersion) -> Self {
        version.0
    }
}

/// The built-in version set.
pub fn default_versions() -> Vec<ToolchainVersion> {
    DEFAULT_VERSIONS
        .iter()
        .map(|v| ToolchainVersion((*v).to_string()))
        .collect()
}

/// Whether `s` is non-empty and made only of ASCII alphanumerics, `.`, `-` or `_`.
pub fn is_safe_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_compiler_arg_strips_compiler_name() {
        let version = ToolchainVersion::from_compiler_arg("clang++-18").unwrap();
        assert_eq!(version.as_str(), "18");
        assert_eq!(version.compiler(), "clang++-18");
    }

    #[test]
    fn test_from_compiler_arg_plain_number() {
        let version: ToolchainVersion = "21".parse().unwrap();
        assert_eq!(version.as_str(), "21");
    }

    #[test]
    fn test_from_compiler_arg_without_digits_kept_verbatim() {
        let version = ToolchainVersion::from_compiler_arg("trunk").unwrap();
        assert_eq!(version.as_str(), "trunk");
    }

    #[test]
    fn test_unsafe_version_rejected() {
        assert!(ToolchainVersion::new("18; rm -rf /").is_err());
        assert!(ToolchainVersion::new("").is_err());
        assert!(ToolchainVersion::from_compiler_arg("clang++").is_err());
    }

    #[test]
    fn test_image_tag() {
        let version = ToolchainVersion::new("18").unwrap();
        assert_eq!(version.image_tag("libcxx-pp-test"), "libcxx-pp-test:18");
    }

    #[test]
    fn test_default_versions() {
        let versions = default_versions();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].as_str(), "18");
        assert_eq!(versions[1].as_str(), "21");
    }

    #[test]
    fn test_serde_rejects_unsafe_version() {
        let ok: ToolchainVersion = serde_json::from_str("\"18\"").unwrap();
        assert_eq!(ok.as_str(), "18");
        assert!(serde_json::from_str::<ToolchainVersion>("\"1 8\"").is_err());
    }
}
