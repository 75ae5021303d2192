//! Harness configuration.
//!
//! Defaults follow the repository layout (`src/` holds the printers,
//! `tests/` holds the Dockerfile and one directory per test case). A JSON
//! file can override any field; relative paths in it are resolved against the
//! file's own directory.
//!
//! Every directory ends up absolute: Docker reads a relative `-v` source as a
//! named volume.

use crate::error::HarnessError;
use crate::Result;
use ppcheck_env::{default_versions, CacheSettings, ToolchainVersion};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Default image tag prefix.
pub const DEFAULT_IMAGE_PREFIX: &str = "libcxx-pp-test";

/// Default bound on one compile-and-debug run.
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 120;

const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 600;
const DEFAULT_INSPECT_TIMEOUT_SECS: u64 = 10;

/// Resolved harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub repo_root: PathBuf,

    /// Directory holding one subdirectory per test case.
    pub tests_dir: PathBuf,

    /// Pretty-printer sources mounted into the container.
    pub printers_dir: PathBuf,

    /// Environment definition.
    pub dockerfile: PathBuf,

    pub build_context: PathBuf,
    pub image_prefix: String,

    /// Container runtime executable.
    pub runtime_program: String,

    pub default_versions: Vec<ToolchainVersion>,
    pub run_timeout_secs: u64,
    pub build_timeout_secs: u64,
    pub inspect_timeout_secs: u64,
}

/// On-disk overrides; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    repo_root: Option<PathBuf>,
    tests_dir: Option<PathBuf>,
    printers_dir: Option<PathBuf>,
    dockerfile: Option<PathBuf>,
    build_context: Option<PathBuf>,
    image_prefix: Option<String>,
    runtime_program: Option<String>,
    default_versions: Option<Vec<ToolchainVersion>>,
    run_timeout_secs: Option<u64>,
    build_timeout_secs: Option<u64>,
    inspect_timeout_secs: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::for_repo(".")
    }
}

impl HarnessConfig {
    /// Conventional layout under `repo_root`.
    pub fn for_repo(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = absolutize(&repo_root.into());
        let tests_dir = repo_root.join("tests");
        Self {
            printers_dir: repo_root.join("src"),
            dockerfile: tests_dir.join("Dockerfile"),
            build_context: tests_dir.clone(),
            tests_dir,
            repo_root,
            image_prefix: DEFAULT_IMAGE_PREFIX.to_string(),
            runtime_program: "docker".to_string(),
            default_versions: default_versions(),
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
            build_timeout_secs: DEFAULT_BUILD_TIMEOUT_SECS,
            inspect_timeout_secs: DEFAULT_INSPECT_TIMEOUT_SECS,
        }
    }

    /// Load a JSON config file on top of the conventional layout.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&raw)?;
        let base = absolutize(path.parent().unwrap_or_else(|| Path::new(".")));
        let resolve = |p: PathBuf| absolutize(&base.join(p));

        let root = file.repo_root.map(resolve).unwrap_or_else(|| base.clone());
        let mut config = Self::for_repo(root);

        if let Some(dir) = file.tests_dir {
            config.tests_dir = resolve(dir);
            config.dockerfile = config.tests_dir.join("Dockerfile");
            config.build_context = config.tests_dir.clone();
        }
        if let Some(dir) = file.printers_dir {
            config.printers_dir = resolve(dir);
        }
        if let Some(dockerfile) = file.dockerfile {
            config.dockerfile = resolve(dockerfile);
        }
        if let Some(context) = file.build_context {
            config.build_context = resolve(context);
        }
        if let Some(prefix) = file.image_prefix {
            config.image_prefix = prefix;
        }
        if let Some(program) = file.runtime_program {
            config.runtime_program = program;
        }
        if let Some(versions) = file.default_versions {
            config.default_versions = versions;
        }
        if let Some(secs) = file.run_timeout_secs {
            config.run_timeout_secs = secs;
        }
        if let Some(secs) = file.build_timeout_secs {
            config.build_timeout_secs = secs;
        }
        if let Some(secs) = file.inspect_timeout_secs {
            config.inspect_timeout_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the harness cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.run_timeout_secs == 0 || self.build_timeout_secs == 0 || self.inspect_timeout_secs == 0 {
            return Err(HarnessError::Config("timeouts must be positive".to_string()));
        }
        let prefix_ok = !self.image_prefix.is_empty()
            && self
                .image_prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '_' | '/'));
        if !prefix_ok {
            return Err(HarnessError::Config(format!(
                "invalid image prefix {:?}",
                self.image_prefix
            )));
        }
        if self.runtime_program.trim().is_empty() {
            return Err(HarnessError::Config("runtime program is empty".to_string()));
        }
        Ok(())
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn inspect_timeout(&self) -> Duration {
        Duration::from_secs(self.inspect_timeout_secs)
    }

    /// Settings for the environment cache.
    pub fn cache_settings(&self, quiet: bool) -> CacheSettings {
        CacheSettings {
            image_prefix: self.image_prefix.clone(),
            dockerfile: self.dockerfile.clone(),
            context: self.build_context.clone(),
            build_timeout: Duration::from_secs(self.build_timeout_secs),
            quiet,
        }
    }
}

/// `path` anchored at the working directory with `.` and `..` folded away.
fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
