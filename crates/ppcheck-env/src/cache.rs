//! Build-or-reuse cache of toolchain images
//!
//! An image is reused only while its `dockerfile.hash` label equals the
//! fingerprint of the current Dockerfile. Anything else triggers a build that
//! stamps the new fingerprint. A version whose build fails is dropped from the
//! run; the others carry on.

use crate::fingerprint::{fingerprint_definition, DefinitionHash};
use crate::runtime::{BuildRequest, ContainerRuntime};
use crate::version::ToolchainVersion;
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Image label carrying the definition fingerprint.
pub const DEFINITION_HASH_LABEL: &str = "dockerfile.hash";

/// Where and how toolchain images are built.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Tag prefix; the version is the tag suffix.
    pub image_prefix: String,

    /// The environment definition.
    pub dockerfile: PathBuf,

    /// Docker build context.
    pub context: PathBuf,

    pub build_timeout: Duration,

    /// Capture build output instead of streaming it.
    pub quiet: bool,
}

/// A toolchain environment known to be usable in this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentRecord {
    pub version: ToolchainVersion,
    pub tag: String,
    pub fingerprint: DefinitionHash,

    /// Whether this process built the image (as opposed to reusing it).
    pub rebuilt: bool,
}

/// Per-process view of the toolchain images.
pub struct EnvironmentCache {
    runtime: Arc<dyn ContainerRuntime>,
    settings: CacheSettings,
    records: BTreeMap<ToolchainVersion, EnvironmentRecord>,
}

impl EnvironmentCache {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, settings: CacheSettings) -> Self {
        Self {
            runtime,
            settings,
            records: BTreeMap::new(),
        }
    }

    /// Record for a version ensured earlier in this process.
    pub fn record(&self, version: &ToolchainVersion) -> Option<&EnvironmentRecord> {
        self.records.get(version)
    }

    /// Make sure an up-to-date image exists for each of `versions`.
    ///
    /// Returns the versions that are ready, in request order. Failures are
    /// logged and the version is left out.
    pub async fn ensure(
        &mut self,
        versions: &[ToolchainVersion],
        force_rebuild: bool,
    ) -> Vec<ToolchainVersion> {
        let fingerprint = match fingerprint_definition(&self.settings.dockerfile) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                for version in versions {
                    warn!(version = %version, "SKIP clang-{}: {}", version, e);
                }
                return Vec::new();
            }
        };

        let mut attempted: BTreeSet<&ToolchainVersion> = BTreeSet::new();
        let mut available: Vec<ToolchainVersion> = Vec::new();
        for version in versions {
            if !attempted.insert(version) {
                continue;
            }

            let tag = version.image_tag(&self.settings.image_prefix);
            if !force_rebuild && self.is_fresh(&tag, &fingerprint).await {
                debug!(tag = %tag, "Reusing image");
                self.remember(version, tag, &fingerprint, false);
                available.push(version.clone());
                continue;
            }

            let reason = if force_rebuild {
                "forced"
            } else {
                "Dockerfile changed"
            };
            info!(tag = %tag, fingerprint = %fingerprint.short(), "Building {} ({})...", tag, reason);

            match self.build(version, &tag, &fingerprint).await {
                Ok(()) => {
                    self.remember(version, tag, &fingerprint, true);
                    available.push(version.clone());
                }
                Err(e) => {
                    warn!(version = %version, "SKIP clang-{}: {}", version, e);
                }
            }
        }

        available
    }

    /// Whether `tag` exists and was built from the definition `fingerprint`.
    pub async fn is_fresh(&self, tag: &str, fingerprint: &DefinitionHash) -> bool {
        match self.runtime.image_label(tag, DEFINITION_HASH_LABEL).await {
            Ok(stored) => fingerprint.matches(stored.as_deref()),
            Err(e) => {
                debug!(tag, error = %e, "Image inspection failed");
                false
            }
        }
    }

    async fn build(
        &self,
        version: &ToolchainVersion,
        tag: &str,
        fingerprint: &DefinitionHash,
    ) -> Result<()> {
        let request = BuildRequest {
            tag: tag.to_string(),
            dockerfile: self.settings.dockerfile.clone(),
            context: self.settings.context.clone(),
            build_args: vec![("LLVM_VERSION".to_string(), version.to_string())],
            labels: vec![(DEFINITION_HASH_LABEL.to_string(), fingerprint.hash.clone())],
            quiet: self.settings.quiet,
            timeout: self.settings.build_timeout,
        };
        self.runtime.build_image(&request).await?;
        Ok(())
    }

    fn remember(
        &mut self,
        version: &ToolchainVersion,
        tag: String,
        fingerprint: &DefinitionHash,
        rebuilt: bool,
    ) {
        self.records.insert(
            version.clone(),
            EnvironmentRecord {
                version: version.clone(),
                tag,
                fingerprint: fingerprint.clone(),
                rebuilt,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedRuntime;
    use tempfile::{tempdir, TempDir};

    const DOCKERFILE: &str = "FROM ubuntu:24.04\nARG LLVM_VERSION\n";

    fn setup() -> (TempDir, CacheSettings, DefinitionHash) {
        let dir = tempdir().unwrap();
        let dockerfile = dir.path().join("Dockerfile");
        std::fs::write(&dockerfile, DOCKERFILE).unwrap();
        let settings = CacheSettings {
            image_prefix: "libcxx-pp-test".to_string(),
            dockerfile,
            context: dir.path().to_path_buf(),
            build_timeout: Duration::from_secs(600),
            quiet: true,
        };
        let fingerprint = DefinitionHash::from_bytes(DOCKERFILE.as_bytes());
        (dir, settings, fingerprint)
    }

    fn versions(list: &[&str]) -> Vec<ToolchainVersion> {
        list.iter().map(|v| ToolchainVersion::new(*v).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_fresh_image_is_reused() {
        let (_dir, settings, fingerprint) = setup();
        let runtime = Arc::new(ScriptedRuntime::new().with_image(
            "libcxx-pp-test:18",
            DEFINITION_HASH_LABEL,
            &fingerprint.hash,
        ));
        let mut cache = EnvironmentCache::new(runtime.clone(), settings);

        let available = cache.ensure(&versions(&["18"]), false).await;

        assert_eq!(available, versions(&["18"]));
        assert!(runtime.builds().is_empty(), "fresh image must not be rebuilt");
        let record = cache.record(&available[0]).unwrap();
        assert!(!record.rebuilt);
        assert_eq!(record.tag, "libcxx-pp-test:18");
    }

    #[tokio::test]
    async fn test_missing_image_is_built_and_stamped() {
        let (_dir, settings, fingerprint) = setup();
        let runtime = Arc::new(ScriptedRuntime::new());
        let mut cache = EnvironmentCache::new(runtime.clone(), settings);

        let available = cache.ensure(&versions(&["21"]), false).await;

        assert_eq!(available, versions(&["21"]));
        let builds = runtime.builds();
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].tag, "libcxx-pp-test:21");
        assert_eq!(
            builds[0].build_args,
            vec![("LLVM_VERSION".to_string(), "21".to_string())]
        );
        assert_eq!(
            builds[0].labels,
            vec![(DEFINITION_HASH_LABEL.to_string(), fingerprint.hash.clone())]
        );

        // The stamped label makes the next check fresh.
        assert!(cache.is_fresh("libcxx-pp-test:21", &fingerprint).await);
    }

    #[tokio::test]
    async fn test_stale_fingerprint_triggers_rebuild() {
        let (_dir, settings, _fingerprint) = setup();
        let runtime = Arc::new(ScriptedRuntime::new().with_image(
            "libcxx-pp-test:18",
            DEFINITION_HASH_LABEL,
            "0000stale",
        ));
        let mut cache = EnvironmentCache::new(runtime.clone(), settings);

        let available = cache.ensure(&versions(&["18"]), false).await;

        assert_eq!(available.len(), 1);
        assert_eq!(runtime.builds().len(), 1);
        assert!(cache.record(&available[0]).unwrap().rebuilt);
    }

    #[tokio::test]
    async fn test_force_rebuild_ignores_fresh_image() {
        let (_dir, settings, fingerprint) = setup();
        let runtime = Arc::new(ScriptedRuntime::new().with_image(
            "libcxx-pp-test:18",
            DEFINITION_HASH_LABEL,
            &fingerprint.hash,
        ));
        let mut cache = EnvironmentCache::new(runtime.clone(), settings);

        cache.ensure(&versions(&["18"]), true).await;

        assert_eq!(runtime.builds().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_build_excludes_only_that_version() {
        let (_dir, settings, _fingerprint) = setup();
        let runtime = Arc::new(ScriptedRuntime::new().fail_build("libcxx-pp-test:18"));
        let mut cache = EnvironmentCache::new(runtime.clone(), settings);

        let available = cache.ensure(&versions(&["18", "21"]), false).await;

        assert_eq!(available, versions(&["21"]));
        assert!(cache.record(&versions(&["18"])[0]).is_none());
        assert_eq!(runtime.builds().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_definition_yields_nothing() {
        let (dir, mut settings, _fingerprint) = setup();
        settings.dockerfile = dir.path().join("nope").join("Dockerfile");
        let runtime = Arc::new(ScriptedRuntime::new());
        let mut cache = EnvironmentCache::new(runtime.clone(), settings);

        let available = cache.ensure(&versions(&["18", "21"]), false).await;

        assert!(available.is_empty());
        assert!(runtime.builds().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_failing_version_built_once() {
        let (_dir, settings, _fingerprint) = setup();
        let runtime = Arc::new(ScriptedRuntime::new().fail_build("libcxx-pp-test:18"));
        let mut cache = EnvironmentCache::new(runtime.clone(), settings);

        let available = cache.ensure(&versions(&["18", "18"]), false).await;

        assert!(available.is_empty());
        assert_eq!(runtime.builds().len(), 1, "a failed version is not retried");
    }

    #[tokio::test]
    async fn test_duplicate_versions_collapse() {
        let (_dir, settings, _fingerprint) = setup();
        let runtime = Arc::new(ScriptedRuntime::new());
        let mut cache = EnvironmentCache::new(runtime.clone(), settings);

        let available = cache.ensure(&versions(&["18", "18"]), false).await;

        assert_eq!(available, versions(&["18"]));
        assert_eq!(runtime.builds().len(), 1);
    }
}
