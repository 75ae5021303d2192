//! End-to-end harness: environments, discovery, then the report driver.

use crate::catalog::TestCatalog;
use crate::config::HarnessConfig;
use crate::engine::{EngineSettings, ExecutionEngine};
use crate::report::{DriverOptions, ExitStatus, ReportDriver, RunReport};
use crate::Result;
use ppcheck_env::{CacheSettings, ContainerRuntime, EnvironmentCache, ToolchainVersion};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Knobs selected per invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Only run the test case with this name.
    pub test_filter: Option<String>,

    /// Regenerate golden files.
    pub update: bool,

    /// Rebuild images even if they are current.
    pub rebuild: bool,

    /// Stream image builds instead of capturing them.
    pub verbose: bool,

    /// Fail discovery on incomplete test cases instead of skipping them.
    pub strict: bool,

    /// Override of the configured run timeout.
    pub timeout: Option<Duration>,
}

/// Outcome of [`Harness::execute`].
#[derive(Debug, Clone)]
pub struct Execution {
    pub status: ExitStatus,

    /// Absent when the run stopped before any cell executed.
    pub report: Option<RunReport>,
}

impl Execution {
    fn unavailable() -> Self {
        Self {
            status: ExitStatus::Unavailable,
            report: None,
        }
    }
}

/// The assembled harness.
pub struct Harness {
    cache: EnvironmentCache,
    catalog: TestCatalog,
    driver: ReportDriver,
    rebuild: bool,
    test_filter: Option<String>,
}

impl Harness {
    pub fn new(config: &HarnessConfig, runtime: Arc<dyn ContainerRuntime>, options: RunOptions) -> Self {
        let settings: CacheSettings = config.cache_settings(!options.verbose);
        let cache = EnvironmentCache::new(Arc::clone(&runtime), settings);
        let catalog = TestCatalog::new(&config.tests_dir).strict(options.strict);
        let engine = ExecutionEngine::new(
            runtime,
            EngineSettings {
                printers_dir: config.printers_dir.clone(),
                tests_dir: config.tests_dir.clone(),
            },
        );
        let driver = ReportDriver::new(
            engine,
            DriverOptions {
                update: options.update,
                timeout: options.timeout.unwrap_or_else(|| config.run_timeout()),
            },
        );
        Self {
            cache,
            catalog,
            driver,
            rebuild: options.rebuild,
            test_filter: options.test_filter,
        }
    }

    /// Prepare environments for `versions`, discover tests and run them all.
    pub async fn execute<W: Write>(
        &mut self,
        versions: &[ToolchainVersion],
        out: &mut W,
    ) -> Result<Execution> {
        writeln!(out, "Preparing Docker images...")?;
        let available = self.cache.ensure(versions, self.rebuild).await;
        if available.is_empty() {
            writeln!(out, "ERROR: No Docker images available.")?;
            return Ok(Execution::unavailable());
        }
        let ready: Vec<String> = available.iter().map(|v| v.compiler()).collect();
        writeln!(out, "  Ready: {}", ready.join(", "))?;

        writeln!(out, "Discovering tests...")?;
        let cases = match self.catalog.discover(self.test_filter.as_deref()) {
            Ok(cases) => cases,
            Err(e) => {
                writeln!(out, "ERROR: Test discovery failed: {}", e)?;
                return Ok(Execution::unavailable());
            }
        };
        if cases.is_empty() {
            writeln!(out, "ERROR: No test cases found.")?;
            return Ok(Execution::unavailable());
        }
        let names: Vec<&str> = cases.iter().map(|c| c.name.as_str()).collect();
        writeln!(out, "  Found: {}", names.join(", "))?;

        info!(versions = available.len(), tests = cases.len(), update = self.driver.options().update, "Starting run");
        let report = self.driver.run(&self.cache, &available, &cases, out).await?;

        Ok(Execution {
            status: report.exit_status(),
            report: Some(report),
        })
    }
}
