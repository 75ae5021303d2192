//! Report driver: runs every (test case, version) cell and tallies results.

use crate::catalog::TestCase;
use crate::compare::{compare, Mismatch};
use crate::engine::{ExecutionEngine, RunOutcome};
use crate::golden::{read_expected, write_expected};
use crate::Result;
use chrono::{DateTime, Utc};
use ppcheck_env::{EnvironmentCache, ToolchainVersion};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Process exit status of a harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Every cell passed.
    AllPassed,
    /// At least one cell failed.
    Failures,
    /// No environments or no test cases to run.
    Unavailable,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::AllPassed => 0,
            ExitStatus::Failures => 1,
            ExitStatus::Unavailable => 2,
        }
    }
}

/// Result of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Passed,
    Updated,
    Failed,
}

/// Per-cell entry of a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellReport {
    pub test: String,
    pub version: ToolchainVersion,
    pub status: CellStatus,

    /// Failure description, when the cell failed for a reason other than
    /// line mismatches.
    pub message: Option<String>,

    pub mismatches: Vec<Mismatch>,
    pub duration_ms: u64,
}

impl CellReport {
    pub fn passed(&self) -> bool {
        self.status != CellStatus::Failed
    }
}

/// Outcome of a full harness run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_at: DateTime<Utc>,
    pub cells: Vec<CellReport>,
    pub passed: usize,
    pub failed: usize,
}

impl RunReport {
    fn new() -> Self {
        Self {
            run_at: Utc::now(),
            cells: Vec::new(),
            passed: 0,
            failed: 0,
        }
    }

    fn push(&mut self, cell: CellReport) {
        if cell.passed() {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.cells.push(cell);
    }

    pub fn exit_status(&self) -> ExitStatus {
        if self.failed == 0 {
            ExitStatus::AllPassed
        } else {
            ExitStatus::Failures
        }
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Options that apply to every cell.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Regenerate golden files instead of comparing.
    pub update: bool,

    /// Bound on each compile-and-debug run.
    pub timeout: Duration,
}

/// Sequences the execution engine and the comparator over all cells.
pub struct ReportDriver {
    engine: ExecutionEngine,
    options: DriverOptions,
}

impl ReportDriver {
    pub fn new(engine: ExecutionEngine, options: DriverOptions) -> Self {
        Self { engine, options }
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Run every case against every version, cases outermost.
    ///
    /// Human-readable lines go to `out`. Only a failure to write to `out`
    /// aborts; every per-cell problem is recorded and the loop continues.
    pub async fn run<W: Write>(
        &self,
        cache: &EnvironmentCache,
        versions: &[ToolchainVersion],
        cases: &[TestCase],
        out: &mut W,
    ) -> Result<RunReport> {
        let mut report = RunReport::new();

        for case in cases {
            for version in versions {
                let label = format!("{} / {}", case.name, version.compiler());
                let start = Instant::now();
                let cell = self.run_cell(cache, version, case, &label, out).await?;
                let cell = CellReport {
                    duration_ms: start.elapsed().as_millis() as u64,
                    ..cell
                };
                info!(test = %case.name, version = %version, status = ?cell.status, "Cell finished");
                report.push(cell);
            }
        }

        writeln!(out)?;
        writeln!(out, "Results: {} passed, {} failed", report.passed, report.failed)?;
        Ok(report)
    }

    async fn run_cell<W: Write>(
        &self,
        cache: &EnvironmentCache,
        version: &ToolchainVersion,
        case: &TestCase,
        label: &str,
        out: &mut W,
    ) -> Result<CellReport> {
        let cell = |status, message: Option<String>, mismatches| CellReport {
            test: case.name.clone(),
            version: version.clone(),
            status,
            message,
            mismatches,
            duration_ms: 0,
        };

        let Some(env) = cache.record(version) else {
            let message = format!("no environment prepared for {}", version.compiler());
            writeln!(out, "  FAIL  {}: {}", label, message)?;
            return Ok(cell(CellStatus::Failed, Some(message), Vec::new()));
        };

        let actual = match self.engine.run(env, case, self.options.timeout).await {
            RunOutcome::Lines(lines) => lines,
            RunOutcome::Failed(message) => {
                writeln!(out, "  FAIL  {}: {}", label, message)?;
                return Ok(cell(CellStatus::Failed, Some(message), Vec::new()));
            }
        };

        if self.options.update {
            if let Err(e) = write_expected(&case.expected, &actual) {
                let message = format!("failed to write {}: {}", case.expected.display(), e);
                warn!(test = %case.name, error = %e, "Golden file update failed");
                writeln!(out, "  FAIL  {}: {}", label, message)?;
                return Ok(cell(CellStatus::Failed, Some(message), Vec::new()));
            }
            writeln!(out, "  UPDATED  {} -> {}", label, case.expected.display())?;
            return Ok(cell(CellStatus::Updated, None, Vec::new()));
        }

        let expected = match read_expected(&case.expected) {
            Ok(Some(lines)) => lines,
            Ok(None) => {
                let message = "expected.txt not found (run with --update to create)".to_string();
                writeln!(out, "  FAIL  {}: {}", label, message)?;
                return Ok(cell(CellStatus::Failed, Some(message), Vec::new()));
            }
            Err(e) => {
                let message = format!("failed to read {}: {}", case.expected.display(), e);
                writeln!(out, "  FAIL  {}: {}", label, message)?;
                return Ok(cell(CellStatus::Failed, Some(message), Vec::new()));
            }
        };

        let mismatches = compare(&actual, &expected);
        if mismatches.is_empty() {
            writeln!(out, "  PASS  {}", label)?;
            return Ok(cell(CellStatus::Passed, None, mismatches));
        }

        writeln!(out, "  FAIL  {}:", label)?;
        for m in &mismatches {
            writeln!(out, "    line {}:", m.line)?;
            writeln!(out, "      expected: {}", m.expected)?;
            writeln!(out, "      actual:   {}", m.actual)?;
        }
        Ok(cell(CellStatus::Failed, None, mismatches))
    }
}
