//! Execution engine: one compile-and-debug run per (test case, version).

use crate::catalog::TestCase;
use crate::command::PipelineCommand;
use crate::Result;
use ppcheck_env::{ContainerRuntime, EnvironmentRecord, RunRequest};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Prefix marking a result line in debugger output.
pub const SENTINEL: &str = "@@@ ";

/// Failure message for a run that exceeded its bound.
pub const TIMEOUT_MESSAGE: &str = "container timed out";

/// Result of one cell: tagged lines or a failure description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RunOutcome {
    Lines(Vec<String>),
    Failed(String),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Lines(_))
    }
}

/// Host directories mounted into every run.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub printers_dir: PathBuf,
    pub tests_dir: PathBuf,
}

/// Runs test cases inside toolchain environments.
pub struct ExecutionEngine {
    runtime: Arc<dyn ContainerRuntime>,
    settings: EngineSettings,
}

impl ExecutionEngine {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, settings: EngineSettings) -> Self {
        Self { runtime, settings }
    }

    /// The container request for a cell.
    pub fn request(
        &self,
        env: &EnvironmentRecord,
        case: &TestCase,
        timeout: Duration,
    ) -> Result<RunRequest> {
        let command = PipelineCommand::new(&env.version, case)?;
        Ok(command.run_request(
            &env.tag,
            &self.settings.printers_dir,
            &self.settings.tests_dir,
            timeout,
        ))
    }

    /// Compile and debug `case` inside `env`, bounded by `timeout`.
    ///
    /// The exit status of the pipeline is ignored: only the tagged lines
    /// matter, and their absence is the failure signal.
    pub async fn run(&self, env: &EnvironmentRecord, case: &TestCase, timeout: Duration) -> RunOutcome {
        let request = match self.request(env, case, timeout) {
            Ok(request) => request,
            Err(e) => return RunOutcome::Failed(e.to_string()),
        };

        let output = match self.runtime.run_container(&request).await {
            Ok(output) => output,
            Err(e) if e.is_timeout() => return RunOutcome::Failed(TIMEOUT_MESSAGE.to_string()),
            Err(e) => return RunOutcome::Failed(e.to_string()),
        };

        debug!(
            test = %case.name,
            version = %env.version,
            exit_code = output.exit_code,
            duration_ms = output.duration_ms,
            "--- stdout ({} / {}) ---\n{}\n--- stderr ---\n{}\n--- end ---",
            env.version.compiler(),
            case.name,
            output.stdout,
            output.stderr
        );

        let lines = extract_result_lines(&output.stdout);
        if lines.is_empty() {
            return RunOutcome::Failed(format!(
                "no @@@ output captured\nstdout:\n{}\nstderr:\n{}",
                output.stdout, output.stderr
            ));
        }
        RunOutcome::Lines(lines)
    }
}

/// Tagged lines of `raw` with the sentinel removed, in order.
pub fn extract_result_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| line.trim().strip_prefix(SENTINEL))
        .map(str::to_string)
        .collect()
}
