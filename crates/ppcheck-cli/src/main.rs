//! ppcheck - libc++ GDB pretty-printer test runner
//!
//! Builds one Docker image per LLVM version, compiles every test case inside
//! it, runs GDB with the pretty-printers loaded and compares the tagged output
//! with each case's `expected.txt`.
//!
//! ## Examples
//!
//! - `ppcheck`: all tests, default compilers
//! - `ppcheck --compiler clang++-18 --test vector`
//! - `ppcheck --update`: regenerate `expected.txt` files
//! - `ppcheck --rebuild`: rebuild images even if current
//!
//! Exit codes: 0 all passed, 1 failures, 2 nothing to run.

use anyhow::{Context, Result};
use clap::Parser;
use ppcheck_core::{init_tracing, level_for, Harness, HarnessConfig, RunOptions};
use ppcheck_env::{DockerRuntime, ToolchainVersion};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "ppcheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Test runner for libc++ GDB pretty-printers (Docker-based)", long_about = None)]
struct Cli {
    /// Specific compiler/version (e.g. clang++-18 or 18); repeatable
    #[arg(long = "compiler", value_name = "COMPILER")]
    compilers: Vec<String>,

    /// Specific test case to run
    #[arg(long)]
    test: Option<String>,

    /// Update expected.txt from actual output
    #[arg(long)]
    update: bool,

    /// Show full Docker/GDB output
    #[arg(short, long)]
    verbose: bool,

    /// Force rebuild Docker images
    #[arg(long)]
    rebuild: bool,

    /// Fail instead of skipping test cases without a .gdb script
    #[arg(long)]
    strict: bool,

    /// Repository root (contains src/ and tests/)
    #[arg(long, env = "PPCHECK_REPO_ROOT", default_value = ".")]
    repo_root: PathBuf,

    /// JSON configuration file (overrides the repository layout defaults)
    #[arg(long, env = "PPCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Container runtime executable
    #[arg(long, env = "PPCHECK_DOCKER")]
    docker: Option<String>,

    /// Per-test timeout in seconds
    #[arg(long, env = "PPCHECK_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn load_config(&self) -> Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::from_file(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => HarnessConfig::for_repo(&self.repo_root),
        };
        if let Some(program) = &self.docker {
            config.runtime_program = program.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.run_timeout_secs = secs;
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn versions(&self, config: &HarnessConfig) -> Result<Vec<ToolchainVersion>> {
        if self.compilers.is_empty() {
            return Ok(config.default_versions.clone());
        }
        self.compilers
            .iter()
            .map(|arg| {
                ToolchainVersion::from_compiler_arg(arg)
                    .with_context(|| format!("Invalid --compiler {:?}", arg))
            })
            .collect()
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            test_filter: self.test.clone(),
            update: self.update,
            rebuild: self.rebuild,
            verbose: self.verbose,
            strict: self.strict,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json_logs, level_for(cli.verbose));

    match run(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: &Cli) -> Result<u8> {
    let config = cli.load_config()?;
    let versions = cli.versions(&config)?;
    debug!(?config, "Resolved configuration");

    let runtime = Arc::new(
        DockerRuntime::new(config.runtime_program.clone()).with_inspect_timeout(config.inspect_timeout()),
    );
    let mut harness = Harness::new(&config, runtime, cli.run_options());

    let mut stdout = std::io::stdout().lock();
    let execution = harness
        .execute(&versions, &mut stdout)
        .await
        .context("Harness run failed")?;

    if let (Some(path), Some(report)) = (&cli.report, &execution.report) {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {:?}", path))?;
    }

    Ok(execution.status.code() as u8)
}
