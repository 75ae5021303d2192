//! Container runtime seam
//!
//! Everything that touches Docker goes through [`ContainerRuntime`], so the
//! cache and the execution engine can be driven by [`crate::fakes`] in tests.
//! Commands are always built as argument vectors, never as shell strings.

use crate::error::EnvError;
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// A host directory bound into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub target: String,
    pub read_only: bool,
}

impl Mount {
    pub fn read_only(host: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            target: target.into(),
            read_only: true,
        }
    }

    fn to_volume_arg(&self) -> String {
        let suffix = if self.read_only { ":ro" } else { "" };
        format!("{}:{}{}", self.host.display(), self.target, suffix)
    }
}

/// Parameters of an image build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Image tag to produce.
    pub tag: String,

    /// Path to the Dockerfile.
    pub dockerfile: PathBuf,

    /// Build context directory.
    pub context: PathBuf,

    /// `--build-arg` pairs.
    pub build_args: Vec<(String, String)>,

    /// `--label` pairs stamped on the image.
    pub labels: Vec<(String, String)>,

    /// Capture build output instead of streaming it to the terminal.
    pub quiet: bool,

    pub timeout: Duration,
}

/// Parameters of a disposable container run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub image: String,
    pub mounts: Vec<Mount>,

    /// Command executed inside the container (first element is executable).
    pub command: Vec<String>,

    /// Container name, so a run that outlives `timeout` can be killed.
    pub name: Option<String>,

    pub timeout: Duration,
}

/// Captured result of a finished runtime command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,

    pub stdout: String,
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    pub success: bool,
}

impl CommandOutput {
    /// Whether this command passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }
}

/// Operations the harness needs from a container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Read `label` from a local image.
    ///
    /// `Ok(None)` when the image does not exist, carries no such label, or
    /// its metadata cannot be parsed.
    async fn image_label(&self, tag: &str, label: &str) -> Result<Option<String>>;

    /// Build an image. A non-zero exit is an [`EnvError::CommandFailed`].
    async fn build_image(&self, request: &BuildRequest) -> Result<CommandOutput>;

    /// Run a command in a fresh container, whatever its exit status.
    ///
    /// Exceeding `request.timeout` yields [`EnvError::TimedOut`]; a named
    /// container is stopped before returning.
    async fn run_container(&self, request: &RunRequest) -> Result<CommandOutput>;
}

/// [`ContainerRuntime`] backed by the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    program: String,
    inspect_timeout: Duration,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerRuntime {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            inspect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_inspect_timeout(mut self, timeout: Duration) -> Self {
        self.inspect_timeout = timeout;
        self
    }

    /// Arguments for `docker build`.
    pub fn build_args(request: &BuildRequest) -> Vec<String> {
        let mut args = vec!["build".to_string()];
        if request.quiet {
            args.push("--quiet".to_string());
        }
        for (key, value) in &request.build_args {
            args.push("--build-arg".to_string());
            args.push(format!("{}={}", key, value));
        }
        for (key, value) in &request.labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push("-t".to_string());
        args.push(request.tag.clone());
        args.push("-f".to_string());
        args.push(request.dockerfile.display().to_string());
        args.push(request.context.display().to_string());
        args
    }

    /// Arguments for `docker run`.
    pub fn run_args(request: &RunRequest) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];
        if let Some(name) = &request.name {
            args.push("--name".to_string());
            args.push(name.clone());
        }
        for mount in &request.mounts {
            args.push("-v".to_string());
            args.push(mount.to_volume_arg());
        }
        args.push(request.image.clone());
        args.extend(request.command.iter().cloned());
        args
    }

    async fn execute(&self, args: &[String], timeout: Duration, capture: bool) -> Result<CommandOutput> {
        let start = Instant::now();
        debug!(program = %self.program, ?args, "Executing runtime command");

        let mut command = Command::new(&self.program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        if capture {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let child = command.spawn().map_err(|source| EnvError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // Dropping the wait future on timeout kills the child.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| EnvError::TimedOut {
                program: self.program.clone(),
                secs: timeout.as_secs(),
            })??;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
            success: output.status.success(),
        })
    }

    /// Stop a container left behind by a timed-out run.
    ///
    /// Killing the CLI client does not stop the container itself.
    async fn kill_container(&self, name: &str) {
        let args = vec!["kill".to_string(), name.to_string()];
        match self.execute(&args, self.inspect_timeout, true).await {
            Ok(output) if output.passed() => debug!(container = name, "Killed timed-out container"),
            Ok(output) => warn!(container = name, stderr = %output.stderr.trim(), "Failed to kill container"),
            Err(e) => warn!(container = name, error = %e, "Failed to kill container"),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn image_label(&self, tag: &str, label: &str) -> Result<Option<String>> {
        let args = vec!["image".to_string(), "inspect".to_string(), tag.to_string()];
        let output = self.execute(&args, self.inspect_timeout, true).await?;
        if !output.passed() {
            debug!(tag, "Image not present");
            return Ok(None);
        }

        match label_from_inspect(&output.stdout, label) {
            Ok(value) => Ok(value),
            Err(e) => {
                debug!(tag, error = %e, "Unreadable image metadata");
                Ok(None)
            }
        }
    }

    async fn build_image(&self, request: &BuildRequest) -> Result<CommandOutput> {
        let args = Self::build_args(request);
        let output = self.execute(&args, request.timeout, request.quiet).await?;
        if !output.passed() {
            return Err(EnvError::CommandFailed(format!(
                "{} build failed:\n{}",
                self.program, output.stderr
            )));
        }
        Ok(output)
    }

    async fn run_container(&self, request: &RunRequest) -> Result<CommandOutput> {
        let args = Self::run_args(request);
        match self.execute(&args, request.timeout, true).await {
            Err(e) if e.is_timeout() => {
                if let Some(name) = &request.name {
                    self.kill_container(name).await;
                }
                Err(e)
            }
            other => other,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageInspect {
    #[serde(rename = "Config")]
    config: Option<ImageConfig>,
}

#[derive(Debug, Deserialize)]
struct ImageConfig {
    #[serde(rename = "Labels")]
    labels: Option<HashMap<String, String>>,
}

/// Pull a label out of `docker image inspect` JSON.
pub fn label_from_inspect(raw: &str, label: &str) -> Result<Option<String>> {
    let images: Vec<ImageInspect> = serde_json::from_str(raw)?;
    Ok(images
        .into_iter()
        .next()
        .and_then(|image| image.config)
        .and_then(|config| config.labels)
        .and_then(|mut labels| labels.remove(label)))
}
