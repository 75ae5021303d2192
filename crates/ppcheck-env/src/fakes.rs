//! In-memory container runtime (testing only)
//!
//! [`ScriptedRuntime`] keeps a map of "images" and their labels, records every
//! build and run request, and answers runs from a caller-supplied script.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::EnvError;
use crate::runtime::{BuildRequest, CommandOutput, ContainerRuntime, RunRequest};
use crate::Result;

/// How a scripted container run behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunScript {
    /// Finish with the given output.
    Output {
        stdout: String,
        stderr: String,
        exit_code: i32,
    },
    /// Exceed the request's timeout.
    TimedOut,
}

impl RunScript {
    /// Successful run printing `stdout`.
    pub fn stdout(stdout: impl Into<String>) -> Self {
        RunScript::Output {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }
}

type Responder = Box<dyn Fn(&RunRequest) -> RunScript + Send + Sync>;

/// Scriptable [`ContainerRuntime`].
pub struct ScriptedRuntime {
    images: Mutex<HashMap<String, HashMap<String, String>>>,
    failing_builds: Mutex<HashSet<String>>,
    builds: Mutex<Vec<BuildRequest>>,
    runs: Mutex<Vec<RunRequest>>,
    responder: Responder,
}

impl Default for ScriptedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRuntime {
    /// Runtime with no images whose runs print nothing.
    pub fn new() -> Self {
        Self {
            images: Mutex::new(HashMap::new()),
            failing_builds: Mutex::new(HashSet::new()),
            builds: Mutex::new(Vec::new()),
            runs: Mutex::new(Vec::new()),
            responder: Box::new(|_| RunScript::stdout("")),
        }
    }

    /// Answer every run with `responder`.
    pub fn on_run<F>(mut self, responder: F) -> Self
    where
        F: Fn(&RunRequest) -> RunScript + Send + Sync + 'static,
    {
        self.responder = Box::new(responder);
        self
    }

    /// Pretend `tag` already exists with `label` set to `value`.
    pub fn with_image(self, tag: &str, label: &str, value: &str) -> Self {
        lock(&self.images)
            .entry(tag.to_string())
            .or_default()
            .insert(label.to_string(), value.to_string());
        self
    }

    /// Make builds of `tag` fail.
    pub fn fail_build(self, tag: &str) -> Self {
        lock(&self.failing_builds).insert(tag.to_string());
        self
    }

    /// Build requests received so far.
    pub fn builds(&self) -> Vec<BuildRequest> {
        lock(&self.builds).clone()
    }

    /// Run requests received so far.
    pub fn runs(&self) -> Vec<RunRequest> {
        lock(&self.runs).clone()
    }
}

#[async_trait]
impl ContainerRuntime for ScriptedRuntime {
    async fn image_label(&self, tag: &str, label: &str) -> Result<Option<String>> {
        Ok(lock(&self.images)
            .get(tag)
            .and_then(|labels| labels.get(label).cloned()))
    }

    async fn build_image(&self, request: &BuildRequest) -> Result<CommandOutput> {
        lock(&self.builds).push(request.clone());

        if lock(&self.failing_builds).contains(&request.tag) {
            return Err(EnvError::CommandFailed(format!(
                "docker build failed:\nno such toolchain for {}",
                request.tag
            )));
        }

        let labels = request.labels.iter().cloned().collect();
        lock(&self.images).insert(request.tag.clone(), labels);
        Ok(CommandOutput {
            success: true,
            ..CommandOutput::default()
        })
    }

    async fn run_container(&self, request: &RunRequest) -> Result<CommandOutput> {
        lock(&self.runs).push(request.clone());

        match (self.responder)(request) {
            RunScript::Output {
                stdout,
                stderr,
                exit_code,
            } => Ok(CommandOutput {
                exit_code,
                stdout,
                stderr,
                duration_ms: 0,
                success: exit_code == 0,
            }),
            RunScript::TimedOut => Err(EnvError::TimedOut {
                program: "docker".to_string(),
                secs: request.timeout.as_secs(),
            }),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
