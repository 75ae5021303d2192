//! Compile-then-debug command construction.
//!
//! The pipeline runs as `bash -c <script>` inside the container. Each piece of
//! the script is assembled from an argument vector, and every value spliced in
//! must pass [`is_safe_container_path`] or [`ppcheck_env::is_safe_token`].

use crate::catalog::{TestCase, CONTAINER_TESTS_ROOT};
use crate::error::HarnessError;
use crate::Result;
use ppcheck_env::{is_safe_token, Mount, RunRequest, ToolchainVersion};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Compiler flags, identical for every toolchain version.
pub const COMPILE_FLAGS: [&str; 5] = [
    "-stdlib=libc++",
    "-g",
    "-O0",
    "-std=c++17",
    "-fno-limit-debug-info",
];

/// Mount point of the pretty-printer sources inside the container.
pub const CONTAINER_PRINTERS_ROOT: &str = "/workspace/src";

/// Variable the debugger script reads to locate the printers.
pub const PRINTER_PATH_VAR: &str = "PRINTER_PATH";

const WORK_DIR: &str = "/tmp";
const BINARY: &str = "test_binary";

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// The compile-and-debug pipeline for one (test case, version) cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineCommand {
    compiler: String,
    source: String,
    script: String,
    container_name: String,
}

impl PipelineCommand {
    pub fn new(version: &ToolchainVersion, case: &TestCase) -> Result<Self> {
        let compiler = version.compiler();
        if !is_safe_token(&compiler) {
            return Err(HarnessError::UnsafeValue(compiler));
        }
        for path in [&case.container_source, &case.container_script] {
            if !is_safe_container_path(path) {
                return Err(HarnessError::UnsafeValue(path.clone()));
            }
        }
        Ok(Self {
            compiler,
            source: case.container_source.clone(),
            script: case.container_script.clone(),
            container_name: container_name(&case.name, version),
        })
    }

    /// Name given to the container, unique within this host process.
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// `clang++-N <flags> -o test_binary <source>`
    pub fn compile_argv(&self) -> Vec<String> {
        let mut argv = vec![self.compiler.clone()];
        argv.extend(COMPILE_FLAGS.iter().map(|f| f.to_string()));
        argv.push("-o".to_string());
        argv.push(BINARY.to_string());
        argv.push(self.source.clone());
        argv
    }

    /// `gdb --batch --quiet -nh -x <script> ./test_binary`
    pub fn debug_argv(&self) -> Vec<String> {
        vec![
            "gdb".to_string(),
            "--batch".to_string(),
            "--quiet".to_string(),
            "-nh".to_string(),
            "-x".to_string(),
            self.script.clone(),
            format!("./{}", BINARY),
        ]
    }

    /// The shell pipeline handed to `bash -c`.
    pub fn shell_script(&self) -> String {
        format!(
            "cd {} && {} && {}={} {}",
            WORK_DIR,
            self.compile_argv().join(" "),
            PRINTER_PATH_VAR,
            CONTAINER_PRINTERS_ROOT,
            self.debug_argv().join(" ")
        )
    }

    /// Full in-container argument vector.
    pub fn argv(&self) -> Vec<String> {
        vec!["bash".to_string(), "-c".to_string(), self.shell_script()]
    }

    /// Container run request with the printer and test trees mounted read-only.
    pub fn run_request(
        &self,
        image: &str,
        printers_dir: &Path,
        tests_dir: &Path,
        timeout: Duration,
    ) -> RunRequest {
        RunRequest {
            image: image.to_string(),
            mounts: vec![
                Mount::read_only(printers_dir, CONTAINER_PRINTERS_ROOT),
                Mount::read_only(tests_dir, CONTAINER_TESTS_ROOT),
            ],
            command: self.argv(),
            name: Some(self.container_name.clone()),
            timeout,
        }
    }
}

/// `ppcheck-<test>-<version>-<pid>-<seq>`, restricted to Docker's name alphabet.
fn container_name(test: &str, version: &ToolchainVersion) -> String {
    let test: String = test
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    format!(
        "ppcheck-{}-{}-{}-{}",
        test,
        version.as_str(),
        std::process::id(),
        RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    )
}

/// Absolute path whose components are all safe tokens (no `..`, no spaces).
pub fn is_safe_container_path(path: &str) -> bool {
    match path.strip_prefix('/') {
        Some(rest) => rest
            .split('/')
            .all(|component| is_safe_token(component) && component != ".." && component != "."),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use ppcheck_env::DockerRuntime;
    use std::path::PathBuf;

    fn case(name: &str) -> TestCase {
        TestCase {
            name: name.to_string(),
            source: PathBuf::from(format!("/repo/tests/{name}/test_{name}.cpp")),
            script: PathBuf::from(format!("/repo/tests/{name}/test_{name}.gdb")),
            expected: PathBuf::from(format!("/repo/tests/{name}/expected.txt")),
            container_source: format!("/workspace/tests/{name}/test_{name}.cpp"),
            container_script: format!("/workspace/tests/{name}/test_{name}.gdb"),
        }
    }

    #[test]
    fn test_shell_script() {
        let version = ToolchainVersion::new("18").unwrap();
        let command = PipelineCommand::new(&version, &case("vector")).unwrap();
        assert_eq!(
            command.shell_script(),
            "cd /tmp && clang++-18 -stdlib=libc++ -g -O0 -std=c++17 -fno-limit-debug-info \
             -o test_binary /workspace/tests/vector/test_vector.cpp && \
             PRINTER_PATH=/workspace/src gdb --batch --quiet -nh \
             -x /workspace/tests/vector/test_vector.gdb ./test_binary"
        );
    }

    #[test]
    fn test_compile_flags_independent_of_version() {
        let a = PipelineCommand::new(&ToolchainVersion::new("18").unwrap(), &case("string")).unwrap();
        let b = PipelineCommand::new(&ToolchainVersion::new("21").unwrap(), &case("string")).unwrap();
        assert_eq!(a.compile_argv()[1..], b.compile_argv()[1..]);
        assert_eq!(b.compile_argv()[0], "clang++-21");
    }

    #[test]
    fn test_run_request_mounts() {
        let version = ToolchainVersion::new("21").unwrap();
        let command = PipelineCommand::new(&version, &case("vector")).unwrap();
        let request = command.run_request(
            "libcxx-pp-test:21",
            Path::new("/repo/src"),
            Path::new("/repo/tests"),
            Duration::from_secs(120),
        );
        assert_eq!(request.image, "libcxx-pp-test:21");
        assert_eq!(request.mounts[0], Mount::read_only("/repo/src", "/workspace/src"));
        assert_eq!(request.mounts[1], Mount::read_only("/repo/tests", "/workspace/tests"));
        assert_eq!(request.command[..2], ["bash".to_string(), "-c".to_string()]);
        assert_eq!(request.name.as_deref(), Some(command.container_name()));
    }

    #[test]
    fn test_container_names_are_distinct() {
        let version = ToolchainVersion::new("18").unwrap();
        let a = PipelineCommand::new(&version, &case("vector-bool")).unwrap();
        let b = PipelineCommand::new(&version, &case("vector-bool")).unwrap();

        let prefix = format!("ppcheck-vector-bool-18-{}-", std::process::id());
        assert!(a.container_name().starts_with(&prefix));
        assert!(b.container_name().starts_with(&prefix));
        assert_ne!(a.container_name(), b.container_name());
    }

    #[test]
    fn test_relative_repo_mounts_absolute_host_paths() {
        let config = HarnessConfig::for_repo("myrepo");
        let version = ToolchainVersion::new("18").unwrap();
        let command = PipelineCommand::new(&version, &case("vector")).unwrap();
        let request = command.run_request(
            "libcxx-pp-test:18",
            &config.printers_dir,
            &config.tests_dir,
            Duration::from_secs(120),
        );

        let args = DockerRuntime::run_args(&request);
        let volumes: Vec<&String> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| flag.as_str() == "-v")
            .map(|(_, value)| value)
            .collect();

        assert_eq!(volumes.len(), 2);
        assert!(volumes.iter().all(|v| v.starts_with('/')));
        assert!(volumes[0].ends_with("myrepo/src:/workspace/src:ro"));
        assert!(volumes[1].ends_with("myrepo/tests:/workspace/tests:ro"));
    }

    #[test]
    fn test_unsafe_container_path_rejected() {
        let version = ToolchainVersion::new("18").unwrap();
        let mut bad = case("vector");
        bad.container_source = "/workspace/tests/vector/$(reboot).cpp".to_string();
        assert!(matches!(
            PipelineCommand::new(&version, &bad),
            Err(HarnessError::UnsafeValue(_))
        ));
    }

    #[test]
    fn test_is_safe_container_path() {
        assert!(is_safe_container_path("/workspace/tests/vector/test_vector.cpp"));
        assert!(!is_safe_container_path("workspace/tests"));
        assert!(!is_safe_container_path("/workspace/../etc/passwd"));
        assert!(!is_safe_container_path("/workspace/a b"));
        assert!(!is_safe_container_path("/workspace//x"));
    }
}
