//! Test case discovery.
//!
//! A test case is a directory under the tests root holding a `test_*.cpp`
//! source and a debugger script with the same base name and a `.gdb`
//! extension. The golden file `expected.txt` lives next to them and may not
//! exist yet.

use crate::error::HarnessError;
use crate::Result;
use ppcheck_env::is_safe_token;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const SOURCE_PREFIX: &str = "test_";
pub const SOURCE_EXTENSION: &str = "cpp";
pub const SCRIPT_EXTENSION: &str = "gdb";
pub const EXPECTED_FILE: &str = "expected.txt";

/// Mount point of the tests root inside the container.
pub const CONTAINER_TESTS_ROOT: &str = "/workspace/tests";

/// One discovered test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    /// Directory name; the identity of the case.
    pub name: String,

    pub source: PathBuf,
    pub script: PathBuf,

    /// Golden file (may not exist yet).
    pub expected: PathBuf,

    /// Source path as seen inside the container.
    pub container_source: String,

    /// Script path as seen inside the container.
    pub container_script: String,
}

/// Discovers test cases under a tests root.
#[derive(Debug, Clone)]
pub struct TestCatalog {
    tests_dir: PathBuf,
    strict: bool,
}

impl TestCatalog {
    pub fn new(tests_dir: impl Into<PathBuf>) -> Self {
        Self {
            tests_dir: tests_dir.into(),
            strict: false,
        }
    }

    /// In strict mode a case without its script fails discovery instead of
    /// being skipped.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Find test cases, optionally only the one named `filter`.
    ///
    /// The result is sorted by the source path string. An empty result is not
    /// an error.
    pub fn discover(&self, filter: Option<&str>) -> Result<Vec<TestCase>> {
        let mut sources = Vec::new();
        for entry in WalkDir::new(&self.tests_dir).min_depth(2).max_depth(2) {
            let entry = entry?;
            if entry.path().is_file() && is_test_source(entry.path()) {
                sources.push(entry.into_path());
            }
        }
        // Whole-string order: `vector-bool/` sorts before `vector/`.
        sources.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));

        let mut cases: Vec<TestCase> = Vec::new();
        for source in sources {
            let Some(name) = dir_name(&source) else {
                continue;
            };
            if filter.is_some_and(|wanted| wanted != name) {
                continue;
            }
            if let Some(existing) = cases.iter().find(|c| c.name == name) {
                warn!(
                    test = %name,
                    "SKIP {}: extra source {}, using {}",
                    name,
                    source.display(),
                    existing.source.display()
                );
                continue;
            }

            if let Some(case) = self.case_for(&name, &source)? {
                debug!(test = %case.name, "Discovered test case");
                cases.push(case);
            }
        }

        Ok(cases)
    }

    fn case_for(&self, name: &str, source: &Path) -> Result<Option<TestCase>> {
        let base = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        if !is_safe_token(name) || !is_safe_token(&base) {
            if self.strict {
                return Err(HarnessError::UnsafeValue(format!("{}/{}", name, base)));
            }
            warn!(test = %name, "SKIP {}: name is not safe to pass into the container", name);
            return Ok(None);
        }

        let dir = source.parent().unwrap_or(&self.tests_dir);
        let script_name = format!("{}.{}", base, SCRIPT_EXTENSION);
        let script = dir.join(&script_name);
        if !script.is_file() {
            if self.strict {
                return Err(HarnessError::MissingScript {
                    name: name.to_string(),
                    script: script_name,
                });
            }
            warn!(test = %name, "SKIP {}: missing {}", name, script_name);
            return Ok(None);
        }

        Ok(Some(TestCase {
            name: name.to_string(),
            source: source.to_path_buf(),
            script,
            expected: dir.join(EXPECTED_FILE),
            container_source: format!(
                "{}/{}/{}.{}",
                CONTAINER_TESTS_ROOT, name, base, SOURCE_EXTENSION
            ),
            container_script: format!("{}/{}/{}", CONTAINER_TESTS_ROOT, name, script_name),
        }))
    }
}

fn is_test_source(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(SOURCE_PREFIX));
    let ext_ok = path.extension().is_some_and(|e| e == SOURCE_EXTENSION);
    name_ok && ext_ok
}

fn dir_name(source: &Path) -> Option<String> {
    source
        .parent()
        .and_then(|dir| dir.file_name())
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn add_case(root: &Path, name: &str, with_script: bool) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("test_{}.cpp", name)), "int main() {}").unwrap();
        if with_script {
            std::fs::write(dir.join(format!("test_{}.gdb", name)), "run\n").unwrap();
        }
    }

    fn fixture() -> TempDir {
        let dir = tempdir().unwrap();
        // Created out of order on purpose.
        add_case(dir.path(), "vector", true);
        add_case(dir.path(), "string", true);
        add_case(dir.path(), "map", false);
        dir
    }

    #[test]
    fn test_discover_sorted_and_complete() {
        let dir = fixture();
        let cases = TestCatalog::new(dir.path()).discover(None).unwrap();

        let names: Vec<_> = cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["string", "vector"]);

        let vector = &cases[1];
        assert_eq!(vector.source, dir.path().join("vector").join("test_vector.cpp"));
        assert_eq!(vector.script, dir.path().join("vector").join("test_vector.gdb"));
        assert_eq!(vector.expected, dir.path().join("vector").join("expected.txt"));
        assert_eq!(vector.container_source, "/workspace/tests/vector/test_vector.cpp");
        assert_eq!(vector.container_script, "/workspace/tests/vector/test_vector.gdb");
    }

    #[test]
    fn test_discover_orders_by_path_string() {
        let dir = tempdir().unwrap();
        add_case(dir.path(), "vector", true);
        add_case(dir.path(), "vector-bool", true);
        add_case(dir.path(), "string", true);

        let cases = TestCatalog::new(dir.path()).discover(None).unwrap();

        let names: Vec<_> = cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["string", "vector-bool", "vector"]);
    }

    #[test]
    fn test_discover_skips_missing_script() {
        let dir = fixture();
        let cases = TestCatalog::new(dir.path()).discover(Some("map")).unwrap();
        assert!(cases.is_empty());
    }

    #[test]
    fn test_discover_strict_fails_on_missing_script() {
        let dir = fixture();
        let err = TestCatalog::new(dir.path())
            .strict(true)
            .discover(None)
            .unwrap_err();
        match err {
            HarnessError::MissingScript { name, script } => {
                assert_eq!(name, "map");
                assert_eq!(script, "test_map.gdb");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_discover_filter() {
        let dir = fixture();
        let cases = TestCatalog::new(dir.path()).discover(Some("string")).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].name, "string");

        let none = TestCatalog::new(dir.path()).discover(Some("deque")).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_discover_ignores_non_matching_files() {
        let dir = tempdir().unwrap();
        let case_dir = dir.path().join("vector");
        std::fs::create_dir_all(&case_dir).unwrap();
        std::fs::write(case_dir.join("helper.cpp"), "").unwrap();
        std::fs::write(case_dir.join("test_vector.h"), "").unwrap();
        std::fs::write(dir.path().join("test_top.cpp"), "").unwrap();
        std::fs::write(dir.path().join("test_top.gdb"), "").unwrap();

        let cases = TestCatalog::new(dir.path()).discover(None).unwrap();
        assert!(cases.is_empty());
    }

    #[test]
    fn test_discover_skips_unsafe_names() {
        let dir = tempdir().unwrap();
        add_case(dir.path(), "bad name", true);
        add_case(dir.path(), "vector", true);

        let cases = TestCatalog::new(dir.path()).discover(None).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].name, "vector");
    }

    #[test]
    fn test_discover_missing_root_is_error() {
        let dir = tempdir().unwrap();
        let result = TestCatalog::new(dir.path().join("absent")).discover(None);
        assert!(matches!(result, Err(HarnessError::Walk(_))));
    }
}
