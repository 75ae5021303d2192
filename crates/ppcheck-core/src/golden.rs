//! Golden file (`expected.txt`) reading and writing.

use crate::Result;
use std::path::Path;

/// Expected lines from file content: trimmed, blank lines dropped.
pub fn parse_expected(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// File content for `lines`: newline-joined with a trailing newline.
pub fn render_expected<S: AsRef<str>>(lines: &[S]) -> String {
    let mut content = lines
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    content.push('\n');
    content
}

/// Load a golden file; `Ok(None)` when it does not exist yet.
pub fn read_expected(path: &Path) -> Result<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(parse_expected(&content)))
}

/// Replace a golden file with `lines`.
pub fn write_expected<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    std::fs::write(path, render_expected(lines))?;
    Ok(())
}
