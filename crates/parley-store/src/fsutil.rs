//! Line-file helpers shared by every store module.

use std::io::Write;
use std::path::Path;

use crate::{Result, StoreError};

/// Read a file as a list of lines. A missing file reads as empty — every
/// ledger starts life as "no entries".
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content.lines().map(str::to_string).collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Append one line, creating the file if needed.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Replace a file's contents with the given lines, atomically: the new
/// content is written to a temporary file in the same directory and then
/// renamed over the original. A crash leaves either the old or the new
/// file, never a torn one.
pub fn rewrite_atomic(path: &Path, lines: &[String]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;

    for line in lines {
        writeln!(tmp, "{line}")?;
    }
    tmp.flush()?;

    tmp.persist(path).map_err(|e| StoreError::Replace {
        path: path.display().to_string(),
        source: e.error,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(read_lines(&dir.path().join("nope.txt")).unwrap().is_empty());
    }

    #[test]
    fn append_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.txt");

        append_line(&path, "first").unwrap();
        append_line(&path, "second").unwrap();
        assert_eq!(read_lines(&path).unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn rewrite_replaces_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.txt");

        append_line(&path, "old").unwrap();
        rewrite_atomic(&path, &["new one".into(), "new two".into()]).unwrap();
        assert_eq!(read_lines(&path).unwrap(), vec!["new one", "new two"]);
    }

    #[test]
    fn rewrite_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.txt");

        rewrite_atomic(&path, &["only".into()]).unwrap();
        assert_eq!(read_lines(&path).unwrap(), vec!["only"]);
    }
}
