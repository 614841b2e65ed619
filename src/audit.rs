//! Append-only JSONL audit log writer.
//!
//! One JSON object per line, flushed on every record. Writes are serialized
//! by an internal lock so concurrent requests cannot interleave partial
//! lines. Used by the security enforcer and the hallucination detector;
//! each owns its own file.

use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Line-oriented append-only writer for audit records.
pub struct JsonlWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlWriter {
    /// Open (creating parents as needed) the audit file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a JSON line and flush it.
    pub fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| Error::StorageUnavailable("audit log lock poisoned".into()))?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use tempfile::TempDir;

    #[derive(Serialize)]
    struct Rec {
        id: u32,
        msg: String,
    }

    #[test]
    fn test_appends_one_json_per_line() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs/audit.log");
        let writer = JsonlWriter::open(&path).unwrap();

        writer
            .append(&Rec {
                id: 1,
                msg: "first".into(),
            })
            .unwrap();
        writer
            .append(&Rec {
                id: 2,
                msg: "second".into(),
            })
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["id"], 1);
    }

    #[test]
    fn test_reopen_appends_not_truncates() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("audit.log");

        {
            let writer = JsonlWriter::open(&path).unwrap();
            writer.append(&Rec { id: 1, msg: "a".into() }).unwrap();
        }
        {
            let writer = JsonlWriter::open(&path).unwrap();
            writer.append(&Rec { id: 2, msg: "b".into() }).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
