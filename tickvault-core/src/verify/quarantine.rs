//! Non-destructive relocation of rejected files.
//!
//! Files are moved, never deleted, into `{root}/quarantine/`. Each move is
//! appended to `quarantine.jsonl` in the same directory so the reason
//! survives after the log output is gone.

use crate::error::DataError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const LEDGER_FILE: &str = "quarantine.jsonl";

/// One line of the quarantine ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineRecord {
    /// Name the file was stored under inside the quarantine directory.
    pub file: String,
    pub symbol: String,
    pub reason: String,
    pub quarantined_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Quarantine {
    dir: PathBuf,
}

impl Quarantine {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.join(LEDGER_FILE)
    }

    /// Move `file` into quarantine and record why. Returns the new path.
    ///
    /// A name already taken inside quarantine gets a `.1`, `.2`, ... counter
    /// ahead of its extension.
    pub fn relocate(&self, file: &Path, symbol: &str, reason: &str) -> Result<PathBuf, DataError> {
        fs::create_dir_all(&self.dir)?;

        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DataError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("not a file path: {}", file.display()),
                ))
            })?;
        let target = self.free_target(name);

        move_file(file, &target)?;

        let record = QuarantineRecord {
            file: target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            symbol: symbol.to_string(),
            reason: reason.to_string(),
            quarantined_at: Utc::now(),
        };
        self.append(&record)?;
        Ok(target)
    }

    /// Every record in the ledger, oldest first. A missing ledger is empty.
    pub fn records(&self) -> Result<Vec<QuarantineRecord>, DataError> {
        let file = match fs::File::open(self.ledger_path()) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line)
                .map_err(|e| DataError::Parse(format!("quarantine ledger: {e}")))?;
            records.push(record);
        }
        Ok(records)
    }

    /// First unused name for `name`; the counter goes before the extension
    /// so `X.csv` becomes `X.1.csv`, `X.2.csv`, ...
    fn free_target(&self, name: &str) -> PathBuf {
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (name, None),
        };
        let mut target = self.dir.join(name);
        let mut n = 1;
        while target.exists() {
            target = match ext {
                Some(ext) => self.dir.join(format!("{stem}.{n}.{ext}")),
                None => self.dir.join(format!("{stem}.{n}")),
            };
            n += 1;
        }
        target
    }

    fn append(&self, record: &QuarantineRecord) -> Result<(), DataError> {
        let line = serde_json::to_string(record)
            .map_err(|e| DataError::Parse(format!("quarantine record: {e}")))?;
        let mut ledger = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.ledger_path())?;
        writeln!(ledger, "{line}")?;
        Ok(())
    }
}

/// Rename, falling back to copy-then-remove when the quarantine directory is
/// on another filesystem.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if !from.exists() {
                return Err(rename_err);
            }
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}
