//! Archive extraction.
//!
//! Members are written at most once per destination: an existing file of the
//! same name is left alone, and each member is streamed into a temp file in
//! the destination directory that is then linked into place without clobbering.
//! Nothing is sized from the sizes an archive declares for itself.
//! A concurrent writer of the same member therefore either wins or is counted
//! as skipped; nobody ever sees a half-written file.

use crate::error::DataError;
use serde::Serialize;
use std::io::{self, Cursor, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractOutcome {
    pub written: usize,
    /// Matching members already present on disk.
    pub skipped: usize,
}

/// Final path component of a member name; directory parts are discarded so a
/// member can never land outside `dest`.
fn member_file_name(name: &str) -> Option<&str> {
    name.rsplit(|c| c == '/' || c == '\\')
        .next()
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
}

/// Extract every member ending in `member_ext` from `bytes` into `dest`.
/// `source` names the archive in errors.
pub fn extract_archive(
    bytes: &[u8],
    dest: &Path,
    member_ext: &str,
    source: &str,
) -> Result<ExtractOutcome, DataError> {
    let corrupt = |reason: String| DataError::ArchiveCorruption {
        url: source.to_string(),
        reason,
    };

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| corrupt(e.to_string()))?;
    let mut outcome = ExtractOutcome::default();

    for i in 0..archive.len() {
        let mut member = archive.by_index(i).map_err(|e| corrupt(e.to_string()))?;
        if member.is_dir() {
            continue;
        }
        let file_name = match member_file_name(member.name()) {
            Some(n) if n.ends_with(member_ext) => n.to_string(),
            _ => continue,
        };

        let target = dest.join(&file_name);
        if target.exists() {
            outcome.skipped += 1;
            continue;
        }

        let mut tmp = NamedTempFile::new_in(dest)?;
        io::copy(&mut member, &mut tmp).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                corrupt(format!("{file_name}: {e}"))
            }
            _ => DataError::Io(e),
        })?;
        tmp.flush()?;

        match tmp.persist_noclobber(&target) {
            Ok(_) => outcome.written += 1,
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => outcome.skipped += 1,
            Err(e) => return Err(DataError::Io(e.error)),
        }
    }

    Ok(outcome)
}
