// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Idempotent persistence for rendered output files.
///
/// Skips writes when the content on disk already matches and otherwise
/// replaces files atomically via a staged sibling.
use std::{
    fs, io,
    path::{Path, PathBuf}
};

use tracing::debug;

use crate::error::{Error, io_error};

/// Persists content to the given path unless it is already identical.
///
/// An absent file is not an error; it is simply created. When the existing
/// content matches, nothing is written and the file's mtime is preserved, so
/// downstream file-watchers are not triggered needlessly. Otherwise the
/// content goes to a `.new` sibling first and is renamed over the target, so
/// a reader never observes a partially written file and a crash mid-write
/// leaves the old file intact.
///
/// # Arguments
///
/// * `path` - Destination file
/// * `content` - Full rendered content
///
/// # Returns
///
/// `true` when the file was written, `false` when the content was unchanged.
///
/// # Errors
///
/// Returns an [`Error`] when the existing file cannot be read for reasons
/// other than absence, or the staged write or rename fails.
pub fn replace_file(path: &Path, content: &str) -> Result<bool, Error> {
    match fs::read_to_string(path) {
        Ok(existing) if existing == content => {
            debug!("content unchanged, leaving {} untouched", path.display());
            return Ok(false);
        }
        Ok(_) => {}
        Err(source) if source.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(io_error(path, source))
    }

    let staged = staged_path(path);
    fs::write(&staged, content).map_err(|source| io_error(&staged, source))?;
    fs::rename(&staged, path).map_err(|source| io_error(path, source))?;
    debug!("wrote {}", path.display());

    Ok(true)
}

/// Derives the staged sibling path used for the atomic replace.
fn staged_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".new");
    PathBuf::from(staged)
}
