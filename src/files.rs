//! File helpers shared by the config store and commands

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{AppError, Result};

/// Read a file, treating a missing file as `None`
pub fn read_file_safe(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::extend(
            format!("Failed to read file at path: {}", path.display()),
            e,
            Vec::<String>::new(),
        )),
    }
}

/// Write a file, refusing to clobber an existing one unless `overwrite` is set
///
/// Returns `false` when the file already existed and was left alone.
pub fn write_file_safe(path: &Path, contents: &str, overwrite: bool) -> Result<bool> {
    let mut options = OpenOptions::new();
    options.write(true);

    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(write_error(path, e)),
    };

    file.write_all(contents.as_bytes())
        .map_err(|e| write_error(path, e))?;

    Ok(true)
}

/// Replace the contents of `path` atomically
///
/// The data goes to a temp file in the same directory first, which is then
/// renamed over the target. The temp file is removed if anything fails.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| write_error(path, e))?;
    temp.write_all(contents.as_bytes())
        .map_err(|e| write_error(path, e))?;
    temp.persist(path).map_err(|e| write_error(path, e.error))?;

    Ok(())
}

fn write_error(path: &Path, error: io::Error) -> AppError {
    AppError::extend(
        format!("Failed to write file at path: {}", path.display()),
        error,
        Vec::<String>::new(),
    )
}

/// Path of the backup copy for `path` (`<path>.backup`)
pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".backup");
    PathBuf::from(name)
}

/// Copy `path` next to itself as `<path>.backup`
pub fn backup_file(path: &Path) -> Result<PathBuf> {
    let backup = backup_path_for(path);

    fs::copy(path, &backup).map_err(|e| {
        AppError::extend(
            format!("Failed to create a backup of: {}", path.display()),
            e,
            Vec::<String>::new(),
        )
    })?;

    Ok(backup)
}

/// Copy a backup over the original and delete the backup
pub fn restore_file(backup: &Path, original: &Path) -> Result<()> {
    fs::copy(backup, original).map_err(|e| {
        AppError::extend(
            format!("Failed to restore backup for: {}", original.display()),
            e,
            Vec::<String>::new(),
        )
    })?;

    remove_backup(backup)
}

fn remove_backup(backup: &Path) -> Result<()> {
    fs::remove_file(backup).map_err(|e| {
        AppError::extend(
            format!("Failed to remove backup file: {}", backup.display()),
            e,
            Vec::<String>::new(),
        )
    })
}

/// Scoped backup of a file that is about to be mutated
///
/// The original contents come back on [`restore`](Self::restore) or when the
/// guard is dropped, so a failing operation never leaves a half-written file
/// behind. No `.backup` file survives the guard.
#[derive(Debug)]
pub struct FileBackup {
    original: PathBuf,
    backup: PathBuf,
    armed: bool,
}

impl FileBackup {
    pub fn create(path: &Path) -> Result<Self> {
        let backup = backup_file(path)?;
        tracing::debug!("Backed up {} to {}", path.display(), backup.display());

        Ok(Self {
            original: path.to_path_buf(),
            backup,
            armed: true,
        })
    }

    pub fn original_path(&self) -> &Path {
        &self.original
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    /// Put the original contents back
    pub fn restore(mut self) -> Result<()> {
        self.armed = false;
        restore_file(&self.backup, &self.original)
    }
}

impl Drop for FileBackup {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        if let Err(e) = restore_file(&self.backup, &self.original) {
            tracing::warn!(
                "Failed to restore {} from backup: {}",
                self.original.display(),
                e
            );
        }
    }
}
