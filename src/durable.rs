//! Durable single-file persistence: atomic writes, backup rotation, and
//! read-time recovery.
//!
//! A [`DurableFile`] owns one target path and guarantees the file is never
//! observed half-written or left unrecoverably corrupt:
//!
//! - Writes go to a temp file in the same directory, are flushed to physical
//!   storage, then renamed onto the target. The rename is the single point
//!   of visibility; readers see the fully-old or fully-new file.
//! - Before each write the previous good state can be rotated into a bounded
//!   set of numbered backups (`<path>.backup`, `<path>.backup.1`, ...).
//! - Loads that fail to parse fall back through the backup slots, newest
//!   first, without ever rewriting the target or promoting a backup.
//!
//! Writes serialize on an in-process mutex; this is single-process safety
//! only. Two processes pointed at the same path can still race, which is an
//! accepted limitation (file locking was deliberately removed in favor of
//! atomic renames).

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

/// Default number of rotated backups to retain
pub const DEFAULT_BACKUP_COUNT: usize = 3;

/// Prefix for temp files created during atomic writes
const TMP_PREFIX: &str = ".taskdeck-";

/// Manages crash-safe persistence for a single JSON file.
///
/// Knows nothing about the payload beyond `Serialize`/`DeserializeOwned`;
/// it is a pure transform between a payload and bytes on disk.
#[derive(Debug)]
pub struct DurableFile {
    /// Target path of the primary file
    path: PathBuf,
    /// Number of backup slots to retain
    backup_count: usize,
    /// Serializes the write path so concurrent saves never interleave
    /// backup rotation with a rename.
    write_lock: Mutex<()>,
}

impl DurableFile {
    /// Create a manager for `path` retaining `backup_count` backups.
    ///
    /// Only one `DurableFile` should own a given path within a process.
    pub fn new(path: impl Into<PathBuf>, backup_count: usize) -> Self {
        Self {
            path: path.into(),
            backup_count,
            write_lock: Mutex::new(()),
        }
    }

    /// Manager with the default backup retention
    pub fn with_default_backups(path: impl Into<PathBuf>) -> Self {
        Self::new(path, DEFAULT_BACKUP_COUNT)
    }

    /// Path to the primary file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of backup slots retained
    pub fn backup_count(&self) -> usize {
        self.backup_count
    }

    /// Path of backup slot `slot`: slot 0 is `<path>.backup`, slot i is
    /// `<path>.backup.<i>`.
    pub fn backup_path(&self, slot: usize) -> PathBuf {
        if slot == 0 {
            PathBuf::from(format!("{}.backup", self.path.display()))
        } else {
            PathBuf::from(format!("{}.backup.{}", self.path.display(), slot))
        }
    }

    /// Atomically replace the target file with the serialized payload.
    ///
    /// `indent` is the JSON indentation width; 0 writes compact JSON.
    /// On any failure before the rename the temp file is removed and the
    /// target is untouched; the error is wrapped as [`Error::Safety`].
    pub fn write<T: Serialize>(&self, payload: &T, indent: usize) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.write_locked(payload, indent)
    }

    /// Rotate backups (when `create_backup` and a target exists), then
    /// atomically write the payload.
    ///
    /// After rotation, slot 0 holds the exact pre-write state and at most
    /// `backup_count` backups exist. Rotation failures are wrapped as
    /// [`Error::Safety`] and leave the target untouched.
    pub fn save_with_backup<T: Serialize>(
        &self,
        payload: &T,
        indent: usize,
        create_backup: bool,
    ) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if create_backup && self.backup_count > 0 && self.path.exists() {
            self.rotate_backups()
                .map_err(|err| self.safety(err.into()))?;
        }

        self.write_locked(payload, indent)
    }

    /// Parse the target file, falling back through backup slots on parse
    /// failure.
    ///
    /// - Target absent: [`Error::NotFound`] (first run, not corruption).
    /// - Target unparseable: try slot 0, then 1, ... returning the first
    ///   slot that parses. Read-only; the target is never rewritten.
    /// - Everything unparseable or absent: [`Error::Corruption`].
    pub fn load_with_recovery<T: DeserializeOwned>(&self) -> Result<T> {
        match fs::read_to_string(&self.path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %err,
                        "primary file failed to parse, trying backups"
                    );
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(self.path.clone()));
            }
            Err(err) => return Err(err.into()),
        }

        for slot in 0..self.backup_count {
            let backup = self.backup_path(slot);
            let text = match fs::read_to_string(&backup) {
                Ok(text) => text,
                Err(_) => continue,
            };
            match serde_json::from_str(&text) {
                Ok(value) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        slot,
                        "recovered payload from backup slot"
                    );
                    return Ok(value);
                }
                Err(err) => {
                    tracing::warn!(
                        backup = %backup.display(),
                        error = %err,
                        "backup slot failed to parse"
                    );
                }
            }
        }

        tracing::error!(
            path = %self.path.display(),
            "primary file and all backups are unreadable"
        );
        Err(Error::Corruption {
            path: self.path.clone(),
            attempts: self.backup_count,
        })
    }

    /// Shift backup slots by one: the oldest slot past retention is
    /// deleted, each remaining slot i moves to i+1, and the current target
    /// is copied into the vacated slot 0. Caller holds the write lock.
    fn rotate_backups(&self) -> io::Result<()> {
        let oldest = self.backup_path(self.backup_count - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for slot in (0..self.backup_count - 1).rev() {
            let from = self.backup_path(slot);
            if from.exists() {
                fs::rename(&from, self.backup_path(slot + 1))?;
            }
        }
        fs::copy(&self.path, self.backup_path(0))?;
        Ok(())
    }

    /// Serialize and atomically write. Caller holds the write lock.
    fn write_locked<T: Serialize>(&self, payload: &T, indent: usize) -> Result<()> {
        // Serialize before touching the filesystem: an unserializable
        // payload must leave the target untouched.
        let bytes = to_json_bytes(payload, indent).map_err(|err| self.safety(err.into()))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|err| self.safety(err.into()))?;

        // NamedTempFile removes itself on drop, so every failure path below
        // cleans up the temp file.
        let mut tmp = tempfile::Builder::new()
            .prefix(TMP_PREFIX)
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|err| self.safety(err.into()))?;

        tmp.write_all(&bytes)
            .map_err(|err| self.safety(err.into()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|err| self.safety(err.into()))?;

        // Rename onto the target: the single point of visibility.
        tmp.persist(&self.path)
            .map_err(|err| self.safety(err.error.into()))?;

        Ok(())
    }

    fn safety(&self, source: Error) -> Error {
        Error::Safety {
            path: self.path.clone(),
            source: Box::new(source),
        }
    }
}

/// Serialize a payload to JSON bytes with a configurable indent width
/// (0 = compact).
fn to_json_bytes<T: Serialize>(payload: &T, indent: usize) -> serde_json::Result<Vec<u8>> {
    if indent == 0 {
        return serde_json::to_vec(payload);
    }
    let spaces = vec![b' '; indent];
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(&spaces);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    payload.serialize(&mut ser)?;
    Ok(buf)
}
