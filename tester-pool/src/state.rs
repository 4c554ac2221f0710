/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Shared state directory and its advisory lock.
//!
//! All test-suite processes using the same resource pool point at the same
//! state directory.  Any read-modify-write of a state file happens while the
//! caller holds a [`StateLock`]: an exclusive `flock()` on `<state_dir>/lock`.
//! The lock is released when the guard is dropped, on every exit path.
//!
//! ```text
//! <state_dir>/
//! ├── lock                       – flock target, holds the owner's origin id
//! ├── reserved_resources.state   – union of all live reservations
//! └── last_used_<token>.state    – persistent counters
//! ```

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::resource::ResourceError;

/// Name of the lock file inside the state directory.
pub const LOCK_FILE: &str = "lock";

// ── StateDir ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StateDir {
    path: PathBuf,
}

impl StateDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `name` inside the state directory (not created).
    pub fn child(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Path of `name`, creating any missing parent directories.
    pub fn mk_parentdir(&self, name: &str) -> Result<PathBuf, ResourceError> {
        let child = self.child(name);
        if let Some(parent) = child.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ResourceError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(child)
    }

    /// Block until the exclusive lock on this directory is acquired.
    ///
    /// `owner` (an origin id) is written into the lock file for diagnostics
    /// only.
    pub fn lock(&self, owner: &str) -> Result<StateLock, ResourceError> {
        let path = self.mk_parentdir(LOCK_FILE)?;
        let io_err = |source| ResourceError::Io {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        debug!(owner = owner, lock = %path.display(), "acquiring state lock");
        file.lock_exclusive().map_err(io_err)?;

        // Dropping `file` on an early return closes it, which releases the lock.
        file.set_len(0).map_err(io_err)?;
        file.write_all(owner.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;

        Ok(StateLock { file, path })
    }
}

// ── StateLock ─────────────────────────────────────────────────────────────────

/// Exclusive hold on a [`StateDir`]; unlocks on drop.
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(lock = %self.path.display(), error = %e, "failed to release state lock");
        } else {
            debug!(lock = %self.path.display(), "state lock released");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
