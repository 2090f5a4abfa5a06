// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use sysinfo::{Pid, System};
use tracing::{debug, error, warn};

/// Times to retry after discarding a stale lock before giving up.
const MAX_ATTEMPTS: usize = 3;

/// Process start times are reported in whole seconds, and may disagree with
/// the wall clock by a little.
const START_TIME_SLACK_SECS: i64 = 2;

/// Process holding the run lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum LockAttempt {
    Acquired(RunLockGuard),

    /// A live process already holds the lock.
    Held(LockOwner),
}

/// Advisory lock file allowing one processing run at a time per library.
/// The file holds the owner's process id, so a lock left behind by a killed
/// process can be detected and discarded.
#[derive(Debug, Clone)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn new(path: &Path) -> Self {
        Self {
            path: PathBuf::from(path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn try_acquire(&self) -> Result<LockAttempt> {
        let lock_dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(lock_dir).with_context(|| format!("create lock directory {:?}", lock_dir))?;

        let owner = LockOwner {
            pid: std::process::id(),
            started_at: Utc::now(),
        };
        let record = serde_json::to_string(&owner)?;

        for _ in 0..MAX_ATTEMPTS {
            if self.create(lock_dir, &record)? {
                debug!("Acquired run lock {:?}", self.path);
                return Ok(LockAttempt::Acquired(RunLockGuard {
                    path: self.path.clone(),
                    record,
                }));
            }

            let Some(existing) = read_record(&self.path)? else {
                // Released since we tried. Go again.
                continue;
            };

            match serde_json::from_str::<LockOwner>(&existing) {
                Ok(holder) if is_running(&holder) => return Ok(LockAttempt::Held(holder)),
                Ok(holder) => {
                    warn!(
                        "Discarding stale run lock {:?} from process {} started at {} that is no longer running",
                        self.path, holder.pid, holder.started_at
                    );
                    self.remove_if_unchanged(&existing)?;
                }
                Err(e) => {
                    warn!("Discarding unreadable run lock {:?}: {}", self.path, e);
                    self.remove_if_unchanged(&existing)?;
                }
            }
        }

        bail!("Could not acquire run lock {:?} after {} attempts", self.path, MAX_ATTEMPTS);
    }

    /// Lock file appears fully written or not at all. Returns false if it already exists.
    fn create(&self, lock_dir: &Path, record: &str) -> Result<bool> {
        let mut temp = tempfile::NamedTempFile::new_in(lock_dir)?;
        temp.write_all(record.as_bytes())?;
        temp.flush()?;

        match fs::hard_link(temp.path(), &self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e).with_context(|| format!("create run lock {:?}", self.path)),
        }
    }

    /// Another process may discard the same stale lock and take it between our
    /// read and remove. The content check narrows that window but can't close it.
    fn remove_if_unchanged(&self, expected: &str) -> Result<()> {
        if read_record(&self.path)?.as_deref() != Some(expected) {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove stale run lock {:?}", self.path)),
        }
    }
}

/// Releases the run lock when dropped, on every exit path.
#[derive(Debug)]
pub struct RunLockGuard {
    path: PathBuf,
    record: String,
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        match read_record(&self.path) {
            Ok(Some(record)) if record == self.record => {
                if let Err(e) = fs::remove_file(&self.path) {
                    error!("Failed releasing run lock {:?}: {}", self.path, e);
                } else {
                    debug!("Released run lock {:?}", self.path);
                }
            }
            Ok(_) => warn!("Run lock {:?} no longer ours. Leaving it alone.", self.path),
            Err(e) => error!("Failed reading run lock {:?}: {}", self.path, e),
        }
    }
}

fn read_record(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(record) => Ok(Some(record)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read run lock {:?}", path)),
    }
}

/// A lock holder is running only if its pid is alive and that process started
/// before the lock was written. A later start means the pid was reused, as
/// happens to pid 1 in every new container.
fn is_running(holder: &LockOwner) -> bool {
    let pid = Pid::from_u32(holder.pid);
    let mut system = System::new();
    if !system.refresh_process(pid) {
        return false;
    }

    match system.process(pid) {
        Some(process) => started_before(process.start_time(), holder.started_at),
        None => false,
    }
}

fn started_before(process_start_secs: u64, lock_started_at: DateTime<Utc>) -> bool {
    let process_start = i64::try_from(process_start_secs).unwrap_or(i64::MAX);
    process_start <= lock_started_at.timestamp().saturating_add(START_TIME_SLACK_SECS)
}
