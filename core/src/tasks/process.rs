// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::ai::{Analysis, AnalysisFailure, Analyzer};
use crate::meme::{MemeId, MemeItem, Repository, Status};
use crate::run_lock::{LockAttempt, LockOwner, RunLock};
use crate::settings::ProcessSettings;
use crate::tags::TagReconciler;
use crate::Error;

use anyhow::{bail, Result};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Which memes a processing run should pick up.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Also process memes that failed on an earlier run.
    pub retry_errors: bool,

    /// Process only this meme, whatever its status.
    pub single_id: Option<MemeId>,
}

/// Counts from one processing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    /// Memes sent to the analyzer.
    pub processed: usize,

    pub succeeded: usize,

    pub failed: usize,

    /// Memes left processing by an earlier run that died, put back to new.
    pub recovered: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed(ProcessSummary),

    /// Another run holds the run lock. Nothing was changed.
    AlreadyRunning(LockOwner),
}

/// Drives memes through the analyzer, one at a time.
#[derive(Clone)]
pub struct ProcessMemes {
    repo: Repository,
    lock: RunLock,
    analyzer: Arc<dyn Analyzer>,
    reconciler: TagReconciler,
    settings: ProcessSettings,
}

impl ProcessMemes {
    pub fn new(
        repo: Repository,
        lock: RunLock,
        analyzer: Arc<dyn Analyzer>,
        reconciler: TagReconciler,
        settings: ProcessSettings,
    ) -> Self {
        Self {
            repo,
            lock,
            analyzer,
            reconciler,
            settings,
        }
    }

    pub fn run(&self, options: &ProcessOptions) -> Result<ProcessOutcome> {
        // Held until this function returns, however it returns.
        let _guard = match self.lock.try_acquire()? {
            LockAttempt::Acquired(guard) => guard,
            LockAttempt::Held(owner) => {
                info!(
                    "Processing run by process {} started at {} is still active. Nothing to do.",
                    owner.pid, owner.started_at
                );
                return Ok(ProcessOutcome::AlreadyRunning(owner));
            }
        };

        let start = std::time::Instant::now();
        let mut repo = self.repo.clone();

        let mut summary = ProcessSummary {
            recovered: repo.recover_interrupted()?,
            ..ProcessSummary::default()
        };
        if summary.recovered > 0 {
            warn!(
                "Reset {} memes left processing by an interrupted run",
                summary.recovered
            );
        }

        let (candidates, from) = self.select(&repo, options)?;
        info!("Found {} memes to process", candidates.len());

        for (index, item) in candidates.into_iter().enumerate() {
            if index > 0 && !self.settings.request_interval.is_zero() {
                thread::sleep(self.settings.request_interval);
            }

            if !repo.claim(item.meme_id, &from)? {
                debug!("Meme {} changed since selection. Skipping.", item.meme_id);
                continue;
            }

            summary.processed += 1;

            match self.analyze(&item) {
                Ok(analysis) => {
                    let path_tags = self.reconciler.path_tags(item.layout.tag_dir());
                    repo.mark_done(item.meme_id, &analysis, &path_tags)?;
                    summary.succeeded += 1;
                    info!(
                        "Processed meme {} at {:?} with {} tags",
                        item.meme_id,
                        item.path(),
                        analysis.tags.len()
                    );
                }
                Err(failure) => {
                    repo.mark_error(item.meme_id, &failure)?;
                    summary.failed += 1;
                    if failure.kind.is_retryable() {
                        warn!(
                            "Failed processing meme {} at {:?}: {}",
                            item.meme_id,
                            item.path(),
                            failure.persisted_message()
                        );
                    } else {
                        error!(
                            "Failed processing meme {} at {:?}: {}",
                            item.meme_id,
                            item.path(),
                            failure.persisted_message()
                        );
                    }
                }
            }
        }

        info!(
            "Processed {} memes in {} seconds: {} succeeded, {} failed.",
            summary.processed,
            start.elapsed().as_secs(),
            summary.succeeded,
            summary.failed
        );

        Ok(ProcessOutcome::Completed(summary))
    }

    /// Memes to process in order, and the statuses they may be claimed from.
    fn select(&self, repo: &Repository, options: &ProcessOptions) -> Result<(Vec<MemeItem>, Vec<Status>)> {
        if let Some(meme_id) = options.single_id {
            let Some(item) = repo.get(meme_id)? else {
                bail!(Error::MemeNotFound(meme_id));
            };

            if item.is_missing {
                warn!("Meme {} at {:?} is missing from disk. Not processing.", meme_id, item.path());
                return Ok((vec![], vec![]));
            }

            return Ok((vec![item], vec![Status::New, Status::Done, Status::Error]));
        }

        let from = if options.retry_errors {
            vec![Status::New, Status::Error]
        } else {
            vec![Status::New]
        };

        Ok((repo.find_processable(options.retry_errors)?, from))
    }

    /// Calls the analyzer on a worker thread so a hung call can be abandoned.
    fn analyze(&self, item: &MemeItem) -> std::result::Result<Analysis, AnalysisFailure> {
        let (tx, rx) = mpsc::channel();
        let analyzer = self.analyzer.clone();
        let job = item.clone();

        let spawned = thread::Builder::new()
            .name(format!("analyze-{}", item.meme_id))
            .spawn(move || {
                // Receiver is gone if the call timed out.
                let _ = tx.send(analyzer.analyze(&job));
            });

        if let Err(e) = spawned {
            return Err(AnalysisFailure::internal(format!(
                "failed spawning analyzer thread: {}",
                e
            )));
        }

        match rx.recv_timeout(self.settings.call_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(AnalysisFailure::transient(format!(
                "no reply after {:?}",
                self.settings.call_timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => {
                Err(AnalysisFailure::internal("analyzer crashed without a reply"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::FailureKind;
    use crate::database;
    use crate::meme::MediaType;
    use crate::settings::TagSettings;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fails for memes whose file name contains "bad", panics for "boom".
    struct Picky;

    impl Analyzer for Picky {
        fn analyze(&self, item: &MemeItem) -> std::result::Result<Analysis, AnalysisFailure> {
            let name = item.file_name().unwrap_or_default();
            if name.contains("boom") {
                panic!("analyzer blew up");
            }
            if name.contains("bad") {
                return Err(AnalysisFailure::unsupported("not a meme"));
            }
            Ok(Analysis {
                description: format!("About {}", name),
                tags: vec![String::from("cat")],
                references: None,
                template: None,
                caption: None,
                meaning: None,
            })
        }
    }

    fn task(root: &Path, analyzer: Arc<dyn Analyzer>) -> ProcessMemes {
        let con = database::setup_in_memory().unwrap();
        let repo = Repository::open(root, Arc::new(Mutex::new(con))).unwrap();
        let settings = ProcessSettings {
            call_timeout: Duration::from_secs(5),
            request_interval: Duration::ZERO,
        };
        ProcessMemes::new(
            repo,
            RunLock::new(&root.join(".memelet").join("process.lock")),
            analyzer,
            TagReconciler::new(&TagSettings::default()),
            settings,
        )
    }

    fn completed(outcome: ProcessOutcome) -> ProcessSummary {
        match outcome {
            ProcessOutcome::Completed(summary) => summary,
            ProcessOutcome::AlreadyRunning(owner) => panic!("unexpected lock holder {:?}", owner),
        }
    }

    #[test]
    fn one_failure_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let task = task(dir.path(), Arc::new(Picky));
        let mut repo = task.repo.clone();
        let a = repo.add_single(Path::new("a.jpg"), MediaType::Image, &[]).unwrap().unwrap();
        let b = repo.add_single(Path::new("bad.jpg"), MediaType::Image, &[]).unwrap().unwrap();
        let c = repo.add_single(Path::new("boom.jpg"), MediaType::Image, &[]).unwrap().unwrap();
        let d = repo.add_single(Path::new("d.jpg"), MediaType::Image, &[]).unwrap().unwrap();

        let summary = completed(task.run(&ProcessOptions::default()).unwrap());
        assert_eq!(
            ProcessSummary {
                processed: 4,
                succeeded: 2,
                failed: 2,
                recovered: 0,
            },
            summary
        );

        let status = |id| repo.get(id).unwrap().unwrap();
        assert_eq!(Status::Done, status(a).status);
        assert_eq!(FailureKind::Unsupported, status(b).error.unwrap().kind);
        assert_eq!(FailureKind::Internal, status(c).error.unwrap().kind);
        assert_eq!(Status::Done, status(d).status);

        // Lock released
        assert!(!dir.path().join(".memelet").join("process.lock").exists());
    }

    #[test]
    fn single_id_reprocesses_done_meme() {
        let dir = tempfile::tempdir().unwrap();
        let task = task(dir.path(), Arc::new(Picky));
        let mut repo = task.repo.clone();
        let a = repo.add_single(Path::new("a.jpg"), MediaType::Image, &[]).unwrap().unwrap();
        repo.add_single(Path::new("b.jpg"), MediaType::Image, &[]).unwrap().unwrap();

        completed(task.run(&ProcessOptions::default()).unwrap());

        let options = ProcessOptions {
            retry_errors: false,
            single_id: Some(a),
        };
        let summary = completed(task.run(&options).unwrap());
        assert_eq!(1, summary.processed);
        assert_eq!(1, summary.succeeded);
    }

    #[test]
    fn single_id_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let task = task(dir.path(), Arc::new(Picky));
        let options = ProcessOptions {
            retry_errors: false,
            single_id: Some(MemeId::new(42)),
        };
        assert!(task.run(&options).is_err());
        assert!(!dir.path().join(".memelet").join("process.lock").exists());
    }

    #[test]
    fn hung_call_times_out() {
        struct Sleepy;

        impl Analyzer for Sleepy {
            fn analyze(&self, _item: &MemeItem) -> std::result::Result<Analysis, AnalysisFailure> {
                thread::sleep(Duration::from_secs(2));
                Err(AnalysisFailure::auth("too late to matter"))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut task = task(dir.path(), Arc::new(Sleepy));
        task.settings.call_timeout = Duration::from_millis(50);

        let mut repo = task.repo.clone();
        let a = repo.add_single(Path::new("a.jpg"), MediaType::Image, &[]).unwrap().unwrap();

        let summary = completed(task.run(&ProcessOptions::default()).unwrap());
        assert_eq!(1, summary.failed);

        let error = repo.get(a).unwrap().unwrap().error.unwrap();
        assert_eq!(FailureKind::Transient, error.kind);
        assert!(error.message.starts_with("transient (retryable): no reply after"));
    }
}
