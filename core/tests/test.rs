// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use memelet_core::ai::{Analysis, AnalysisFailure, Analyzer, FailureKind};
use memelet_core::database;
use memelet_core::meme::{Layout, MemeItem, Status};
use memelet_core::run_lock::LockOwner;
use memelet_core::settings::{ProcessSettings, ScanSettings};
use memelet_core::tasks::ProcessSummary;
use memelet_core::{Error, Library, LibrarySettings, ProcessOptions, ProcessOutcome};

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

enum Reply {
    Tags(Vec<&'static str>),
    Fail(AnalysisFailure),
    Hang(Duration),
}

/// Replies per file name, in order. Anything unscripted gets a plain reply.
#[derive(Default)]
struct Scripted {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl Scripted {
    fn reply(self, name: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn analysis(tags: &[&str]) -> Analysis {
    Analysis {
        description: String::from("A meme"),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        references: None,
        template: None,
        caption: None,
        meaning: None,
    }
}

impl Analyzer for Scripted {
    fn analyze(&self, item: &MemeItem) -> Result<Analysis, AnalysisFailure> {
        let name = item.file_name().unwrap_or_default();
        self.calls.lock().unwrap().push(name.clone());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&name)
            .and_then(|r| r.pop_front());

        match reply {
            None => Ok(analysis(&["meme"])),
            Some(Reply::Tags(tags)) => Ok(analysis(&tags)),
            Some(Reply::Fail(failure)) => Err(failure),
            Some(Reply::Hang(duration)) => {
                thread::sleep(duration);
                Ok(analysis(&["late"]))
            }
        }
    }
}

/// Blocks inside the analyzer until released.
struct Gated {
    started: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl Analyzer for Gated {
    fn analyze(&self, _item: &MemeItem) -> Result<Analysis, AnalysisFailure> {
        let _ = self.started.lock().unwrap().send(());
        let _ = self
            .release
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(10));
        Ok(analysis(&["gated"]))
    }
}

fn touch(root: &Path, path: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"not empty").unwrap();
}

fn library(root: &Path, analyzer: Arc<dyn Analyzer>, call_timeout: Duration) -> Library {
    let con = Arc::new(Mutex::new(database::setup_in_memory().unwrap()));
    library_on(root, con, analyzer, call_timeout)
}

fn library_on(
    root: &Path,
    con: Arc<Mutex<rusqlite::Connection>>,
    analyzer: Arc<dyn Analyzer>,
    call_timeout: Duration,
) -> Library {
    let settings = LibrarySettings {
        scan: ScanSettings {
            settle_time: Duration::ZERO,
            ..ScanSettings::default()
        },
        process: ProcessSettings {
            call_timeout,
            request_interval: Duration::ZERO,
        },
        ..LibrarySettings::default()
    };
    Library::open(root, con, settings, analyzer).unwrap()
}

fn completed(outcome: ProcessOutcome) -> ProcessSummary {
    match outcome {
        ProcessOutcome::Completed(summary) => summary,
        ProcessOutcome::AlreadyRunning(owner) => panic!("unexpected lock holder {:?}", owner),
    }
}

fn retry() -> ProcessOptions {
    ProcessOptions {
        retry_errors: true,
        single_id: None,
    }
}

#[test]
fn test_scan_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "funny/cats/lol.jpg");
    touch(dir.path(), "funny/dance.gif");
    touch(dir.path(), "clip.mp4");
    let lib = library(dir.path(), Arc::new(Scripted::default()), Duration::from_secs(5));

    let first = lib.scan().unwrap();
    assert_eq!(3, first.new);

    let second = lib.scan().unwrap();
    assert_eq!(0, second.new);
    assert_eq!(0, second.removed);
    assert_eq!(0, second.restored);

    let paths: Vec<PathBuf> = lib.all().unwrap().iter().map(|m| m.path().to_path_buf()).collect();
    assert_eq!(3, paths.len());
}

#[test]
fn test_album_of_three_images_is_one_meme() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "comics/strip/.album");
    touch(dir.path(), "comics/strip/a.png");
    touch(dir.path(), "comics/strip/b.png");
    touch(dir.path(), "comics/strip/c.png");
    let lib = library(dir.path(), Arc::new(Scripted::default()), Duration::from_secs(5));

    lib.scan().unwrap();

    let all = lib.all().unwrap();
    assert_eq!(1, all.len());

    let Layout::Album { dir: album_dir, members } = &all[0].layout else {
        panic!("expected album, got {:?}", all[0].layout);
    };
    assert_eq!(Path::new("comics/strip"), album_dir);
    let members: Vec<_> = members.iter().map(|m| m.path.clone()).collect();
    assert_eq!(
        vec![
            PathBuf::from("comics/strip/a.png"),
            PathBuf::from("comics/strip/b.png"),
            PathBuf::from("comics/strip/c.png"),
        ],
        members
    );

    // User chosen order survives a rescan.
    let order = vec![
        PathBuf::from("comics/strip/c.png"),
        PathBuf::from("comics/strip/a.png"),
        PathBuf::from("comics/strip/b.png"),
    ];
    lib.reorder_album(all[0].meme_id, &order).unwrap();
    lib.scan().unwrap();
    let Layout::Album { members, .. } = lib.get(all[0].meme_id).unwrap().unwrap().layout else {
        panic!("expected album");
    };
    let members: Vec<_> = members.into_iter().map(|m| m.path).collect();
    assert_eq!(order, members);
}

#[test]
fn test_path_and_ai_tags_merge() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "funny/cats/lol.jpg");
    let analyzer = Scripted::default().reply("lol.jpg", Reply::Tags(vec!["cat", "Funny"]));
    let lib = library(dir.path(), Arc::new(analyzer), Duration::from_secs(5));

    lib.scan().unwrap();
    let item = lib.all().unwrap().pop().unwrap();
    assert_eq!(vec!["funny", "cats"], item.tag_names());

    let summary = completed(lib.process(&ProcessOptions::default()).unwrap());
    assert_eq!(1, summary.succeeded);

    let item = lib.get(item.meme_id).unwrap().unwrap();
    assert_eq!(Status::Done, item.status);
    assert_eq!(vec!["funny", "cats", "cat"], item.tag_names());

    // Reconciling again is a no op.
    let reconciled = lib.reconcile_tags(memelet_core::TagTarget::All).unwrap();
    assert_eq!(0, reconciled.changed);
    assert_eq!(
        vec!["funny", "cats", "cat"],
        lib.get(item.meme_id).unwrap().unwrap().tag_names()
    );
}

#[test]
fn test_timeout_then_retry_errors() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "a.jpg");
    touch(dir.path(), "slow.jpg");
    touch(dir.path(), "z.jpg");
    let analyzer = Arc::new(
        Scripted::default().reply("slow.jpg", Reply::Hang(Duration::from_millis(1500))),
    );
    let lib = library(dir.path(), analyzer.clone(), Duration::from_millis(200));

    lib.scan().unwrap();
    let summary = completed(lib.process(&ProcessOptions::default()).unwrap());
    assert_eq!(3, summary.processed);
    assert_eq!(2, summary.succeeded);
    assert_eq!(1, summary.failed);

    // Processed oldest first
    assert_eq!(vec!["a.jpg", "slow.jpg", "z.jpg"], analyzer.calls());

    let failed = lib.find_by_status(Status::Error).unwrap();
    assert_eq!(1, failed.len());
    let error = failed[0].error.clone().unwrap();
    assert_eq!(FailureKind::Transient, error.kind);
    assert!(error.message.starts_with("transient (retryable)"));

    // A plain run leaves the failure alone.
    let summary = completed(lib.process(&ProcessOptions::default()).unwrap());
    assert_eq!(0, summary.processed);
    assert_eq!(3, analyzer.calls().len());

    // Retry picks up exactly the failed meme.
    let summary = completed(lib.process(&retry()).unwrap());
    assert_eq!(1, summary.processed);
    assert_eq!(1, summary.succeeded);
    assert_eq!("slow.jpg", analyzer.calls().last().unwrap());
    assert_eq!(Status::Done, lib.get(failed[0].meme_id).unwrap().unwrap().status);
}

#[test]
fn test_permanent_failure_is_flagged() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "lol.jpg");
    let analyzer = Scripted::default().reply("lol.jpg", Reply::Fail(AnalysisFailure::auth("HTTP 401")));
    let lib = library(dir.path(), Arc::new(analyzer), Duration::from_secs(5));

    lib.scan().unwrap();
    completed(lib.process(&ProcessOptions::default()).unwrap());

    let item = lib.all().unwrap().pop().unwrap();
    assert_eq!(Status::Error, item.status);
    assert_eq!(
        "auth (not retryable, check configuration): HTTP 401",
        item.error.unwrap().message
    );
}

#[test]
fn test_done_is_never_reverted() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "lol.jpg");
    let analyzer = Arc::new(Scripted::default());
    let lib = library(dir.path(), analyzer.clone(), Duration::from_secs(5));

    lib.scan().unwrap();
    completed(lib.process(&ProcessOptions::default()).unwrap());

    lib.scan().unwrap();
    completed(lib.process(&ProcessOptions::default()).unwrap());
    completed(lib.process(&retry()).unwrap());

    assert_eq!(1, analyzer.calls().len());
    assert_eq!(Status::Done, lib.all().unwrap()[0].status);
}

#[test]
fn test_single_flight() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "lol.jpg");

    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let analyzer = Gated {
        started: Mutex::new(started_tx),
        release: Mutex::new(release_rx),
    };
    let lib = library(dir.path(), Arc::new(analyzer), Duration::from_secs(20));
    lib.scan().unwrap();

    let first = {
        let lib = lib.clone();
        thread::spawn(move || lib.process(&ProcessOptions::default()).unwrap())
    };

    started_rx.recv_timeout(Duration::from_secs(10)).unwrap();

    let stats_before = lib.stats().unwrap();
    match lib.process(&retry()).unwrap() {
        ProcessOutcome::AlreadyRunning(LockOwner { pid, .. }) => {
            assert_eq!(std::process::id(), pid)
        }
        ProcessOutcome::Completed(summary) => panic!("second run went ahead: {:?}", summary),
    }
    assert_eq!(stats_before, lib.stats().unwrap());
    assert_eq!(1, stats_before.processing);

    release_tx.send(()).unwrap();
    let summary = completed(first.join().unwrap());
    assert_eq!(1, summary.succeeded);
}

#[test]
fn test_stale_lock_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "lol.jpg");
    let lib = library(dir.path(), Arc::new(Scripted::default()), Duration::from_secs(5));

    let lock_path = Library::default_lock_path(dir.path());
    fs::create_dir_all(lock_path.parent().unwrap()).unwrap();
    fs::write(
        &lock_path,
        r#"{"pid": 4294967294, "started_at": "2024-01-01T00:00:00Z"}"#,
    )
    .unwrap();

    lib.scan().unwrap();
    let summary = completed(lib.process(&ProcessOptions::default()).unwrap());
    assert_eq!(1, summary.succeeded);
    assert!(!lock_path.exists());
}

#[test]
fn test_interrupted_run_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "lol.jpg");
    let con = Arc::new(Mutex::new(database::setup_in_memory().unwrap()));
    let lib = library_on(dir.path(), con.clone(), Arc::new(Scripted::default()), Duration::from_secs(5));
    lib.scan().unwrap();

    // Claimed by a run that was killed before it finished.
    let item = lib.all().unwrap().pop().unwrap();
    let mut repo = memelet_core::Repository::open(dir.path(), con).unwrap();
    assert!(repo.claim(item.meme_id, &[Status::New]).unwrap());

    let summary = completed(lib.process(&ProcessOptions::default()).unwrap());
    assert_eq!(1, summary.recovered);
    assert_eq!(1, summary.succeeded);
    assert_eq!(Status::Done, lib.get(item.meme_id).unwrap().unwrap().status);
}

#[test]
fn test_missing_root_fails_scan() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("library");
    fs::create_dir(&root).unwrap();
    let lib = library(&root, Arc::new(Scripted::default()), Duration::from_secs(5));

    fs::remove_dir(&root).unwrap();
    let err = lib.scan().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::LibraryRootMissing(_))
    ));
}
