// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::ai::Analyzer;
use crate::meme::{Details, MemeId, MemeItem, Repository, Stats, Status, Tag};
use crate::run_lock::RunLock;
use crate::scanner::Scanner;
use crate::settings::{ProcessSettings, ScanSettings, TagSettings};
use crate::tags::TagReconciler;
use crate::tasks::{
    ProcessMemes, ProcessOptions, ProcessOutcome, ReconcileSummary, ReconcileTags, ScanMemes,
    ScanSummary, TagTarget,
};

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Everything a library needs configured.
#[derive(Debug, Clone, Default)]
pub struct LibrarySettings {
    pub scan: ScanSettings,
    pub process: ProcessSettings,
    pub tags: TagSettings,

    /// Run lock file. Defaults to a hidden file inside the library root.
    pub lock_path: Option<PathBuf>,
}

/// Entry point for callers such as the command line or a web server.
#[derive(Clone)]
pub struct Library {
    repo: Repository,
    scan: ScanSettings,
    process: ProcessSettings,
    reconciler: TagReconciler,
    lock: RunLock,
    analyzer: Arc<dyn Analyzer>,
}

impl Library {
    pub fn open(
        library_base_path: &Path,
        con: Arc<Mutex<rusqlite::Connection>>,
        settings: LibrarySettings,
        analyzer: Arc<dyn Analyzer>,
    ) -> Result<Self> {
        let repo = Repository::open(library_base_path, con)?;
        let lock_path = settings
            .lock_path
            .unwrap_or_else(|| Self::default_lock_path(library_base_path));

        Ok(Self {
            repo,
            scan: settings.scan,
            process: settings.process,
            reconciler: TagReconciler::new(&settings.tags),
            lock: RunLock::new(&lock_path),
            analyzer,
        })
    }

    pub fn default_lock_path(library_base_path: &Path) -> PathBuf {
        library_base_path.join(".memelet").join("process.lock")
    }

    pub fn library_base_path(&self) -> &Path {
        self.repo.library_base_path()
    }

    /// Adds new memes, flags vanished ones. Never waits for the run lock.
    pub fn scan(&self) -> Result<ScanSummary> {
        let scanner = Scanner::build(self.repo.library_base_path(), &self.scan)?;
        ScanMemes::new(scanner, self.repo.clone(), self.reconciler.clone()).run()
    }

    /// Sends eligible memes to the analyzer, unless another run is active.
    pub fn process(&self, options: &ProcessOptions) -> Result<ProcessOutcome> {
        ProcessMemes::new(
            self.repo.clone(),
            self.lock.clone(),
            self.analyzer.clone(),
            self.reconciler.clone(),
            self.process.clone(),
        )
        .run(options)
    }

    pub fn reconcile_tags(&self, target: TagTarget) -> Result<ReconcileSummary> {
        ReconcileTags::new(self.repo.clone(), self.reconciler.clone()).run(target)
    }

    pub fn all(&self) -> Result<Vec<MemeItem>> {
        self.repo.all()
    }

    pub fn get(&self, meme_id: MemeId) -> Result<Option<MemeItem>> {
        self.repo.get(meme_id)
    }

    pub fn find_by_status(&self, status: Status) -> Result<Vec<MemeItem>> {
        self.repo.find_by_status(status)
    }

    pub fn stats(&self) -> Result<Stats> {
        self.repo.stats()
    }

    pub fn add_tag(&self, meme_id: MemeId, tag: &str) -> Result<Vec<Tag>> {
        let mut repo = self.repo.clone();
        repo.add_manual_tag(meme_id, tag)?;
        repo.tags(meme_id)
    }

    pub fn remove_tag(&self, meme_id: MemeId, tag: &str) -> Result<Vec<Tag>> {
        let mut repo = self.repo.clone();
        repo.remove_manual_tag(meme_id, tag)?;
        repo.tags(meme_id)
    }

    pub fn update_details(&self, meme_id: MemeId, details: &Details, status: Option<Status>) -> Result<()> {
        self.repo.clone().update_details(meme_id, details, status)
    }

    pub fn reorder_album(&self, meme_id: MemeId, order: &[PathBuf]) -> Result<()> {
        self.repo.clone().reorder_album(meme_id, order)
    }

    pub fn remove(&self, meme_id: MemeId) -> Result<()> {
        self.repo.clone().remove(meme_id)
    }
}
