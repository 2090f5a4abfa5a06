// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::meme::repo::IndexEntry;
use crate::meme::{AlbumMember, Repository};
use crate::scanner::{ScanResult, ScannedMeme, Scanner};
use crate::tags::TagReconciler;

use anyhow::Result;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Counts from one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Memes found on disk.
    pub discovered: usize,

    /// Memes added to the database.
    pub new: usize,

    /// Memes flagged as missing from disk.
    pub removed: usize,

    /// Memes previously flagged as missing that are back.
    pub restored: usize,

    /// Files appended to existing albums.
    pub members_added: usize,

    /// Files dropped from albums because they are gone.
    pub members_removed: usize,

    /// Files left for a later scan because they look incomplete.
    pub skipped: usize,
}

/// Brings the database in line with what is on disk.
#[derive(Debug, Clone)]
pub struct ScanMemes {
    scanner: Scanner,
    repo: Repository,
    reconciler: TagReconciler,
}

impl ScanMemes {
    pub fn new(scanner: Scanner, repo: Repository, reconciler: TagReconciler) -> Self {
        Self {
            scanner,
            repo,
            reconciler,
        }
    }

    pub fn run(&self) -> Result<ScanSummary> {
        let start = std::time::Instant::now();

        info!("Scanning file system for memes...");
        let found = self.scanner.scan_all()?;

        let mut repo = self.repo.clone();
        let index = repo.index()?;
        let known: HashMap<&Path, &IndexEntry> =
            index.iter().map(|e| (e.path.as_path(), e)).collect();

        let mut summary = ScanSummary {
            discovered: found.discovered(),
            skipped: found.incomplete.len(),
            ..ScanSummary::default()
        };

        for scanned in &found.memes {
            match (scanned, known.get(scanned.path())) {
                (ScannedMeme::Single { path, media_type }, None) => {
                    let tags = self.reconciler.path_tags(path.parent().unwrap_or(Path::new("")));
                    if let Some(meme_id) = repo.add_single(path, *media_type, &tags)? {
                        debug!("Added meme {} at {:?}", meme_id, path);
                        summary.new += 1;
                    }
                }
                (ScannedMeme::Album { dir, members }, None) => {
                    if members.is_empty() {
                        continue;
                    }
                    let tags = self.reconciler.path_tags(dir);
                    if let Some(meme_id) = repo.add_album(dir, members, &tags)? {
                        debug!("Added album {} at {:?} with {} files", meme_id, dir, members.len());
                        summary.new += 1;
                    }
                }
                (ScannedMeme::Single { .. }, Some(entry)) if !entry.is_album => {
                    if entry.is_missing {
                        info!("Meme {} at {:?} is back", entry.meme_id, entry.path);
                        repo.set_missing(entry.meme_id, false)?;
                        summary.restored += 1;
                    }
                }
                (ScannedMeme::Album { members, .. }, Some(entry)) if entry.is_album => {
                    if entry.is_missing && !members.is_empty() {
                        info!("Album {} at {:?} is back", entry.meme_id, entry.path);
                        repo.set_missing(entry.meme_id, false)?;
                        summary.restored += 1;
                    }
                    let (added, removed) = self.update_members(&mut repo, entry, members, &found)?;
                    summary.members_added += added;
                    summary.members_removed += removed;
                }
                (scanned, Some(entry)) => {
                    warn!(
                        "Meme {} at {:?} changed between single file and album. Skipping.",
                        entry.meme_id,
                        scanned.path()
                    );
                }
            }
        }

        summary.removed = self.flag_missing(&mut repo, &index, &found)?;

        info!(
            "Scanned {} memes in {} seconds: {} new, {} removed, {} restored, {} skipped.",
            summary.discovered,
            start.elapsed().as_secs(),
            summary.new,
            summary.removed,
            summary.restored,
            summary.skipped
        );

        Ok(summary)
    }

    /// Appends new album files and drops album files that are gone.
    fn update_members(
        &self,
        repo: &mut Repository,
        entry: &IndexEntry,
        on_disk: &[AlbumMember],
        found: &ScanResult,
    ) -> Result<(usize, usize)> {
        let known: HashSet<&PathBuf> = entry.members.iter().collect();
        let present: HashSet<&PathBuf> = on_disk.iter().map(|m| &m.path).collect();

        let appended: Vec<AlbumMember> = on_disk
            .iter()
            .filter(|m| !known.contains(&m.path))
            .cloned()
            .collect();

        let gone: Vec<PathBuf> = entry
            .members
            .iter()
            .filter(|p| !present.contains(p) && !found.incomplete.contains(*p))
            .cloned()
            .collect();

        let added = if appended.is_empty() {
            0
        } else {
            info!("Appending {} files to album {}", appended.len(), entry.meme_id);
            repo.append_album_members(entry.meme_id, &appended)?
        };

        let removed = if gone.is_empty() {
            0
        } else {
            for path in &gone {
                warn!("Album {} file {:?} is gone. Dropping it from album.", entry.meme_id, path);
            }
            repo.remove_album_members(entry.meme_id, &gone)?
        };

        Ok((added, removed))
    }

    /// Flags memes not seen by this scan. The walk skips anything it failed to
    /// read, so each candidate is checked on disk before it is flagged, and only
    /// a definite "not found" flags it.
    fn flag_missing(&self, repo: &mut Repository, index: &[IndexEntry], found: &ScanResult) -> Result<usize> {
        let seen: HashSet<&Path> = found.memes.iter().map(|m| m.path()).collect();

        // A single file can become an album member when its directory is marked as an album.
        let album_files: HashSet<&Path> = found
            .memes
            .iter()
            .flat_map(|m| match m {
                ScannedMeme::Album { members, .. } => {
                    members.iter().map(|m| m.path.as_path()).collect::<Vec<_>>()
                }
                ScannedMeme::Single { .. } => vec![],
            })
            .collect();

        let candidates: Vec<&IndexEntry> = index
            .iter()
            .filter(|e| !e.is_missing)
            .filter(|e| !seen.contains(e.path.as_path()))
            .filter(|e| !found.incomplete.contains(&e.path))
            .collect();

        let base = self.repo.library_base_path();

        let gone: Vec<&IndexEntry> = candidates
            .into_par_iter()
            .filter(|e| {
                let full_path = base.join(&e.path);
                if e.is_album {
                    is_gone(&self.scanner.album_marker(&full_path))
                } else {
                    album_files.contains(e.path.as_path()) || is_gone(&full_path)
                }
            })
            .collect();

        for entry in &gone {
            info!("Meme {} at {:?} is no longer on disk", entry.meme_id, entry.path);
            repo.set_missing(entry.meme_id, true)?;
        }

        Ok(gone.len())
    }
}

/// True only if the file is certainly not there. Any other failure to stat
/// it is logged and the file is treated as present.
fn is_gone(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(metadata) => !metadata.is_file(),
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed checking {:?}, leaving it as is: {}", path, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use crate::meme::MediaType;
    use crate::settings::{ScanSettings, TagSettings};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn task(root: &Path) -> ScanMemes {
        let settings = ScanSettings {
            settle_time: Duration::ZERO,
            ..ScanSettings::default()
        };
        let con = database::setup_in_memory().unwrap();
        let repo = Repository::open(root, Arc::new(Mutex::new(con))).unwrap();
        let scanner = Scanner::build(root, &settings).unwrap();
        ScanMemes::new(scanner, repo, TagReconciler::new(&TagSettings::default()))
    }

    fn touch(root: &Path, path: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"not empty").unwrap();
    }

    #[test]
    fn second_scan_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "funny/cats/lol.jpg");
        touch(dir.path(), "funny/dance.gif");
        let task = task(dir.path());

        let first = task.run().unwrap();
        assert_eq!(2, first.discovered);
        assert_eq!(2, first.new);

        let second = task.run().unwrap();
        assert_eq!(
            ScanSummary {
                discovered: 2,
                ..ScanSummary::default()
            },
            second
        );
    }

    #[test]
    fn missing_file_is_flagged_and_restored() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "lol.jpg");
        let task = task(dir.path());
        task.run().unwrap();

        fs::rename(dir.path().join("lol.jpg"), dir.path().join("lol.bak")).unwrap();
        let summary = task.run().unwrap();
        assert_eq!(1, summary.removed);
        assert!(task.repo.all().unwrap()[0].is_missing);

        // Flagging is not repeated
        assert_eq!(0, task.run().unwrap().removed);

        fs::rename(dir.path().join("lol.bak"), dir.path().join("lol.jpg")).unwrap();
        let summary = task.run().unwrap();
        assert_eq!(1, summary.restored);
        assert_eq!(0, summary.new);
        assert!(!task.repo.all().unwrap()[0].is_missing);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn unreadable_file_is_not_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let task = task(dir.path());
        let mut repo = task.repo.clone();

        // A name too long to stat fails with something other than "not found".
        let unreadable = PathBuf::from(format!("{}.jpg", "x".repeat(300)));
        let unreadable = repo.add_single(&unreadable, MediaType::Image, &[]).unwrap().unwrap();
        let gone = repo.add_single(Path::new("gone.jpg"), MediaType::Image, &[]).unwrap().unwrap();

        let summary = task.run().unwrap();
        assert_eq!(1, summary.removed);
        assert!(!repo.get(unreadable).unwrap().unwrap().is_missing);
        assert!(repo.get(gone).unwrap().unwrap().is_missing);
    }

    #[test]
    fn unreadable_album_marker_is_not_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let task = task(dir.path());
        let mut repo = task.repo.clone();

        // The walk saw nothing here, but the directory can't be checked either.
        let long_dir = PathBuf::from("x".repeat(300));
        let member = AlbumMember {
            path: long_dir.join("1.png"),
            media_type: MediaType::Image,
        };
        let album = repo.add_album(&long_dir, &[member], &[]).unwrap().unwrap();

        assert_eq!(0, task.run().unwrap().removed);
        assert!(!repo.get(album).unwrap().unwrap().is_missing);
    }

    #[test]
    fn album_files_are_appended_and_dropped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "strip/.album");
        touch(dir.path(), "strip/1.png");
        touch(dir.path(), "strip/2.png");
        let task = task(dir.path());
        task.run().unwrap();

        touch(dir.path(), "strip/0.png");
        fs::remove_file(dir.path().join("strip/1.png")).unwrap();

        let summary = task.run().unwrap();
        assert_eq!(0, summary.new);
        assert_eq!(1, summary.members_added);
        assert_eq!(1, summary.members_removed);

        // New files go to the end of the album, whatever their name.
        let index = task.repo.index().unwrap();
        assert_eq!(1, index.len());
        assert_eq!(
            vec![PathBuf::from("strip/2.png"), PathBuf::from("strip/0.png")],
            index[0].members
        );
    }

    #[test]
    fn singles_become_missing_when_directory_becomes_album() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "strip/1.png");
        let task = task(dir.path());
        assert_eq!(1, task.run().unwrap().new);

        touch(dir.path(), "strip/.album");
        let summary = task.run().unwrap();
        assert_eq!(1, summary.new);
        assert_eq!(1, summary.removed);
    }

    #[test]
    fn path_tags_computed_on_insert() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Memes/Funny/cats/lol.jpg");
        let task = task(dir.path());
        task.run().unwrap();

        let item = task.repo.all().unwrap().pop().unwrap();
        assert_eq!(vec!["funny", "cats"], item.tag_names());
    }
}
