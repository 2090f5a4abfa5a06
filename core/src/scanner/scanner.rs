// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use super::{ScanResult, ScannedMeme};
use crate::file_types;
use crate::meme::AlbumMember;
use crate::settings::ScanSettings;
use crate::Error;

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, warn};
use walkdir::{DirEntry, WalkDir};

/// Scans a file system for memes.
#[derive(Debug, Clone)]
pub struct Scanner {
    /// File system path to scan.
    scan_base: PathBuf,

    /// Absolute paths of directories never scanned.
    skip_dirs: Vec<PathBuf>,

    /// Marker file name identifying album directories.
    album_marker: String,

    settle_time: Duration,
}

impl Scanner {
    pub fn build(scan_base: &Path, settings: &ScanSettings) -> Result<Self> {
        if !scan_base.is_dir() {
            bail!(Error::LibraryRootMissing(PathBuf::from(scan_base)));
        }

        let skip_dirs = settings
            .skip_dirs
            .iter()
            .map(|dir| scan_base.join(dir))
            .collect();

        Ok(Self {
            scan_base: PathBuf::from(scan_base),
            skip_dirs,
            album_marker: settings.album_marker.clone(),
            settle_time: settings.settle_time,
        })
    }

    /// Walks the whole library. Entries that can't be read are logged and skipped.
    pub fn scan_all(&self) -> Result<ScanResult> {
        if !self.scan_base.is_dir() {
            bail!(Error::LibraryRootMissing(self.scan_base.clone()));
        }

        let mut result = ScanResult::default();

        // Album directory to members. Ordered so albums come out in path order.
        let mut albums: BTreeMap<PathBuf, Vec<AlbumMember>> = BTreeMap::new();

        let now = SystemTime::now();

        WalkDir::new(&self.scan_base)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !(Scanner::is_hidden(e) || self.is_skipped(e)))
            .inspect(|x| {
                let _ = x
                    .as_ref()
                    .inspect_err(|e| error!("Failed walking: {:?}", e));
            })
            .flatten() // skip files we failed to read
            .filter(|x| x.depth() > 0)
            .for_each(|entry| {
                let Some(relative) = self.relative_path(entry.path()) else {
                    return;
                };

                if entry.file_type().is_dir() {
                    if self.is_album(entry.path()) {
                        albums.entry(relative).or_default();
                    }
                    return;
                }

                if !entry.file_type().is_file() {
                    return;
                }

                // only process supported media types
                let Some(media_type) = file_types::media_type(entry.path()) else {
                    return;
                };

                if !self.is_complete(&entry, now) {
                    debug!("Skipping incomplete file {:?}", relative);
                    result.incomplete.insert(relative);
                    return;
                }

                let album_dir = relative
                    .parent()
                    .filter(|dir| albums.contains_key(*dir))
                    .map(PathBuf::from);

                match album_dir {
                    Some(dir) => albums.entry(dir).or_default().push(AlbumMember {
                        path: relative,
                        media_type,
                    }),
                    None => result.memes.push(ScannedMeme::Single {
                        path: relative,
                        media_type,
                    }),
                }
            });

        result.memes.extend(
            albums
                .into_iter()
                .map(|(dir, members)| ScannedMeme::Album { dir, members }),
        );

        Ok(result)
    }

    /// Does this directory hold the album marker?
    pub fn is_album(&self, dir: &Path) -> bool {
        self.album_marker(dir).is_file()
    }

    pub fn album_marker(&self, dir: &Path) -> PathBuf {
        dir.join(&self.album_marker)
    }

    fn is_hidden(entry: &DirEntry) -> bool {
        entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with("."))
            .unwrap_or(false)
    }

    fn is_skipped(&self, entry: &DirEntry) -> bool {
        entry.file_type().is_dir() && self.skip_dirs.iter().any(|dir| dir == entry.path())
    }

    /// Zero sized or recently modified files are probably still being copied in.
    fn is_complete(&self, entry: &DirEntry, now: SystemTime) -> bool {
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Failed reading metadata of {:?}: {}", entry.path(), e);
                return false;
            }
        };

        if metadata.len() == 0 {
            return false;
        }

        if self.settle_time.is_zero() {
            return true;
        }

        metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .map(|age| age >= self.settle_time)
            .unwrap_or(true) // modified in the future or unsupported, so can't tell
    }

    fn relative_path(&self, path: &Path) -> Option<PathBuf> {
        let relative = path.strip_prefix(&self.scan_base).ok()?;
        if relative.to_str().is_none() {
            warn!("Skipping path that is not valid UTF-8: {:?}", path);
            return None;
        }
        Some(PathBuf::from(relative))
    }
}
