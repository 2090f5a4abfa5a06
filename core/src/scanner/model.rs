// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::meme::{AlbumMember, MediaType};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A meme found on disk. Paths are relative to the library root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannedMeme {
    Single { path: PathBuf, media_type: MediaType },

    /// Members in file name order. May be empty if the album directory
    /// has no complete media files yet.
    Album { dir: PathBuf, members: Vec<AlbumMember> },
}

impl ScannedMeme {
    pub fn path(&self) -> &Path {
        match self {
            ScannedMeme::Single { path, .. } => path,
            ScannedMeme::Album { dir, .. } => dir,
        }
    }
}

/// Everything one walk of the library found.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub memes: Vec<ScannedMeme>,

    /// Media files that look like they are still being written.
    /// Relative to the library root.
    pub incomplete: HashSet<PathBuf>,
}

impl ScanResult {
    /// Number of memes with at least one file.
    pub fn discovered(&self) -> usize {
        self.memes
            .iter()
            .filter(|m| match m {
                ScannedMeme::Single { .. } => true,
                ScannedMeme::Album { members, .. } => !members.is_empty(),
            })
            .count()
    }
}
