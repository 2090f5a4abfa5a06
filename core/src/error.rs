// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::meme::MemeId;
use std::path::PathBuf;
use thiserror::Error;

/// Bespoke errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Library root {0:?} is not a directory")]
    LibraryRootMissing(PathBuf),

    #[error("Meme {0} not found")]
    MemeNotFound(MemeId),

    #[error("Meme {0} is not an album")]
    NotAnAlbum(MemeId),

    #[error("New order for album {0} must list every current member exactly once")]
    InvalidAlbumOrder(MemeId),

    #[error("Invalid tag {0:?}")]
    InvalidTag(String),
}
