// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::ai::FailureKind;
use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use strum::{AsRefStr, EnumIter, EnumString};

/// Database ID of meme
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemeId(i64);

impl MemeId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> i64 {
        self.0
    }
}

impl Display for MemeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of media file, inferred from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum MediaType {
    Image,
    Gif,
    Video,
}

/// Processing state of a meme.
///
/// new -> processing -> done | error, and error -> processing only when
/// a retry is explicitly requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    New,
    Processing,
    Done,
    Error,
}

/// Where a tag came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum TagSource {
    /// Derived from directory names below the library root.
    Path,

    /// Suggested by the AI model.
    Ai,

    /// Added by the operator.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub source: TagSource,
}

impl Tag {
    pub fn new(name: impl Into<String>, source: TagSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

/// A child file of an album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumMember {
    /// Path relative to library root.
    pub path: PathBuf,

    pub media_type: MediaType,
}

/// What a meme is made of on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// One media file.
    Single { path: PathBuf, media_type: MediaType },

    /// A directory of media files catalogued as one unit. Members are in album order.
    Album {
        dir: PathBuf,
        members: Vec<AlbumMember>,
    },
}

impl Layout {
    /// Path relative to library root that identifies the meme.
    pub fn path(&self) -> &Path {
        match self {
            Layout::Single { path, .. } => path,
            Layout::Album { dir, .. } => dir,
        }
    }

    /// Directory holding the media, relative to library root.
    /// Path tags are derived from this.
    pub fn tag_dir(&self) -> &Path {
        match self {
            Layout::Single { path, .. } => path.parent().unwrap_or(Path::new("")),
            Layout::Album { dir, .. } => dir,
        }
    }

    pub fn is_album(&self) -> bool {
        matches!(self, Layout::Album { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Layout::Single { .. } => "single",
            Layout::Album { .. } => "album",
        }
    }
}

/// Free text fields describing a meme. Filled by the AI model or edited by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Details {
    pub description: Option<String>,

    /// Famous people or characters from movies, shows and games.
    pub references: Option<String>,

    /// Established meme template, such as 'Wojak'.
    pub template: Option<String>,

    /// Captions in their original language.
    pub caption: Option<String>,

    pub meaning: Option<String>,
}

/// Why the last processing attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub kind: FailureKind,
    pub message: String,
}

/// A meme in the repository
#[derive(Debug, Clone)]
pub struct MemeItem {
    /// Database primary key for meme
    pub meme_id: MemeId,

    pub layout: Layout,

    pub status: Status,

    pub details: Details,

    /// Set only when status is error.
    pub error: Option<ItemError>,

    /// Final tag set: path, AI and manual tags merged case-insensitively.
    pub tags: Vec<Tag>,

    /// File or directory was not found by the last scan.
    pub is_missing: bool,

    pub processed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl MemeItem {
    pub fn path(&self) -> &Path {
        self.layout.path()
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn file_name(&self) -> Option<String> {
        self.path()
            .file_name()
            .map(|x| x.to_string_lossy().to_string())
    }
}

/// Count of memes per status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub new: usize,
    pub processing: usize,
    pub done: usize,
    pub error: usize,
    pub missing: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_names() {
        assert_eq!("processing", Status::Processing.as_ref());
        assert_eq!(Status::Error, Status::from_str("error").unwrap());
        assert!(Status::from_str("pending").is_err());
    }

    #[test]
    fn tag_dir_of_single_is_parent() {
        let layout = Layout::Single {
            path: PathBuf::from("funny/cats/lol.jpg"),
            media_type: MediaType::Image,
        };
        assert_eq!(Path::new("funny/cats"), layout.tag_dir());
        assert_eq!(Path::new("funny/cats/lol.jpg"), layout.path());
    }

    #[test]
    fn tag_dir_of_top_level_single_is_empty() {
        let layout = Layout::Single {
            path: PathBuf::from("lol.jpg"),
            media_type: MediaType::Image,
        };
        assert_eq!(Path::new(""), layout.tag_dir());
    }

    #[test]
    fn tag_dir_of_album_is_album_dir() {
        let layout = Layout::Album {
            dir: PathBuf::from("comics/saga"),
            members: vec![],
        };
        assert_eq!(Path::new("comics/saga"), layout.tag_dir());
        assert!(layout.is_album());
    }
}
