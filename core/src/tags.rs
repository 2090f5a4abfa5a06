// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::meme::Tag;
use crate::settings::TagSettings;
use itertools::Itertools;
use std::collections::HashSet;
use std::path::{Component, Path};

/// Derives tags from directory structure and merges tags from all sources.
#[derive(Debug, Clone)]
pub struct TagReconciler {
    /// Lower case directory names to ignore.
    stopwords: HashSet<String>,
}

impl TagReconciler {
    pub fn new(settings: &TagSettings) -> Self {
        let stopwords = settings
            .stopwords
            .iter()
            .filter_map(|s| normalize(s))
            .map(|s| key(&s))
            .collect();
        Self { stopwords }
    }

    /// Each directory below the library root becomes a lower case tag.
    /// `dir` must be relative to the library root.
    pub fn path_tags(&self, dir: &Path) -> Vec<String> {
        dir.components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy()),
                _ => None,
            })
            .filter_map(|name| normalize(&name))
            .map(|name| name.to_lowercase())
            .filter(|name| !self.stopwords.contains(name))
            .unique()
            .collect()
    }
}

/// Merges tags, keeping the first occurrence of each tag when compared case-insensitively.
/// Callers pass path tags first, then AI tags, then manual tags.
pub fn merge(tags: impl IntoIterator<Item = Tag>) -> Vec<Tag> {
    tags.into_iter().unique_by(|t| key(&t.name)).collect()
}

/// Trims and collapses inner whitespace. None if nothing is left.
pub fn normalize(tag: &str) -> Option<String> {
    let tag = tag.split_whitespace().join(" ");
    if tag.is_empty() { None } else { Some(tag) }
}

/// Case-insensitive identity of a tag.
pub fn key(tag: &str) -> String {
    tag.to_lowercase()
}
