// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::meme::{MemeId, Repository};
use crate::tags::TagReconciler;
use crate::Error;

use anyhow::{bail, Result};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagTarget {
    One(MemeId),
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Memes whose tags were recomputed.
    pub reconciled: usize,

    /// Memes whose final tag set changed.
    pub changed: usize,
}

/// Recomputes path tags without calling the analyzer.
/// AI and manual tags are kept as they are.
#[derive(Debug, Clone)]
pub struct ReconcileTags {
    repo: Repository,
    reconciler: TagReconciler,
}

impl ReconcileTags {
    pub fn new(repo: Repository, reconciler: TagReconciler) -> Self {
        Self { repo, reconciler }
    }

    pub fn run(&self, target: TagTarget) -> Result<ReconcileSummary> {
        let mut repo = self.repo.clone();

        let items = match target {
            TagTarget::All => repo.all()?,
            TagTarget::One(meme_id) => match repo.get(meme_id)? {
                Some(item) => vec![item],
                None => bail!(Error::MemeNotFound(meme_id)),
            },
        };

        let mut summary = ReconcileSummary::default();

        for item in items {
            let path_tags = self.reconciler.path_tags(item.layout.tag_dir());
            let tags = repo.replace_path_tags(item.meme_id, &path_tags)?;
            summary.reconciled += 1;

            if tags != item.tags {
                debug!("Tags of meme {} changed", item.meme_id);
                summary.changed += 1;
            }
        }

        info!(
            "Reconciled tags of {} memes, {} changed",
            summary.reconciled, summary.changed
        );

        Ok(summary)
    }
}
