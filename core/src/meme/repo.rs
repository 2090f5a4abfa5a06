// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use super::model::{
    AlbumMember, Details, ItemError, Layout, MediaType, MemeId, MemeItem, Stats, Status, Tag,
    TagSource,
};
use crate::ai::{Analysis, AnalysisFailure, FailureKind};
use crate::tags;
use crate::Error;
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Params, Row};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_MEMES: &str = "SELECT
        meme_id,
        meme_path,
        layout,
        media_type,
        status,
        description,
        ref_content,
        template,
        caption,
        meaning,
        error_kind,
        error_message,
        is_missing,
        processed_ts,
        created_ts,
        updated_ts
    FROM memes";

/// What the scanner needs to know about an existing meme.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub meme_id: MemeId,

    /// Path relative to library root.
    pub path: PathBuf,

    pub is_album: bool,

    pub is_missing: bool,

    /// Album members, in album order. Empty for single memes.
    pub members: Vec<PathBuf>,
}

/// Columns of a memes row before members and tags are attached.
struct MemeRow {
    meme_id: MemeId,
    path: PathBuf,
    layout: String,
    media_type: Option<MediaType>,
    status: Status,
    details: Details,
    error: Option<ItemError>,
    is_missing: bool,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Repository of memes.
/// Repository is backed by a Sqlite database. Every write is one statement or
/// one transaction, so readers never see a half-written meme.
#[derive(Debug, Clone)]
pub struct Repository {
    /// Base path to meme library on file system
    library_base_path: PathBuf,

    /// Connection to backing Sqlite database.
    con: Arc<Mutex<rusqlite::Connection>>,
}

impl Repository {
    pub fn open(library_base_path: &Path, con: Arc<Mutex<rusqlite::Connection>>) -> Result<Repository> {
        if !library_base_path.is_dir() {
            bail!(Error::LibraryRootMissing(PathBuf::from(library_base_path)));
        }

        let repo = Repository {
            library_base_path: PathBuf::from(library_base_path),
            con,
        };

        Ok(repo)
    }

    pub fn library_base_path(&self) -> &Path {
        &self.library_base_path
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.con
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    // Scanner operations

    /// Every meme path known to the repository.
    pub fn index(&self) -> Result<Vec<IndexEntry>> {
        let con = self.connection()?;

        let mut members: HashMap<i64, Vec<PathBuf>> = HashMap::new();
        {
            let mut stmt = con.prepare(
                "SELECT meme_id, member_path
                FROM album_members
                ORDER BY meme_id ASC, position ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                let meme_id: i64 = row.get(0)?;
                let path: String = row.get(1)?;
                Ok((meme_id, PathBuf::from(path)))
            })?;
            for row in rows {
                let (meme_id, path) = row?;
                members.entry(meme_id).or_default().push(path);
            }
        }

        let mut stmt = con.prepare(
            "SELECT meme_id, meme_path, layout, is_missing
            FROM memes
            ORDER BY meme_id ASC",
        )?;

        let entries = stmt
            .query_map([], |row| {
                let meme_id: i64 = row.get(0)?;
                let path: String = row.get(1)?;
                let layout: String = row.get(2)?;
                Ok(IndexEntry {
                    meme_id: MemeId::new(meme_id),
                    path: PathBuf::from(path),
                    is_album: layout == "album",
                    is_missing: row.get(3)?,
                    members: members.remove(&meme_id).unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Adds a single file meme with status new.
    /// Returns None if a meme with the same path already exists.
    pub fn add_single(
        &mut self,
        path: &Path,
        media_type: MediaType,
        path_tags: &[String],
    ) -> Result<Option<MemeId>> {
        let mut con = self.connection()?;
        let tx = con.transaction()?;

        let meme_id = {
            let now = Utc::now();
            let inserted = tx.execute(
                "INSERT INTO memes (
                    meme_path,
                    layout,
                    media_type,
                    status,
                    created_ts,
                    updated_ts
                ) VALUES (
                    ?1, 'single', ?2, 'new', ?3, ?3
                ) ON CONFLICT (meme_path) DO NOTHING",
                params![path_str(path)?, media_type.as_ref(), now],
            )?;

            if inserted == 0 {
                None
            } else {
                let meme_id = MemeId::new(tx.last_insert_rowid());
                replace_tags(&tx, meme_id, TagSource::Path, path_tags)?;
                Some(meme_id)
            }
        };

        tx.commit()?;
        Ok(meme_id)
    }

    /// Adds an album meme with status new and its members in the given order.
    /// Returns None if a meme with the same directory already exists.
    pub fn add_album(
        &mut self,
        dir: &Path,
        members: &[AlbumMember],
        path_tags: &[String],
    ) -> Result<Option<MemeId>> {
        let mut con = self.connection()?;
        let tx = con.transaction()?;

        let meme_id = {
            let now = Utc::now();
            let inserted = tx.execute(
                "INSERT INTO memes (
                    meme_path,
                    layout,
                    media_type,
                    status,
                    created_ts,
                    updated_ts
                ) VALUES (
                    ?1, 'album', NULL, 'new', ?2, ?2
                ) ON CONFLICT (meme_path) DO NOTHING",
                params![path_str(dir)?, now],
            )?;

            if inserted == 0 {
                None
            } else {
                let meme_id = MemeId::new(tx.last_insert_rowid());
                insert_members(&tx, meme_id, members, 0)?;
                replace_tags(&tx, meme_id, TagSource::Path, path_tags)?;
                Some(meme_id)
            }
        };

        tx.commit()?;
        Ok(meme_id)
    }

    /// Appends new files to the end of an album. Returns number of members added.
    pub fn append_album_members(&mut self, meme_id: MemeId, members: &[AlbumMember]) -> Result<usize> {
        let mut con = self.connection()?;
        let tx = con.transaction()?;

        let added = {
            let next_position: i64 = tx.query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM album_members WHERE meme_id = ?1",
                [meme_id.id()],
                |row| row.get(0),
            )?;
            let added = insert_members(&tx, meme_id, members, next_position)?;
            touch(&tx, meme_id)?;
            added
        };

        tx.commit()?;
        Ok(added)
    }

    /// Drops files from an album. Returns number of members removed.
    pub fn remove_album_members(&mut self, meme_id: MemeId, paths: &[PathBuf]) -> Result<usize> {
        let mut con = self.connection()?;
        let tx = con.transaction()?;

        let mut removed = 0;
        {
            let mut stmt = tx.prepare_cached(
                "DELETE FROM album_members WHERE meme_id = ?1 AND member_path = ?2",
            )?;
            for path in paths {
                removed += stmt.execute(params![meme_id.id(), path_str(path)?])?;
            }
        }
        touch(&tx, meme_id)?;

        tx.commit()?;
        Ok(removed)
    }

    /// Flags or clears a meme whose file or directory is no longer on disk.
    pub fn set_missing(&mut self, meme_id: MemeId, is_missing: bool) -> Result<()> {
        let con = self.connection()?;
        con.execute(
            "UPDATE memes
            SET
                is_missing = ?2,
                updated_ts = ?3
            WHERE meme_id = ?1",
            params![meme_id.id(), is_missing, Utc::now()],
        )?;
        Ok(())
    }

    // Read operations

    /// Gets all memes in the repository, oldest first.
    pub fn all(&self) -> Result<Vec<MemeItem>> {
        self.query_items("ORDER BY meme_id ASC", [])
    }

    pub fn get(&self, meme_id: MemeId) -> Result<Option<MemeItem>> {
        let mut items = self.query_items("WHERE meme_id = ?1", [meme_id.id()])?;
        Ok(items.pop())
    }

    pub fn find_by_status(&self, status: Status) -> Result<Vec<MemeItem>> {
        self.query_items("WHERE status = ?1 ORDER BY meme_id ASC", [status.as_ref()])
    }

    /// Memes eligible for processing, oldest first.
    /// Always includes new memes. Memes in error only when `include_errors` is set.
    /// Memes missing from disk are never eligible.
    pub fn find_processable(&self, include_errors: bool) -> Result<Vec<MemeItem>> {
        let statuses = if include_errors {
            status_list(&[Status::New, Status::Error])
        } else {
            status_list(&[Status::New])
        };
        let clause = format!(
            "WHERE is_missing = FALSE AND status IN ({}) ORDER BY meme_id ASC",
            statuses
        );
        self.query_items(&clause, [])
    }

    pub fn stats(&self) -> Result<Stats> {
        let con = self.connection()?;
        let mut stats = Stats::default();

        {
            let mut stmt = con.prepare("SELECT status, COUNT(*) FROM memes GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((status, count as usize))
            })?;

            for row in rows {
                let (status, count) = row?;
                stats.total += count;
                match Status::from_str(&status) {
                    Ok(Status::New) => stats.new = count,
                    Ok(Status::Processing) => stats.processing = count,
                    Ok(Status::Done) => stats.done = count,
                    Ok(Status::Error) => stats.error = count,
                    Err(_) => {}
                }
            }
        }

        let missing: i64 = con.query_row(
            "SELECT COUNT(*) FROM memes WHERE is_missing = TRUE",
            [],
            |row| row.get(0),
        )?;
        stats.missing = missing as usize;

        Ok(stats)
    }

    fn query_items<P: Params>(&self, clause: &str, params: P) -> Result<Vec<MemeItem>> {
        let con = self.connection()?;
        let sql = format!("{} {}", SELECT_MEMES, clause);

        let rows = {
            let mut stmt = con.prepare(&sql)?;
            let rows = stmt
                .query_map(params, |row| to_meme_row(row))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        rows.into_iter().map(|row| assemble(&con, row)).collect()
    }

    // Processing operations

    /// Any meme still processing belongs to a run that died. Puts them back to new.
    /// Must only be called while holding the run lock.
    pub fn recover_interrupted(&mut self) -> Result<usize> {
        let con = self.connection()?;
        let recovered = con.execute(
            "UPDATE memes
            SET
                status = 'new',
                updated_ts = ?1
            WHERE status = 'processing'",
            params![Utc::now()],
        )?;
        Ok(recovered)
    }

    /// Moves a meme to processing if it is currently in one of the `from` states
    /// and is not missing. Returns false if the meme was not claimed.
    pub fn claim(&mut self, meme_id: MemeId, from: &[Status]) -> Result<bool> {
        if from.is_empty() {
            return Ok(false);
        }

        let con = self.connection()?;
        let sql = format!(
            "UPDATE memes
            SET
                status = 'processing',
                updated_ts = ?2
            WHERE meme_id = ?1
            AND is_missing = FALSE
            AND status IN ({})",
            status_list(from)
        );
        let claimed = con.execute(&sql, params![meme_id.id(), Utc::now()])?;
        Ok(claimed == 1)
    }

    /// Saves a successful analysis. Replaces AI tags and refreshes path tags.
    /// Returns false if the meme was not processing.
    pub fn mark_done(&mut self, meme_id: MemeId, analysis: &Analysis, path_tags: &[String]) -> Result<bool> {
        let mut con = self.connection()?;
        let tx = con.transaction()?;

        let updated = {
            let now = Utc::now();
            let updated = tx.execute(
                "UPDATE memes
                SET
                    status = 'done',
                    description = ?2,
                    ref_content = ?3,
                    template = ?4,
                    caption = ?5,
                    meaning = ?6,
                    error_kind = NULL,
                    error_message = NULL,
                    processed_ts = ?7,
                    updated_ts = ?7
                WHERE meme_id = ?1 AND status = 'processing'",
                params![
                    meme_id.id(),
                    analysis.description,
                    analysis.references,
                    analysis.template,
                    analysis.caption,
                    analysis.meaning,
                    now,
                ],
            )?;

            if updated == 1 {
                replace_tags(&tx, meme_id, TagSource::Ai, &analysis.tags)?;
                replace_tags(&tx, meme_id, TagSource::Path, path_tags)?;
            }
            updated == 1
        };

        tx.commit()?;
        Ok(updated)
    }

    /// Saves a failed analysis. Returns false if the meme was not processing.
    /// Output of any earlier successful analysis is cleared. Manual edits are
    /// made after the fact with `update_details`.
    pub fn mark_error(&mut self, meme_id: MemeId, failure: &AnalysisFailure) -> Result<bool> {
        let mut con = self.connection()?;
        let tx = con.transaction()?;

        let updated = tx.execute(
            "UPDATE memes
            SET
                status = 'error',
                description = NULL,
                ref_content = NULL,
                template = NULL,
                caption = NULL,
                meaning = NULL,
                error_kind = ?2,
                error_message = ?3,
                processed_ts = NULL,
                updated_ts = ?4
            WHERE meme_id = ?1 AND status = 'processing'",
            params![
                meme_id.id(),
                failure.kind.as_ref(),
                failure.persisted_message(),
                Utc::now(),
            ],
        )?;

        if updated == 1 {
            replace_tags(&tx, meme_id, TagSource::Ai, &[])?;
        }

        tx.commit()?;
        Ok(updated == 1)
    }

    // Tag operations

    /// Final tag set of a meme.
    pub fn tags(&self, meme_id: MemeId) -> Result<Vec<Tag>> {
        let con = self.connection()?;
        load_tags(&con, meme_id)
    }

    /// Tags of a meme from one source, in stored order.
    pub fn source_tags(&self, meme_id: MemeId, source: TagSource) -> Result<Vec<String>> {
        let con = self.connection()?;
        let mut stmt = con.prepare(
            "SELECT tag FROM meme_tags
            WHERE meme_id = ?1 AND source = ?2
            ORDER BY position ASC",
        )?;
        let tags = stmt
            .query_map(params![meme_id.id(), source.as_ref()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(tags)
    }

    /// Replaces the path tags of a meme and returns the new final tag set.
    pub fn replace_path_tags(&mut self, meme_id: MemeId, path_tags: &[String]) -> Result<Vec<Tag>> {
        let mut con = self.connection()?;
        let tx = con.transaction()?;

        ensure_exists(&tx, meme_id)?;
        replace_tags(&tx, meme_id, TagSource::Path, path_tags)?;
        let tags = load_tags(&tx, meme_id)?;

        tx.commit()?;
        Ok(tags)
    }

    /// Adds a manual tag. Returns false if the meme already had it.
    pub fn add_manual_tag(&mut self, meme_id: MemeId, tag: &str) -> Result<bool> {
        let Some(tag) = tags::normalize(tag) else {
            bail!(Error::InvalidTag(tag.to_string()));
        };

        let mut con = self.connection()?;
        let tx = con.transaction()?;

        ensure_exists(&tx, meme_id)?;
        let added = tx.execute(
            "INSERT INTO meme_tags (meme_id, source, tag, tag_key, position)
            SELECT ?1, 'manual', ?2, ?3, COALESCE(MAX(position) + 1, 0)
            FROM meme_tags WHERE meme_id = ?1 AND source = 'manual'
            ON CONFLICT DO NOTHING",
            params![meme_id.id(), tag, tags::key(&tag)],
        )?;
        touch(&tx, meme_id)?;

        tx.commit()?;
        Ok(added == 1)
    }

    /// Removes a manual tag. Returns false if the meme didn't have it.
    pub fn remove_manual_tag(&mut self, meme_id: MemeId, tag: &str) -> Result<bool> {
        let con = self.connection()?;
        ensure_exists(&con, meme_id)?;
        let removed = con.execute(
            "DELETE FROM meme_tags WHERE meme_id = ?1 AND source = 'manual' AND tag_key = ?2",
            params![meme_id.id(), tags::key(tag.trim())],
        )?;
        Ok(removed == 1)
    }

    // Editing operations

    /// Saves hand edited details. A status other than error clears the error fields.
    pub fn update_details(&mut self, meme_id: MemeId, details: &Details, status: Option<Status>) -> Result<()> {
        if status == Some(Status::Processing) {
            bail!("status 'processing' is reserved for the process coordinator");
        }

        let mut con = self.connection()?;
        let tx = con.transaction()?;

        let updated = tx.execute(
            "UPDATE memes
            SET
                description = ?2,
                ref_content = ?3,
                template = ?4,
                caption = ?5,
                meaning = ?6,
                updated_ts = ?7
            WHERE meme_id = ?1",
            params![
                meme_id.id(),
                details.description,
                details.references,
                details.template,
                details.caption,
                details.meaning,
                Utc::now(),
            ],
        )?;

        if updated == 0 {
            bail!(Error::MemeNotFound(meme_id));
        }

        if let Some(status) = status {
            tx.execute(
                "UPDATE memes
                SET
                    status = ?2,
                    error_kind = CASE WHEN ?2 = 'error' THEN error_kind ELSE NULL END,
                    error_message = CASE WHEN ?2 = 'error' THEN error_message ELSE NULL END
                WHERE meme_id = ?1",
                params![meme_id.id(), status.as_ref()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Persists a new album order. `order` must list each current member exactly once.
    pub fn reorder_album(&mut self, meme_id: MemeId, order: &[PathBuf]) -> Result<()> {
        let mut con = self.connection()?;
        let tx = con.transaction()?;

        let layout: Option<String> = tx
            .query_row(
                "SELECT layout FROM memes WHERE meme_id = ?1",
                [meme_id.id()],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(e),
            })?;

        match layout.as_deref() {
            None => bail!(Error::MemeNotFound(meme_id)),
            Some("album") => {}
            Some(_) => bail!(Error::NotAnAlbum(meme_id)),
        }

        let current: HashSet<PathBuf> = load_members(&tx, meme_id)?
            .into_iter()
            .map(|m| m.path)
            .collect();
        let requested: HashSet<PathBuf> = order.iter().cloned().collect();

        if order.len() != current.len() || requested != current {
            bail!(Error::InvalidAlbumOrder(meme_id));
        }

        {
            let mut stmt = tx.prepare_cached(
                "UPDATE album_members SET position = ?3 WHERE meme_id = ?1 AND member_path = ?2",
            )?;
            for (position, path) in order.iter().enumerate() {
                stmt.execute(params![meme_id.id(), path_str(path)?, position as i64])?;
            }
        }
        touch(&tx, meme_id)?;

        tx.commit()?;
        Ok(())
    }

    /// Deletes a meme with its album members and tags.
    pub fn remove(&mut self, meme_id: MemeId) -> Result<()> {
        let con = self.connection()?;
        let removed = con.execute("DELETE FROM memes WHERE meme_id = ?1", [meme_id.id()])?;
        if removed == 0 {
            bail!(Error::MemeNotFound(meme_id));
        }
        Ok(())
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("path {:?} is not valid UTF-8", path))
}

/// SQL list of status literals. Statuses are a closed set, so this is safe to inline.
fn status_list(statuses: &[Status]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_ref()))
        .join(", ")
}

fn parse_text<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let idx = row.as_ref().column_index(column)?;
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_meme_row(row: &Row<'_>) -> rusqlite::Result<MemeRow> {
    let path: String = row.get("meme_path")?;

    let media_type = match row.get::<_, Option<String>>("media_type")? {
        Some(_) => Some(parse_text::<MediaType>(row, "media_type")?),
        None => None,
    };

    let error_message: Option<String> = row.get("error_message")?;
    let error = match (row.get::<_, Option<String>>("error_kind")?, error_message) {
        (Some(kind), Some(message)) => Some(ItemError {
            kind: FailureKind::from_str(&kind).unwrap_or(FailureKind::Internal),
            message,
        }),
        _ => None,
    };

    std::result::Result::Ok(MemeRow {
        meme_id: MemeId::new(row.get("meme_id")?),
        path: PathBuf::from(path),
        layout: row.get("layout")?,
        media_type,
        status: parse_text(row, "status")?,
        details: Details {
            description: row.get("description")?,
            references: row.get("ref_content")?,
            template: row.get("template")?,
            caption: row.get("caption")?,
            meaning: row.get("meaning")?,
        },
        error,
        is_missing: row.get("is_missing")?,
        processed_at: row.get("processed_ts")?,
        created_at: row.get("created_ts")?,
        updated_at: row.get("updated_ts")?,
    })
}

fn assemble(con: &Connection, row: MemeRow) -> Result<MemeItem> {
    let layout = if row.layout == "album" {
        Layout::Album {
            dir: row.path,
            members: load_members(con, row.meme_id)?,
        }
    } else {
        let media_type = row
            .media_type
            .ok_or_else(|| anyhow!("single meme {} has no media type", row.meme_id))?;
        Layout::Single {
            path: row.path,
            media_type,
        }
    };

    Ok(MemeItem {
        meme_id: row.meme_id,
        layout,
        status: row.status,
        details: row.details,
        error: row.error,
        tags: load_tags(con, row.meme_id)?,
        is_missing: row.is_missing,
        processed_at: row.processed_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn load_members(con: &Connection, meme_id: MemeId) -> Result<Vec<AlbumMember>> {
    let mut stmt = con.prepare_cached(
        "SELECT member_path, media_type
        FROM album_members
        WHERE meme_id = ?1
        ORDER BY position ASC",
    )?;

    let members = stmt
        .query_map([meme_id.id()], |row| {
            let path: String = row.get("member_path")?;
            Ok(AlbumMember {
                path: PathBuf::from(path),
                media_type: parse_text(row, "media_type")?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(members)
}

/// Final tag set: path tags, then AI tags, then manual tags, merged case-insensitively.
fn load_tags(con: &Connection, meme_id: MemeId) -> Result<Vec<Tag>> {
    let mut stmt = con.prepare_cached(
        "SELECT source, tag
        FROM meme_tags
        WHERE meme_id = ?1
        ORDER BY
            CASE source WHEN 'path' THEN 0 WHEN 'ai' THEN 1 ELSE 2 END,
            position ASC",
    )?;

    let all = stmt
        .query_map([meme_id.id()], |row| {
            Ok(Tag {
                source: parse_text(row, "source")?,
                name: row.get("tag")?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(tags::merge(all))
}

fn replace_tags(con: &Connection, meme_id: MemeId, source: TagSource, tags: &[String]) -> Result<()> {
    con.execute(
        "DELETE FROM meme_tags WHERE meme_id = ?1 AND source = ?2",
        params![meme_id.id(), source.as_ref()],
    )?;

    let mut stmt = con.prepare_cached(
        "INSERT INTO meme_tags (meme_id, source, tag, tag_key, position)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT DO NOTHING",
    )?;

    for (position, tag) in tags.iter().filter_map(|t| tags::normalize(t)).enumerate() {
        stmt.execute(params![
            meme_id.id(),
            source.as_ref(),
            tag,
            tags::key(&tag),
            position as i64,
        ])?;
    }

    Ok(())
}

fn insert_members(con: &Connection, meme_id: MemeId, members: &[AlbumMember], first_position: i64) -> Result<usize> {
    let mut stmt = con.prepare_cached(
        "INSERT INTO album_members (meme_id, member_path, media_type, position)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT DO NOTHING",
    )?;

    let mut added = 0;
    for member in members {
        let position = first_position + added as i64;
        added += stmt.execute(params![
            meme_id.id(),
            path_str(&member.path)?,
            member.media_type.as_ref(),
            position,
        ])?;
    }

    Ok(added)
}

fn ensure_exists(con: &Connection, meme_id: MemeId) -> Result<()> {
    let count: i64 = con.query_row(
        "SELECT COUNT(*) FROM memes WHERE meme_id = ?1",
        [meme_id.id()],
        |row| row.get(0),
    )?;
    if count == 0 {
        bail!(Error::MemeNotFound(meme_id));
    }
    Ok(())
}

fn touch(con: &Connection, meme_id: MemeId) -> Result<()> {
    con.execute(
        "UPDATE memes SET updated_ts = ?2 WHERE meme_id = ?1",
        params![meme_id.id(), Utc::now()],
    )?;
    Ok(())
}
