// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::*;
use rusqlite::Connection;
use std::path;
use std::time::Duration;

// Embed migration SQL in executable.
refinery::embed_migrations!("migrations");

/// How long a writer waits for another process (scanner or coordinator) to
/// release the database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub fn setup(database_path: &path::Path) -> Result<Connection> {
    let mut con = Connection::open(database_path)
        .with_context(|| format!("open database {:?}", database_path))?;
    con.busy_timeout(BUSY_TIMEOUT)?;
    con.pragma_update_and_check(None, "journal_mode", "WAL", |_| std::result::Result::Ok(()))?;
    con.pragma_update(None, "foreign_keys", true)?;
    migrations::runner().run(&mut con)?;
    Ok(con)
}

// for testing
pub fn setup_in_memory() -> Result<Connection> {
    let mut con = Connection::open_in_memory()?;
    con.pragma_update(None, "foreign_keys", true)?;
    migrations::runner().run(&mut con)?;
    Ok(con)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_create_tables() {
        let con = setup_in_memory().unwrap();
        let count: i64 = con
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                WHERE type = 'table' AND name IN ('memes', 'album_members', 'meme_tags')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(3, count);
    }

    #[test]
    fn setup_file_database_twice() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("memelet.db");
        drop(setup(&db_path).unwrap());

        // Migrations already applied, so re-opening must not fail.
        let con = setup(&db_path).unwrap();
        let fk: bool = con
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(fk);
    }
}
