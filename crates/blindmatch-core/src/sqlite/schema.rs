//! SQLite schema definitions

use crate::error::CoreResult;
use rusqlite::Connection;

pub const SCHEMA_VERSION: u32 = 2;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> CoreResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- AUTOINCREMENT never reuses a key, so rowids are the paper ids
        CREATE TABLE IF NOT EXISTS papers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title BLOB NOT NULL,                   -- 32 byte handles
            abstract BLOB NOT NULL,
            keywords BLOB NOT NULL,
            discipline BLOB NOT NULL,
            submitted_at INTEGER NOT NULL          -- Unix timestamp
        );

        CREATE TABLE IF NOT EXISTS reviewers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            expertise BLOB NOT NULL,
            affiliation BLOB NOT NULL,
            publication_count BLOB NOT NULL,
            review_count BLOB NOT NULL,
            added_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS matches (
            paper_id INTEGER PRIMARY KEY,
            reviewer_id INTEGER NOT NULL,
            score BLOB NOT NULL,
            revealed INTEGER NOT NULL DEFAULT 0,
            acknowledged INTEGER NOT NULL DEFAULT 0,
            computed_at INTEGER NOT NULL,
            revealed_at INTEGER,
            disclosed_score BLOB
        );

        CREATE TABLE IF NOT EXISTS pending_requests (
            request_id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL,                    -- 'matching' or 'reveal'
            paper_id INTEGER NOT NULL,
            issued_at INTEGER NOT NULL
        );

        -- Ids that must never be accepted again
        CREATE TABLE IF NOT EXISTS retired_requests (
            request_id INTEGER PRIMARY KEY
        );
    "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_version (version) VALUES (?)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}

/// Check schema version
pub fn check_version(conn: &Connection) -> CoreResult<u32> {
    let version: u32 = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);
    Ok(version)
}
