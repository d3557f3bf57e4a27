//! SQLite record store

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};

use super::schema::init_schema;
use crate::error::{CoreError, CoreResult};
use crate::records::{EncryptedPaper, EncryptedReviewer, PaperCiphertexts, ReviewerCiphertexts};
use crate::store::RecordStore;
use crate::types::{CiphertextHandle, PaperId, ReviewerId};

const PAPER_COLUMNS: &str = "id, title, abstract, keywords, discipline, submitted_at";
const REVIEWER_COLUMNS: &str =
    "id, expertise, affiliation, publication_count, review_count, added_at";

/// SQLite-backed record store
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open or create a database at the given path
    pub fn open(path: &str) -> CoreResult<Self> {
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(super) fn conn(&self) -> CoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Storage("sqlite connection lock poisoned".into()))
    }
}

pub(super) fn handle_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<CiphertextHandle> {
    let bytes: Vec<u8> = row.get(idx)?;
    let arr: [u8; 32] = bytes.try_into().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Blob,
            "ciphertext handle must be 32 bytes".into(),
        )
    })?;
    Ok(CiphertextHandle::from_bytes(arr))
}

fn paper_from_row(row: &Row<'_>) -> rusqlite::Result<EncryptedPaper> {
    Ok(EncryptedPaper {
        id: PaperId(row.get::<_, i64>(0)? as u64),
        ciphertexts: PaperCiphertexts {
            title: handle_at(row, 1)?,
            abstract_text: handle_at(row, 2)?,
            keywords: handle_at(row, 3)?,
            discipline: handle_at(row, 4)?,
        },
        submitted_at: row.get::<_, i64>(5)? as u64,
    })
}

fn reviewer_from_row(row: &Row<'_>) -> rusqlite::Result<EncryptedReviewer> {
    Ok(EncryptedReviewer {
        id: ReviewerId(row.get::<_, i64>(0)? as u64),
        ciphertexts: ReviewerCiphertexts {
            expertise: handle_at(row, 1)?,
            affiliation: handle_at(row, 2)?,
            publication_count: handle_at(row, 3)?,
            review_count: handle_at(row, 4)?,
        },
        added_at: row.get::<_, i64>(5)? as u64,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn submit_paper(
        &self,
        ciphertexts: PaperCiphertexts,
        submitted_at: u64,
    ) -> CoreResult<EncryptedPaper> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO papers (title, abstract, keywords, discipline, submitted_at) VALUES (?, ?, ?, ?, ?)",
            (
                ciphertexts.title.as_bytes().as_slice(),
                ciphertexts.abstract_text.as_bytes().as_slice(),
                ciphertexts.keywords.as_bytes().as_slice(),
                ciphertexts.discipline.as_bytes().as_slice(),
                submitted_at as i64,
            ),
        )?;

        Ok(EncryptedPaper {
            id: PaperId(conn.last_insert_rowid() as u64),
            ciphertexts,
            submitted_at,
        })
    }

    async fn add_reviewer(
        &self,
        ciphertexts: ReviewerCiphertexts,
        added_at: u64,
    ) -> CoreResult<EncryptedReviewer> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO reviewers (expertise, affiliation, publication_count, review_count, added_at) VALUES (?, ?, ?, ?, ?)",
            (
                ciphertexts.expertise.as_bytes().as_slice(),
                ciphertexts.affiliation.as_bytes().as_slice(),
                ciphertexts.publication_count.as_bytes().as_slice(),
                ciphertexts.review_count.as_bytes().as_slice(),
                added_at as i64,
            ),
        )?;

        Ok(EncryptedReviewer {
            id: ReviewerId(conn.last_insert_rowid() as u64),
            ciphertexts,
            added_at,
        })
    }

    async fn paper(&self, id: PaperId) -> CoreResult<Option<EncryptedPaper>> {
        let conn = self.conn()?;
        let paper = conn
            .query_row(
                &format!("SELECT {PAPER_COLUMNS} FROM papers WHERE id = ?"),
                [id.0 as i64],
                paper_from_row,
            )
            .optional()?;
        Ok(paper)
    }

    async fn reviewer(&self, id: ReviewerId) -> CoreResult<Option<EncryptedReviewer>> {
        let conn = self.conn()?;
        let reviewer = conn
            .query_row(
                &format!("SELECT {REVIEWER_COLUMNS} FROM reviewers WHERE id = ?"),
                [id.0 as i64],
                reviewer_from_row,
            )
            .optional()?;
        Ok(reviewer)
    }

    async fn reviewers(&self) -> CoreResult<Vec<EncryptedReviewer>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVIEWER_COLUMNS} FROM reviewers ORDER BY id ASC"
        ))?;
        let reviewers = stmt
            .query_map([], reviewer_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reviewers)
    }

    async fn paper_count(&self) -> CoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM papers", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    async fn reviewer_count(&self) -> CoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM reviewers", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
