//! SQLite protocol ledger, sharing the record store's connection

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use super::records::{SqliteRecordStore, handle_at};
use crate::error::CoreResult;
use crate::pending::{PendingEntry, PendingRequest};
use crate::records::MatchResult;
use crate::store::{LedgerSnapshot, LedgerStore};
use crate::types::{PaperId, RequestId, ReviewerId};

const MATCH_COLUMNS: &str = "paper_id, reviewer_id, score, revealed, acknowledged, computed_at, revealed_at, disclosed_score";

fn match_from_row(row: &Row<'_>) -> rusqlite::Result<MatchResult> {
    Ok(MatchResult {
        paper_id: PaperId(row.get::<_, i64>(0)? as u64),
        reviewer_id: ReviewerId(row.get::<_, i64>(1)? as u64),
        score: handle_at(row, 2)?,
        revealed: row.get(3)?,
        acknowledged: row.get(4)?,
        computed_at: row.get::<_, i64>(5)? as u64,
        revealed_at: row.get::<_, Option<i64>>(6)?.map(|t| t as u64),
        disclosed_score: row.get(7)?,
    })
}

fn pending_from_row(row: &Row<'_>) -> rusqlite::Result<(RequestId, PendingEntry)> {
    let request_id = RequestId(row.get::<_, i64>(0)? as u64);
    let kind: String = row.get(1)?;
    let paper_id = PaperId(row.get::<_, i64>(2)? as u64);
    let request = match kind.as_str() {
        "matching" => PendingRequest::Matching(paper_id),
        "reveal" => PendingRequest::Reveal(paper_id),
        other => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                1,
                Type::Text,
                format!("unknown request kind '{other}'").into(),
            ));
        }
    };
    let issued_at = row.get::<_, i64>(3)? as u64;
    Ok((request_id, PendingEntry { request, issued_at }))
}

fn kind_of(request: PendingRequest) -> &'static str {
    match request {
        PendingRequest::Matching(_) => "matching",
        PendingRequest::Reveal(_) => "reveal",
    }
}

fn upsert_match(conn: &Connection, result: &MatchResult) -> rusqlite::Result<()> {
    conn.execute(
        &format!("INSERT OR REPLACE INTO matches ({MATCH_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"),
        (
            result.paper_id.0 as i64,
            result.reviewer_id.0 as i64,
            result.score.as_bytes().as_slice(),
            result.revealed,
            result.acknowledged,
            result.computed_at as i64,
            result.revealed_at.map(|t| t as i64),
            result.disclosed_score.as_deref(),
        ),
    )?;
    Ok(())
}

#[async_trait]
impl LedgerStore for SqliteRecordStore {
    async fn load(&self) -> CoreResult<LedgerSnapshot> {
        let conn = self.conn()?;

        let matches = conn
            .prepare(&format!("SELECT {MATCH_COLUMNS} FROM matches ORDER BY paper_id ASC"))?
            .query_map([], match_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let pending = conn
            .prepare(
                "SELECT request_id, kind, paper_id, issued_at FROM pending_requests ORDER BY request_id ASC",
            )?
            .query_map([], pending_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let retired = conn
            .prepare("SELECT request_id FROM retired_requests ORDER BY request_id ASC")?
            .query_map([], |row| Ok(RequestId(row.get::<_, i64>(0)? as u64)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(LedgerSnapshot {
            matches,
            pending,
            retired,
        })
    }

    async fn record_pending(&self, request_id: RequestId, entry: PendingEntry) -> CoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO pending_requests (request_id, kind, paper_id, issued_at) VALUES (?, ?, ?, ?)",
            (
                request_id.0 as i64,
                kind_of(entry.request),
                entry.request.paper_id().0 as i64,
                entry.issued_at as i64,
            ),
        )?;
        Ok(())
    }

    async fn retire(
        &self,
        request_id: RequestId,
        result: Option<&MatchResult>,
    ) -> CoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM pending_requests WHERE request_id = ?",
            [request_id.0 as i64],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO retired_requests (request_id) VALUES (?)",
            [request_id.0 as i64],
        )?;
        if let Some(result) = result {
            upsert_match(&tx, result)?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn save_match(&self, result: &MatchResult) -> CoreResult<()> {
        let conn = self.conn()?;
        upsert_match(&conn, result)?;
        Ok(())
    }
}
