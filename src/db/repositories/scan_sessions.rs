use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{
        parse_credit_status, parse_credit_type, parse_datetime, parse_kind, parse_optional_datetime,
        parse_outcome, parse_phase, to_u32,
    },
    Database,
};
use crate::models::ScanSessionRecord;

const SESSION_COLUMNS: &str = "request_id, user_id, mode, phase, credit_status, credit_type,
     credits_count, image_count, result_count, outcome, error, started_at, ended_at, updated_at";

fn row_to_record(row: &Row) -> Result<ScanSessionRecord> {
    let mode: String = row.get("mode")?;
    let phase: String = row.get("phase")?;
    let credit_status: String = row.get("credit_status")?;
    let credit_type: Option<String> = row.get("credit_type")?;
    let credits_count: i64 = row.get("credits_count")?;
    let image_count: i64 = row.get("image_count")?;
    let result_count: i64 = row.get("result_count")?;
    let outcome: String = row.get("outcome")?;
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(ScanSessionRecord {
        request_id: row.get("request_id")?,
        user_id: row.get("user_id")?,
        mode: parse_kind(&mode)?,
        phase: parse_phase(&phase)?,
        credit_status: parse_credit_status(&credit_status)?,
        credit_type: parse_credit_type(credit_type)?,
        credits_count: to_u32(credits_count, "credits_count")?,
        image_count: to_u32(image_count, "image_count")?,
        result_count: to_u32(result_count, "result_count")?,
        outcome: parse_outcome(&outcome)?,
        error: row.get("error")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    /// Inserts or refreshes the history row for a session.
    pub async fn upsert_scan_session(&self, record: &ScanSessionRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO scan_sessions (request_id, user_id, mode, phase, credit_status, credit_type,
                     credits_count, image_count, result_count, outcome, error, started_at, ended_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(request_id) DO UPDATE SET
                     phase = excluded.phase,
                     credit_status = excluded.credit_status,
                     credit_type = excluded.credit_type,
                     credits_count = excluded.credits_count,
                     image_count = excluded.image_count,
                     result_count = excluded.result_count,
                     outcome = CASE scan_sessions.outcome
                         WHEN 'Interrupted' THEN scan_sessions.outcome
                         ELSE excluded.outcome
                     END,
                     error = COALESCE(excluded.error, scan_sessions.error),
                     ended_at = COALESCE(scan_sessions.ended_at, excluded.ended_at),
                     updated_at = excluded.updated_at",
                params![
                    record.request_id,
                    record.user_id,
                    record.mode.as_str(),
                    record.phase.as_str(),
                    record.credit_status.as_str(),
                    record.credit_type.map(|credit_type| credit_type.as_str()),
                    record.credits_count,
                    record.image_count,
                    record.result_count,
                    record.outcome.as_str(),
                    record.error,
                    record.started_at.to_rfc3339(),
                    record.ended_at.map(|dt| dt.to_rfc3339()),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to upsert scan session")?;
            Ok(())
        })
        .await
    }

    pub async fn get_scan_session(&self, request_id: &str) -> Result<Option<ScanSessionRecord>> {
        let request_id = request_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM scan_sessions WHERE request_id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![request_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_record(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Most recent sessions for a user, newest first.
    pub async fn list_scan_sessions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ScanSessionRecord>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM scan_sessions
                 WHERE user_id = ?1
                 ORDER BY started_at DESC
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![user_id, limit])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }

    /// Whether the history row for `request_id` is still open.
    pub async fn has_active_scan_session(&self, request_id: &str) -> Result<bool> {
        let request_id = request_id.to_string();
        self.execute(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM scan_sessions WHERE request_id = ?1 AND outcome = 'Active'",
                    params![request_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }
}
