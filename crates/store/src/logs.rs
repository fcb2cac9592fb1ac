// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only job log rows with cursor reads.

use crate::{Store, StoreError};
use appdock_core::{LogEntry, LogLevel};
use rusqlite::params;

impl Store {
    /// Append one log row; returns its dense monotonic id.
    pub fn append_log(
        &self,
        job_id: &str,
        level: LogLevel,
        message: &str,
        ts_ns: i64,
    ) -> Result<i64, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO job_logs (job_id, ts_ns, level, message) VALUES (?1, ?2, ?3, ?4)",
            params![job_id, ts_ns, level.as_str(), message],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Rows with id greater than `after_id`, in id order, plus the new
    /// cursor (max id seen, or `after_id` when nothing is new).
    pub fn logs_since(
        &self,
        job_id: &str,
        after_id: i64,
    ) -> Result<(Vec<LogEntry>, i64), StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, job_id, ts_ns, level, message FROM job_logs \
             WHERE job_id = ?1 AND id > ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![job_id, after_id], |row| {
            let level: String = row.get(3)?;
            Ok(LogEntry {
                id: row.get(0)?,
                job_id: row.get(1)?,
                ts_ns: row.get(2)?,
                level: LogLevel::parse(&level).unwrap_or(LogLevel::Info),
                message: row.get(4)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        let cursor = entries.last().map_or(after_id, |e| e.id);
        Ok((entries, cursor))
    }
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
