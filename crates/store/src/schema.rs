// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema creation and forward-compatible migrations.

use crate::StoreError;
use rusqlite::Connection;

const CREATE: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        job_type TEXT NOT NULL,
        state TEXT NOT NULL,
        app_id TEXT NOT NULL DEFAULT '',
        app_name TEXT NOT NULL DEFAULT '',
        ctid INTEGER NOT NULL DEFAULT 0,
        node TEXT NOT NULL DEFAULT '',
        pool TEXT NOT NULL DEFAULT '',
        storage TEXT NOT NULL DEFAULT '',
        bridge TEXT NOT NULL DEFAULT '',
        os_template TEXT NOT NULL DEFAULT '',
        cores INTEGER NOT NULL DEFAULT 0,
        memory_mb INTEGER NOT NULL DEFAULT 0,
        disk_gb INTEGER NOT NULL DEFAULT 0,
        hostname TEXT NOT NULL DEFAULT '',
        ip TEXT NOT NULL DEFAULT '',
        onboot INTEGER NOT NULL DEFAULT 0,
        unprivileged INTEGER NOT NULL DEFAULT 1,
        inputs TEXT NOT NULL DEFAULT '{}',
        outputs TEXT NOT NULL DEFAULT '{}',
        mounts TEXT NOT NULL DEFAULT '[]',
        devices TEXT NOT NULL DEFAULT '[]',
        env TEXT NOT NULL DEFAULT '{}',
        tags TEXT NOT NULL DEFAULT '',
        stack_id TEXT,
        error TEXT NOT NULL DEFAULT '',
        created_at_ms INTEGER NOT NULL,
        updated_at_ms INTEGER NOT NULL,
        completed_at_ms INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS job_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id TEXT NOT NULL,
        ts_ns INTEGER NOT NULL,
        level TEXT NOT NULL,
        message TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_job_logs_job ON job_logs(job_id)",
    "CREATE TABLE IF NOT EXISTS installs (
        id TEXT PRIMARY KEY,
        app_id TEXT NOT NULL,
        app_name TEXT NOT NULL DEFAULT '',
        app_version TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'running',
        ctid INTEGER NOT NULL DEFAULT 0,
        node TEXT NOT NULL DEFAULT '',
        pool TEXT NOT NULL DEFAULT '',
        storage TEXT NOT NULL DEFAULT '',
        bridge TEXT NOT NULL DEFAULT '',
        os_template TEXT NOT NULL DEFAULT '',
        cores INTEGER NOT NULL DEFAULT 0,
        memory_mb INTEGER NOT NULL DEFAULT 0,
        disk_gb INTEGER NOT NULL DEFAULT 0,
        hostname TEXT NOT NULL DEFAULT '',
        ip TEXT NOT NULL DEFAULT '',
        onboot INTEGER NOT NULL DEFAULT 0,
        unprivileged INTEGER NOT NULL DEFAULT 1,
        inputs TEXT NOT NULL DEFAULT '{}',
        outputs TEXT NOT NULL DEFAULT '{}',
        mounts TEXT NOT NULL DEFAULT '[]',
        devices TEXT NOT NULL DEFAULT '[]',
        env TEXT NOT NULL DEFAULT '{}',
        tags TEXT NOT NULL DEFAULT '',
        created_at_ms INTEGER NOT NULL,
        updated_at_ms INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS stacks (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        ctid INTEGER NOT NULL DEFAULT 0,
        node TEXT NOT NULL DEFAULT '',
        pool TEXT NOT NULL DEFAULT '',
        storage TEXT NOT NULL DEFAULT '',
        bridge TEXT NOT NULL DEFAULT '',
        os_template TEXT NOT NULL DEFAULT '',
        cores INTEGER NOT NULL DEFAULT 0,
        memory_mb INTEGER NOT NULL DEFAULT 0,
        disk_gb INTEGER NOT NULL DEFAULT 0,
        hostname TEXT NOT NULL DEFAULT '',
        ip TEXT NOT NULL DEFAULT '',
        onboot INTEGER NOT NULL DEFAULT 0,
        unprivileged INTEGER NOT NULL DEFAULT 1,
        apps TEXT NOT NULL DEFAULT '[]',
        mounts TEXT NOT NULL DEFAULT '[]',
        devices TEXT NOT NULL DEFAULT '[]',
        env TEXT NOT NULL DEFAULT '{}',
        tags TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'running',
        created_at_ms INTEGER NOT NULL,
        updated_at_ms INTEGER NOT NULL
    )",
];

/// Columns appended after the initial release. Applied on every open;
/// "duplicate column name" means the column is already there.
const ALTER: &[&str] = &[
    "ALTER TABLE jobs ADD COLUMN hwaddr TEXT NOT NULL DEFAULT ''",
    "ALTER TABLE jobs ADD COLUMN os_template TEXT NOT NULL DEFAULT ''",
    "ALTER TABLE installs ADD COLUMN os_template TEXT NOT NULL DEFAULT ''",
];

pub(crate) fn migrate(conn: &Connection) -> Result<(), StoreError> {
    for sql in CREATE {
        conn.execute(sql, [])?;
    }
    for sql in ALTER {
        match conn.execute(sql, []) {
            Ok(_) => {}
            Err(err) if is_duplicate_column(&err) => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    err.to_string().contains("duplicate column name")
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
