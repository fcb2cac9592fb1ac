// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable persistence for jobs, logs, installs and stacks.
//!
//! One sqlite file in WAL mode. Collections are serialized as JSON blobs in
//! TEXT columns, booleans as 0/1. Readers and the single writer share one
//! connection behind a mutex; per-job write ordering is the runner task's
//! responsibility.

mod installs;
mod jobs;
mod logs;
mod schema;
mod stacks;

use appdock_core::Clock;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt column data: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("install not found: {0}")]
    InstallNotFound(String),
    #[error("stack not found: {0}")]
    StackNotFound(String),
}

/// The single source of truth for engine state.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if needed) the database at `path`, run schema
    /// migrations, and recover orphaned jobs. Returns the store and the ids
    /// of the jobs that were failed by recovery, so the engine can also
    /// destroy any containers those jobs had allocated.
    pub fn open(path: &Path, clock: &impl Clock) -> Result<(Self, Vec<String>), StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        schema::migrate(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        let recovered = store.recover_orphans(clock)?;
        Ok((store, recovered))
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    Ok(serde_json::to_string(value)?)
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    Ok(serde_json::from_str(raw)?)
}
