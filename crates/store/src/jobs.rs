// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job rows and orphan recovery.

use crate::{from_json, to_json, Store, StoreError};
use appdock_core::{Clock, Job, JobState, JobType, LogLevel};
use rusqlite::{params, OptionalExtension, Row};

const JOB_COLUMNS: &str = "id, job_type, state, app_id, app_name, ctid, node, pool, storage, \
     bridge, os_template, cores, memory_mb, disk_gb, hostname, ip, hwaddr, onboot, unprivileged, \
     inputs, outputs, mounts, devices, env, tags, stack_id, error, created_at_ms, updated_at_ms, \
     completed_at_ms";

fn job_from_row(row: &Row<'_>) -> Result<Job, StoreError> {
    let job_type: String = row.get(1)?;
    let state: String = row.get(2)?;
    Ok(Job {
        id: row.get(0)?,
        job_type: JobType::parse(&job_type).unwrap_or(JobType::Install),
        state: JobState::parse(&state).unwrap_or(JobState::Failed),
        app_id: row.get(3)?,
        app_name: row.get(4)?,
        ctid: row.get(5)?,
        node: row.get(6)?,
        pool: row.get(7)?,
        storage: row.get(8)?,
        bridge: row.get(9)?,
        os_template: row.get(10)?,
        cores: row.get(11)?,
        memory_mb: row.get(12)?,
        disk_gb: row.get(13)?,
        hostname: row.get(14)?,
        ip: row.get(15)?,
        hwaddr: row.get(16)?,
        onboot: row.get::<_, i64>(17)? != 0,
        unprivileged: row.get::<_, i64>(18)? != 0,
        inputs: from_json(&row.get::<_, String>(19)?)?,
        outputs: from_json(&row.get::<_, String>(20)?)?,
        mounts: from_json(&row.get::<_, String>(21)?)?,
        devices: from_json(&row.get::<_, String>(22)?)?,
        env: from_json(&row.get::<_, String>(23)?)?,
        tags: row.get(24)?,
        stack_id: row.get(25)?,
        error: row.get(26)?,
        created_at_ms: row.get::<_, i64>(27)? as u64,
        updated_at_ms: row.get::<_, i64>(28)? as u64,
        completed_at_ms: row.get::<_, Option<i64>>(29)?.map(|v| v as u64),
    })
}

impl Store {
    /// Insert or fully replace a job row.
    pub fn put_job(&self, job: &Job) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO jobs ({JOB_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, \
                  ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30)"
            ),
            params![
                job.id,
                job.job_type.as_str(),
                job.state.as_str(),
                job.app_id,
                job.app_name,
                job.ctid,
                job.node,
                job.pool,
                job.storage,
                job.bridge,
                job.os_template,
                job.cores,
                job.memory_mb,
                job.disk_gb,
                job.hostname,
                job.ip,
                job.hwaddr,
                job.onboot as i64,
                job.unprivileged as i64,
                to_json(&job.inputs)?,
                to_json(&job.outputs)?,
                to_json(&job.mounts)?,
                to_json(&job.devices)?,
                to_json(&job.env)?,
                job.tags,
                job.stack_id,
                job.error,
                job.created_at_ms as i64,
                job.updated_at_ms as i64,
                job.completed_at_ms.map(|v| v as i64),
            ],
        )?;
        Ok(())
    }

    pub fn get_job(&self, id: &str) -> Result<Job, StoreError> {
        let conn = self.conn();
        let job = conn
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id],
                |row| Ok(job_from_row(row)),
            )
            .optional()?
            .transpose()?;
        job.ok_or_else(|| StoreError::JobNotFound(id.to_string()))
    }

    /// All jobs, newest first.
    pub fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at_ms DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], |row| Ok(job_from_row(row)))?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row??);
        }
        Ok(jobs)
    }

    /// Most recent non-terminal job for an app, if any. Gates every
    /// lifecycle operation on that app.
    pub fn active_job_for_app(&self, app_id: &str) -> Result<Option<Job>, StoreError> {
        let conn = self.conn();
        let job = conn
            .query_row(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM jobs \
                     WHERE app_id = ?1 AND state NOT IN ('completed', 'failed', 'cancelled') \
                     ORDER BY created_at_ms DESC, id DESC LIMIT 1"
                ),
                params![app_id],
                |row| Ok(job_from_row(row)),
            )
            .optional()?
            .transpose()?;
        Ok(job)
    }

    /// Delete terminal jobs and their logs. Returns the number of jobs
    /// removed.
    pub fn clear_terminal_jobs(&self) -> Result<usize, StoreError> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM job_logs WHERE job_id IN \
             (SELECT id FROM jobs WHERE state IN ('completed', 'failed', 'cancelled'))",
            [],
        )?;
        let removed = conn.execute(
            "DELETE FROM jobs WHERE state IN ('completed', 'failed', 'cancelled')",
            [],
        )?;
        Ok(removed)
    }

    /// Fail every job whose runner no longer exists (the process restarted
    /// while it was in flight). Idempotent; returns the recovered ids.
    pub fn recover_orphans(&self, clock: &impl Clock) -> Result<Vec<String>, StoreError> {
        let now_ms = clock.epoch_ms() as i64;
        let now_ns = clock.epoch_ns();
        let conn = self.conn();

        let mut stmt = conn.prepare(
            "SELECT id FROM jobs WHERE state NOT IN ('completed', 'failed', 'cancelled')",
        )?;
        let ids: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        for id in &ids {
            tracing::warn!(job_id = %id, "recovering orphaned job");
            conn.execute(
                "UPDATE jobs SET state = 'failed', error = ?2, updated_at_ms = ?3, \
                 completed_at_ms = ?3 WHERE id = ?1",
                params![id, "interrupted by service restart", now_ms],
            )?;
            conn.execute(
                "INSERT INTO job_logs (job_id, ts_ns, level, message) VALUES (?1, ?2, ?3, ?4)",
                params![
                    id,
                    now_ns,
                    LogLevel::Warn.as_str(),
                    "Job interrupted by service restart"
                ],
            )?;
        }
        Ok(ids)
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
