// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stack rows.

use crate::{from_json, to_json, Store, StoreError};
use appdock_core::{InstallStatus, Stack};
use rusqlite::{params, OptionalExtension, Row};

const STACK_COLUMNS: &str = "id, name, ctid, node, pool, storage, bridge, os_template, cores, \
     memory_mb, disk_gb, hostname, ip, onboot, unprivileged, apps, mounts, devices, env, tags, \
     status, created_at_ms, updated_at_ms";

fn stack_from_row(row: &Row<'_>) -> Result<Stack, StoreError> {
    let status: String = row.get(20)?;
    Ok(Stack {
        id: row.get(0)?,
        name: row.get(1)?,
        ctid: row.get(2)?,
        node: row.get(3)?,
        pool: row.get(4)?,
        storage: row.get(5)?,
        bridge: row.get(6)?,
        os_template: row.get(7)?,
        cores: row.get(8)?,
        memory_mb: row.get(9)?,
        disk_gb: row.get(10)?,
        hostname: row.get(11)?,
        ip: row.get(12)?,
        onboot: row.get::<_, i64>(13)? != 0,
        unprivileged: row.get::<_, i64>(14)? != 0,
        apps: from_json(&row.get::<_, String>(15)?)?,
        mounts: from_json(&row.get::<_, String>(16)?)?,
        devices: from_json(&row.get::<_, String>(17)?)?,
        env: from_json(&row.get::<_, String>(18)?)?,
        tags: row.get(19)?,
        status: InstallStatus::parse(&status).unwrap_or(InstallStatus::Stopped),
        created_at_ms: row.get::<_, i64>(21)? as u64,
        updated_at_ms: row.get::<_, i64>(22)? as u64,
    })
}

impl Store {
    pub fn put_stack(&self, stack: &Stack) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO stacks ({STACK_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, \
                  ?18, ?19, ?20, ?21, ?22, ?23)"
            ),
            params![
                stack.id,
                stack.name,
                stack.ctid,
                stack.node,
                stack.pool,
                stack.storage,
                stack.bridge,
                stack.os_template,
                stack.cores,
                stack.memory_mb,
                stack.disk_gb,
                stack.hostname,
                stack.ip,
                stack.onboot as i64,
                stack.unprivileged as i64,
                to_json(&stack.apps)?,
                to_json(&stack.mounts)?,
                to_json(&stack.devices)?,
                to_json(&stack.env)?,
                stack.tags,
                stack.status.as_str(),
                stack.created_at_ms as i64,
                stack.updated_at_ms as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_stack(&self, id: &str) -> Result<Stack, StoreError> {
        let conn = self.conn();
        let stack = conn
            .query_row(
                &format!("SELECT {STACK_COLUMNS} FROM stacks WHERE id = ?1"),
                params![id],
                |row| Ok(stack_from_row(row)),
            )
            .optional()?
            .transpose()?;
        stack.ok_or_else(|| StoreError::StackNotFound(id.to_string()))
    }

    pub fn list_stacks(&self) -> Result<Vec<Stack>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {STACK_COLUMNS} FROM stacks ORDER BY created_at_ms DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], |row| Ok(stack_from_row(row)))?;
        let mut stacks = Vec::new();
        for row in rows {
            stacks.push(row??);
        }
        Ok(stacks)
    }

    pub fn delete_stack(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute("DELETE FROM stacks WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "stacks_tests.rs"]
mod tests;
