// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Install rows.

use crate::{from_json, to_json, Store, StoreError};
use appdock_core::{Install, InstallStatus};
use rusqlite::{params, OptionalExtension, Row};

const INSTALL_COLUMNS: &str = "id, app_id, app_name, app_version, status, ctid, node, pool, \
     storage, bridge, os_template, cores, memory_mb, disk_gb, hostname, ip, onboot, unprivileged, \
     inputs, outputs, mounts, devices, env, tags, created_at_ms, updated_at_ms";

fn install_from_row(row: &Row<'_>) -> Result<Install, StoreError> {
    let status: String = row.get(4)?;
    Ok(Install {
        id: row.get(0)?,
        app_id: row.get(1)?,
        app_name: row.get(2)?,
        app_version: row.get(3)?,
        status: InstallStatus::parse(&status).unwrap_or(InstallStatus::Stopped),
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
        onboot: row.get::<_, i64>(16)? != 0,
        unprivileged: row.get::<_, i64>(17)? != 0,
        inputs: from_json(&row.get::<_, String>(18)?)?,
        outputs: from_json(&row.get::<_, String>(19)?)?,
        mounts: from_json(&row.get::<_, String>(20)?)?,
        devices: from_json(&row.get::<_, String>(21)?)?,
        env: from_json(&row.get::<_, String>(22)?)?,
        tags: row.get(23)?,
        created_at_ms: row.get::<_, i64>(24)? as u64,
        updated_at_ms: row.get::<_, i64>(25)? as u64,
    })
}

impl Store {
    pub fn put_install(&self, install: &Install) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO installs ({INSTALL_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, \
                  ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)"
            ),
            params![
                install.id,
                install.app_id,
                install.app_name,
                install.app_version,
                install.status.as_str(),
                install.ctid,
                install.node,
                install.pool,
                install.storage,
                install.bridge,
                install.os_template,
                install.cores,
                install.memory_mb,
                install.disk_gb,
                install.hostname,
                install.ip,
                install.onboot as i64,
                install.unprivileged as i64,
                to_json(&install.inputs)?,
                to_json(&install.outputs)?,
                to_json(&install.mounts)?,
                to_json(&install.devices)?,
                to_json(&install.env)?,
                install.tags,
                install.created_at_ms as i64,
                install.updated_at_ms as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_install(&self, id: &str) -> Result<Install, StoreError> {
        let conn = self.conn();
        let install = conn
            .query_row(
                &format!("SELECT {INSTALL_COLUMNS} FROM installs WHERE id = ?1"),
                params![id],
                |row| Ok(install_from_row(row)),
            )
            .optional()?
            .transpose()?;
        install.ok_or_else(|| StoreError::InstallNotFound(id.to_string()))
    }

    pub fn list_installs(&self) -> Result<Vec<Install>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {INSTALL_COLUMNS} FROM installs ORDER BY created_at_ms DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], |row| Ok(install_from_row(row)))?;
        let mut installs = Vec::new();
        for row in rows {
            installs.push(row??);
        }
        Ok(installs)
    }

    pub fn delete_install(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute("DELETE FROM installs WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Most recent install for an app with status other than `uninstalled`.
    /// The second half of the duplicate guard.
    pub fn active_install_for_app(&self, app_id: &str) -> Result<Option<Install>, StoreError> {
        let conn = self.conn();
        let install = conn
            .query_row(
                &format!(
                    "SELECT {INSTALL_COLUMNS} FROM installs \
                     WHERE app_id = ?1 AND status != 'uninstalled' \
                     ORDER BY created_at_ms DESC, id DESC LIMIT 1"
                ),
                params![app_id],
                |row| Ok(install_from_row(row)),
            )
            .optional()?
            .transpose()?;
        Ok(install)
    }

    /// Any install row (active or preserved) for an app.
    pub fn install_for_app(&self, app_id: &str) -> Result<Option<Install>, StoreError> {
        let conn = self.conn();
        let install = conn
            .query_row(
                &format!(
                    "SELECT {INSTALL_COLUMNS} FROM installs WHERE app_id = ?1 \
                     ORDER BY created_at_ms DESC, id DESC LIMIT 1"
                ),
                params![app_id],
                |row| Ok(install_from_row(row)),
            )
            .optional()?
            .transpose()?;
        Ok(install)
    }
}

#[cfg(test)]
#[path = "installs_tests.rs"]
mod tests;
