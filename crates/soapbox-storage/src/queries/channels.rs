// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel CRUD operations.
//!
//! The credential crosses the storage boundary exactly twice: exposed here
//! on write, re-wrapped into `SecretString` on read. It never appears in a
//! log field or Debug output anywhere else.

use chrono::{DateTime, Utc};
use rusqlite::params;
use secrecy::{ExposeSecret, SecretString};
use soapbox_core::{Channel, ChannelId, SoapboxError};

use super::ts;
use crate::database::Database;

fn row_to_channel(row: &rusqlite::Row<'_>) -> Result<Channel, rusqlite::Error> {
    let credential: Option<String> = row.get(3)?;
    let max_content_len: Option<i64> = row.get(4)?;
    Ok(Channel {
        id: ChannelId(row.get(0)?),
        name: row.get(1)?,
        remote_page_id: row.get(2)?,
        credential: credential.map(SecretString::from),
        max_content_len: max_content_len.map(|n| n as usize),
        active: row.get::<_, i64>(5)? != 0,
    })
}

/// Insert a new channel.
pub async fn insert_channel(
    db: &Database,
    channel: &Channel,
    now: DateTime<Utc>,
) -> Result<(), SoapboxError> {
    let id = channel.id.0.clone();
    let name = channel.name.clone();
    let remote_page_id = channel.remote_page_id.clone();
    let credential = channel
        .credential
        .as_ref()
        .map(|c| c.expose_secret().to_string());
    let max_content_len = channel.max_content_len.map(|n| n as i64);
    let active = channel.active;
    let now_text = ts(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO channels (id, name, remote_page_id, credential, max_content_len, \
                 active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![id, name, remote_page_id, credential, max_content_len, active, now_text],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a channel by id.
pub async fn get_channel(
    db: &Database,
    id: &ChannelId,
) -> Result<Option<Channel>, SoapboxError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, remote_page_id, credential, max_content_len, active
                 FROM channels WHERE id = ?1",
            )?;
            let result = stmt.query_row(params![id], row_to_channel);
            match result {
                Ok(channel) => Ok(Some(channel)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all channels, active first.
pub async fn list_channels(db: &Database) -> Result<Vec<Channel>, SoapboxError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, remote_page_id, credential, max_content_len, active
                 FROM channels ORDER BY active DESC, name ASC",
            )?;
            let rows = stmt.query_map([], row_to_channel)?;
            let mut channels = Vec::new();
            for row in rows {
                channels.push(row?);
            }
            Ok(channels)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
