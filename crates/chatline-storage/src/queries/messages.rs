// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message log operations.

use chatline_core::{ChatlineError, Message, MessageId};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::parse_column;

/// Insert a message at the end of the log. Re-inserting an existing id
/// refreshes its mutable fields without moving it.
pub async fn append_message(db: &Database, msg: &Message) -> Result<(), ChatlineError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, role, content, status, deleted, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    content = excluded.content,
                    status = excluded.status,
                    deleted = excluded.deleted,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![
                    msg.id.as_str(),
                    msg.role.to_string(),
                    msg.content,
                    msg.status.to_string(),
                    msg.deleted,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite content, status, and tombstone of an existing message.
pub async fn update_message(db: &Database, msg: &Message) -> Result<(), ChatlineError> {
    let msg = msg.clone();
    let id = msg.id.clone();
    let changed = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE messages SET content = ?1, status = ?2, deleted = ?3,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?4",
                params![
                    msg.content,
                    msg.status.to_string(),
                    msg.deleted,
                    msg.id.as_str()
                ],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 0 {
        return Err(ChatlineError::Storage {
            source: format!("message {id} not found").into(),
        });
    }
    Ok(())
}

/// All messages in insertion order.
pub async fn load_messages(db: &Database) -> Result<Vec<Message>, ChatlineError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, role, content, status, deleted, created_at
                 FROM messages ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(Message {
                    id: MessageId(row.get(0)?),
                    role: parse_column(row, 1)?,
                    content: row.get(2)?,
                    status: parse_column(row, 3)?,
                    deleted: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}
