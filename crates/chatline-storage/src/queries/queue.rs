// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Action queue and dead-letter persistence.
//!
//! Both lists are saved by replacing the table contents inside one
//! transaction, so a crash leaves either the old or the new list.

use chatline_core::{ActionPayload, ChatlineError, DeadLetter, MessageId, QueuedAction};
use rusqlite::{Row, params};

use crate::database::{Database, map_tr_err};

fn encode_payload(payload: &ActionPayload) -> Result<String, ChatlineError> {
    serde_json::to_string(payload).map_err(|e| ChatlineError::Storage {
        source: Box::new(e),
    })
}

fn action_from_row(row: &Row<'_>) -> rusqlite::Result<QueuedAction> {
    let payload: String = row.get(3)?;
    let payload: ActionPayload = serde_json::from_str(&payload).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let seq: i64 = row.get(1)?;
    Ok(QueuedAction {
        id: row.get(0)?,
        seq: seq.max(0) as u64,
        message_id: MessageId(row.get(2)?),
        payload,
        attempts: row.get(4)?,
        enqueued_at: row.get(5)?,
    })
}

/// Pending actions in enqueue order.
pub async fn load_queue(db: &Database) -> Result<Vec<QueuedAction>, ChatlineError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, seq, message_id, payload, attempts, enqueued_at
                 FROM action_queue ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map([], action_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Replace the stored queue with `actions`.
pub async fn save_queue(db: &Database, actions: &[QueuedAction]) -> Result<(), ChatlineError> {
    let rows = actions
        .iter()
        .map(|a| Ok((a.clone(), encode_payload(&a.payload)?)))
        .collect::<Result<Vec<_>, ChatlineError>>()?;

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM action_queue", [])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO action_queue
                     (id, seq, message_id, kind, payload, attempts, enqueued_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for (action, payload) in &rows {
                    stmt.execute(params![
                        action.id,
                        action.seq as i64,
                        action.message_id.as_str(),
                        action.kind().to_string(),
                        payload,
                        action.attempts,
                        action.enqueued_at,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Dead letters in original enqueue order.
pub async fn load_dead_letters(db: &Database) -> Result<Vec<DeadLetter>, ChatlineError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, seq, message_id, payload, attempts, enqueued_at, reason, retired_at
                 FROM dead_letters ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(DeadLetter {
                    action: action_from_row(row)?,
                    reason: row.get(6)?,
                    retired_at: row.get(7)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Replace the stored dead letters with `letters`.
pub async fn save_dead_letters(db: &Database, letters: &[DeadLetter]) -> Result<(), ChatlineError> {
    let rows = letters
        .iter()
        .map(|l| Ok((l.clone(), encode_payload(&l.action.payload)?)))
        .collect::<Result<Vec<_>, ChatlineError>>()?;

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM dead_letters", [])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO dead_letters
                     (id, seq, message_id, kind, payload, attempts, enqueued_at, reason, retired_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )?;
                for (letter, payload) in &rows {
                    let action = &letter.action;
                    stmt.execute(params![
                        action.id,
                        action.seq as i64,
                        action.message_id.as_str(),
                        action.kind().to_string(),
                        payload,
                        action.attempts,
                        action.enqueued_at,
                        letter.reason,
                        letter.retired_at,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_core::DeliveryStatus;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn action(seq: u64, message_id: &str, payload: ActionPayload) -> QueuedAction {
        QueuedAction {
            id: format!("a{seq}"),
            seq,
            message_id: MessageId::from(message_id),
            payload,
            enqueued_at: "2026-01-01T00:00:00.000Z".to_string(),
            attempts: 0,
        }
    }

    #[tokio::test]
    async fn save_then_load_keeps_order_and_payloads() {
        let (db, _dir) = setup_db().await;

        let actions = vec![
            action(1, "m1", ActionPayload::SendMessage { content: "hi".into() }),
            action(
                2,
                "m1",
                ActionPayload::UpdateStatus {
                    status: DeliveryStatus::Read,
                },
            ),
            action(3, "m2", ActionPayload::DeleteMessage),
        ];
        save_queue(&db, &actions).await.unwrap();

        let loaded = load_queue(&db).await.unwrap();
        assert_eq!(loaded, actions);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn save_replaces_previous_contents() {
        let (db, _dir) = setup_db().await;

        let mut actions = vec![
            action(1, "m1", ActionPayload::DeleteMessage),
            action(2, "m2", ActionPayload::DeleteMessage),
        ];
        save_queue(&db, &actions).await.unwrap();

        actions.remove(0);
        actions[0].attempts = 3;
        save_queue(&db, &actions).await.unwrap();

        let loaded = load_queue(&db).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "a2");
        assert_eq!(loaded[0].attempts, 3);

        save_queue(&db, &[]).await.unwrap();
        assert!(load_queue(&db).await.unwrap().is_empty());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn dead_letters_persist_reason() {
        let (db, _dir) = setup_db().await;

        let mut retired = action(4, "m3", ActionPayload::SendMessage { content: "x".into() });
        retired.attempts = 5;
        let letters = vec![DeadLetter {
            action: retired,
            reason: "transport failure: reset".to_string(),
            retired_at: "2026-01-01T00:01:00.000Z".to_string(),
        }];
        save_dead_letters(&db, &letters).await.unwrap();

        assert_eq!(load_dead_letters(&db).await.unwrap(), letters);

        db.close().await.unwrap();
    }
}
