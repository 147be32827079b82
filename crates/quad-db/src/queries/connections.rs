use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::Database;
use crate::models::ConnectionRow;
use crate::queries::now_utc;

#[derive(Debug)]
pub enum InviteOutcome {
    Created(ConnectionRow),
    /// An invite already exists between the pair, in either direction.
    AlreadyExists,
}

impl Database {
    pub fn create_connection(
        &self,
        id: &str,
        requester_id: &str,
        addressee_id: &str,
    ) -> Result<InviteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let existing: i64 = tx.query_row(
                "SELECT COUNT(*) FROM connections
                 WHERE (requester_id = ?1 AND addressee_id = ?2)
                    OR (requester_id = ?2 AND addressee_id = ?1)",
                [requester_id, addressee_id],
                |row| row.get(0),
            )?;
            if existing > 0 {
                return Ok(InviteOutcome::AlreadyExists);
            }

            let created_at = now_utc();
            tx.execute(
                "INSERT INTO connections (id, requester_id, addressee_id, status, created_at)
                 VALUES (?1, ?2, ?3, 'pending', ?4)",
                rusqlite::params![id, requester_id, addressee_id, created_at],
            )?;
            tx.commit()?;

            Ok(InviteOutcome::Created(ConnectionRow {
                id: id.to_string(),
                requester_id: requester_id.to_string(),
                addressee_id: addressee_id.to_string(),
                status: "pending".to_string(),
                created_at,
            }))
        })
    }

    /// The addressee accepts a pending invite. Returns the accepted row,
    /// or None when no pending invite addressed to them exists.
    pub fn accept_connection(
        &self,
        requester_id: &str,
        addressee_id: &str,
    ) -> Result<Option<ConnectionRow>> {
        self.with_conn(|conn| {
            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT id, created_at FROM connections
                     WHERE requester_id = ?1 AND addressee_id = ?2 AND status = 'pending'",
                    [requester_id, addressee_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let (id, created_at) = match row {
                Some(pair) => pair,
                None => return Ok(None),
            };

            conn.execute("UPDATE connections SET status = 'accepted' WHERE id = ?1", [&id])?;

            Ok(Some(ConnectionRow {
                id,
                requester_id: requester_id.to_string(),
                addressee_id: addressee_id.to_string(),
                status: "accepted".to_string(),
                created_at,
            }))
        })
    }
}
