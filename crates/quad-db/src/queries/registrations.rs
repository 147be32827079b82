use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::Database;
use crate::models::{AttendeeRow, RegistrationRow};
use crate::queries::now_utc;

/// Outcome of a registration attempt. Precondition failures are data, not
/// errors; only store failures surface as `Err`.
#[derive(Debug)]
pub enum RegisterOutcome {
    Registered(RegistrationRow),
    /// Event missing, or not in the `approved` state.
    NotFoundOrClosed,
    CapacityFull,
    AlreadyRegistered,
    /// Attendance was already recorded; a terminal state that must not be
    /// re-entered (it would double-count the event counter).
    AlreadyAttended,
}

#[derive(Debug, PartialEq, Eq)]
pub enum UnregisterOutcome {
    Cancelled,
    /// The registration was not active; reported as success, and the
    /// counter is NOT decremented a second time.
    AlreadyCancelled,
    NotFound,
}

impl Database {
    /// The whole attempt runs in one transaction on the single connection.
    /// The capacity claim itself is a conditional atomic increment: the
    /// counter only moves if the event is still approved and under
    /// capacity, so concurrent attempts can never oversubscribe.
    pub fn register_for_event(
        &self,
        registration_id: &str,
        event_id: &str,
        student_id: &str,
    ) -> Result<RegisterOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let status: Option<String> = tx
                .query_row("SELECT status FROM events WHERE id = ?1", [event_id], |row| {
                    row.get(0)
                })
                .optional()?;
            match status.as_deref() {
                Some("approved") => {}
                _ => return Ok(RegisterOutcome::NotFoundOrClosed),
            }

            let existing: Option<(String, String)> = tx
                .query_row(
                    "SELECT id, status FROM registrations
                     WHERE event_id = ?1 AND student_id = ?2",
                    [event_id, student_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            match existing.as_ref().map(|(_, s)| s.as_str()) {
                Some("registered") => return Ok(RegisterOutcome::AlreadyRegistered),
                Some("attended") => return Ok(RegisterOutcome::AlreadyAttended),
                _ => {}
            }

            let claimed = tx.execute(
                "UPDATE events SET registration_count = registration_count + 1
                 WHERE id = ?1 AND status = 'approved'
                   AND (capacity IS NULL OR registration_count < capacity)",
                [event_id],
            )?;
            if claimed == 0 {
                return Ok(RegisterOutcome::CapacityFull);
            }

            let registered_at = now_utc();
            let row = match existing {
                // Re-activating a cancelled registration: same row, fresh timestamp.
                Some((id, _)) => {
                    tx.execute(
                        "UPDATE registrations SET status = 'registered', registered_at = ?2
                         WHERE id = ?1",
                        rusqlite::params![id, registered_at],
                    )?;
                    RegistrationRow {
                        id,
                        event_id: event_id.to_string(),
                        student_id: student_id.to_string(),
                        status: "registered".to_string(),
                        registered_at,
                    }
                }
                None => {
                    tx.execute(
                        "INSERT INTO registrations (id, event_id, student_id, status, registered_at)
                         VALUES (?1, ?2, ?3, 'registered', ?4)",
                        rusqlite::params![registration_id, event_id, student_id, registered_at],
                    )?;
                    RegistrationRow {
                        id: registration_id.to_string(),
                        event_id: event_id.to_string(),
                        student_id: student_id.to_string(),
                        status: "registered".to_string(),
                        registered_at,
                    }
                }
            };

            tx.commit()?;
            Ok(RegisterOutcome::Registered(row))
        })
    }

    pub fn unregister_from_event(
        &self,
        event_id: &str,
        student_id: &str,
    ) -> Result<UnregisterOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let existing: Option<(String, String)> = tx
                .query_row(
                    "SELECT id, status FROM registrations
                     WHERE event_id = ?1 AND student_id = ?2",
                    [event_id, student_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let (registration_id, status) = match existing {
                Some(pair) => pair,
                None => return Ok(UnregisterOutcome::NotFound),
            };
            if status != "registered" {
                return Ok(UnregisterOutcome::AlreadyCancelled);
            }

            tx.execute(
                "UPDATE registrations SET status = 'cancelled' WHERE id = ?1",
                [&registration_id],
            )?;
            // Clamped so concurrent decrements can never drive it negative.
            tx.execute(
                "UPDATE events SET registration_count = MAX(registration_count - 1, 0)
                 WHERE id = ?1",
                [event_id],
            )?;

            tx.commit()?;
            Ok(UnregisterOutcome::Cancelled)
        })
    }

    /// Registrations with status other than `cancelled`, joined with the
    /// student's public profile, most recent first.
    pub fn attendees(&self, event_id: &str) -> Result<Vec<AttendeeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.student_id, u.username, u.display_name, r.status, r.registered_at
                 FROM registrations r
                 JOIN users u ON r.student_id = u.id
                 WHERE r.event_id = ?1 AND r.status != 'cancelled'
                 ORDER BY r.registered_at DESC",
            )?;
            let rows = stmt
                .query_map([event_id], |row| {
                    Ok(AttendeeRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        display_name: row.get(2)?,
                        status: row.get(3)?,
                        registered_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Count of `registered`-status rows for an event. The denormalized
    /// `events.registration_count` must always equal this.
    pub fn registered_count(&self, event_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM registrations
                 WHERE event_id = ?1 AND status = 'registered'",
                [event_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}
