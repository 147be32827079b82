use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::OptionalExtension;

use crate::Database;
use crate::models::EventRow;
use crate::queries::now_utc;

const EVENT_COLUMNS: &str = "id, org_id, creator_id, title, description, location,
     starts_at, status, capacity, registration_count, created_at";

impl Database {
    /// New events always start in `pending`; approval is a separate step.
    #[allow(clippy::too_many_arguments)]
    pub fn create_event(
        &self,
        id: &str,
        org_id: &str,
        creator_id: &str,
        title: &str,
        description: &str,
        location: &str,
        starts_at: DateTime<Utc>,
        capacity: Option<u32>,
    ) -> Result<EventRow> {
        let starts = starts_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        let created = now_utc();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events
                     (id, org_id, creator_id, title, description, location,
                      starts_at, status, capacity, registration_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, 0, ?9)",
                rusqlite::params![
                    id, org_id, creator_id, title, description, location, starts, capacity, created
                ],
            )?;
            Ok(())
        })?;
        Ok(EventRow {
            id: id.to_string(),
            org_id: org_id.to_string(),
            creator_id: creator_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            location: location.to_string(),
            starts_at: starts,
            status: "pending".to_string(),
            capacity: capacity.map(|c| c as i64),
            registration_count: 0,
            created_at: created,
        })
    }

    pub fn get_event(&self, id: &str) -> Result<Option<EventRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt.query_row([id], read_event).optional()?;
            Ok(row)
        })
    }

    pub fn list_approved_events(&self) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE status = 'approved' ORDER BY starts_at"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], read_event)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Guarded lifecycle transition: flips `from` to `to` in one statement.
    /// Returns false when the event was not in `from` (or does not exist).
    pub fn transition_event(&self, id: &str, from: &str, to: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE events SET status = ?3 WHERE id = ?1 AND status = ?2",
                [id, from, to],
            )?;
            Ok(changed > 0)
        })
    }
}

fn read_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        org_id: row.get(1)?,
        creator_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        location: row.get(5)?,
        starts_at: row.get(6)?,
        status: row.get(7)?,
        capacity: row.get(8)?,
        registration_count: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl Database {
    /// Cancelling is allowed from both `pending` and `approved`.
    pub fn cancel_event(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE events SET status = 'cancelled'
                 WHERE id = ?1 AND status IN ('pending', 'approved')",
                [id],
            )?;
            Ok(changed > 0)
        })
    }
}
