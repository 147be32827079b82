use anyhow::Result;

use crate::Database;
use crate::models::NotificationRow;
use crate::queries::now_utc;

impl Database {
    pub fn insert_notification(
        &self,
        id: &str,
        user_id: &str,
        kind: &str,
        title: &str,
        body: &str,
        payload: &str,
        link: &str,
    ) -> Result<NotificationRow> {
        let created_at = now_utc();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, kind, title, body, payload, link, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
                rusqlite::params![id, user_id, kind, title, body, payload, link, created_at],
            )?;
            Ok(())
        })?;
        Ok(NotificationRow {
            id: id.to_string(),
            user_id: user_id.to_string(),
            kind: kind.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            payload: payload.to_string(),
            link: link.to_string(),
            read: false,
            created_at,
        })
    }

    pub fn recent_notifications(&self, user_id: &str, limit: u32) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, kind, title, body, payload, link, read, created_at
                 FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        kind: row.get(2)?,
                        title: row.get(3)?,
                        body: row.get(4)?,
                        payload: row.get(5)?,
                        link: row.get(6)?,
                        read: row.get(7)?,
                        created_at: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Derived at query time; nothing denormalized to drift.
    pub fn unread_count(&self, user_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Flips `read` on the caller's own notifications. Already-read rows
    /// are untouched, so the call is idempotent. Returns the number of
    /// rows actually flipped.
    pub fn mark_read(&self, user_id: &str, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (2..=ids.len() + 1).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "UPDATE notifications SET read = 1
                 WHERE user_id = ?1 AND read = 0 AND id IN ({})",
                placeholders.join(", ")
            );

            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&user_id as &dyn rusqlite::types::ToSql];
            params.extend(ids.iter().map(|id| id as &dyn rusqlite::types::ToSql));

            let changed = conn.execute(&sql, params.as_slice())?;
            Ok(changed)
        })
    }
}
