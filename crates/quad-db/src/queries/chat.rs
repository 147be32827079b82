use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::Database;
use crate::models::{ConversationRow, MessageRow};
use crate::queries::now_utc;

impl Database {
    pub fn create_conversation(
        &self,
        id: &str,
        is_group: bool,
        participant_ids: &[String],
    ) -> Result<ConversationRow> {
        self.with_conn_mut(|conn| {
            let created_at = now_utc();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO conversations (id, is_group, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, is_group, created_at],
            )?;
            for user_id in participant_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO conversation_participants (conversation_id, user_id)
                     VALUES (?1, ?2)",
                    rusqlite::params![id, user_id],
                )?;
            }
            tx.commit()?;

            Ok(ConversationRow {
                id: id.to_string(),
                is_group,
                last_message: None,
                last_message_at: None,
                created_at,
            })
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, is_group, last_message, last_message_at, created_at
                     FROM conversations WHERE id = ?1",
                    [id],
                    read_conversation,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// A user's conversations, most recent activity first.
    pub fn conversations_for_user(&self, user_id: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.is_group, c.last_message, c.last_message_at, c.created_at
                 FROM conversations c
                 JOIN conversation_participants p ON p.conversation_id = c.id
                 WHERE p.user_id = ?1
                 ORDER BY COALESCE(c.last_message_at, c.created_at) DESC",
            )?;
            let rows = stmt
                .query_map([user_id], read_conversation)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn participant_ids(&self, conversation_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM conversation_participants WHERE conversation_id = ?1",
            )?;
            let rows = stmt
                .query_map([conversation_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    pub fn is_participant(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM conversation_participants
                 WHERE conversation_id = ?1 AND user_id = ?2",
                [conversation_id, user_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Persists the message, then refreshes the conversation preview as a
    /// second statement. The two are deliberately NOT one transaction: a
    /// crash in between leaves a stale preview, never a lost message.
    pub fn insert_message(
        &self,
        id: &str,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
        attachments_json: &str,
    ) -> Result<MessageRow> {
        self.with_conn(|conn| {
            let created_at = now_utc();
            conn.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, content, attachments, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, conversation_id, sender_id, content, attachments_json, created_at],
            )?;

            conn.execute(
                "UPDATE conversations SET last_message = ?2, last_message_at = ?3 WHERE id = ?1",
                rusqlite::params![conversation_id, content, created_at],
            )?;

            let sender_username: String = conn
                .query_row("SELECT username FROM users WHERE id = ?1", [sender_id], |row| {
                    row.get(0)
                })
                .optional()?
                .unwrap_or_else(|| "unknown".to_string());

            Ok(MessageRow {
                id: id.to_string(),
                conversation_id: conversation_id.to_string(),
                sender_id: sender_id.to_string(),
                sender_username,
                content: content.to_string(),
                attachments: attachments_json.to_string(),
                created_at,
            })
        })
    }

    /// History page, newest first. `before` is the created_at cursor of
    /// the oldest message from the previous page.
    pub fn messages(
        &self,
        conversation_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            // JOIN users so sender_username arrives in one query
            let (sql, params): (&str, Vec<&dyn rusqlite::types::ToSql>) = match &before {
                Some(cursor) => (
                    "SELECT m.id, m.conversation_id, m.sender_id, u.username, m.content,
                            m.attachments, m.created_at
                     FROM messages m
                     LEFT JOIN users u ON m.sender_id = u.id
                     WHERE m.conversation_id = ?1 AND m.created_at < ?2
                     ORDER BY m.created_at DESC, m.rowid DESC
                     LIMIT ?3",
                    vec![&conversation_id, cursor, &limit],
                ),
                None => (
                    "SELECT m.id, m.conversation_id, m.sender_id, u.username, m.content,
                            m.attachments, m.created_at
                     FROM messages m
                     LEFT JOIN users u ON m.sender_id = u.id
                     WHERE m.conversation_id = ?1
                     ORDER BY m.created_at DESC, m.rowid DESC
                     LIMIT ?2",
                    vec![&conversation_id, &limit],
                ),
            };

            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        sender_username: row
                            .get::<_, Option<String>>(3)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        content: row.get(4)?,
                        attachments: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn read_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        is_group: row.get(1)?,
        last_message: row.get(2)?,
        last_message_at: row.get(3)?,
        created_at: row.get(4)?,
    })
}
