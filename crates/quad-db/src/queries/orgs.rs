use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::Database;
use crate::models::OrganizationRow;
use crate::queries::now_utc;

impl Database {
    /// Creates the organization and its head set in one transaction.
    /// Listed heads that are plain members are promoted to the head role.
    pub fn create_organization(
        &self,
        id: &str,
        name: &str,
        description: &str,
        head_ids: &[String],
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO organizations (id, name, description, active, created_at)
                 VALUES (?1, ?2, ?3, 1, ?4)",
                rusqlite::params![id, name, description, now_utc()],
            )?;
            for head_id in head_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO organization_heads (org_id, user_id) VALUES (?1, ?2)",
                    rusqlite::params![id, head_id],
                )?;
                tx.execute(
                    "UPDATE users SET role = 'head' WHERE id = ?1 AND role = 'member'",
                    [head_id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn organization_name_exists(&self, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM organizations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn get_organization(&self, id: &str) -> Result<Option<OrganizationRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, description, active, created_at
                     FROM organizations WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(OrganizationRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            description: row.get(2)?,
                            active: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_organizations(&self) -> Result<Vec<OrganizationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, active, created_at
                 FROM organizations WHERE active = 1 ORDER BY name",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(OrganizationRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        active: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn org_head_ids(&self, org_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT user_id FROM organization_heads WHERE org_id = ?1")?;
            let rows = stmt
                .query_map([org_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    pub fn is_org_head(&self, org_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM organization_heads WHERE org_id = ?1 AND user_id = ?2",
                [org_id, user_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }
}
