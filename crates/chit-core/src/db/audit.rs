//! API audit log

use rusqlite::params;

use crate::error::Result;
use crate::models::AuditEntry;

use super::{parse_datetime, Database};

impl Database {
    /// Record an API action for a user
    pub fn log_audit(&self, user_email: &str, action: &str, detail: Option<&str>) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO audit_log (user_email, action, detail) VALUES (?1, ?2, ?3)",
            params![user_email, action, detail],
        )?;
        Ok(())
    }

    /// Most recent audit entries, newest first
    pub fn list_audit(&self, limit: i64) -> Result<Vec<AuditEntry>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, user_email, action, detail, created_at
             FROM audit_log
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let entries = stmt
            .query_map(params![limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(id, user_email, action, detail, created_at)| AuditEntry {
                id,
                user_email,
                action,
                detail,
                created_at: parse_datetime(&created_at),
            })
            .collect();

        Ok(entries)
    }
}
