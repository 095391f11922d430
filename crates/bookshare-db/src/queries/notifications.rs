use anyhow::Result;
use uuid::Uuid;

use crate::models::NotificationRow;
use crate::{Database, now};

impl Database {
    pub fn insert_notification(&self, user_id: &str, kind: &str, message: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, kind, message, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![Uuid::new_v4().to_string(), user_id, kind, message, now()],
            )?;
            Ok(())
        })
    }

    pub fn get_notifications(&self, user_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, kind, message, read, created_at \
                 FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map([user_id], |row| {
                Ok(NotificationRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    kind: row.get(2)?,
                    message: row.get(3)?,
                    read: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    /// Scoped to the owner so one user cannot mark another's notification.
    pub fn mark_notification_read(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn mark_all_notifications_read(&self, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1",
                [user_id],
            )?;
            Ok(())
        })
    }
}
