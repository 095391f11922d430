use anyhow::Result;

use crate::models::WishlistItemRow;
use crate::{Database, now};

impl Database {
    /// Returns false if the listing is already on the user's wishlist.
    pub fn add_wishlist_item(
        &self,
        user_id: &str,
        listing_id: &str,
        alert_enabled: bool,
        target_price: Option<f64>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO wishlist_items \
                 (user_id, listing_id, added_at, alert_enabled, target_price) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![user_id, listing_id, now(), alert_enabled, target_price],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn remove_wishlist_item(&self, user_id: &str, listing_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM wishlist_items WHERE user_id = ?1 AND listing_id = ?2",
                rusqlite::params![user_id, listing_id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn get_wishlist_items(&self, user_id: &str) -> Result<Vec<WishlistItemRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, listing_id, added_at, alert_enabled, target_price \
                 FROM wishlist_items WHERE user_id = ?1 ORDER BY added_at DESC",
            )?;
            let rows = stmt.query_map([user_id], |row| {
                Ok(WishlistItemRow {
                    user_id: row.get(0)?,
                    listing_id: row.get(1)?,
                    added_at: row.get(2)?,
                    alert_enabled: row.get(3)?,
                    target_price: row.get(4)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    pub fn is_in_wishlist(&self, user_id: &str, listing_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM wishlist_items WHERE user_id = ?1 AND listing_id = ?2",
                rusqlite::params![user_id, listing_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Users watching this listing whose alert target is at or above the
    /// new price.
    pub fn price_alert_watchers(&self, listing_id: &str, new_price: f64) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM wishlist_items \
                 WHERE listing_id = ?1 AND alert_enabled = 1 AND target_price >= ?2",
            )?;
            let rows = stmt.query_map(rusqlite::params![listing_id, new_price], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }
}
