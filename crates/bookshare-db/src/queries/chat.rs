use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

use crate::models::{ChatMessageRow, ChatParticipantRow, ChatRow, ReadReceiptRow};
use crate::{Database, now};

pub struct NewChatMessage {
    pub id: String,
    pub chat_id: String,
    pub sender: String,
    pub content: String,
    pub message_type: String,
    pub offer_amount: Option<f64>,
    pub offer_listing: Option<String>,
    pub offer_status: Option<String>,
}

const MESSAGE_COLS: &str = "m.id, m.chat_id, m.sender, m.content, m.message_type, \
     m.offer_amount, m.offer_listing, m.offer_status, m.created_at, u.name";

fn map_message(row: &Row) -> rusqlite::Result<ChatMessageRow> {
    Ok(ChatMessageRow {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        sender: row.get(2)?,
        content: row.get(3)?,
        message_type: row.get(4)?,
        offer_amount: row.get(5)?,
        offer_listing: row.get(6)?,
        offer_status: row.get(7)?,
        created_at: row.get(8)?,
        sender_name: row.get(9)?,
    })
}

fn map_chat(row: &Row) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(0)?,
        listing_id: row.get(1)?,
        is_active: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl Database {
    /// An existing conversation between the same two users about the same
    /// listing (or no listing), if any.
    pub fn find_chat(
        &self,
        user_a: &str,
        user_b: &str,
        listing_id: Option<&str>,
    ) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT c.id, c.listing_id, c.is_active, c.created_at, c.updated_at \
                 FROM chats c \
                 JOIN chat_participants pa ON pa.chat_id = c.id AND pa.user_id = ?1 \
                 JOIN chat_participants pb ON pb.chat_id = c.id AND pb.user_id = ?2 \
                 WHERE c.listing_id IS ?3",
                rusqlite::params![user_a, user_b, listing_id],
                map_chat,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn create_chat(
        &self,
        id: &str,
        participants: &[&str],
        listing_id: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();
            tx.execute(
                "INSERT INTO chats (id, listing_id, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?3)",
                rusqlite::params![id, listing_id, ts],
            )?;
            for user in participants {
                tx.execute(
                    "INSERT INTO chat_participants (chat_id, user_id) VALUES (?1, ?2)",
                    rusqlite::params![id, user],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_chat(&self, id: &str) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, listing_id, is_active, created_at, updated_at \
                 FROM chats WHERE id = ?1",
                [id],
                map_chat,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Conversations involving the user, most recently touched first.
    pub fn get_chats_for_user(&self, user_id: &str) -> Result<Vec<ChatRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.listing_id, c.is_active, c.created_at, c.updated_at \
                 FROM chats c \
                 JOIN chat_participants p ON p.chat_id = c.id \
                 WHERE p.user_id = ?1 ORDER BY c.updated_at DESC",
            )?;
            let rows = stmt.query_map([user_id], map_chat)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    pub fn get_chat_participants(&self, chat_id: &str) -> Result<Vec<ChatParticipantRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.chat_id, p.user_id, u.name, u.email \
                 FROM chat_participants p JOIN users u ON u.id = p.user_id \
                 WHERE p.chat_id = ?1",
            )?;
            let rows = stmt.query_map([chat_id], |row| {
                Ok(ChatParticipantRow {
                    chat_id: row.get(0)?,
                    user_id: row.get(1)?,
                    user_name: row.get(2)?,
                    user_email: row.get(3)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    pub fn is_chat_participant(&self, chat_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM chat_participants WHERE chat_id = ?1 AND user_id = ?2",
                rusqlite::params![chat_id, user_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn insert_chat_message(&self, message: &NewChatMessage) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();
            tx.execute(
                "INSERT INTO chat_messages (id, chat_id, sender, content, message_type, \
                 offer_amount, offer_listing, offer_status, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    message.id,
                    message.chat_id,
                    message.sender,
                    message.content,
                    message.message_type,
                    message.offer_amount,
                    message.offer_listing,
                    message.offer_status,
                    ts,
                ],
            )?;
            tx.execute(
                "UPDATE chats SET updated_at = ?2 WHERE id = ?1",
                rusqlite::params![message.chat_id, ts],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_chat_messages(&self, chat_id: &str) -> Result<Vec<ChatMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLS} FROM chat_messages m JOIN users u ON u.id = m.sender \
                 WHERE m.chat_id = ?1 ORDER BY m.created_at ASC"
            ))?;
            let rows = stmt.query_map([chat_id], map_message)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    pub fn get_chat_message(&self, chat_id: &str, message_id: &str) -> Result<Option<ChatMessageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {MESSAGE_COLS} FROM chat_messages m JOIN users u ON u.id = m.sender \
                     WHERE m.chat_id = ?1 AND m.id = ?2"
                ),
                rusqlite::params![chat_id, message_id],
                map_message,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn get_last_chat_message(&self, chat_id: &str) -> Result<Option<ChatMessageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {MESSAGE_COLS} FROM chat_messages m JOIN users u ON u.id = m.sender \
                     WHERE m.chat_id = ?1 ORDER BY m.created_at DESC LIMIT 1"
                ),
                [chat_id],
                map_message,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Mark every message in the conversation not sent by this user as
    /// read by them. Idempotent via the (message, user) uniqueness.
    pub fn mark_chat_read(&self, chat_id: &str, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at) \
                 SELECT id, ?2, ?3 FROM chat_messages WHERE chat_id = ?1 AND sender != ?2",
                rusqlite::params![chat_id, user_id, now()],
            )?;
            Ok(())
        })
    }

    /// Batch-fetch read receipts for a set of message ids.
    pub fn get_read_receipts(&self, message_ids: &[String]) -> Result<Vec<ReadReceiptRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT message_id, user_id, read_at FROM message_reads WHERE message_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt.query_map(params.as_slice(), |row| {
                Ok(ReadReceiptRow {
                    message_id: row.get(0)?,
                    user_id: row.get(1)?,
                    read_at: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    /// Recipient decision on a pending offer message.
    pub fn update_offer_status(&self, message_id: &str, status: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE chat_messages SET offer_status = ?2 WHERE id = ?1",
                rusqlite::params![message_id, status],
            )?;
            Ok(())
        })
    }
}
