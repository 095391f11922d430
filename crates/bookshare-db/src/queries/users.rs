use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

use crate::models::UserRow;
use crate::{Database, now};

pub struct NewUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub academic_interests: String,
    pub library_name: Option<String>,
    pub gst_number: Option<String>,
    pub location: Option<String>,
}

const USER_COLS: &str = "id, name, email, phone, password, role, avatar, academic_interests, \
     library_name, gst_number, location, kyc_status, kyc_documents, \
     rating_average, rating_count, is_active, created_at";

fn map_user(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        password: row.get(4)?,
        role: row.get(5)?,
        avatar: row.get(6)?,
        academic_interests: row.get(7)?,
        library_name: row.get(8)?,
        gst_number: row.get(9)?,
        location: row.get(10)?,
        kyc_status: row.get(11)?,
        kyc_documents: row.get(12)?,
        rating_average: row.get(13)?,
        rating_count: row.get(14)?,
        is_active: row.get(15)?,
        created_at: row.get(16)?,
    })
}

impl Database {
    pub fn create_user(&self, user: &NewUser) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, phone, password, role, academic_interests, \
                 library_name, gst_number, location, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    user.id,
                    user.name,
                    user.email,
                    user.phone,
                    user.password_hash,
                    user.role,
                    user.academic_interests,
                    user.library_name,
                    user.gst_number,
                    user.location,
                    now(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLS} FROM users WHERE email = ?1"),
                [email],
                map_user,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
                [id],
                map_user,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Patch the client-mutable profile fields. `None` leaves a column
    /// unchanged.
    pub fn update_profile(
        &self,
        id: &str,
        name: Option<&str>,
        phone: Option<&str>,
        avatar: Option<&str>,
        academic_interests: Option<&str>,
        location: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET \
                 name = COALESCE(?2, name), \
                 phone = COALESCE(?3, phone), \
                 avatar = COALESCE(?4, avatar), \
                 academic_interests = COALESCE(?5, academic_interests), \
                 location = COALESCE(?6, location) \
                 WHERE id = ?1",
                rusqlite::params![id, name, phone, avatar, academic_interests, location],
            )?;
            Ok(())
        })
    }

    /// Replace the KYC document set and put the account back under review.
    pub fn submit_kyc_documents(&self, id: &str, documents_json: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET kyc_documents = ?2, kyc_status = 'pending' WHERE id = ?1",
                rusqlite::params![id, documents_json],
            )?;
            Ok(())
        })
    }

    pub fn set_kyc_status(&self, id: &str, status: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET kyc_status = ?2 WHERE id = ?1",
                rusqlite::params![id, status],
            )?;
            Ok(changed > 0)
        })
    }

    /// Fold one more rating into the seller's running average.
    pub fn add_user_rating(&self, id: &str, rating: u8) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET \
                 rating_average = (rating_average * rating_count + ?2) / (rating_count + 1), \
                 rating_count = rating_count + 1 \
                 WHERE id = ?1",
                rusqlite::params![id, i64::from(rating)],
            )?;
            Ok(())
        })
    }
}
