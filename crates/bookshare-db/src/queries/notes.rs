use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

use crate::models::NoteRow;
use crate::{Database, now};

pub struct NewNote {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub class_level: String,
    pub board: String,
    pub description: Option<String>,
    pub price: f64,
    pub pages: i64,
    pub file_url: Option<String>,
    pub author: String,
}

const NOTE_COLS: &str = "n.id, n.title, n.subject, n.class_level, n.board, n.description, \
     n.price, n.pages, n.file_url, n.author, n.downloads, n.rating, n.created_at, u.name";

fn map_note(row: &Row) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        id: row.get(0)?,
        title: row.get(1)?,
        subject: row.get(2)?,
        class_level: row.get(3)?,
        board: row.get(4)?,
        description: row.get(5)?,
        price: row.get(6)?,
        pages: row.get(7)?,
        file_url: row.get(8)?,
        author: row.get(9)?,
        downloads: row.get(10)?,
        rating: row.get(11)?,
        created_at: row.get(12)?,
        author_name: row.get(13)?,
    })
}

impl Database {
    pub fn insert_note(&self, note: &NewNote) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notes (id, title, subject, class_level, board, description, price, \
                 pages, file_url, author, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    note.id,
                    note.title,
                    note.subject,
                    note.class_level,
                    note.board,
                    note.description,
                    note.price,
                    note.pages,
                    note.file_url,
                    note.author,
                    now(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_notes(&self) -> Result<Vec<NoteRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTE_COLS} FROM notes n JOIN users u ON u.id = n.author \
                 ORDER BY n.created_at DESC"
            ))?;
            let rows = stmt.query_map([], map_note)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    pub fn get_note(&self, id: &str) -> Result<Option<NoteRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {NOTE_COLS} FROM notes n JOIN users u ON u.id = n.author \
                     WHERE n.id = ?1"
                ),
                [id],
                map_note,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn increment_note_downloads(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE notes SET downloads = downloads + 1 WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
    }
}
