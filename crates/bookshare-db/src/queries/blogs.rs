use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

use crate::models::{BlogReplyRow, BlogRow};
use crate::{Database, now};

pub struct NewBlog {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub category: String,
    pub tags: String,
}

const BLOG_COLS: &str = "b.id, b.title, b.content, b.author, b.category, b.tags, \
     b.views, b.replies, b.likes, b.created_at, u.name, u.role";

fn map_blog(row: &Row) -> rusqlite::Result<BlogRow> {
    Ok(BlogRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author: row.get(3)?,
        category: row.get(4)?,
        tags: row.get(5)?,
        views: row.get(6)?,
        replies: row.get(7)?,
        likes: row.get(8)?,
        created_at: row.get(9)?,
        author_name: row.get(10)?,
        author_role: row.get(11)?,
    })
}

impl Database {
    pub fn insert_blog(&self, blog: &NewBlog) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO blogs (id, title, content, author, category, tags, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    blog.id,
                    blog.title,
                    blog.content,
                    blog.author,
                    blog.category,
                    blog.tags,
                    now(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_blogs(&self) -> Result<Vec<BlogRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BLOG_COLS} FROM blogs b JOIN users u ON u.id = b.author \
                 ORDER BY b.created_at DESC"
            ))?;
            let rows = stmt.query_map([], map_blog)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    pub fn get_blog(&self, id: &str) -> Result<Option<BlogRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {BLOG_COLS} FROM blogs b JOIN users u ON u.id = b.author \
                     WHERE b.id = ?1"
                ),
                [id],
                map_blog,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn increment_blog_views(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE blogs SET views = views + 1 WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Insert a reply and bump the parent's counter in one transaction.
    pub fn insert_blog_reply(
        &self,
        id: &str,
        blog_id: &str,
        author: &str,
        content: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO blog_replies (id, blog_id, author, content, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, blog_id, author, content, now()],
            )?;
            tx.execute(
                "UPDATE blogs SET replies = replies + 1 WHERE id = ?1",
                [blog_id],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_blog_replies(&self, blog_id: &str) -> Result<Vec<BlogReplyRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.blog_id, r.author, r.content, r.created_at, u.name \
                 FROM blog_replies r JOIN users u ON u.id = r.author \
                 WHERE r.blog_id = ?1 ORDER BY r.created_at ASC",
            )?;
            let rows = stmt.query_map([blog_id], |row| {
                Ok(BlogReplyRow {
                    id: row.get(0)?,
                    blog_id: row.get(1)?,
                    author: row.get(2)?,
                    content: row.get(3)?,
                    created_at: row.get(4)?,
                    author_name: row.get(5)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    /// One like per user per post. Returns false if this user already
    /// liked the post.
    pub fn like_blog(&self, blog_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO blog_likes (blog_id, user_id, created_at) \
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![blog_id, user_id, now()],
            )?;
            if inserted == 0 {
                return Ok(false);
            }
            tx.execute("UPDATE blogs SET likes = likes + 1 WHERE id = ?1", [blog_id])?;
            tx.commit()?;
            Ok(true)
        })
    }
}
