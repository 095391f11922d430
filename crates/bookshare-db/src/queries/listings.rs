use anyhow::Result;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use crate::models::{BidRow, ListingRow};
use crate::{Database, now};

pub struct NewListing {
    pub id: String,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub edition: Option<String>,
    pub price: f64,
    pub original_price: Option<f64>,
    pub condition: String,
    pub description: String,
    pub category: String,
    pub subject: Option<String>,
    pub course: Option<String>,
    pub exam_type: Option<String>,
    pub listing_type: String,
    pub digital_file: Option<String>,
    pub sale_type: String,
    pub auction_end_date: Option<String>,
    pub images: String,
    pub stock: i64,
    pub seller: String,
    pub location: Option<String>,
    pub delivery_options: String,
}

/// Column-by-column patch for an owner update. `None` leaves the stored
/// value untouched; enum fields arrive pre-validated as wire strings.
#[derive(Default)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub edition: Option<String>,
    pub price: Option<f64>,
    pub original_price: Option<f64>,
    pub condition: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub subject: Option<String>,
    pub course: Option<String>,
    pub exam_type: Option<String>,
    pub sale_type: Option<String>,
    pub auction_end_date: Option<String>,
    pub stock: Option<i64>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub delivery_options: Option<String>,
    pub images: Option<String>,
}

const LISTING_COLS: &str = "l.id, l.title, l.author, l.isbn, l.edition, l.price, l.original_price, \
     l.condition, l.description, l.category, l.subject, l.course, l.exam_type, l.listing_type, \
     l.digital_file, l.sale_type, l.auction_end_date, l.current_bid, l.images, l.stock, l.seller, \
     l.status, l.views, l.location, l.delivery_options, l.rating_average, l.rating_count, \
     l.created_at, l.updated_at, u.name, u.email";

fn map_listing(row: &Row) -> rusqlite::Result<ListingRow> {
    Ok(ListingRow {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        isbn: row.get(3)?,
        edition: row.get(4)?,
        price: row.get(5)?,
        original_price: row.get(6)?,
        condition: row.get(7)?,
        description: row.get(8)?,
        category: row.get(9)?,
        subject: row.get(10)?,
        course: row.get(11)?,
        exam_type: row.get(12)?,
        listing_type: row.get(13)?,
        digital_file: row.get(14)?,
        sale_type: row.get(15)?,
        auction_end_date: row.get(16)?,
        current_bid: row.get(17)?,
        images: row.get(18)?,
        stock: row.get(19)?,
        seller: row.get(20)?,
        status: row.get(21)?,
        views: row.get(22)?,
        location: row.get(23)?,
        delivery_options: row.get(24)?,
        rating_average: row.get(25)?,
        rating_count: row.get(26)?,
        created_at: row.get(27)?,
        updated_at: row.get(28)?,
        seller_name: row.get(29)?,
        seller_email: row.get(30)?,
    })
}

impl Database {
    pub fn insert_listing(&self, listing: &NewListing) -> Result<()> {
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO listings (id, title, author, isbn, edition, price, original_price, \
                 condition, description, category, subject, course, exam_type, listing_type, \
                 digital_file, sale_type, auction_end_date, images, stock, seller, location, \
                 delivery_options, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
                 ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?23)",
                rusqlite::params![
                    listing.id,
                    listing.title,
                    listing.author,
                    listing.isbn,
                    listing.edition,
                    listing.price,
                    listing.original_price,
                    listing.condition,
                    listing.description,
                    listing.category,
                    listing.subject,
                    listing.course,
                    listing.exam_type,
                    listing.listing_type,
                    listing.digital_file,
                    listing.sale_type,
                    listing.auction_end_date,
                    listing.images,
                    listing.stock,
                    listing.seller,
                    listing.location,
                    listing.delivery_options,
                    ts,
                ],
            )?;
            Ok(())
        })
    }

    /// The public browse view: active listings only, newest first.
    pub fn get_active_listings(&self) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LISTING_COLS} FROM listings l JOIN users u ON u.id = l.seller \
                 WHERE l.status = 'active' ORDER BY l.created_at DESC"
            ))?;
            let rows = stmt.query_map([], map_listing)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    pub fn get_listing(&self, id: &str) -> Result<Option<ListingRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {LISTING_COLS} FROM listings l JOIN users u ON u.id = l.seller \
                     WHERE l.id = ?1"
                ),
                [id],
                map_listing,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn get_listings_by_seller(&self, seller: &str) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LISTING_COLS} FROM listings l JOIN users u ON u.id = l.seller \
                 WHERE l.seller = ?1 ORDER BY l.created_at DESC"
            ))?;
            let rows = stmt.query_map([seller], map_listing)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    /// Batch-fetch listings for a set of ids (wishlist hydration).
    pub fn get_listings_by_ids(&self, ids: &[String]) -> Result<Vec<ListingRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {LISTING_COLS} FROM listings l JOIN users u ON u.id = l.seller \
                 WHERE l.id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt.query_map(params.as_slice(), map_listing)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    pub fn update_listing(&self, id: &str, patch: &ListingPatch) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE listings SET \
                 title = COALESCE(?2, title), \
                 author = COALESCE(?3, author), \
                 isbn = COALESCE(?4, isbn), \
                 edition = COALESCE(?5, edition), \
                 price = COALESCE(?6, price), \
                 original_price = COALESCE(?7, original_price), \
                 condition = COALESCE(?8, condition), \
                 description = COALESCE(?9, description), \
                 category = COALESCE(?10, category), \
                 subject = COALESCE(?11, subject), \
                 course = COALESCE(?12, course), \
                 exam_type = COALESCE(?13, exam_type), \
                 sale_type = COALESCE(?14, sale_type), \
                 auction_end_date = COALESCE(?15, auction_end_date), \
                 stock = COALESCE(?16, stock), \
                 status = COALESCE(?17, status), \
                 location = COALESCE(?18, location), \
                 delivery_options = COALESCE(?19, delivery_options), \
                 images = COALESCE(?20, images), \
                 updated_at = ?21 \
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    patch.title,
                    patch.author,
                    patch.isbn,
                    patch.edition,
                    patch.price,
                    patch.original_price,
                    patch.condition,
                    patch.description,
                    patch.category,
                    patch.subject,
                    patch.course,
                    patch.exam_type,
                    patch.sale_type,
                    patch.auction_end_date,
                    patch.stock,
                    patch.status,
                    patch.location,
                    patch.delivery_options,
                    patch.images,
                    now(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn delete_listing(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM listings WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn increment_listing_views(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE listings SET views = views + 1 WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Record a bid and advance the listing's current high bid, atomically.
    pub fn place_bid(&self, listing_id: &str, user_id: &str, amount: f64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO bids (id, listing_id, user_id, amount, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    listing_id,
                    user_id,
                    amount,
                    now(),
                ],
            )?;
            tx.execute(
                "UPDATE listings SET current_bid = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![listing_id, amount, now()],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_bids(&self, listing_id: &str) -> Result<Vec<BidRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, listing_id, user_id, amount, created_at FROM bids \
                 WHERE listing_id = ?1 ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map([listing_id], |row| {
                Ok(BidRow {
                    id: row.get(0)?,
                    listing_id: row.get(1)?,
                    user_id: row.get(2)?,
                    amount: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    pub fn add_listing_rating(&self, id: &str, rating: u8) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE listings SET \
                 rating_average = (rating_average * rating_count + ?2) / (rating_count + 1), \
                 rating_count = rating_count + 1 \
                 WHERE id = ?1",
                rusqlite::params![id, i64::from(rating)],
            )?;
            Ok(())
        })
    }
}
