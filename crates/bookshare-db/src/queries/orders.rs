use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

use crate::models::OrderRow;
use crate::{Database, now};

pub struct NewOrder {
    pub id: String,
    pub buyer: String,
    pub listing: String,
    pub quantity: i64,
    pub payment_method: String,
    pub payment_status: String,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
}

/// Outcome of the atomic order-placement transaction.
pub enum OrderCreation {
    /// Order inserted; stock decremented. Carries the derived seller id
    /// and the server-computed total.
    Created { seller: String, total: f64 },
    ListingNotFound,
    ListingNotActive,
    InsufficientStock,
}

const ORDER_COLS: &str = "o.id, o.buyer, o.seller, o.listing, o.quantity, o.total_amount, \
     o.payment_method, o.payment_status, o.order_status, o.delivery_address, o.tracking_info, \
     o.escrow_released, o.escrow_release_date, o.notes, o.created_at, \
     b.name, b.email, s.name, s.email, l.title, l.price, l.images";

const ORDER_JOINS: &str = "FROM orders o \
     JOIN users b ON b.id = o.buyer \
     JOIN users s ON s.id = o.seller \
     JOIN listings l ON l.id = o.listing";

fn map_order(row: &Row) -> rusqlite::Result<OrderRow> {
    Ok(OrderRow {
        id: row.get(0)?,
        buyer: row.get(1)?,
        seller: row.get(2)?,
        listing: row.get(3)?,
        quantity: row.get(4)?,
        total_amount: row.get(5)?,
        payment_method: row.get(6)?,
        payment_status: row.get(7)?,
        order_status: row.get(8)?,
        delivery_address: row.get(9)?,
        tracking_info: row.get(10)?,
        escrow_released: row.get(11)?,
        escrow_release_date: row.get(12)?,
        notes: row.get(13)?,
        created_at: row.get(14)?,
        buyer_name: row.get(15)?,
        buyer_email: row.get(16)?,
        seller_name: row.get(17)?,
        seller_email: row.get(18)?,
        listing_title: row.get(19)?,
        listing_price: row.get(20)?,
        listing_images: row.get(21)?,
    })
}

impl Database {
    /// Place an order. The seller and total are derived from the listing
    /// inside the same transaction that decrements stock, so two buyers
    /// racing for the last unit cannot both succeed. The listing flips to
    /// `sold` when its stock reaches zero.
    pub fn create_order(&self, order: &NewOrder) -> Result<OrderCreation> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let listing: Option<(String, f64, i64, String)> = tx
                .query_row(
                    "SELECT seller, price, stock, status FROM listings WHERE id = ?1",
                    [&order.listing],
                    |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    },
                )
                .optional()?;

            let Some((seller, price, stock, status)) = listing else {
                return Ok(OrderCreation::ListingNotFound);
            };
            if status != "active" {
                return Ok(OrderCreation::ListingNotActive);
            }
            if stock < order.quantity {
                return Ok(OrderCreation::InsufficientStock);
            }

            tx.execute(
                "UPDATE listings SET \
                 stock = stock - ?2, \
                 status = CASE WHEN stock - ?2 <= 0 THEN 'sold' ELSE status END, \
                 updated_at = ?3 \
                 WHERE id = ?1",
                rusqlite::params![order.listing, order.quantity, now()],
            )?;

            let total = price * order.quantity as f64;
            tx.execute(
                "INSERT INTO orders (id, buyer, seller, listing, quantity, total_amount, \
                 payment_method, payment_status, delivery_address, notes, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    order.id,
                    order.buyer,
                    seller,
                    order.listing,
                    order.quantity,
                    total,
                    order.payment_method,
                    order.payment_status,
                    order.delivery_address,
                    order.notes,
                    now(),
                ],
            )?;

            tx.commit()?;
            Ok(OrderCreation::Created { seller, total })
        })
    }

    pub fn get_order(&self, id: &str) -> Result<Option<OrderRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {ORDER_COLS} {ORDER_JOINS} WHERE o.id = ?1"),
                [id],
                map_order,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn get_orders_by_buyer(&self, buyer: &str) -> Result<Vec<OrderRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ORDER_COLS} {ORDER_JOINS} WHERE o.buyer = ?1 ORDER BY o.created_at DESC"
            ))?;
            let rows = stmt.query_map([buyer], map_order)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    pub fn get_orders_by_seller(&self, seller: &str) -> Result<Vec<OrderRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ORDER_COLS} {ORDER_JOINS} WHERE o.seller = ?1 ORDER BY o.created_at DESC"
            ))?;
            let rows = stmt.query_map([seller], map_order)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    /// Seller-side mutation: status plus, optionally, tracking details.
    pub fn update_order_status(
        &self,
        id: &str,
        status: &str,
        tracking_info: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE orders SET \
                 order_status = ?2, \
                 tracking_info = COALESCE(?3, tracking_info) \
                 WHERE id = ?1",
                rusqlite::params![id, status, tracking_info],
            )?;
            Ok(())
        })
    }

    pub fn release_escrow(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE orders SET escrow_released = 1, escrow_release_date = ?2 WHERE id = ?1",
                rusqlite::params![id, now()],
            )?;
            Ok(())
        })
    }
}
