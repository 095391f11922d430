use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                  TEXT PRIMARY KEY,
            name                TEXT NOT NULL,
            email               TEXT NOT NULL UNIQUE,
            phone               TEXT,
            password            TEXT NOT NULL,
            role                TEXT NOT NULL DEFAULT 'student',
            avatar              TEXT,
            academic_interests  TEXT NOT NULL DEFAULT '[]',
            library_name        TEXT,
            gst_number          TEXT,
            location            TEXT,
            kyc_status          TEXT NOT NULL DEFAULT 'pending',
            kyc_documents       TEXT NOT NULL DEFAULT '[]',
            rating_average      REAL NOT NULL DEFAULT 0,
            rating_count        INTEGER NOT NULL DEFAULT 0,
            is_active           INTEGER NOT NULL DEFAULT 1,
            created_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS listings (
            id                  TEXT PRIMARY KEY,
            title               TEXT NOT NULL,
            author              TEXT NOT NULL,
            isbn                TEXT,
            edition             TEXT,
            price               REAL NOT NULL CHECK (price >= 1),
            original_price      REAL,
            condition           TEXT NOT NULL,
            description         TEXT NOT NULL,
            category            TEXT NOT NULL,
            subject             TEXT,
            course              TEXT,
            exam_type           TEXT,
            listing_type        TEXT NOT NULL DEFAULT 'physical',
            digital_file        TEXT,
            sale_type           TEXT NOT NULL DEFAULT 'fixed',
            auction_end_date    TEXT,
            current_bid         REAL,
            images              TEXT NOT NULL DEFAULT '[]',
            stock               INTEGER NOT NULL DEFAULT 1,
            seller              TEXT NOT NULL REFERENCES users(id),
            status              TEXT NOT NULL DEFAULT 'active',
            views               INTEGER NOT NULL DEFAULT 0,
            location            TEXT,
            delivery_options    TEXT NOT NULL DEFAULT '[]',
            rating_average      REAL NOT NULL DEFAULT 0,
            rating_count        INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_listings_status
            ON listings(status, created_at);
        CREATE INDEX IF NOT EXISTS idx_listings_seller
            ON listings(seller, created_at);

        CREATE TABLE IF NOT EXISTS bids (
            id          TEXT PRIMARY KEY,
            listing_id  TEXT NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id),
            amount      REAL NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_bids_listing
            ON bids(listing_id, created_at);

        CREATE TABLE IF NOT EXISTS orders (
            id                  TEXT PRIMARY KEY,
            buyer               TEXT NOT NULL REFERENCES users(id),
            seller              TEXT NOT NULL REFERENCES users(id),
            listing             TEXT NOT NULL REFERENCES listings(id),
            quantity            INTEGER NOT NULL DEFAULT 1 CHECK (quantity >= 1),
            total_amount        REAL NOT NULL,
            payment_method      TEXT NOT NULL,
            payment_status      TEXT NOT NULL DEFAULT 'pending',
            order_status        TEXT NOT NULL DEFAULT 'placed',
            delivery_address    TEXT,
            tracking_info       TEXT,
            escrow_released     INTEGER NOT NULL DEFAULT 0,
            escrow_release_date TEXT,
            notes               TEXT,
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_orders_buyer
            ON orders(buyer, created_at);
        CREATE INDEX IF NOT EXISTS idx_orders_seller
            ON orders(seller, created_at);

        CREATE TABLE IF NOT EXISTS notes (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            subject     TEXT NOT NULL,
            class_level TEXT NOT NULL,
            board       TEXT NOT NULL,
            description TEXT,
            price       REAL NOT NULL,
            pages       INTEGER NOT NULL,
            file_url    TEXT,
            author      TEXT NOT NULL REFERENCES users(id),
            downloads   INTEGER NOT NULL DEFAULT 0,
            rating      REAL NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS blogs (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            content     TEXT NOT NULL,
            author      TEXT NOT NULL REFERENCES users(id),
            category    TEXT NOT NULL,
            tags        TEXT NOT NULL DEFAULT '[]',
            views       INTEGER NOT NULL DEFAULT 0,
            replies     INTEGER NOT NULL DEFAULT 0,
            likes       INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS blog_replies (
            id          TEXT PRIMARY KEY,
            blog_id     TEXT NOT NULL REFERENCES blogs(id) ON DELETE CASCADE,
            author      TEXT NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_blog_replies_blog
            ON blog_replies(blog_id, created_at);

        CREATE TABLE IF NOT EXISTS blog_likes (
            blog_id     TEXT NOT NULL REFERENCES blogs(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            UNIQUE(blog_id, user_id)
        );

        -- One wishlist per user, one row per saved listing
        CREATE TABLE IF NOT EXISTS wishlist_items (
            user_id         TEXT NOT NULL REFERENCES users(id),
            listing_id      TEXT NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
            added_at        TEXT NOT NULL,
            alert_enabled   INTEGER NOT NULL DEFAULT 0,
            target_price    REAL,
            UNIQUE(user_id, listing_id)
        );

        CREATE INDEX IF NOT EXISTS idx_wishlist_user
            ON wishlist_items(user_id, added_at);

        CREATE TABLE IF NOT EXISTS chats (
            id          TEXT PRIMARY KEY,
            listing_id  TEXT REFERENCES listings(id) ON DELETE SET NULL,
            is_active   INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chat_participants (
            chat_id     TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id),
            UNIQUE(chat_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_chat_participants_user
            ON chat_participants(user_id);

        CREATE TABLE IF NOT EXISTS chat_messages (
            id              TEXT PRIMARY KEY,
            chat_id         TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            sender          TEXT NOT NULL REFERENCES users(id),
            content         TEXT NOT NULL,
            message_type    TEXT NOT NULL DEFAULT 'text',
            offer_amount    REAL,
            offer_listing   TEXT,
            offer_status    TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_chat
            ON chat_messages(chat_id, created_at);

        CREATE TABLE IF NOT EXISTS message_reads (
            message_id  TEXT NOT NULL REFERENCES chat_messages(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id),
            read_at     TEXT NOT NULL,
            UNIQUE(message_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS notifications (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            kind        TEXT NOT NULL,
            message     TEXT NOT NULL,
            read        INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
