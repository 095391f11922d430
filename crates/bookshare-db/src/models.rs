//! Database row types that map directly to SQLite rows.
//! Distinct from the bookshare-types API models to keep the DB layer
//! independent. Nested sub-documents (images, locations, addresses) are
//! stored as JSON text columns; enum-valued columns hold the wire strings.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub role: String,
    pub avatar: Option<String>,
    pub academic_interests: String,
    pub library_name: Option<String>,
    pub gst_number: Option<String>,
    pub location: Option<String>,
    pub kyc_status: String,
    pub kyc_documents: String,
    pub rating_average: f64,
    pub rating_count: i64,
    pub is_active: bool,
    pub created_at: String,
}

pub struct ListingRow {
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
    pub current_bid: Option<f64>,
    pub images: String,
    pub stock: i64,
    pub seller: String,
    pub status: String,
    pub views: i64,
    pub location: Option<String>,
    pub delivery_options: String,
    pub rating_average: f64,
    pub rating_count: i64,
    pub created_at: String,
    pub updated_at: String,
    // joined from users
    pub seller_name: String,
    pub seller_email: String,
}

pub struct BidRow {
    pub id: String,
    pub listing_id: String,
    pub user_id: String,
    pub amount: f64,
    pub created_at: String,
}

pub struct OrderRow {
    pub id: String,
    pub buyer: String,
    pub seller: String,
    pub listing: String,
    pub quantity: i64,
    pub total_amount: f64,
    pub payment_method: String,
    pub payment_status: String,
    pub order_status: String,
    pub delivery_address: Option<String>,
    pub tracking_info: Option<String>,
    pub escrow_released: bool,
    pub escrow_release_date: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    // joined from users and listings
    pub buyer_name: String,
    pub buyer_email: String,
    pub seller_name: String,
    pub seller_email: String,
    pub listing_title: String,
    pub listing_price: f64,
    pub listing_images: String,
}

pub struct NoteRow {
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
    pub downloads: i64,
    pub rating: f64,
    pub created_at: String,
    pub author_name: String,
}

pub struct BlogRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub category: String,
    pub tags: String,
    pub views: i64,
    pub replies: i64,
    pub likes: i64,
    pub created_at: String,
    pub author_name: String,
    pub author_role: String,
}

pub struct BlogReplyRow {
    pub id: String,
    pub blog_id: String,
    pub author: String,
    pub content: String,
    pub created_at: String,
    pub author_name: String,
}

pub struct WishlistItemRow {
    pub user_id: String,
    pub listing_id: String,
    pub added_at: String,
    pub alert_enabled: bool,
    pub target_price: Option<f64>,
}

pub struct ChatRow {
    pub id: String,
    pub listing_id: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ChatParticipantRow {
    pub chat_id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
}

pub struct ChatMessageRow {
    pub id: String,
    pub chat_id: String,
    pub sender: String,
    pub content: String,
    pub message_type: String,
    pub offer_amount: Option<f64>,
    pub offer_listing: Option<String>,
    pub offer_status: Option<String>,
    pub created_at: String,
    pub sender_name: String,
}

pub struct ReadReceiptRow {
    pub message_id: String,
    pub user_id: String,
    pub read_at: String,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub message: String,
    pub read: bool,
    pub created_at: String,
}
