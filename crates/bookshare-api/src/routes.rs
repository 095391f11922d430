use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use bookshare_types::api::ApiResponse;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{blogs, chat, listings, notes, notifications, orders, payments, users, wishlist};

/// Uploads are capped at 10 MB per file; leave headroom for the rest of
/// the multipart body.
const MAX_BODY_BYTES: usize = 12 * 1024 * 1024;

/// The full API surface. Browse endpoints are public; everything that
/// writes (or reads private state) sits behind bearer auth.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/listings", get(listings::get_listings))
        .route("/api/listings/{id}", get(listings::get_listing))
        .route("/api/blogs", get(blogs::get_blogs))
        .route("/api/blogs/{id}", get(blogs::get_blog))
        .route("/api/notes", get(notes::get_notes))
        .route("/api/payment/create-order", post(payments::create_payment_order))
        .route("/api/payment/verify", post(payments::verify_payment))
        .route("/health", get(health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/users/profile", get(users::get_profile).put(users::update_profile))
        .route("/api/users/kyc", post(users::submit_kyc))
        .route("/api/users/{id}/kyc", put(users::update_kyc_status))
        .route("/api/listings", post(listings::create_listing))
        .route("/api/listings/my", get(listings::get_my_listings))
        .route(
            "/api/listings/{id}",
            put(listings::update_listing).delete(listings::delete_listing),
        )
        .route("/api/listings/{id}/bids", post(listings::place_bid))
        .route("/api/listings/{id}/ratings", post(listings::rate_listing))
        .route("/api/orders", post(orders::create_order))
        .route("/api/orders/my-orders", get(orders::get_my_orders))
        .route("/api/orders/my-sales", get(orders::get_my_sales))
        .route("/api/orders/{id}/status", put(orders::update_order_status))
        .route("/api/orders/{id}/confirm-delivery", post(orders::confirm_delivery))
        .route("/api/notes/upload", post(notes::upload_notes))
        .route("/api/notes/{id}/download", get(notes::download_note))
        .route("/api/blogs", post(blogs::create_blog))
        .route("/api/blogs/{id}/replies", post(blogs::create_reply))
        .route("/api/blogs/{id}/likes", post(blogs::like_blog))
        .route("/api/wishlist", get(wishlist::get_wishlist).post(wishlist::add_to_wishlist))
        .route("/api/wishlist/{listing_id}", delete(wishlist::remove_from_wishlist))
        .route("/api/wishlist/check/{listing_id}", get(wishlist::check_wishlist_item))
        .route("/api/chats", get(chat::get_chats).post(chat::create_chat))
        .route("/api/chats/{id}/messages", get(chat::get_messages).post(chat::send_message))
        .route("/api/chats/{id}/messages/{message_id}/offer", put(chat::update_offer))
        .route("/api/notifications", get(notifications::get_notifications))
        .route("/api/notifications/read-all", put(notifications::mark_all_read))
        .route("/api/notifications/{id}/read", put(notifications::mark_read))
        .layer(middleware::from_fn(require_auth))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/uploads", ServeDir::new(state.storage.root()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(ApiResponse::<()>::message("BookShare API is running"))
}
