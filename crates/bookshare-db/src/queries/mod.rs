pub mod blogs;
pub mod chat;
pub mod listings;
pub mod notes;
pub mod notifications;
pub mod orders;
pub mod users;
pub mod wishlist;
