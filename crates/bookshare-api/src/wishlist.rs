use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use bookshare_types::api::{
    ApiResponse, AddWishlistRequest, Claims, WishlistCheckResponse, WishlistItemResponse,
    WishlistResponse,
};
use bookshare_types::models::PriceAlert;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::listings::listing_response;
use crate::parse_ts;

/// The wishlist joined with live listing data, newest additions first.
pub async fn get_wishlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let items = state.db.get_wishlist_items(&claims.sub.to_string())?;

    let listing_ids: Vec<String> = items.iter().map(|i| i.listing_id.clone()).collect();
    let listings: HashMap<String, _> = state
        .db
        .get_listings_by_ids(&listing_ids)?
        .into_iter()
        .map(|row| (row.id.clone(), row))
        .collect();

    let listings: Vec<WishlistItemResponse> = items
        .iter()
        .filter_map(|item| {
            // deleted listings fall out of the wishlist view
            listings.get(&item.listing_id).map(|row| WishlistItemResponse {
                listing: listing_response(row, &[]),
                added_at: parse_ts(&item.added_at, "wishlist item"),
                price_alert: PriceAlert {
                    enabled: item.alert_enabled,
                    target_price: item.target_price,
                },
            })
        })
        .collect();

    Ok(Json(ApiResponse::ok(WishlistResponse { listings })))
}

pub async fn add_to_wishlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddWishlistRequest>,
) -> ApiResult<impl IntoResponse> {
    let listing_id = req.listing_id.to_string();
    if state.db.get_listing(&listing_id)?.is_none() {
        return Err(ApiError::NotFound("listing"));
    }

    let alert = req.price_alert.unwrap_or_default();
    let added = state.db.add_wishlist_item(
        &claims.sub.to_string(),
        &listing_id,
        alert.enabled,
        alert.target_price,
    )?;
    if !added {
        return Err(ApiError::conflict("Item already in wishlist"));
    }

    Ok(Json(ApiResponse::<()>::message("Item added to wishlist")))
}

pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(listing_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let removed = state
        .db
        .remove_wishlist_item(&claims.sub.to_string(), &listing_id.to_string())?;
    if !removed {
        return Err(ApiError::NotFound("wishlist item"));
    }

    Ok(Json(ApiResponse::<()>::message("Item removed from wishlist")))
}

pub async fn check_wishlist_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(listing_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let in_wishlist = state
        .db
        .is_in_wishlist(&claims.sub.to_string(), &listing_id.to_string())?;

    Ok(Json(ApiResponse::ok(WishlistCheckResponse { in_wishlist })))
}
