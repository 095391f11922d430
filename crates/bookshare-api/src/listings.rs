use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use bookshare_db::models::{BidRow, ListingRow};
use bookshare_db::queries::listings::{ListingPatch, NewListing};
use bookshare_types::api::{
    ApiResponse, Claims, ListingResponse, PlaceBidRequest, RateListingRequest, UserRef,
};
use bookshare_types::models::{
    Bid, Category, Condition, DeliveryOption, ImageRef, ListingLocation, ListingStatus,
    ListingType, NotificationKind, RatingAggregate, Role, SaleType,
};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::{form, parse_ts, parse_uuid};

pub fn listing_response(row: &ListingRow, bids: &[BidRow]) -> ListingResponse {
    ListingResponse {
        id: parse_uuid(&row.id, "listing id"),
        title: row.title.clone(),
        author: row.author.clone(),
        isbn: row.isbn.clone(),
        edition: row.edition.clone(),
        price: row.price,
        original_price: row.original_price,
        condition: Condition::parse(&row.condition).unwrap_or(Condition::Good),
        description: row.description.clone(),
        category: Category::parse(&row.category).unwrap_or(Category::School),
        subject: row.subject.clone(),
        course: row.course.clone(),
        exam_type: row.exam_type.clone(),
        listing_type: ListingType::parse(&row.listing_type).unwrap_or(ListingType::Physical),
        digital_file: row
            .digital_file
            .as_deref()
            .and_then(|f| serde_json::from_str(f).ok()),
        sale_type: SaleType::parse(&row.sale_type).unwrap_or(SaleType::Fixed),
        auction_end_date: row
            .auction_end_date
            .as_deref()
            .and_then(|d| d.parse().ok()),
        current_bid: row.current_bid,
        bidders: bids
            .iter()
            .map(|b| Bid {
                user: parse_uuid(&b.user_id, "bidder id"),
                amount: b.amount,
                timestamp: parse_ts(&b.created_at, "bid"),
            })
            .collect(),
        images: serde_json::from_str(&row.images).unwrap_or_else(|e| {
            warn!("Corrupt images for listing '{}': {}", row.id, e);
            vec![]
        }),
        stock: row.stock.max(0) as u32,
        seller: UserRef {
            id: parse_uuid(&row.seller, "seller id"),
            name: row.seller_name.clone(),
            email: Some(row.seller_email.clone()),
            role: None,
        },
        status: ListingStatus::parse(&row.status).unwrap_or(ListingStatus::Inactive),
        views: row.views.max(0) as u64,
        location: row
            .location
            .as_deref()
            .and_then(|loc| serde_json::from_str(loc).ok()),
        delivery_options: serde_json::from_str(&row.delivery_options).unwrap_or_default(),
        rating: RatingAggregate {
            average: row.rating_average,
            count: row.rating_count as u32,
        },
        created_at: parse_ts(&row.created_at, "listing"),
        updated_at: parse_ts(&row.updated_at, "listing"),
    }
}

/// Multipart create. Any client-supplied seller field is ignored; the
/// authenticated user is always recorded as the seller.
pub async fn create_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    // Libraries must clear KYC before they can sell
    if claims.role == Role::Library {
        let user = state
            .db
            .get_user_by_id(&claims.sub.to_string())?
            .ok_or(ApiError::NotFound("user"))?;
        if user.kyc_status != "verified" {
            return Err(ApiError::conflict(
                "library accounts must complete KYC verification before listing",
            ));
        }
    }

    let form = form::collect(multipart, &state.storage).await?;

    let price = form.f64("price")?;
    if price < 1.0 {
        return Err(ApiError::validation("price must be at least 1"));
    }

    let sale_type = form
        .opt_enum("saleType", SaleType::parse)?
        .unwrap_or(SaleType::Fixed);
    let auction_end_date = form
        .opt_text("auctionEndDate")
        .map(|d| {
            d.parse::<chrono::DateTime<chrono::Utc>>()
                .map_err(|_| ApiError::validation("auctionEndDate must be an RFC 3339 timestamp"))
        })
        .transpose()?;
    if sale_type == SaleType::Auction {
        match auction_end_date {
            None => return Err(ApiError::validation("auctionEndDate is required for auctions")),
            Some(end) if end <= chrono::Utc::now() => {
                return Err(ApiError::validation("auctionEndDate must be in the future"));
            }
            Some(_) => {}
        }
    }

    let images = match form.file("bookImage") {
        Some(stored) => vec![ImageRef {
            url: stored.url.clone(),
            caption: Some("Book image".to_string()),
        }],
        None => vec![],
    };

    let listing_type = form
        .opt_enum("listingType", ListingType::parse)?
        .unwrap_or(ListingType::Physical);
    let digital_file = form.file("noteFile").map(|stored| {
        serde_json::json!({
            "url": stored.url,
            "format": stored.format,
            "size": stored.size,
        })
        .to_string()
    });

    let location: Option<ListingLocation> = form.opt_json("location")?;
    let delivery_options: Vec<DeliveryOption> =
        form.opt_json("deliveryOptions")?.unwrap_or_default();

    let listing = NewListing {
        id: Uuid::new_v4().to_string(),
        title: form.text("title")?.to_string(),
        author: form.text("author")?.to_string(),
        isbn: form.opt_text("isbn").map(str::to_string),
        edition: form.opt_text("edition").map(str::to_string),
        price,
        original_price: form.opt_f64("originalPrice")?,
        condition: form.required_enum("condition", Condition::parse)?.as_str().to_string(),
        description: form.text("description")?.to_string(),
        category: form.required_enum("category", Category::parse)?.as_str().to_string(),
        subject: form.opt_text("subject").map(str::to_string),
        course: form.opt_text("course").map(str::to_string),
        exam_type: form.opt_text("examType").map(str::to_string),
        listing_type: listing_type.as_str().to_string(),
        digital_file,
        sale_type: sale_type.as_str().to_string(),
        auction_end_date: auction_end_date.map(|d| d.to_rfc3339()),
        images: serde_json::to_string(&images).map_err(|e| ApiError::Internal(e.into()))?,
        stock: i64::from(form.opt_u32("stock")?.unwrap_or(1)),
        seller: claims.sub.to_string(),
        location: location
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ApiError::Internal(e.into()))?,
        delivery_options: serde_json::to_string(&delivery_options)
            .map_err(|e| ApiError::Internal(e.into()))?,
    };

    state.db.insert_listing(&listing)?;
    info!("Listing {} created by {}", listing.id, claims.sub);

    let row = state
        .db
        .get_listing(&listing.id)?
        .ok_or(ApiError::NotFound("listing"))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(listing_response(&row, &[]))),
    ))
}

/// Public browse view, active listings only.
pub async fn get_listings(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let rows = state.db.get_active_listings()?;
    let listings: Vec<_> = rows.iter().map(|r| listing_response(r, &[])).collect();
    Ok(Json(ApiResponse::ok(listings)))
}

pub async fn get_my_listings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let rows = state.db.get_listings_by_seller(&claims.sub.to_string())?;
    let listings: Vec<_> = rows.iter().map(|r| listing_response(r, &[])).collect();
    Ok(Json(ApiResponse::ok(listings)))
}

/// Public detail view. Reading a listing counts as a view.
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let id = id.to_string();
    state.db.increment_listing_views(&id)?;

    let row = state.db.get_listing(&id)?.ok_or(ApiError::NotFound("listing"))?;
    let bids = state.db.get_bids(&id)?;

    Ok(Json(ApiResponse::ok(listing_response(&row, &bids))))
}

/// Owner-only multipart patch over the explicitly mutable fields.
pub async fn update_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let id = id.to_string();
    let existing = state.db.get_listing(&id)?.ok_or(ApiError::NotFound("listing"))?;
    if existing.seller != claims.sub.to_string() {
        return Err(ApiError::Forbidden("listing"));
    }

    let form = form::collect(multipart, &state.storage).await?;

    // Status moves must follow the listing lifecycle
    let status = form.opt_enum("status", ListingStatus::parse)?;
    if let Some(next) = status {
        let current = ListingStatus::parse(&existing.status).unwrap_or(ListingStatus::Inactive);
        if next != current && !current.can_transition_to(next) {
            return Err(ApiError::conflict(format!(
                "cannot move listing from {} to {}",
                current.as_str(),
                next.as_str()
            )));
        }
    }

    let price = form.opt_f64("price")?;
    if let Some(p) = price {
        if p < 1.0 {
            return Err(ApiError::validation("price must be at least 1"));
        }
    }

    let location: Option<ListingLocation> = form.opt_json("location")?;
    let delivery_options: Option<Vec<DeliveryOption>> = form.opt_json("deliveryOptions")?;

    let images = form.file("bookImage").map(|stored| {
        let images = vec![ImageRef {
            url: stored.url.clone(),
            caption: Some("Book image".to_string()),
        }];
        serde_json::to_string(&images).unwrap_or_else(|_| "[]".to_string())
    });

    let patch = ListingPatch {
        title: form.opt_text("title").map(str::to_string),
        author: form.opt_text("author").map(str::to_string),
        isbn: form.opt_text("isbn").map(str::to_string),
        edition: form.opt_text("edition").map(str::to_string),
        price,
        original_price: form.opt_f64("originalPrice")?,
        condition: form
            .opt_enum("condition", Condition::parse)?
            .map(|c| c.as_str().to_string()),
        description: form.opt_text("description").map(str::to_string),
        category: form
            .opt_enum("category", Category::parse)?
            .map(|c| c.as_str().to_string()),
        subject: form.opt_text("subject").map(str::to_string),
        course: form.opt_text("course").map(str::to_string),
        exam_type: form.opt_text("examType").map(str::to_string),
        sale_type: form
            .opt_enum("saleType", SaleType::parse)?
            .map(|s| s.as_str().to_string()),
        auction_end_date: form.opt_text("auctionEndDate").map(str::to_string),
        stock: form.opt_u32("stock")?.map(i64::from),
        status: status.map(|s| s.as_str().to_string()),
        location: location
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ApiError::Internal(e.into()))?,
        delivery_options: delivery_options
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ApiError::Internal(e.into()))?,
        images,
    };

    state.db.update_listing(&id, &patch)?;

    // Price drops wake up wishlist alerts
    if let Some(new_price) = price {
        if new_price < existing.price {
            for watcher in state.db.price_alert_watchers(&id, new_price)? {
                state.db.insert_notification(
                    &watcher,
                    NotificationKind::PriceAlert.as_str(),
                    &format!("Price drop: {} is now ₹{}", existing.title, new_price),
                )?;
            }
        }
    }

    let row = state.db.get_listing(&id)?.ok_or(ApiError::NotFound("listing"))?;
    let bids = state.db.get_bids(&id)?;
    Ok(Json(ApiResponse::ok(listing_response(&row, &bids))))
}

pub async fn delete_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let id = id.to_string();
    let existing = state.db.get_listing(&id)?.ok_or(ApiError::NotFound("listing"))?;
    if existing.seller != claims.sub.to_string() {
        return Err(ApiError::Forbidden("listing"));
    }

    state.db.delete_listing(&id)?;
    info!("Listing {} deleted by {}", id, claims.sub);

    Ok(Json(ApiResponse::<()>::message("Listing deleted")))
}

/// Auction bid: must beat the current high bid (or the asking price when
/// no bids exist) while the auction is open.
pub async fn place_bid(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<PlaceBidRequest>,
) -> ApiResult<impl IntoResponse> {
    let id = id.to_string();
    let listing = state.db.get_listing(&id)?.ok_or(ApiError::NotFound("listing"))?;

    if listing.sale_type != "auction" {
        return Err(ApiError::validation("this listing is not an auction"));
    }
    if listing.status != "active" {
        return Err(ApiError::conflict("this auction is no longer active"));
    }
    if listing.seller == claims.sub.to_string() {
        return Err(ApiError::validation("you cannot bid on your own listing"));
    }
    if let Some(end) = listing.auction_end_date.as_deref() {
        let end = parse_ts(end, "auction end");
        if chrono::Utc::now() >= end {
            return Err(ApiError::conflict("this auction has ended"));
        }
    }

    let floor = listing.current_bid.unwrap_or(listing.price);
    if req.amount <= floor {
        return Err(ApiError::validation(format!(
            "bid must be higher than the current price of {floor}"
        )));
    }

    state.db.place_bid(&id, &claims.sub.to_string(), req.amount)?;
    state.db.insert_notification(
        &listing.seller,
        NotificationKind::OfferReceived.as_str(),
        &format!("New bid of ₹{} on {}", req.amount, listing.title),
    )?;

    let row = state.db.get_listing(&id)?.ok_or(ApiError::NotFound("listing"))?;
    let bids = state.db.get_bids(&id)?;
    Ok(Json(ApiResponse::ok(listing_response(&row, &bids))))
}

/// Rate a listing 1–5; the seller's aggregate moves with it.
pub async fn rate_listing(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<RateListingRequest>,
) -> ApiResult<impl IntoResponse> {
    if !(1..=5).contains(&req.rating) {
        return Err(ApiError::validation("rating must be between 1 and 5"));
    }

    let id = id.to_string();
    let listing = state.db.get_listing(&id)?.ok_or(ApiError::NotFound("listing"))?;

    state.db.add_listing_rating(&id, req.rating)?;
    state.db.add_user_rating(&listing.seller, req.rating)?;

    let row = state.db.get_listing(&id)?.ok_or(ApiError::NotFound("listing"))?;
    Ok(Json(ApiResponse::ok(listing_response(&row, &[]))))
}
