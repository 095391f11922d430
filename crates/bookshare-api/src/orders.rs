use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use bookshare_db::models::OrderRow;
use bookshare_db::queries::orders::{NewOrder, OrderCreation};
use bookshare_types::api::{
    ApiResponse, Claims, CreateOrderRequest, ListingRef, OrderResponse, UpdateOrderStatusRequest,
    UserRef,
};
use bookshare_types::models::{NotificationKind, OrderStatus, PaymentMethod, PaymentStatus};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::{parse_ts, parse_uuid};

pub fn order_response(row: &OrderRow) -> OrderResponse {
    OrderResponse {
        id: parse_uuid(&row.id, "order id"),
        buyer: UserRef {
            id: parse_uuid(&row.buyer, "buyer id"),
            name: row.buyer_name.clone(),
            email: Some(row.buyer_email.clone()),
            role: None,
        },
        seller: UserRef {
            id: parse_uuid(&row.seller, "seller id"),
            name: row.seller_name.clone(),
            email: Some(row.seller_email.clone()),
            role: None,
        },
        listing: ListingRef {
            id: parse_uuid(&row.listing, "listing id"),
            title: row.listing_title.clone(),
            price: row.listing_price,
            images: serde_json::from_str(&row.listing_images).unwrap_or_default(),
        },
        quantity: row.quantity.max(0) as u32,
        total_amount: row.total_amount,
        payment_method: PaymentMethod::parse(&row.payment_method).unwrap_or(PaymentMethod::Cod),
        payment_status: PaymentStatus::parse(&row.payment_status).unwrap_or(PaymentStatus::Pending),
        order_status: OrderStatus::parse(&row.order_status).unwrap_or_else(|| {
            warn!("Corrupt order_status '{}' on order '{}'", row.order_status, row.id);
            OrderStatus::Placed
        }),
        delivery_address: row
            .delivery_address
            .as_deref()
            .and_then(|a| serde_json::from_str(a).ok()),
        tracking_info: row
            .tracking_info
            .as_deref()
            .and_then(|t| serde_json::from_str(t).ok()),
        escrow_released: row.escrow_released,
        escrow_release_date: row
            .escrow_release_date
            .as_deref()
            .and_then(|d| d.parse().ok()),
        notes: row.notes.clone(),
        created_at: parse_ts(&row.created_at, "order"),
    }
}

/// Checkout. The seller and the total are derived from the listing on the
/// server; whatever the client claims about either is ignored. Prepaid
/// methods arrive after the gateway flow, so they start out `paid`;
/// cash-on-delivery starts `pending`.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.quantity < 1 {
        return Err(ApiError::validation("quantity must be at least 1"));
    }

    let payment_status = match req.payment_method {
        PaymentMethod::Cod => PaymentStatus::Pending,
        _ => PaymentStatus::Paid,
    };

    let order_id = Uuid::new_v4().to_string();
    let delivery_address = req
        .delivery_address
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ApiError::Internal(e.into()))?;

    let outcome = state.db.create_order(&NewOrder {
        id: order_id.clone(),
        buyer: claims.sub.to_string(),
        listing: req.listing.to_string(),
        quantity: i64::from(req.quantity),
        payment_method: req.payment_method.as_str().to_string(),
        payment_status: payment_status.as_str().to_string(),
        delivery_address,
        notes: req.notes.clone(),
    })?;

    let seller = match outcome {
        OrderCreation::Created { seller, total } => {
            info!(
                "Order {} placed by {} for listing {} (total {})",
                order_id, claims.sub, req.listing, total
            );
            seller
        }
        OrderCreation::ListingNotFound => return Err(ApiError::NotFound("listing")),
        OrderCreation::ListingNotActive => {
            return Err(ApiError::conflict("this listing is no longer available"));
        }
        OrderCreation::InsufficientStock => {
            return Err(ApiError::conflict("not enough stock for the requested quantity"));
        }
    };

    let row = state.db.get_order(&order_id)?.ok_or(ApiError::NotFound("order"))?;

    state.db.insert_notification(
        &seller,
        NotificationKind::OrderPlaced.as_str(),
        &format!("{} ordered {} × {}", claims.name, row.quantity, row.listing_title),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(order_response(&row))),
    ))
}

pub async fn get_my_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let rows = state.db.get_orders_by_buyer(&claims.sub.to_string())?;
    let orders: Vec<_> = rows.iter().map(order_response).collect();
    Ok(Json(ApiResponse::ok(orders)))
}

pub async fn get_my_sales(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let rows = state.db.get_orders_by_seller(&claims.sub.to_string())?;
    let orders: Vec<_> = rows.iter().map(order_response).collect();
    Ok(Json(ApiResponse::ok(orders)))
}

/// Seller-side fulfilment update. Transitions must follow the order
/// lifecycle; anything else is rejected as a conflict.
pub async fn update_order_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let id = id.to_string();
    let order = state.db.get_order(&id)?.ok_or(ApiError::NotFound("order"))?;
    if order.seller != claims.sub.to_string() {
        return Err(ApiError::Forbidden("order"));
    }

    let current = OrderStatus::parse(&order.order_status)
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("corrupt order_status '{}'", order.order_status)))?;
    if !current.can_transition_to(req.status) {
        return Err(ApiError::conflict(format!(
            "cannot move order from {} to {}",
            current.as_str(),
            req.status.as_str()
        )));
    }

    let tracking_info = req
        .tracking_info
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ApiError::Internal(e.into()))?;

    state
        .db
        .update_order_status(&id, req.status.as_str(), tracking_info.as_deref())?;

    state.db.insert_notification(
        &order.buyer,
        NotificationKind::OrderStatus.as_str(),
        &format!("Your order for {} is now {}", order.listing_title, req.status.as_str()),
    )?;

    let row = state.db.get_order(&id)?.ok_or(ApiError::NotFound("order"))?;
    Ok(Json(ApiResponse::ok(order_response(&row))))
}

/// Buyer confirms receipt, which releases the escrowed payout to the
/// seller. Requires a delivered order whose payment has cleared.
pub async fn confirm_delivery(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let id = id.to_string();
    let order = state.db.get_order(&id)?.ok_or(ApiError::NotFound("order"))?;
    if order.buyer != claims.sub.to_string() {
        return Err(ApiError::Forbidden("order"));
    }

    if order.order_status != "delivered" {
        return Err(ApiError::conflict("order has not been delivered yet"));
    }
    if order.payment_status != "paid" {
        return Err(ApiError::conflict("payment has not cleared for this order"));
    }
    if order.escrow_released {
        return Err(ApiError::conflict("escrow has already been released"));
    }

    state.db.release_escrow(&id)?;
    info!("Escrow released for order {} by buyer {}", id, claims.sub);

    state.db.insert_notification(
        &order.seller,
        NotificationKind::OrderStatus.as_str(),
        &format!("Payment released for {}", order.listing_title),
    )?;

    let row = state.db.get_order(&id)?.ok_or(ApiError::NotFound("order"))?;
    Ok(Json(ApiResponse::ok(order_response(&row))))
}
