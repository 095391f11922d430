use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use bookshare_types::api::{ApiResponse, Claims, NotificationResponse};
use bookshare_types::models::NotificationKind;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::{parse_ts, parse_uuid};

pub async fn get_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let rows = state.db.get_notifications(&claims.sub.to_string())?;

    let notifications: Vec<NotificationResponse> = rows
        .iter()
        .map(|row| NotificationResponse {
            id: parse_uuid(&row.id, "notification id"),
            kind: NotificationKind::parse(&row.kind).unwrap_or(NotificationKind::OrderStatus),
            message: row.message.clone(),
            read: row.read,
            created_at: parse_ts(&row.created_at, "notification"),
        })
        .collect();

    Ok(Json(ApiResponse::ok(notifications)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let marked = state
        .db
        .mark_notification_read(&id.to_string(), &claims.sub.to_string())?;
    if !marked {
        return Err(ApiError::NotFound("notification"));
    }

    Ok(Json(ApiResponse::<()>::message("Notification marked as read")))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .mark_all_notifications_read(&claims.sub.to_string())?;

    Ok(Json(ApiResponse::<()>::message("All notifications marked as read")))
}
