use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum::{Extension, extract::Multipart};
use tracing::{info, warn};
use uuid::Uuid;

use bookshare_db::models::UserRow;
use bookshare_types::api::{ApiResponse, Claims, UpdateKycRequest, UpdateProfileRequest, UserResponse};
use bookshare_types::models::{KycStatus, RatingAggregate, Role, RoleProfile};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::{form, parse_ts, parse_uuid};

/// Project a user row into the public API shape. Corrupt JSON columns
/// degrade to empty values rather than failing the response.
pub fn user_response(row: &UserRow) -> UserResponse {
    let role = Role::parse(&row.role).unwrap_or(Role::Student);

    let profile = match role {
        Role::Student => RoleProfile::Student {
            academic_interests: serde_json::from_str(&row.academic_interests).unwrap_or_else(|e| {
                warn!("Corrupt academic_interests for user '{}': {}", row.id, e);
                vec![]
            }),
        },
        Role::Library => RoleProfile::Library {
            library_name: row.library_name.clone().unwrap_or_default(),
            gst_number: row.gst_number.clone().unwrap_or_default(),
            location: row
                .location
                .as_deref()
                .and_then(|loc| serde_json::from_str(loc).ok()),
        },
        Role::Admin => RoleProfile::Admin,
    };

    UserResponse {
        id: parse_uuid(&row.id, "user id"),
        name: row.name.clone(),
        email: row.email.clone(),
        phone: row.phone.clone(),
        profile,
        avatar: row.avatar.clone(),
        kyc_status: KycStatus::parse(&row.kyc_status).unwrap_or(KycStatus::Pending),
        kyc_documents: serde_json::from_str(&row.kyc_documents).unwrap_or_default(),
        rating: RatingAggregate {
            average: row.rating_average,
            count: row.rating_count as u32,
        },
        is_active: row.is_active,
        created_at: parse_ts(&row.created_at, "user"),
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(ApiResponse::ok(user_response(&user))))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let id = claims.sub.to_string();

    let academic_interests = req
        .academic_interests
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ApiError::Internal(e.into()))?;
    let location = req
        .location
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ApiError::Internal(e.into()))?;

    state.db.update_profile(
        &id,
        req.name.as_deref(),
        req.phone.as_deref(),
        req.avatar.as_deref(),
        academic_interests.as_deref(),
        location.as_deref(),
    )?;

    let user = state
        .db
        .get_user_by_id(&id)?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(ApiResponse::ok(user_response(&user))))
}

/// Multipart document submission. Replaces the stored document set and
/// puts the account back under review.
pub async fn submit_kyc(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = form::collect(multipart, &state.storage).await?;

    let documents: Vec<String> = form
        .files("file")
        .into_iter()
        .map(|f| f.url.clone())
        .collect();
    if documents.is_empty() {
        return Err(ApiError::validation("at least one document file is required"));
    }

    let documents_json =
        serde_json::to_string(&documents).map_err(|e| ApiError::Internal(e.into()))?;
    state
        .db
        .submit_kyc_documents(&claims.sub.to_string(), &documents_json)?;

    info!("User {} submitted {} KYC document(s)", claims.sub, documents.len());

    let user = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(ApiResponse::ok(user_response(&user))))
}

/// Admin verdict on a pending KYC submission.
pub async fn update_kyc_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateKycRequest>,
) -> ApiResult<impl IntoResponse> {
    if claims.role != Role::Admin {
        return Err(ApiError::Forbidden("operation"));
    }
    if req.status == KycStatus::Pending {
        return Err(ApiError::validation("status must be verified or rejected"));
    }

    if !state
        .db
        .set_kyc_status(&user_id.to_string(), req.status.as_str())?
    {
        return Err(ApiError::NotFound("user"));
    }

    info!("KYC for user {} set to {}", user_id, req.status.as_str());

    let user = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(ApiResponse::ok(user_response(&user))))
}
