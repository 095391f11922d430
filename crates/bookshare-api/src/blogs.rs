use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use bookshare_db::models::{BlogReplyRow, BlogRow};
use bookshare_db::queries::blogs::NewBlog;
use bookshare_types::api::{
    ApiResponse, BlogReplyResponse, BlogResponse, Claims, CreateBlogRequest, CreateReplyRequest,
    UserRef,
};
use bookshare_types::models::Role;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::{parse_ts, parse_uuid};

pub fn blog_response(row: &BlogRow) -> BlogResponse {
    BlogResponse {
        id: parse_uuid(&row.id, "blog id"),
        title: row.title.clone(),
        content: row.content.clone(),
        author: UserRef {
            id: parse_uuid(&row.author, "author id"),
            name: row.author_name.clone(),
            email: None,
            role: Role::parse(&row.author_role),
        },
        category: row.category.clone(),
        tags: serde_json::from_str(&row.tags).unwrap_or_else(|e| {
            warn!("Corrupt tags for blog '{}': {}", row.id, e);
            vec![]
        }),
        views: row.views.max(0) as u64,
        replies: row.replies.max(0) as u64,
        likes: row.likes.max(0) as u64,
        created_at: parse_ts(&row.created_at, "blog"),
    }
}

fn reply_response(row: &BlogReplyRow) -> BlogReplyResponse {
    BlogReplyResponse {
        id: parse_uuid(&row.id, "reply id"),
        author: UserRef {
            id: parse_uuid(&row.author, "author id"),
            name: row.author_name.clone(),
            email: None,
            role: None,
        },
        content: row.content.clone(),
        created_at: parse_ts(&row.created_at, "reply"),
    }
}

pub async fn create_blog(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateBlogRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.title.trim().is_empty() {
        return Err(ApiError::validation("title is required"));
    }
    if req.content.trim().is_empty() {
        return Err(ApiError::validation("content is required"));
    }

    let blog = NewBlog {
        id: Uuid::new_v4().to_string(),
        title: req.title.trim().to_string(),
        content: req.content,
        author: claims.sub.to_string(),
        category: req.category,
        tags: serde_json::to_string(&req.tags).map_err(|e| ApiError::Internal(e.into()))?,
    };

    state.db.insert_blog(&blog)?;

    let row = state.db.get_blog(&blog.id)?.ok_or(ApiError::NotFound("post"))?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(blog_response(&row))),
    ))
}

pub async fn get_blogs(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let rows = state.db.get_blogs()?;
    let blogs: Vec<_> = rows.iter().map(blog_response).collect();
    Ok(Json(ApiResponse::ok(blogs)))
}

/// Public read; counts as a view. Replies ride along with the post.
pub async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let id = id.to_string();
    state.db.increment_blog_views(&id)?;

    let row = state.db.get_blog(&id)?.ok_or(ApiError::NotFound("post"))?;
    let replies: Vec<_> = state
        .db
        .get_blog_replies(&id)?
        .iter()
        .map(reply_response)
        .collect();

    Ok(Json(ApiResponse::ok(serde_json::json!({
        "blog": blog_response(&row),
        "replies": replies,
    }))))
}

pub async fn create_reply(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateReplyRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.content.trim().is_empty() {
        return Err(ApiError::validation("content is required"));
    }

    let blog_id = id.to_string();
    if state.db.get_blog(&blog_id)?.is_none() {
        return Err(ApiError::NotFound("post"));
    }

    let reply_id = Uuid::new_v4().to_string();
    state
        .db
        .insert_blog_reply(&reply_id, &blog_id, &claims.sub.to_string(), req.content.trim())?;

    let replies: Vec<_> = state
        .db
        .get_blog_replies(&blog_id)?
        .iter()
        .map(reply_response)
        .collect();

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(replies))))
}

/// One like per user; a second like is reported as a conflict.
pub async fn like_blog(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let blog_id = id.to_string();
    if state.db.get_blog(&blog_id)?.is_none() {
        return Err(ApiError::NotFound("post"));
    }

    if !state.db.like_blog(&blog_id, &claims.sub.to_string())? {
        return Err(ApiError::conflict("you have already liked this post"));
    }

    let row = state.db.get_blog(&blog_id)?.ok_or(ApiError::NotFound("post"))?;
    Ok(Json(ApiResponse::ok(blog_response(&row))))
}
