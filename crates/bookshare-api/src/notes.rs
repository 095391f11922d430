use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use bookshare_db::models::NoteRow;
use bookshare_db::queries::notes::NewNote;
use bookshare_types::api::{ApiResponse, Claims, NoteResponse, UserRef};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::{form, parse_ts, parse_uuid};

pub fn note_response(row: &NoteRow) -> NoteResponse {
    NoteResponse {
        id: parse_uuid(&row.id, "note id"),
        title: row.title.clone(),
        subject: row.subject.clone(),
        class_level: row.class_level.clone(),
        board: row.board.clone(),
        description: row.description.clone(),
        price: row.price,
        pages: row.pages.max(0) as u32,
        file_url: row.file_url.clone(),
        author: UserRef {
            id: parse_uuid(&row.author, "author id"),
            name: row.author_name.clone(),
            email: None,
            role: None,
        },
        downloads: row.downloads.max(0) as u64,
        rating: row.rating,
        created_at: parse_ts(&row.created_at, "note"),
    }
}

/// Multipart upload of digital study material. The document arrives in
/// the `noteFile` field (PDF or Word only).
pub async fn upload_notes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = form::collect(multipart, &state.storage).await?;

    let pages = form
        .opt_u32("pages")?
        .ok_or_else(|| ApiError::validation("pages is required"))?;

    let note = NewNote {
        id: Uuid::new_v4().to_string(),
        title: form.text("title")?.to_string(),
        subject: form.text("subject")?.to_string(),
        class_level: form.text("class")?.to_string(),
        board: form.text("board")?.to_string(),
        description: form.opt_text("description").map(str::to_string),
        price: form.f64("price")?,
        pages: i64::from(pages),
        file_url: form.file("noteFile").map(|f| f.url.clone()),
        author: claims.sub.to_string(),
    };

    state.db.insert_note(&note)?;
    info!("Notes {} uploaded by {}", note.id, claims.sub);

    let row = state.db.get_note(&note.id)?.ok_or(ApiError::NotFound("notes"))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(note_response(&row))),
    ))
}

pub async fn get_notes(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let rows = state.db.get_notes()?;
    let notes: Vec<_> = rows.iter().map(note_response).collect();
    Ok(Json(ApiResponse::ok(notes)))
}

/// Hand out the file URL and count the download.
pub async fn download_note(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let id = id.to_string();
    let note = state.db.get_note(&id)?.ok_or(ApiError::NotFound("notes"))?;

    let Some(file_url) = note.file_url.clone() else {
        return Err(ApiError::NotFound("notes file"));
    };

    state.db.increment_note_downloads(&id)?;

    Ok(Json(ApiResponse::ok(serde_json::json!({ "fileUrl": file_url }))))
}
