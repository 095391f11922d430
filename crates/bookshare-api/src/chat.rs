use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use bookshare_db::models::{ChatMessageRow, ChatRow};
use bookshare_db::queries::chat::NewChatMessage;
use bookshare_types::api::{
    ApiResponse, ChatMessageResponse, ChatResponse, Claims, CreateChatRequest, LastMessage,
    ListingRef, ReadReceipt, SendChatMessageRequest, UpdateOfferRequest, UserRef,
};
use bookshare_types::models::{MessageType, NotificationKind, Offer, OfferStatus};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::{parse_ts, parse_uuid};

fn message_response(row: &ChatMessageRow, receipts: &[ReadReceipt]) -> ChatMessageResponse {
    ChatMessageResponse {
        id: parse_uuid(&row.id, "message id"),
        sender: UserRef {
            id: parse_uuid(&row.sender, "sender id"),
            name: row.sender_name.clone(),
            email: None,
            role: None,
        },
        content: row.content.clone(),
        message_type: MessageType::parse(&row.message_type).unwrap_or(MessageType::Text),
        offer: row.offer_amount.map(|amount| Offer {
            amount,
            listing: row.offer_listing.as_deref().map(|l| parse_uuid(l, "offer listing")),
            status: row
                .offer_status
                .as_deref()
                .and_then(OfferStatus::parse)
                .unwrap_or(OfferStatus::Pending),
        }),
        read_by: receipts.to_vec(),
        created_at: parse_ts(&row.created_at, "message"),
    }
}

async fn chat_response(state: &AppState, chat: &ChatRow) -> ApiResult<ChatResponse> {
    let participants = state
        .db
        .get_chat_participants(&chat.id)?
        .iter()
        .map(|p| UserRef {
            id: parse_uuid(&p.user_id, "participant id"),
            name: p.user_name.clone(),
            email: Some(p.user_email.clone()),
            role: None,
        })
        .collect();

    let listing = match chat.listing_id.as_deref() {
        Some(listing_id) => state.db.get_listing(listing_id)?.map(|row| ListingRef {
            id: parse_uuid(&row.id, "listing id"),
            title: row.title.clone(),
            price: row.price,
            images: serde_json::from_str(&row.images).unwrap_or_default(),
        }),
        None => None,
    };

    let last_message = state.db.get_last_chat_message(&chat.id)?.map(|m| LastMessage {
        content: m.content.clone(),
        timestamp: parse_ts(&m.created_at, "message"),
        sender: parse_uuid(&m.sender, "sender id"),
    });

    Ok(ChatResponse {
        id: parse_uuid(&chat.id, "chat id"),
        participants,
        listing,
        last_message,
        is_active: chat.is_active,
        created_at: parse_ts(&chat.created_at, "chat"),
    })
}

/// Guard shared by the message endpoints: the conversation must exist and
/// the caller must be in it.
fn require_participant(state: &AppState, chat_id: &str, user_id: &str) -> ApiResult<ChatRow> {
    let chat = state.db.get_chat(chat_id)?.ok_or(ApiError::NotFound("conversation"))?;
    if !state.db.is_chat_participant(chat_id, user_id)? {
        return Err(ApiError::Forbidden("conversation"));
    }
    Ok(chat)
}

/// Find or start a conversation with another user, optionally about a
/// listing.
pub async fn create_chat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChatRequest>,
) -> ApiResult<impl IntoResponse> {
    let me = claims.sub.to_string();
    let other = req.participant_id.to_string();

    if me == other {
        return Err(ApiError::validation("cannot start a conversation with yourself"));
    }
    if state.db.get_user_by_id(&other)?.is_none() {
        return Err(ApiError::NotFound("user"));
    }

    let listing_id = req.listing_id.map(|l| l.to_string());
    if let Some(listing_id) = listing_id.as_deref() {
        if state.db.get_listing(listing_id)?.is_none() {
            return Err(ApiError::NotFound("listing"));
        }
    }

    if let Some(existing) = state.db.find_chat(&me, &other, listing_id.as_deref())? {
        return Ok((
            StatusCode::OK,
            Json(ApiResponse::ok(chat_response(&state, &existing).await?)),
        ));
    }

    let chat_id = Uuid::new_v4().to_string();
    state
        .db
        .create_chat(&chat_id, &[me.as_str(), other.as_str()], listing_id.as_deref())?;

    let chat = state.db.get_chat(&chat_id)?.ok_or(ApiError::NotFound("conversation"))?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(chat_response(&state, &chat).await?)),
    ))
}

pub async fn get_chats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let chats = state.db.get_chats_for_user(&claims.sub.to_string())?;

    let mut out = Vec::with_capacity(chats.len());
    for chat in &chats {
        out.push(chat_response(&state, chat).await?);
    }

    Ok(Json(ApiResponse::ok(out)))
}

/// Fetching a conversation marks its messages as read by the caller.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(chat_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let chat_id = chat_id.to_string();
    let me = claims.sub.to_string();
    require_participant(&state, &chat_id, &me)?;

    state.db.mark_chat_read(&chat_id, &me)?;

    let rows = state.db.get_chat_messages(&chat_id)?;
    let message_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let receipt_rows = state.db.get_read_receipts(&message_ids)?;

    // group receipts by message id
    let mut receipts: HashMap<String, Vec<ReadReceipt>> = HashMap::new();
    for r in &receipt_rows {
        receipts.entry(r.message_id.clone()).or_default().push(ReadReceipt {
            user: parse_uuid(&r.user_id, "reader id"),
            read_at: parse_ts(&r.read_at, "read receipt"),
        });
    }

    let messages: Vec<ChatMessageResponse> = rows
        .iter()
        .map(|row| {
            message_response(
                row,
                receipts.get(&row.id).map(Vec::as_slice).unwrap_or(&[]),
            )
        })
        .collect();

    Ok(Json(ApiResponse::ok(messages)))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<SendChatMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let chat_id = chat_id.to_string();
    let me = claims.sub.to_string();
    require_participant(&state, &chat_id, &me)?;

    if req.content.trim().is_empty() {
        return Err(ApiError::validation("content is required"));
    }
    if req.message_type == MessageType::Offer && req.offer.is_none() {
        return Err(ApiError::validation("an offer message needs an offer amount"));
    }
    if req.message_type != MessageType::Offer && req.offer.is_some() {
        return Err(ApiError::validation("only offer messages may carry an offer"));
    }

    let message_id = Uuid::new_v4().to_string();
    state.db.insert_chat_message(&NewChatMessage {
        id: message_id.clone(),
        chat_id: chat_id.clone(),
        sender: me.clone(),
        content: req.content.trim().to_string(),
        message_type: req.message_type.as_str().to_string(),
        offer_amount: req.offer.as_ref().map(|o| o.amount),
        offer_listing: req.offer.as_ref().and_then(|o| o.listing_id).map(|l| l.to_string()),
        offer_status: req
            .offer
            .as_ref()
            .map(|_| OfferStatus::Pending.as_str().to_string()),
    })?;

    // offers ping the other side
    if let Some(offer) = &req.offer {
        for participant in state.db.get_chat_participants(&chat_id)? {
            if participant.user_id != me {
                state.db.insert_notification(
                    &participant.user_id,
                    NotificationKind::OfferReceived.as_str(),
                    &format!("{} made an offer of ₹{}", claims.name, offer.amount),
                )?;
            }
        }
    }

    let row = state
        .db
        .get_chat_message(&chat_id, &message_id)?
        .ok_or(ApiError::NotFound("message"))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(message_response(&row, &[]))),
    ))
}

/// Recipient decides on a pending offer. The sender cannot accept their
/// own offer, and a settled offer stays settled.
pub async fn update_offer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((chat_id, message_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateOfferRequest>,
) -> ApiResult<impl IntoResponse> {
    let chat_id = chat_id.to_string();
    let message_id = message_id.to_string();
    let me = claims.sub.to_string();
    require_participant(&state, &chat_id, &me)?;

    if req.status == OfferStatus::Pending {
        return Err(ApiError::validation("status must be accepted or rejected"));
    }

    let message = state
        .db
        .get_chat_message(&chat_id, &message_id)?
        .ok_or(ApiError::NotFound("message"))?;

    if message.offer_amount.is_none() {
        return Err(ApiError::validation("this message is not an offer"));
    }
    if message.sender == me {
        return Err(ApiError::Forbidden("offer"));
    }
    if message.offer_status.as_deref() != Some("pending") {
        return Err(ApiError::conflict("this offer has already been settled"));
    }

    state.db.update_offer_status(&message_id, req.status.as_str())?;

    let row = state
        .db
        .get_chat_message(&chat_id, &message_id)?
        .ok_or(ApiError::NotFound("message"))?;

    Ok(Json(ApiResponse::ok(message_response(&row, &[]))))
}
