use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::AppState;
use crate::error::AppResult;

use super::model::{
    ChatDetails, ChatMessage, ChatMessageWithSender, ChatSummary, ChatWithMembers, GroupChat,
    SendMessageRequest,
};

#[axum::debug_handler]
pub async fn get_chat_for_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> AppResult<Json<ChatWithMembers>> {
    let chat = GroupChat::for_event(&state.pool, &event_id).await?;
    Ok(Json(chat))
}

#[axum::debug_handler]
pub async fn get_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> AppResult<Json<Vec<ChatMessageWithSender>>> {
    let messages = ChatMessage::list(&state.pool, &chat_id).await?;
    Ok(Json(messages))
}

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<impl IntoResponse> {
    let message = ChatMessage::send(&state.pool, &chat_id, req).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[axum::debug_handler]
pub async fn chat_details(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> AppResult<Json<ChatDetails>> {
    let details = GroupChat::details(&state.pool, &chat_id).await?;
    Ok(Json(details))
}

#[axum::debug_handler]
pub async fn chats_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<ChatSummary>>> {
    let chats = GroupChat::for_user(&state.pool, &user_id).await?;
    Ok(Json(chats))
}
