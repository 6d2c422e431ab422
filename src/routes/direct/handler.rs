use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::AppState;
use crate::error::AppResult;

use super::model::{
    CreateDirectChatRequest, DirectChat, DirectChatWithPeer, DirectMessage,
    DirectMessageWithSender, SendDirectMessageRequest,
};

#[axum::debug_handler]
pub async fn create_direct_chat(
    State(state): State<AppState>,
    Json(req): Json<CreateDirectChatRequest>,
) -> AppResult<Json<DirectChat>> {
    let chat = DirectChat::get_or_create(&state.pool, &req.user_a, &req.user_b).await?;
    Ok(Json(chat))
}

#[axum::debug_handler]
pub async fn chats_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<DirectChatWithPeer>>> {
    let chats = DirectChat::for_user(&state.pool, &user_id).await?;
    Ok(Json(chats))
}

#[axum::debug_handler]
pub async fn get_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> AppResult<Json<Vec<DirectMessageWithSender>>> {
    let messages = DirectMessage::list(&state.pool, &chat_id).await?;
    Ok(Json(messages))
}

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(req): Json<SendDirectMessageRequest>,
) -> AppResult<impl IntoResponse> {
    let message = DirectMessage::send(&state.pool, &chat_id, req).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
