use axum::{
    Json,
    extract::{Path, State},
};

use crate::AppState;
use crate::error::{AppError, AppResult};

use super::model::{UpdateUserRequest, UpsertUserRequest, User};

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> AppResult<Json<User>> {
    User::find_by_id(&state.pool, &uid)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("User not found"))
}

#[axum::debug_handler]
pub async fn upsert_user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(req): Json<UpsertUserRequest>,
) -> AppResult<Json<User>> {
    let user = User::upsert(&state.pool, &uid, req).await?;
    Ok(Json(user))
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    User::update(&state.pool, &uid, req)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("User not found"))
}
