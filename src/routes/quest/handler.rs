use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::json;

use crate::AppState;
use crate::error::AppResult;

use super::model::{
    ActiveQuest, CompleteStepRequest, Quest, QuestMembershipRequest, QuestProgress,
    QuestWithSteps, StepCompletion,
};

#[axum::debug_handler]
pub async fn list_quests(State(state): State<AppState>) -> AppResult<Json<Vec<QuestWithSteps>>> {
    let quests = Quest::list(&state.pool).await?;
    Ok(Json(quests))
}

#[axum::debug_handler]
pub async fn quests_for_city(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> AppResult<Json<Vec<QuestWithSteps>>> {
    let quests = Quest::for_city(&state.pool, &city).await?;
    Ok(Json(quests))
}

#[axum::debug_handler]
pub async fn join_quest(
    State(state): State<AppState>,
    Json(req): Json<QuestMembershipRequest>,
) -> AppResult<Json<serde_json::Value>> {
    Quest::join(&state.pool, &req.user_id, &req.quest_id).await?;
    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn quit_quest(
    State(state): State<AppState>,
    Json(req): Json<QuestMembershipRequest>,
) -> AppResult<Json<serde_json::Value>> {
    Quest::quit(&state.pool, &req.user_id, &req.quest_id).await?;
    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn complete_step(
    State(state): State<AppState>,
    Json(req): Json<CompleteStepRequest>,
) -> AppResult<Json<StepCompletion>> {
    let completion = Quest::complete_step(&state.pool, &req.user_id, &req.step_id).await?;
    Ok(Json(completion))
}

#[axum::debug_handler]
pub async fn active_quests(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<ActiveQuest>>> {
    let quests = Quest::active_for_user(&state.pool, &user_id).await?;
    Ok(Json(quests))
}

#[axum::debug_handler]
pub async fn progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<QuestProgress>>> {
    let progress = Quest::progress_for_user(&state.pool, &user_id).await?;
    Ok(Json(progress))
}

#[axum::debug_handler]
pub async fn progress_for_quest(
    State(state): State<AppState>,
    Path((user_id, quest_id)): Path<(String, String)>,
) -> AppResult<Json<QuestProgress>> {
    let progress = Quest::progress_for_quest(&state.pool, &user_id, &quest_id).await?;
    Ok(Json(progress))
}
