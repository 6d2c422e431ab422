use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::AppResult;

use super::model::{CreateEventRequest, EventWithMembers, LeaveOutcome, Requester, TravelEvent};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdRequest {
    pub user_id: String,
}

#[axum::debug_handler]
pub async fn list_events(State(state): State<AppState>) -> AppResult<Json<Vec<EventWithMembers>>> {
    let events = TravelEvent::list(&state.pool).await?;
    Ok(Json(events))
}

#[axum::debug_handler]
pub async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> AppResult<impl IntoResponse> {
    let event = TravelEvent::create(&state.pool, req).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[axum::debug_handler]
pub async fn join_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UserIdRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let status = TravelEvent::join(&state.pool, &id, &req.user_id).await?;
    Ok(Json(json!({ "status": status })))
}

#[axum::debug_handler]
pub async fn accept_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UserIdRequest>,
) -> AppResult<Json<serde_json::Value>> {
    TravelEvent::accept(&state.pool, &id, &req.user_id).await?;
    Ok(Json(json!({ "status": "accepted" })))
}

#[axum::debug_handler]
pub async fn reject_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UserIdRequest>,
) -> AppResult<Json<serde_json::Value>> {
    TravelEvent::reject(&state.pool, &id, &req.user_id).await?;
    Ok(Json(json!({ "status": "rejected" })))
}

#[axum::debug_handler]
pub async fn list_requests(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Requester>>> {
    let requesters = TravelEvent::requests(&state.pool, &id).await?;
    Ok(Json(requesters))
}

#[axum::debug_handler]
pub async fn leave_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UserIdRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let outcome = TravelEvent::leave(&state.pool, &id, &req.user_id).await?;

    let body = match outcome {
        LeaveOutcome::Left => json!({ "status": "left" }),
        LeaveOutcome::Transferred { new_creator_id } => {
            json!({ "status": "transferred", "newCreatorId": new_creator_id })
        }
        LeaveOutcome::Deleted => json!({ "status": "deleted" }),
    };

    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn close_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UserIdRequest>,
) -> AppResult<Json<TravelEvent>> {
    let event = TravelEvent::close(&state.pool, &id, &req.user_id).await?;
    Ok(Json(event))
}

// 创建者校验走可选的 x-user-id 请求头
#[axum::debug_handler]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<serde_json::Value>> {
    let requester = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok());

    TravelEvent::delete(&state.pool, &id, requester).await?;
    Ok(Json(json!({ "success": true })))
}
