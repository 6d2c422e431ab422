use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::AppState;
use crate::error::AppResult;

use super::model::{CreatePinRequest, Pin};

#[axum::debug_handler]
pub async fn list_pins(State(state): State<AppState>) -> AppResult<Json<Vec<Pin>>> {
    let pins = Pin::list(&state.pool).await?;
    Ok(Json(pins))
}

#[axum::debug_handler]
pub async fn create_pin(
    State(state): State<AppState>,
    Json(req): Json<CreatePinRequest>,
) -> AppResult<impl IntoResponse> {
    let pin = Pin::create(&state.pool, req).await?;
    Ok((StatusCode::CREATED, Json(pin)))
}
