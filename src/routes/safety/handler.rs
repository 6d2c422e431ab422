use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::AppState;
use crate::error::AppResult;
use crate::utils::maps_link;

use super::model::{
    AddContactRequest, CreateAlertRequest, EmergencyContact, SafetyAlert, SosRequest,
};

#[axum::debug_handler]
pub async fn create_alert(
    State(state): State<AppState>,
    Json(req): Json<CreateAlertRequest>,
) -> AppResult<impl IntoResponse> {
    let alert = SafetyAlert::create(
        &state.pool,
        &req.user_id,
        req.latitude,
        req.longitude,
        &req.alert_type,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

/// 告警先落库，联系人逐个尽力通知，单个失败只记日志。
#[axum::debug_handler]
pub async fn sos(
    State(state): State<AppState>,
    Json(req): Json<SosRequest>,
) -> AppResult<impl IntoResponse> {
    let alert = SafetyAlert::create(
        &state.pool,
        &req.user_id,
        req.latitude,
        req.longitude,
        "emergency",
    )
    .await?;

    let contacts = EmergencyContact::for_user(&state.pool, &req.user_id).await?;

    let body = format!(
        "{} triggered an SOS alert.\nLast known location: {}",
        req.user_id,
        maps_link(req.latitude, req.longitude)
    );

    let mut notified = 0;
    for contact in &contacts {
        let Some(email) = contact.email.as_deref().filter(|e| !e.is_empty()) else {
            continue;
        };

        match &state.mailer {
            Some(mailer) => match mailer.send(email, "SOS Alert", body.clone()).await {
                Ok(()) => notified += 1,
                Err(e) => {
                    tracing::warn!(contact = %contact.id, "SOS email failed: {}", e);
                }
            },
            None => {
                tracing::debug!(contact = %contact.id, "SMTP not configured, SOS email skipped");
            }
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "alert": alert, "contactsNotified": notified })),
    ))
}

#[axum::debug_handler]
pub async fn list_contacts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<EmergencyContact>>> {
    let contacts = EmergencyContact::for_user(&state.pool, &user_id).await?;
    Ok(Json(contacts))
}

#[axum::debug_handler]
pub async fn add_contact(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<AddContactRequest>,
) -> AppResult<impl IntoResponse> {
    let contact = EmergencyContact::add(&state.pool, &user_id, req).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

#[axum::debug_handler]
pub async fn delete_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    EmergencyContact::delete(&state.pool, &id).await?;
    Ok(Json(json!({ "success": true })))
}
