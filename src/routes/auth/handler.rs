use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::utils::{generate_otp_code, uid_from_email, verify_password};

use super::model::{OtpCode, SessionInfo, UserSession, ensure_user, find_login_row};

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub session_id: String,
}

#[axum::debug_handler]
pub async fn send_otp(
    State(state): State<AppState>,
    Json(req): Json<SendOtpRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let code = generate_otp_code();
    let expires_at = Utc::now() + state.config.otp_expiry();

    let expires_at = OtpCode::create(&state.pool, &req.email, &code, expires_at).await?;

    match &state.mailer {
        Some(mailer) => {
            let body = format!(
                "Your login code is {}. It expires in {} minutes.",
                code, state.config.otp_expiry_minutes
            );
            if let Err(e) = mailer.send(&req.email, "Your login code", body).await {
                tracing::warn!(email = %req.email, "OTP email failed: {}", e);
            }
        }
        None => {
            // 本地开发没有 SMTP，把验证码打到日志里
            tracing::info!(email = %req.email, code = %code, "SMTP not configured, OTP logged");
        }
    }

    Ok(Json(json!({ "success": true, "expiresAt": expires_at })))
}

#[axum::debug_handler]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> AppResult<Json<serde_json::Value>> {
    OtpCode::verify(&state.pool, &req.email, &req.code, Utc::now()).await?;

    let uid = uid_from_email(&req.email);
    let display_name = req.email.split('@').next().unwrap_or(&req.email);
    let user = ensure_user(&state.pool, &uid, &req.email, display_name).await?;

    let session =
        UserSession::create(&state.pool, &user.uid, state.config.session_expiry()).await?;

    Ok(Json(json!({
        "token": session.session_id,
        "expiresAt": session.expires_at,
        "user": user,
    })))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let row = find_login_row(&state.pool, &req.email)
        .await?
        .ok_or(AppError::Unauthorized("Invalid credentials"))?;

    let stored = row
        .password
        .as_deref()
        .ok_or(AppError::Unauthorized("Invalid credentials"))?;

    if !verify_password(&req.password, stored) {
        return Err(AppError::Unauthorized("Invalid credentials"));
    }

    let user = crate::routes::user::model::User::find_by_id(&state.pool, &row.uid)
        .await?
        .ok_or(AppError::Unauthorized("Invalid credentials"))?;

    let session =
        UserSession::create(&state.pool, &user.uid, state.config.session_expiry()).await?;

    Ok(Json(json!({
        "token": session.session_id,
        "expiresAt": session.expires_at,
        "user": user,
    })))
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> AppResult<Json<serde_json::Value>> {
    UserSession::deactivate(&state.pool, &req.session_id).await?;
    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<SessionInfo>> {
    let info = UserSession::validate(&state.pool, &session_id, Utc::now()).await?;
    Ok(Json(info))
}
