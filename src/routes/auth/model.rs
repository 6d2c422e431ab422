use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::routes::user::model::User;

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct UserSession {
    pub session_id: String,
    pub user_id: String,
    pub created_at: String,
    pub expires_at: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub expires_at: String,
    pub user: User,
}

#[derive(Debug, sqlx::FromRow)]
#[sqlx(rename_all = "camelCase")]
struct SessionWithUser {
    session_id: String,
    expires_at: String,
    is_active: bool,
    uid: String,
    email: Option<String>,
    display_name: Option<String>,
    explorer_points: i64,
}

#[derive(Debug, sqlx::FromRow)]
#[sqlx(rename_all = "camelCase")]
pub struct LoginRow {
    pub uid: String,
    pub password: Option<String>,
}

fn is_past(timestamp: &str, now: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(parsed) => now > parsed,
        // 解析不了的过期时间一律当作已过期
        Err(_) => true,
    }
}

pub struct OtpCode;

impl OtpCode {
    pub async fn create(
        pool: &SqlitePool,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<String> {
        let expires_at = expires_at.to_rfc3339();

        sqlx::query(
            "INSERT INTO otp_codes (id, email, code, expiresAt, verified) VALUES (?, ?, ?, ?, 0)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(email)
        .bind(code)
        .bind(&expires_at)
        .execute(pool)
        .await?;

        Ok(expires_at)
    }

    // 码不匹配是 Invalid Code，匹配但超时是 Code Expired
    pub async fn verify(
        pool: &SqlitePool,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let row: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT id, expiresAt FROM otp_codes
            WHERE email = ? AND code = ?
            ORDER BY rowid DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(code)
        .fetch_optional(pool)
        .await?;

        let (id, expires_at) = row.ok_or(AppError::BadRequest("Invalid Code"))?;

        if is_past(&expires_at, now) {
            return Err(AppError::BadRequest("Code Expired"));
        }

        sqlx::query("UPDATE otp_codes SET verified = 1 WHERE id = ?")
            .bind(&id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

/// 按邮箱建档或补全资料，不动已有的积分和密码。
pub async fn ensure_user(
    pool: &SqlitePool,
    uid: &str,
    email: &str,
    display_name: &str,
) -> AppResult<User> {
    sqlx::query(
        r#"
        INSERT INTO users (uid, email, displayName, explorerPoints)
        VALUES (?, ?, ?, 0)
        ON CONFLICT(uid) DO UPDATE SET email = excluded.email
        "#,
    )
    .bind(uid)
    .bind(email)
    .bind(display_name)
    .execute(pool)
    .await?;

    User::find_by_id(pool, uid)
        .await?
        .ok_or(AppError::NotFound("User not found"))
}

pub async fn find_login_row(pool: &SqlitePool, email: &str) -> AppResult<Option<LoginRow>> {
    let row = sqlx::query_as::<_, LoginRow>("SELECT uid, password FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

impl UserSession {
    pub async fn create(pool: &SqlitePool, user_id: &str, ttl: Duration) -> AppResult<Self> {
        let now = Utc::now();
        let session = UserSession {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            created_at: now.to_rfc3339(),
            expires_at: (now + ttl).to_rfc3339(),
            is_active: true,
        };

        sqlx::query(
            r#"
            INSERT INTO user_sessions (sessionId, userId, createdAt, expiresAt, isActive)
            VALUES (?, ?, ?, ?, 1)
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.user_id)
        .bind(&session.created_at)
        .bind(&session.expires_at)
        .execute(pool)
        .await?;

        Ok(session)
    }

    pub async fn validate(
        pool: &SqlitePool,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<SessionInfo> {
        let row = sqlx::query_as::<_, SessionWithUser>(
            r#"
            SELECT s.sessionId, s.expiresAt, s.isActive,
                   u.uid, u.email, u.displayName, u.explorerPoints
            FROM user_sessions s
            JOIN users u ON u.uid = s.userId
            WHERE s.sessionId = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Session not found"))?;

        if !row.is_active || is_past(&row.expires_at, now) {
            return Err(AppError::Unauthorized("Session expired"));
        }

        Ok(SessionInfo {
            session_id: row.session_id,
            expires_at: row.expires_at,
            user: User {
                uid: row.uid,
                email: row.email,
                display_name: row.display_name,
                explorer_points: row.explorer_points,
            },
        })
    }

    pub async fn deactivate(pool: &SqlitePool, session_id: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE user_sessions SET isActive = 0 WHERE sessionId = ?")
            .bind(session_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Session not found"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn mismatched_code_is_invalid_even_when_expired_rows_exist() {
        let pool = test_pool().await;
        let past = Utc::now() - Duration::minutes(5);
        OtpCode::create(&pool, "alice@example.com", "123456", past)
            .await
            .unwrap();

        let err = OtpCode::verify(&pool, "alice@example.com", "654321", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest("Invalid Code")));
    }

    #[tokio::test]
    async fn matching_expired_code_reports_expired() {
        let pool = test_pool().await;
        let past = Utc::now() - Duration::minutes(5);
        OtpCode::create(&pool, "alice@example.com", "123456", past)
            .await
            .unwrap();

        let err = OtpCode::verify(&pool, "alice@example.com", "123456", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest("Code Expired")));
    }

    #[tokio::test]
    async fn fresh_code_verifies() {
        let pool = test_pool().await;
        let future = Utc::now() + Duration::minutes(10);
        OtpCode::create(&pool, "alice@example.com", "123456", future)
            .await
            .unwrap();

        OtpCode::verify(&pool, "alice@example.com", "123456", Utc::now())
            .await
            .unwrap();

        let verified: bool =
            sqlx::query_scalar("SELECT verified FROM otp_codes WHERE email = ?")
                .bind("alice@example.com")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(verified);
    }

    #[tokio::test]
    async fn ensure_user_keeps_existing_points() {
        let pool = test_pool().await;
        sqlx::query("INSERT INTO users (uid, email, displayName, explorerPoints) VALUES (?, ?, ?, ?)")
            .bind("user_alice")
            .bind("alice@example.com")
            .bind("Alice Explorer")
            .bind(120)
            .execute(&pool)
            .await
            .unwrap();

        let user = ensure_user(&pool, "user_alice", "alice@example.com", "alice")
            .await
            .unwrap();
        assert_eq!(user.explorer_points, 120);
        assert_eq!(user.display_name.as_deref(), Some("Alice Explorer"));
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let pool = test_pool().await;
        ensure_user(&pool, "user_alice", "alice@example.com", "alice")
            .await
            .unwrap();

        let session = UserSession::create(&pool, "user_alice", Duration::days(7))
            .await
            .unwrap();

        let info = UserSession::validate(&pool, &session.session_id, Utc::now())
            .await
            .unwrap();
        assert_eq!(info.user.uid, "user_alice");

        UserSession::deactivate(&pool, &session.session_id)
            .await
            .unwrap();

        let err = UserSession::validate(&pool, &session.session_id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized("Session expired")));
    }

    #[tokio::test]
    async fn expired_session_is_rejected() {
        let pool = test_pool().await;
        ensure_user(&pool, "user_alice", "alice@example.com", "alice")
            .await
            .unwrap();

        let session = UserSession::create(&pool, "user_alice", Duration::days(7))
            .await
            .unwrap();

        let later = Utc::now() + Duration::days(8);
        let err = UserSession::validate(&pool, &session.session_id, later)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized("Session expired")));
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let pool = test_pool().await;

        let err = UserSession::validate(&pool, "missing", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Session not found")));
    }
}
