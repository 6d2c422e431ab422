use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::utils::hash_password;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub explorer_points: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserRequest {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub explorer_points: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub password: Option<String>,
}

impl User {
    pub async fn find_by_id(pool: &SqlitePool, uid: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT uid, email, displayName, explorerPoints
            FROM users
            WHERE uid = ?
            "#,
        )
        .bind(uid)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT uid, email, displayName, explorerPoints
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    // 冲突时只更新资料列，不碰 password
    pub async fn upsert(pool: &SqlitePool, uid: &str, req: UpsertUserRequest) -> AppResult<Self> {
        sqlx::query(
            r#"
            INSERT INTO users (uid, email, displayName, explorerPoints)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(uid) DO UPDATE SET
                email = excluded.email,
                displayName = excluded.displayName,
                explorerPoints = excluded.explorerPoints
            "#,
        )
        .bind(uid)
        .bind(&req.email)
        .bind(&req.display_name)
        .bind(req.explorer_points.unwrap_or(0))
        .execute(pool)
        .await?;

        Self::find_by_id(pool, uid)
            .await?
            .ok_or(crate::error::AppError::NotFound("User not found"))
    }

    pub async fn update(
        pool: &SqlitePool,
        uid: &str,
        req: UpdateUserRequest,
    ) -> AppResult<Option<Self>> {
        let password_hash = match req.password.as_deref() {
            Some(plain) => Some(
                hash_password(plain)
                    .map_err(|e| sqlx::Error::Protocol(format!("Failed to hash password: {}", e)))?,
            ),
            None => None,
        };

        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = COALESCE(?, email),
                displayName = COALESCE(?, displayName),
                password = COALESCE(?, password)
            WHERE uid = ?
            "#,
        )
        .bind(&req.email)
        .bind(&req.display_name)
        .bind(&password_hash)
        .bind(uid)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Self::find_by_id(pool, uid).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn upsert_creates_then_updates() {
        let pool = test_pool().await;

        let user = User::upsert(
            &pool,
            "user_alice",
            UpsertUserRequest {
                email: Some("alice@example.com".into()),
                display_name: Some("Alice Explorer".into()),
                explorer_points: Some(120),
            },
        )
        .await
        .unwrap();
        assert_eq!(user.explorer_points, 120);

        let user = User::upsert(
            &pool,
            "user_alice",
            UpsertUserRequest {
                email: Some("alice@example.com".into()),
                display_name: Some("Alice".into()),
                explorer_points: Some(150),
            },
        )
        .await
        .unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Alice"));
        assert_eq!(user.explorer_points, 150);
    }

    #[tokio::test]
    async fn upsert_preserves_password_column() {
        let pool = test_pool().await;

        User::upsert(
            &pool,
            "user_bob",
            UpsertUserRequest {
                email: Some("bob@example.com".into()),
                display_name: Some("Bob".into()),
                explorer_points: None,
            },
        )
        .await
        .unwrap();

        User::update(
            &pool,
            "user_bob",
            UpdateUserRequest {
                email: None,
                display_name: None,
                password: Some("secret".into()),
            },
        )
        .await
        .unwrap()
        .unwrap();

        // 再次 upsert 不得清掉密码
        User::upsert(
            &pool,
            "user_bob",
            UpsertUserRequest {
                email: Some("bob@example.com".into()),
                display_name: Some("Bob The Builder".into()),
                explorer_points: Some(50),
            },
        )
        .await
        .unwrap();

        let stored: Option<String> =
            sqlx::query_scalar("SELECT password FROM users WHERE uid = ?")
                .bind("user_bob")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn update_missing_user_is_none() {
        let pool = test_pool().await;

        let updated = User::update(
            &pool,
            "user_ghost",
            UpdateUserRequest {
                email: None,
                display_name: Some("Ghost".into()),
                password: None,
            },
        )
        .await
        .unwrap();
        assert!(updated.is_none());
    }
}
