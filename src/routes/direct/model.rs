use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct DirectChat {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    pub last_message: Option<String>,
    pub last_message_time: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct DirectChatWithPeer {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    pub last_message: Option<String>,
    pub last_message_time: Option<String>,
    pub peer_id: String,
    pub peer_name: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct DirectMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub text: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct DirectMessageWithSender {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub text: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectChatRequest {
    pub user_a: String,
    pub user_b: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendDirectMessageRequest {
    pub sender_id: String,
    pub text: String,
}

impl DirectChat {
    // (A,B) 是无序对，两个方向都算同一个会话
    pub async fn find_by_pair(
        pool: &SqlitePool,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, DirectChat>(
            r#"
            SELECT id, userA, userB, lastMessage, lastMessageTime
            FROM direct_chats
            WHERE (userA = ?1 AND userB = ?2) OR (userA = ?2 AND userB = ?1)
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(pool)
        .await
    }

    pub async fn get_or_create(
        pool: &SqlitePool,
        user_a: &str,
        user_b: &str,
    ) -> AppResult<Self> {
        if let Some(existing) = Self::find_by_pair(pool, user_a, user_b).await? {
            return Ok(existing);
        }

        let chat = DirectChat {
            id: Uuid::new_v4().to_string(),
            user_a: user_a.to_string(),
            user_b: user_b.to_string(),
            last_message: None,
            last_message_time: None,
        };

        sqlx::query("INSERT INTO direct_chats (id, userA, userB) VALUES (?, ?, ?)")
            .bind(&chat.id)
            .bind(&chat.user_a)
            .bind(&chat.user_b)
            .execute(pool)
            .await?;

        Ok(chat)
    }

    pub async fn for_user(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<DirectChatWithPeer>> {
        let chats = sqlx::query_as::<_, DirectChatWithPeer>(
            r#"
            SELECT c.id, c.userA, c.userB, c.lastMessage, c.lastMessageTime,
                   CASE WHEN c.userA = ?1 THEN c.userB ELSE c.userA END AS peerId,
                   u.displayName AS peerName
            FROM direct_chats c
            LEFT JOIN users u ON u.uid = CASE WHEN c.userA = ?1 THEN c.userB ELSE c.userA END
            WHERE c.userA = ?1 OR c.userB = ?1
            ORDER BY c.lastMessageTime DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(chats)
    }
}

impl DirectMessage {
    pub async fn list(pool: &SqlitePool, chat_id: &str) -> AppResult<Vec<DirectMessageWithSender>> {
        let messages = sqlx::query_as::<_, DirectMessageWithSender>(
            r#"
            SELECT m.id, m.chatId, m.senderId, u.displayName AS senderName, m.text, m.timestamp
            FROM direct_messages m
            LEFT JOIN users u ON u.uid = m.senderId
            WHERE m.chatId = ?
            ORDER BY m.timestamp ASC, m.rowid ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// 消息写入和 lastMessage 缓存更新在同一事务里。
    pub async fn send(
        pool: &SqlitePool,
        chat_id: &str,
        req: SendDirectMessageRequest,
    ) -> AppResult<Self> {
        let mut tx = pool.begin().await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM direct_chats WHERE id = ?)")
                .bind(chat_id)
                .fetch_one(&mut *tx)
                .await?;

        if !exists {
            return Err(AppError::NotFound("Chat not found"));
        }

        let message = DirectMessage {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            sender_id: req.sender_id,
            text: req.text,
            timestamp: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO direct_messages (id, chatId, senderId, text, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.chat_id)
        .bind(&message.sender_id)
        .bind(&message.text)
        .bind(&message.timestamp)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE direct_chats SET lastMessage = ?, lastMessageTime = ? WHERE id = ?")
            .bind(&message.text)
            .bind(&message.timestamp)
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    async fn seed_user(pool: &SqlitePool, uid: &str, name: &str) {
        sqlx::query("INSERT INTO users (uid, email, displayName) VALUES (?, ?, ?)")
            .bind(uid)
            .bind(format!("{}@example.com", uid))
            .bind(name)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pair_lookup_is_symmetric() {
        let pool = test_pool().await;
        seed_user(&pool, "user_alice", "Alice").await;
        seed_user(&pool, "user_bob", "Bob").await;

        let chat = DirectChat::get_or_create(&pool, "user_alice", "user_bob")
            .await
            .unwrap();
        let same = DirectChat::get_or_create(&pool, "user_bob", "user_alice")
            .await
            .unwrap();
        assert_eq!(chat.id, same.id);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM direct_chats")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn send_updates_last_message_cache() {
        let pool = test_pool().await;
        seed_user(&pool, "user_alice", "Alice").await;
        seed_user(&pool, "user_bob", "Bob").await;

        let chat = DirectChat::get_or_create(&pool, "user_alice", "user_bob")
            .await
            .unwrap();

        DirectMessage::send(
            &pool,
            &chat.id,
            SendDirectMessageRequest {
                sender_id: "user_alice".into(),
                text: "hi bob".into(),
            },
        )
        .await
        .unwrap();

        let refreshed = DirectChat::find_by_pair(&pool, "user_bob", "user_alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.last_message.as_deref(), Some("hi bob"));
        assert!(refreshed.last_message_time.is_some());
    }

    #[tokio::test]
    async fn chats_for_user_resolve_the_peer() {
        let pool = test_pool().await;
        seed_user(&pool, "user_alice", "Alice").await;
        seed_user(&pool, "user_bob", "Bob The Builder").await;

        DirectChat::get_or_create(&pool, "user_alice", "user_bob")
            .await
            .unwrap();

        let chats = DirectChat::for_user(&pool, "user_alice").await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].peer_id, "user_bob");
        assert_eq!(chats[0].peer_name.as_deref(), Some("Bob The Builder"));

        let chats = DirectChat::for_user(&pool, "user_bob").await.unwrap();
        assert_eq!(chats[0].peer_id, "user_alice");
    }

    #[tokio::test]
    async fn send_to_unknown_chat_is_not_found() {
        let pool = test_pool().await;

        let err = DirectMessage::send(
            &pool,
            "missing",
            SendDirectMessageRequest {
                sender_id: "user_alice".into(),
                text: "anyone?".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Chat not found")));
    }
}
