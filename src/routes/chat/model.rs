use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct GroupChat {
    pub id: String,
    pub event_id: String,
}

// 群聊成员不落库，每次读取时从活动成员表派生
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatWithMembers {
    pub id: String,
    pub event_id: String,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub text: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct ChatMessageWithSender {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub text: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct ChatEventRow {
    pub id: String,
    pub event_id: String,
    pub title: String,
    pub city: String,
    pub event_date: String,
    pub creator_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDetails {
    #[serde(flatten)]
    pub chat: ChatEventRow,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    #[serde(flatten)]
    pub chat: ChatEventRow,
    pub last_message: Option<String>,
    pub last_message_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub sender_id: String,
    pub text: String,
}

async fn member_ids(pool: &SqlitePool, event_id: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT userId FROM event_participants WHERE eventId = ? ORDER BY rowid",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await
}

impl GroupChat {
    pub async fn for_event(pool: &SqlitePool, event_id: &str) -> AppResult<ChatWithMembers> {
        let chat = sqlx::query_as::<_, GroupChat>(
            "SELECT id, eventId FROM group_chats WHERE eventId = ?",
        )
        .bind(event_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Chat not found"))?;

        let member_ids = member_ids(pool, event_id).await?;

        Ok(ChatWithMembers {
            id: chat.id,
            event_id: chat.event_id,
            member_ids,
        })
    }

    pub async fn details(pool: &SqlitePool, chat_id: &str) -> AppResult<ChatDetails> {
        let chat = sqlx::query_as::<_, ChatEventRow>(
            r#"
            SELECT c.id, c.eventId, e.title, e.city, e.eventDate, e.creatorId
            FROM group_chats c
            JOIN travel_events e ON e.id = c.eventId
            WHERE c.id = ?
            "#,
        )
        .bind(chat_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Chat not found"))?;

        let member_ids = member_ids(pool, &chat.event_id).await?;

        Ok(ChatDetails {
            chat,
            member_ids,
        })
    }

    pub async fn for_user(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<ChatSummary>> {
        let chats = sqlx::query_as::<_, ChatEventRow>(
            r#"
            SELECT c.id, c.eventId, e.title, e.city, e.eventDate, e.creatorId
            FROM group_chats c
            JOIN travel_events e ON e.id = c.eventId
            JOIN event_participants p ON p.eventId = e.id
            WHERE p.userId = ?
            ORDER BY e.eventDate
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        // 每个会话补上最后一条消息
        let mut summaries = Vec::with_capacity(chats.len());
        for chat in chats {
            let last: Option<(String, String)> = sqlx::query_as(
                r#"
                SELECT text, timestamp FROM chat_messages
                WHERE chatId = ?
                ORDER BY timestamp DESC, rowid DESC
                LIMIT 1
                "#,
            )
            .bind(&chat.id)
            .fetch_optional(pool)
            .await?;

            let (last_message, last_message_time) = match last {
                Some((text, timestamp)) => (Some(text), Some(timestamp)),
                None => (None, None),
            };

            summaries.push(ChatSummary {
                chat,
                last_message,
                last_message_time,
            });
        }

        Ok(summaries)
    }
}

impl ChatMessage {
    pub async fn list(pool: &SqlitePool, chat_id: &str) -> AppResult<Vec<ChatMessageWithSender>> {
        let messages = sqlx::query_as::<_, ChatMessageWithSender>(
            r#"
            SELECT m.id, m.chatId, m.senderId, u.displayName AS senderName, m.text, m.timestamp
            FROM chat_messages m
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

    pub async fn send(
        pool: &SqlitePool,
        chat_id: &str,
        req: SendMessageRequest,
    ) -> AppResult<Self> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM group_chats WHERE id = ?)")
                .bind(chat_id)
                .fetch_one(pool)
                .await?;

        if !exists {
            return Err(AppError::NotFound("Chat not found"));
        }

        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            sender_id: req.sender_id,
            text: req.text,
            timestamp: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO chat_messages (id, chatId, senderId, text, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.chat_id)
        .bind(&message.sender_id)
        .bind(&message.text)
        .bind(&message.timestamp)
        .execute(pool)
        .await?;

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::routes::event::model::{CreateEventRequest, TravelEvent};

    async fn seed_user(pool: &SqlitePool, uid: &str, name: &str) {
        sqlx::query("INSERT INTO users (uid, email, displayName) VALUES (?, ?, ?)")
            .bind(uid)
            .bind(format!("{}@example.com", uid))
            .bind(name)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn seed_event(pool: &SqlitePool, creator: &str) -> String {
        TravelEvent::create(
            pool,
            CreateEventRequest {
                city: "Goa".into(),
                title: "Beach Hopping".into(),
                event_date: "2026-09-05T08:00:00Z".into(),
                is_date_flexible: true,
                creator_id: creator.into(),
                requires_approval: false,
                category: Some("Adventure".into()),
            },
        )
        .await
        .unwrap()
        .event
        .id
    }

    #[tokio::test]
    async fn members_are_derived_from_participants() {
        let pool = test_pool().await;
        seed_user(&pool, "user_alice", "Alice").await;
        seed_user(&pool, "user_bob", "Bob").await;
        let event_id = seed_event(&pool, "user_alice").await;

        let chat = GroupChat::for_event(&pool, &event_id).await.unwrap();
        assert_eq!(chat.member_ids, vec!["user_alice"]);

        TravelEvent::join(&pool, &event_id, "user_bob").await.unwrap();

        // 不写任何聊天成员表，读取即反映活动成员变化
        let chat = GroupChat::for_event(&pool, &event_id).await.unwrap();
        assert_eq!(chat.member_ids, vec!["user_alice", "user_bob"]);
    }

    #[tokio::test]
    async fn messages_carry_sender_names_in_order() {
        let pool = test_pool().await;
        seed_user(&pool, "user_alice", "Alice Explorer").await;
        seed_user(&pool, "user_bob", "Bob").await;
        let event_id = seed_event(&pool, "user_alice").await;
        let chat = GroupChat::for_event(&pool, &event_id).await.unwrap();

        ChatMessage::send(
            &pool,
            &chat.id,
            SendMessageRequest {
                sender_id: "user_alice".into(),
                text: "Hey everyone!".into(),
            },
        )
        .await
        .unwrap();
        ChatMessage::send(
            &pool,
            &chat.id,
            SendMessageRequest {
                sender_id: "user_bob".into(),
                text: "Excited!".into(),
            },
        )
        .await
        .unwrap();

        let messages = ChatMessage::list(&pool, &chat.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender_name.as_deref(), Some("Alice Explorer"));
        assert_eq!(messages[1].text, "Excited!");
    }

    #[tokio::test]
    async fn send_to_unknown_chat_is_not_found() {
        let pool = test_pool().await;

        let err = ChatMessage::send(
            &pool,
            "missing-chat",
            SendMessageRequest {
                sender_id: "user_alice".into(),
                text: "hello?".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Chat not found")));
    }

    #[tokio::test]
    async fn chats_for_user_include_last_message() {
        let pool = test_pool().await;
        seed_user(&pool, "user_alice", "Alice").await;
        let event_id = seed_event(&pool, "user_alice").await;
        let chat = GroupChat::for_event(&pool, &event_id).await.unwrap();

        ChatMessage::send(
            &pool,
            &chat.id,
            SendMessageRequest {
                sender_id: "user_alice".into(),
                text: "first".into(),
            },
        )
        .await
        .unwrap();
        ChatMessage::send(
            &pool,
            &chat.id,
            SendMessageRequest {
                sender_id: "user_alice".into(),
                text: "second".into(),
            },
        )
        .await
        .unwrap();

        let summaries = GroupChat::for_user(&pool, "user_alice").await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].last_message.as_deref(), Some("second"));
    }
}
