use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct TravelEvent {
    pub id: String,
    pub city: String,
    pub title: String,
    pub event_date: String,
    pub is_date_flexible: bool,
    pub creator_id: String,
    pub requires_approval: bool,
    pub category: Option<String>,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventWithMembers {
    #[serde(flatten)]
    pub event: TravelEvent,
    pub participant_ids: Vec<String>,
    pub pending_request_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub city: String,
    pub title: String,
    pub event_date: String,
    #[serde(default)]
    pub is_date_flexible: bool,
    pub creator_id: String,
    #[serde(default)]
    pub requires_approval: bool,
    pub category: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct Requester {
    pub user_id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum LeaveOutcome {
    Left,
    Transferred { new_creator_id: String },
    Deleted,
}

impl TravelEvent {
    /// 活动行、创建者成员行和群聊在同一事务里落库。
    pub async fn create(pool: &SqlitePool, req: CreateEventRequest) -> AppResult<EventWithMembers> {
        let id = Uuid::new_v4().to_string();
        let chat_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO travel_events
                (id, city, title, eventDate, isDateFlexible, creatorId, requiresApproval, category, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'open')
            "#,
        )
        .bind(&id)
        .bind(&req.city)
        .bind(&req.title)
        .bind(&req.event_date)
        .bind(req.is_date_flexible)
        .bind(&req.creator_id)
        .bind(req.requires_approval)
        .bind(&req.category)
        .execute(&mut *tx)
        .await?;

        // 创建者自动成为成员
        sqlx::query(
            r#"
            INSERT INTO event_participants (eventId, userId, joinedAt)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&req.creator_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        // 群聊随活动一起建
        sqlx::query("INSERT INTO group_chats (id, eventId) VALUES (?, ?)")
            .bind(&chat_id)
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(EventWithMembers {
            event: TravelEvent {
                id,
                city: req.city,
                title: req.title,
                event_date: req.event_date,
                is_date_flexible: req.is_date_flexible,
                creator_id: req.creator_id.clone(),
                requires_approval: req.requires_approval,
                category: req.category,
                status: "open".into(),
            },
            participant_ids: vec![req.creator_id],
            pending_request_ids: vec![],
        })
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TravelEvent>(
            r#"
            SELECT id, city, title, eventDate, isDateFlexible, creatorId,
                   requiresApproval, category, status
            FROM travel_events
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    // 关闭的活动也在列表里，是否展示由客户端决定
    pub async fn list(pool: &SqlitePool) -> AppResult<Vec<EventWithMembers>> {
        let events = sqlx::query_as::<_, TravelEvent>(
            r#"
            SELECT id, city, title, eventDate, isDateFlexible, creatorId,
                   requiresApproval, category, status
            FROM travel_events
            "#,
        )
        .fetch_all(pool)
        .await?;

        let participants = sqlx::query_as::<_, (String, String)>(
            "SELECT eventId, userId FROM event_participants ORDER BY rowid",
        )
        .fetch_all(pool)
        .await?;
        let requests = sqlx::query_as::<_, (String, String)>(
            "SELECT eventId, userId FROM event_requests ORDER BY rowid",
        )
        .fetch_all(pool)
        .await?;

        let mut by_event: HashMap<String, Vec<String>> = HashMap::new();
        for (event_id, user_id) in participants {
            by_event.entry(event_id).or_default().push(user_id);
        }
        let mut pending_by_event: HashMap<String, Vec<String>> = HashMap::new();
        for (event_id, user_id) in requests {
            pending_by_event.entry(event_id).or_default().push(user_id);
        }

        Ok(events
            .into_iter()
            .map(|event| {
                let participant_ids = by_event.remove(&event.id).unwrap_or_default();
                let pending_request_ids = pending_by_event.remove(&event.id).unwrap_or_default();
                EventWithMembers {
                    event,
                    participant_ids,
                    pending_request_ids,
                }
            })
            .collect())
    }

    pub async fn participant_ids(pool: &SqlitePool, event_id: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT userId FROM event_participants WHERE eventId = ? ORDER BY rowid",
        )
        .bind(event_id)
        .fetch_all(pool)
        .await
    }

    pub async fn pending_request_ids(
        pool: &SqlitePool,
        event_id: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT userId FROM event_requests WHERE eventId = ? ORDER BY rowid",
        )
        .bind(event_id)
        .fetch_all(pool)
        .await
    }

    // 需要审批的活动进申请表，其余直接进成员表，两条路径都幂等
    pub async fn join(pool: &SqlitePool, event_id: &str, user_id: &str) -> AppResult<&'static str> {
        let requires_approval: Option<bool> =
            sqlx::query_scalar("SELECT requiresApproval FROM travel_events WHERE id = ?")
                .bind(event_id)
                .fetch_optional(pool)
                .await?;

        let requires_approval = requires_approval.ok_or(AppError::NotFound("Event not found"))?;

        if requires_approval {
            sqlx::query("INSERT OR IGNORE INTO event_requests (eventId, userId) VALUES (?, ?)")
                .bind(event_id)
                .bind(user_id)
                .execute(pool)
                .await?;
            Ok("pending")
        } else {
            sqlx::query(
                "INSERT OR IGNORE INTO event_participants (eventId, userId, joinedAt) VALUES (?, ?, ?)",
            )
            .bind(event_id)
            .bind(user_id)
            .bind(Utc::now().to_rfc3339())
            .execute(pool)
            .await?;
            Ok("accepted")
        }
    }

    /// 申请行删除和成员行插入在同一事务里，不存在两边同时在的中间态。
    pub async fn accept(pool: &SqlitePool, event_id: &str, user_id: &str) -> AppResult<()> {
        let mut tx = pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM event_requests WHERE eventId = ? AND userId = ?")
            .bind(event_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound("Request not found"));
        }

        sqlx::query(
            "INSERT OR IGNORE INTO event_participants (eventId, userId, joinedAt) VALUES (?, ?, ?)",
        )
        .bind(event_id)
        .bind(user_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    pub async fn reject(pool: &SqlitePool, event_id: &str, user_id: &str) -> AppResult<()> {
        let deleted = sqlx::query("DELETE FROM event_requests WHERE eventId = ? AND userId = ?")
            .bind(event_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound("Request not found"));
        }

        Ok(())
    }

    pub async fn requests(pool: &SqlitePool, event_id: &str) -> AppResult<Vec<Requester>> {
        let rows = sqlx::query_as::<_, Requester>(
            r#"
            SELECT r.userId, u.displayName
            FROM event_requests r
            LEFT JOIN users u ON u.uid = r.userId
            WHERE r.eventId = ?
            ORDER BY r.rowid
            "#,
        )
        .bind(event_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn close(pool: &SqlitePool, event_id: &str, user_id: &str) -> AppResult<Self> {
        let event = Self::find_by_id(pool, event_id)
            .await?
            .ok_or(AppError::NotFound("Event not found"))?;

        if event.creator_id != user_id {
            return Err(AppError::Forbidden("Only the creator can close this event"));
        }

        sqlx::query("UPDATE travel_events SET status = 'closed' WHERE id = ?")
            .bind(event_id)
            .execute(pool)
            .await?;

        Ok(TravelEvent {
            status: "closed".into(),
            ..event
        })
    }

    pub async fn delete(
        pool: &SqlitePool,
        event_id: &str,
        requester: Option<&str>,
    ) -> AppResult<()> {
        let creator_id: Option<String> =
            sqlx::query_scalar("SELECT creatorId FROM travel_events WHERE id = ?")
                .bind(event_id)
                .fetch_optional(pool)
                .await?;

        let creator_id = creator_id.ok_or(AppError::NotFound("Event not found"))?;

        if let Some(requester) = requester {
            if requester != creator_id {
                return Err(AppError::Forbidden("Only the creator can delete this event"));
            }
        }

        let mut tx = pool.begin().await?;

        // 不依赖级联，聊天行显式删除
        sqlx::query("DELETE FROM group_chats WHERE eventId = ?")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM travel_events WHERE id = ?")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// 退出活动。创建者退出时把最早加入的其余成员提升为创建者，
    /// 被提升者保留在成员表里；没有其他成员就连同群聊一起删除。
    pub async fn leave(pool: &SqlitePool, event_id: &str, user_id: &str) -> AppResult<LeaveOutcome> {
        let mut tx = pool.begin().await?;

        let creator_id: Option<String> =
            sqlx::query_scalar("SELECT creatorId FROM travel_events WHERE id = ?")
                .bind(event_id)
                .fetch_optional(&mut *tx)
                .await?;

        let creator_id = creator_id.ok_or(AppError::NotFound("Event not found"))?;

        if user_id != creator_id {
            sqlx::query("DELETE FROM event_participants WHERE eventId = ? AND userId = ?")
                .bind(event_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            return Ok(LeaveOutcome::Left);
        }

        // 严格按插入顺序挑继任者
        let next: Option<String> = sqlx::query_scalar(
            r#"
            SELECT userId FROM event_participants
            WHERE eventId = ? AND userId != ?
            ORDER BY rowid ASC
            LIMIT 1
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        match next {
            Some(new_creator_id) => {
                sqlx::query("UPDATE travel_events SET creatorId = ? WHERE id = ?")
                    .bind(&new_creator_id)
                    .bind(event_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM event_participants WHERE eventId = ? AND userId = ?")
                    .bind(event_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;

                tx.commit().await?;
                Ok(LeaveOutcome::Transferred { new_creator_id })
            }
            None => {
                sqlx::query("DELETE FROM group_chats WHERE eventId = ?")
                    .bind(event_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM travel_events WHERE id = ?")
                    .bind(event_id)
                    .execute(&mut *tx)
                    .await?;

                tx.commit().await?;
                Ok(LeaveOutcome::Deleted)
            }
        }
    }
}
