use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::utils::parse_reward_points;

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct Quest {
    pub id: String,
    pub city: String,
    pub title: String,
    pub description: Option<String>,
    pub reward: Option<String>,
    pub reward_points: Option<i64>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct QuestStep {
    pub id: String,
    pub quest_id: String,
    pub step_order: i64,
    pub title: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestWithSteps {
    #[serde(flatten)]
    pub quest: Quest,
    pub steps: Vec<QuestStep>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct ActiveQuest {
    pub user_id: String,
    pub quest_id: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub city: String,
    pub title: String,
    pub reward: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCompletion {
    pub quest_id: String,
    pub completed_steps: i64,
    pub total_steps: i64,
    pub is_quest_complete: bool,
    pub points_awarded: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestProgress {
    pub quest_id: String,
    pub completed_step_ids: Vec<String>,
    pub completed_steps: i64,
    pub total_steps: i64,
    pub is_quest_complete: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestMembershipRequest {
    pub user_id: String,
    pub quest_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteStepRequest {
    pub user_id: String,
    pub step_id: String,
}

async fn steps_for_quests(
    pool: &SqlitePool,
    quests: Vec<Quest>,
) -> Result<Vec<QuestWithSteps>, sqlx::Error> {
    let steps = sqlx::query_as::<_, QuestStep>(
        r#"
        SELECT id, questId, stepOrder, title, description, latitude, longitude
        FROM quest_steps
        ORDER BY stepOrder
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut by_quest: HashMap<String, Vec<QuestStep>> = HashMap::new();
    for step in steps {
        by_quest.entry(step.quest_id.clone()).or_default().push(step);
    }

    Ok(quests
        .into_iter()
        .map(|quest| {
            let steps = by_quest.remove(&quest.id).unwrap_or_default();
            QuestWithSteps { quest, steps }
        })
        .collect())
}

impl Quest {
    pub async fn list(pool: &SqlitePool) -> AppResult<Vec<QuestWithSteps>> {
        let quests = sqlx::query_as::<_, Quest>(
            "SELECT id, city, title, description, reward, rewardPoints FROM quests",
        )
        .fetch_all(pool)
        .await?;

        Ok(steps_for_quests(pool, quests).await?)
    }

    pub async fn for_city(pool: &SqlitePool, city: &str) -> AppResult<Vec<QuestWithSteps>> {
        let quests = sqlx::query_as::<_, Quest>(
            r#"
            SELECT id, city, title, description, reward, rewardPoints
            FROM quests
            WHERE LOWER(city) = LOWER(?)
            "#,
        )
        .bind(city)
        .fetch_all(pool)
        .await?;

        Ok(steps_for_quests(pool, quests).await?)
    }

    pub async fn join(pool: &SqlitePool, user_id: &str, quest_id: &str) -> AppResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM quests WHERE id = ?)")
            .bind(quest_id)
            .fetch_one(pool)
            .await?;

        if !exists {
            return Err(AppError::NotFound("Quest not found"));
        }

        sqlx::query(
            "INSERT OR IGNORE INTO user_active_quests (userId, questId, startedAt) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(quest_id)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// 退出即全量重置：参加记录和所有步骤进度一起删。
    pub async fn quit(pool: &SqlitePool, user_id: &str, quest_id: &str) -> AppResult<()> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM user_active_quests WHERE userId = ? AND questId = ?")
            .bind(user_id)
            .bind(quest_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            DELETE FROM user_quest_progress
            WHERE userId = ?
              AND stepId IN (SELECT id FROM quest_steps WHERE questId = ?)
            "#,
        )
        .bind(user_id)
        .bind(quest_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// 记一步进度并重算完成度。全部步骤完成且尚未结算时，
    /// 给参加记录盖 completedAt 并把奖励积分加到用户账上。
    pub async fn complete_step(
        pool: &SqlitePool,
        user_id: &str,
        step_id: &str,
    ) -> AppResult<StepCompletion> {
        let mut tx = pool.begin().await?;

        let quest_id: Option<String> =
            sqlx::query_scalar("SELECT questId FROM quest_steps WHERE id = ?")
                .bind(step_id)
                .fetch_optional(&mut *tx)
                .await?;

        let quest_id = quest_id.ok_or(AppError::NotFound("Step not found"))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT OR IGNORE INTO user_quest_progress (userId, stepId, completedAt) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(step_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let total_steps: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM quest_steps WHERE questId = ?")
                .bind(&quest_id)
                .fetch_one(&mut *tx)
                .await?;

        let completed_steps: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM user_quest_progress p
            JOIN quest_steps s ON s.id = p.stepId
            WHERE p.userId = ? AND s.questId = ?
            "#,
        )
        .bind(user_id)
        .bind(&quest_id)
        .fetch_one(&mut *tx)
        .await?;

        let is_quest_complete = total_steps > 0 && completed_steps >= total_steps;
        let mut points_awarded = 0;

        if is_quest_complete {
            // 只在参加过且尚未结算时发一次奖励
            let active: Option<Option<String>> = sqlx::query_scalar(
                "SELECT completedAt FROM user_active_quests WHERE userId = ? AND questId = ?",
            )
            .bind(user_id)
            .bind(&quest_id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(None) = active {
                sqlx::query(
                    "UPDATE user_active_quests SET completedAt = ? WHERE userId = ? AND questId = ?",
                )
                .bind(&now)
                .bind(user_id)
                .bind(&quest_id)
                .execute(&mut *tx)
                .await?;

                let (reward, reward_points): (Option<String>, Option<i64>) =
                    sqlx::query_as("SELECT reward, rewardPoints FROM quests WHERE id = ?")
                        .bind(&quest_id)
                        .fetch_one(&mut *tx)
                        .await?;

                points_awarded = reward_points.unwrap_or_else(|| {
                    parse_reward_points(reward.as_deref().unwrap_or_default())
                });

                sqlx::query("UPDATE users SET explorerPoints = explorerPoints + ? WHERE uid = ?")
                    .bind(points_awarded)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        Ok(StepCompletion {
            quest_id,
            completed_steps,
            total_steps,
            is_quest_complete,
            points_awarded,
        })
    }

    pub async fn active_for_user(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<ActiveQuest>> {
        let quests = sqlx::query_as::<_, ActiveQuest>(
            r#"
            SELECT a.userId, a.questId, a.startedAt, a.completedAt,
                   q.city, q.title, q.reward
            FROM user_active_quests a
            JOIN quests q ON q.id = a.questId
            WHERE a.userId = ?
            ORDER BY a.startedAt
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(quests)
    }

    pub async fn progress_for_quest(
        pool: &SqlitePool,
        user_id: &str,
        quest_id: &str,
    ) -> AppResult<QuestProgress> {
        let total_steps: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM quest_steps WHERE questId = ?")
                .bind(quest_id)
                .fetch_one(pool)
                .await?;

        let completed_step_ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.stepId
            FROM user_quest_progress p
            JOIN quest_steps s ON s.id = p.stepId
            WHERE p.userId = ? AND s.questId = ?
            ORDER BY s.stepOrder
            "#,
        )
        .bind(user_id)
        .bind(quest_id)
        .fetch_all(pool)
        .await?;

        let completed_steps = completed_step_ids.len() as i64;

        Ok(QuestProgress {
            quest_id: quest_id.to_string(),
            completed_step_ids,
            completed_steps,
            total_steps,
            is_quest_complete: total_steps > 0 && completed_steps >= total_steps,
        })
    }

    pub async fn progress_for_user(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Vec<QuestProgress>> {
        let quest_ids = sqlx::query_scalar::<_, String>(
            "SELECT questId FROM user_active_quests WHERE userId = ? ORDER BY startedAt",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let mut progress = Vec::with_capacity(quest_ids.len());
        for quest_id in quest_ids {
            progress.push(Self::progress_for_quest(pool, user_id, &quest_id).await?);
        }

        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    async fn seed_user(pool: &SqlitePool, uid: &str, points: i64) {
        sqlx::query("INSERT INTO users (uid, email, displayName, explorerPoints) VALUES (?, ?, ?, ?)")
            .bind(uid)
            .bind(format!("{}@example.com", uid))
            .bind(uid)
            .bind(points)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn seed_quest(
        pool: &SqlitePool,
        id: &str,
        city: &str,
        reward: Option<&str>,
        reward_points: Option<i64>,
        step_count: i64,
    ) {
        sqlx::query(
            "INSERT INTO quests (id, city, title, description, reward, rewardPoints) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(city)
        .bind(format!("{} Quest", city))
        .bind("Explore the city")
        .bind(reward)
        .bind(reward_points)
        .execute(pool)
        .await
        .unwrap();

        for n in 1..=step_count {
            sqlx::query(
                "INSERT INTO quest_steps (id, questId, stepOrder, title) VALUES (?, ?, ?, ?)",
            )
            .bind(format!("{}_step_{}", id, n))
            .bind(id)
            .bind(n)
            .bind(format!("Step {}", n))
            .execute(pool)
            .await
            .unwrap();
        }
    }

    async fn user_points(pool: &SqlitePool, uid: &str) -> i64 {
        sqlx::query_scalar("SELECT explorerPoints FROM users WHERE uid = ?")
            .bind(uid)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn city_match_is_case_insensitive() {
        let pool = test_pool().await;
        seed_quest(&pool, "quest_blr", "Bangalore", Some("500 XP"), None, 2).await;

        let quests = Quest::for_city(&pool, "bangalore").await.unwrap();
        assert_eq!(quests.len(), 1);
        assert_eq!(quests[0].steps.len(), 2);
    }

    #[tokio::test]
    async fn completing_all_steps_awards_parsed_reward() {
        let pool = test_pool().await;
        seed_user(&pool, "user_alice", 20).await;
        seed_quest(&pool, "quest_blr", "Bangalore", Some("500 XP"), None, 2).await;
        Quest::join(&pool, "user_alice", "quest_blr").await.unwrap();

        let first = Quest::complete_step(&pool, "user_alice", "quest_blr_step_1")
            .await
            .unwrap();
        assert!(!first.is_quest_complete);
        assert_eq!(first.completed_steps, 1);
        assert_eq!(first.points_awarded, 0);

        let second = Quest::complete_step(&pool, "user_alice", "quest_blr_step_2")
            .await
            .unwrap();
        assert!(second.is_quest_complete);
        assert_eq!(second.points_awarded, 500);
        assert_eq!(user_points(&pool, "user_alice").await, 520);

        let active = Quest::active_for_user(&pool, "user_alice").await.unwrap();
        assert!(active[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn reward_without_digits_awards_zero() {
        let pool = test_pool().await;
        seed_user(&pool, "user_bob", 0).await;
        seed_quest(&pool, "quest_goa", "Goa", Some("Shiny Badge"), None, 1).await;
        Quest::join(&pool, "user_bob", "quest_goa").await.unwrap();

        let done = Quest::complete_step(&pool, "user_bob", "quest_goa_step_1")
            .await
            .unwrap();
        assert!(done.is_quest_complete);
        assert_eq!(done.points_awarded, 0);
        assert_eq!(user_points(&pool, "user_bob").await, 0);
    }

    #[tokio::test]
    async fn structured_reward_points_take_precedence() {
        let pool = test_pool().await;
        seed_user(&pool, "user_bob", 0).await;
        seed_quest(&pool, "quest_del", "Delhi", Some("500 XP"), Some(750), 1).await;
        Quest::join(&pool, "user_bob", "quest_del").await.unwrap();

        let done = Quest::complete_step(&pool, "user_bob", "quest_del_step_1")
            .await
            .unwrap();
        assert_eq!(done.points_awarded, 750);
        assert_eq!(user_points(&pool, "user_bob").await, 750);
    }

    #[tokio::test]
    async fn re_completing_last_step_does_not_double_award() {
        let pool = test_pool().await;
        seed_user(&pool, "user_alice", 0).await;
        seed_quest(&pool, "quest_blr", "Bangalore", Some("500 XP"), None, 1).await;
        Quest::join(&pool, "user_alice", "quest_blr").await.unwrap();

        Quest::complete_step(&pool, "user_alice", "quest_blr_step_1")
            .await
            .unwrap();
        let again = Quest::complete_step(&pool, "user_alice", "quest_blr_step_1")
            .await
            .unwrap();

        assert!(again.is_quest_complete);
        assert_eq!(again.points_awarded, 0);
        assert_eq!(user_points(&pool, "user_alice").await, 500);

        let progress_rows: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_quest_progress WHERE userId = ?")
                .bind("user_alice")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(progress_rows, 1);
    }

    #[tokio::test]
    async fn quit_resets_all_progress() {
        let pool = test_pool().await;
        seed_user(&pool, "user_alice", 0).await;
        seed_quest(&pool, "quest_blr", "Bangalore", Some("500 XP"), None, 2).await;
        Quest::join(&pool, "user_alice", "quest_blr").await.unwrap();
        Quest::complete_step(&pool, "user_alice", "quest_blr_step_1")
            .await
            .unwrap();

        Quest::quit(&pool, "user_alice", "quest_blr").await.unwrap();

        let active = Quest::active_for_user(&pool, "user_alice").await.unwrap();
        assert!(active.is_empty());

        let progress = Quest::progress_for_quest(&pool, "user_alice", "quest_blr")
            .await
            .unwrap();
        assert_eq!(progress.completed_steps, 0);
        assert!(!progress.is_quest_complete);
    }

    #[tokio::test]
    async fn join_is_idempotent_and_checks_quest() {
        let pool = test_pool().await;
        seed_user(&pool, "user_alice", 0).await;
        seed_quest(&pool, "quest_blr", "Bangalore", None, Some(100), 1).await;

        Quest::join(&pool, "user_alice", "quest_blr").await.unwrap();
        Quest::join(&pool, "user_alice", "quest_blr").await.unwrap();

        let active = Quest::active_for_user(&pool, "user_alice").await.unwrap();
        assert_eq!(active.len(), 1);

        let err = Quest::join(&pool, "user_alice", "quest_missing")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Quest not found")));
    }
}
