use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct SafetyAlert {
    pub id: String,
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub alert_type: String,
    pub timestamp: String,
    pub status: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "type")]
    pub alert_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SosRequest {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddContactRequest {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl SafetyAlert {
    // 纯追加，创建后除 status 外不再改动
    pub async fn create(
        pool: &SqlitePool,
        user_id: &str,
        latitude: f64,
        longitude: f64,
        alert_type: &str,
    ) -> AppResult<Self> {
        let alert = SafetyAlert {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            latitude,
            longitude,
            alert_type: alert_type.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            status: "active".into(),
        };

        sqlx::query(
            r#"
            INSERT INTO safety_alerts (id, userId, latitude, longitude, type, timestamp, status)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.user_id)
        .bind(alert.latitude)
        .bind(alert.longitude)
        .bind(&alert.alert_type)
        .bind(&alert.timestamp)
        .bind(&alert.status)
        .execute(pool)
        .await?;

        Ok(alert)
    }
}

impl EmergencyContact {
    pub async fn for_user(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<Self>> {
        let contacts = sqlx::query_as::<_, EmergencyContact>(
            r#"
            SELECT id, userId, name, phone, email
            FROM emergency_contacts
            WHERE userId = ?
            ORDER BY rowid
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(contacts)
    }

    pub async fn add(
        pool: &SqlitePool,
        user_id: &str,
        req: AddContactRequest,
    ) -> AppResult<Self> {
        let contact = EmergencyContact {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: req.name,
            phone: req.phone,
            email: req.email,
        };

        sqlx::query(
            "INSERT INTO emergency_contacts (id, userId, name, phone, email) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&contact.id)
        .bind(&contact.user_id)
        .bind(&contact.name)
        .bind(&contact.phone)
        .bind(&contact.email)
        .execute(pool)
        .await?;

        Ok(contact)
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM emergency_contacts WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Contact not found"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    async fn seed_user(pool: &SqlitePool, uid: &str) {
        sqlx::query("INSERT INTO users (uid, email, displayName) VALUES (?, ?, ?)")
            .bind(uid)
            .bind(format!("{}@example.com", uid))
            .bind(uid)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn alert_is_inserted_active() {
        let pool = test_pool().await;
        seed_user(&pool, "user_alice").await;

        let alert = SafetyAlert::create(&pool, "user_alice", 12.9716, 77.5946, "uncomfortable")
            .await
            .unwrap();
        assert_eq!(alert.status, "active");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM safety_alerts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn contact_crud() {
        let pool = test_pool().await;
        seed_user(&pool, "user_alice").await;

        let contact = EmergencyContact::add(
            &pool,
            "user_alice",
            AddContactRequest {
                name: "Mom".into(),
                phone: Some("+911234567890".into()),
                email: Some("mom@example.com".into()),
            },
        )
        .await
        .unwrap();

        let contacts = EmergencyContact::for_user(&pool, "user_alice").await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].name, "Mom");

        EmergencyContact::delete(&pool, &contact.id).await.unwrap();
        let err = EmergencyContact::delete(&pool, &contact.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("Contact not found")));
    }
}
