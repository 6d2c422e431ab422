use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub struct Pin {
    pub id: String,
    pub city: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub pin_type: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub active_visitor_count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePinRequest {
    pub city: String,
    #[serde(rename = "type")]
    pub pin_type: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub active_visitor_count: Option<i64>,
}

impl Pin {
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Pin>(
            r#"
            SELECT id, city, type, latitude, longitude, activeVisitorCount
            FROM destination_pins
            "#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, req: CreatePinRequest) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO destination_pins (id, city, type, latitude, longitude, activeVisitorCount)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&req.city)
        .bind(&req.pin_type)
        .bind(req.latitude)
        .bind(req.longitude)
        .bind(req.active_visitor_count.unwrap_or(0))
        .execute(pool)
        .await?;

        Ok(Pin {
            id,
            city: req.city,
            pin_type: req.pin_type,
            latitude: req.latitude,
            longitude: req.longitude,
            active_visitor_count: req.active_visitor_count.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn create_and_list_pins() {
        let pool = test_pool().await;

        let pin = Pin::create(
            &pool,
            CreatePinRequest {
                city: "Paris".into(),
                pin_type: "point_of_interest".into(),
                latitude: Some(48.8566),
                longitude: Some(2.3522),
                active_visitor_count: Some(120),
            },
        )
        .await
        .unwrap();
        assert_eq!(pin.active_visitor_count, 120);

        let pins = Pin::list(&pool).await.unwrap();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].city, "Paris");
    }
}
