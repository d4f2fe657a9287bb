// db/alertdb.rs
use async_trait::async_trait;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::alertmodel::{AlertWithWorker, EmergencyAlert};

const ALERT_WITH_WORKER_SELECT: &str = r#"
    SELECT a.id, a.worker_id, a.location_lat, a.location_lng, a.status, a.created_at, a.resolved_at,
           u.name AS worker_name, u.phone AS worker_phone
    FROM emergency_alerts a
    JOIN users u ON u.id = a.worker_id
"#;

#[async_trait]
pub trait AlertExt {
    async fn create_alert(&self, worker_id: Uuid, lat: f64, lng: f64) -> Result<EmergencyAlert, sqlx::Error>;

    async fn get_alert(&self, alert_id: Uuid) -> Result<Option<EmergencyAlert>, sqlx::Error>;

    async fn get_alerts(&self) -> Result<Vec<AlertWithWorker>, sqlx::Error>;

    async fn get_recent_alerts(&self, limit: i64) -> Result<Vec<AlertWithWorker>, sqlx::Error>;

    async fn resolve_alert(&self, alert_id: Uuid) -> Result<Option<EmergencyAlert>, sqlx::Error>;
}

#[async_trait]
impl AlertExt for DBClient {
    async fn create_alert(&self, worker_id: Uuid, lat: f64, lng: f64) -> Result<EmergencyAlert, sqlx::Error> {
        sqlx::query_as::<_, EmergencyAlert>(
            r#"
            INSERT INTO emergency_alerts (id, worker_id, location_lat, location_lng, status)
            VALUES ($1, $2, $3, $4, 'active'::alert_status)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(worker_id)
        .bind(lat)
        .bind(lng)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_alert(&self, alert_id: Uuid) -> Result<Option<EmergencyAlert>, sqlx::Error> {
        sqlx::query_as::<_, EmergencyAlert>(r#"SELECT * FROM emergency_alerts WHERE id = $1"#)
            .bind(alert_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_alerts(&self) -> Result<Vec<AlertWithWorker>, sqlx::Error> {
        let query = format!("{} ORDER BY a.created_at DESC", ALERT_WITH_WORKER_SELECT);
        sqlx::query_as::<_, AlertWithWorker>(&query)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_recent_alerts(&self, limit: i64) -> Result<Vec<AlertWithWorker>, sqlx::Error> {
        let query = format!("{} ORDER BY a.created_at DESC LIMIT $1", ALERT_WITH_WORKER_SELECT);
        sqlx::query_as::<_, AlertWithWorker>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    async fn resolve_alert(&self, alert_id: Uuid) -> Result<Option<EmergencyAlert>, sqlx::Error> {
        sqlx::query_as::<_, EmergencyAlert>(
            r#"
            UPDATE emergency_alerts
            SET status = 'resolved'::alert_status, resolved_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(alert_id)
        .fetch_optional(&self.pool)
        .await
    }
}
