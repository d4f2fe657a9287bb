use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "alert_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Resolved,
}

impl AlertStatus {
    pub fn to_str(&self) -> &str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct EmergencyAlert {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub location_lat: f64,
    pub location_lng: f64,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct AlertWithWorker {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub location_lat: f64,
    pub location_lng: f64,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub worker_name: Option<String>,
    pub worker_phone: Option<String>,
}
