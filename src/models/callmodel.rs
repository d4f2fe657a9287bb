use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Default)]
#[sqlx(type_name = "call_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    #[default]
    Audio,
    Video,
}

impl CallType {
    pub fn to_str(&self) -> &str {
        match self {
            CallType::Audio => "audio",
            CallType::Video => "video",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct VoiceCall {
    pub id: Uuid,
    pub caller_id: Uuid,
    pub recipient_id: Uuid,
    pub room_sid: Option<String>,
    pub room_name: String,
    pub call_type: CallType,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}
