// db/calldb.rs
use async_trait::async_trait;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::callmodel::{CallType, VoiceCall};

#[async_trait]
pub trait CallExt {
    async fn create_call(
        &self,
        caller_id: Uuid,
        recipient_id: Uuid,
        room_sid: Option<String>,
        room_name: &str,
        call_type: CallType,
    ) -> Result<VoiceCall, sqlx::Error>;
}

#[async_trait]
impl CallExt for DBClient {
    async fn create_call(
        &self,
        caller_id: Uuid,
        recipient_id: Uuid,
        room_sid: Option<String>,
        room_name: &str,
        call_type: CallType,
    ) -> Result<VoiceCall, sqlx::Error> {
        sqlx::query_as::<_, VoiceCall>(
            r#"
            INSERT INTO voice_calls (id, caller_id, recipient_id, room_sid, room_name, call_type, status, started_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'initiated', NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(caller_id)
        .bind(recipient_id)
        .bind(room_sid)
        .bind(room_name)
        .bind(call_type)
        .fetch_one(&self.pool)
        .await
    }
}
